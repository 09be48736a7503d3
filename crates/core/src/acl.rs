//! Access control evaluation
//!
//! Object stores have no execute bit. READ grants also satisfy execute so
//! that readable directories stay traversable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::{Grant, Grantee, ObjectAcl, Owner, Permission};

const ALL_USERS: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const AUTHENTICATED_USERS: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// Requested access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

impl AccessMode {
    fn satisfied_by(self, permission: Permission) -> bool {
        match (self, permission) {
            (_, Permission::FullControl) => true,
            (AccessMode::Read | AccessMode::Execute, Permission::Read) => true,
            (AccessMode::Write, Permission::Write) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
            AccessMode::Execute => write!(f, "execute"),
        }
    }
}

/// Grants and owner of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlList {
    pub bucket: String,
    pub key: String,
    pub grants: Vec<Grant>,
    pub owner: Owner,
}

impl AccessControlList {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, acl: ObjectAcl) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            grants: acl.grants,
            owner: acl.owner,
        }
    }

    fn applies_to(grantee: &Grantee, principal: &Owner) -> bool {
        match grantee {
            Grantee::Account(id) => *id == principal.id,
            Grantee::Group(uri) => uri == ALL_USERS || uri == AUTHENTICATED_USERS,
            Grantee::Email(_) => false,
        }
    }

    /// Whether `principal` holds `mode` on this object
    pub fn allows(&self, principal: &Owner, mode: AccessMode) -> bool {
        if principal.id == self.owner.id {
            return true;
        }
        self.grants
            .iter()
            .filter(|g| Self::applies_to(&g.grantee, principal))
            .any(|g| mode.satisfied_by(g.permission))
    }

    /// Fail with [`Error::AccessDenied`] on the first mode `principal` lacks
    pub fn check_access(&self, principal: &Owner, modes: &[AccessMode]) -> Result<()> {
        match modes.iter().find(|m| !self.allows(principal, **m)) {
            Some(mode) => Err(Error::AccessDenied(format!(
                "{}/{}: {mode} access denied",
                self.bucket, self.key
            ))),
            None => Ok(()),
        }
    }
}
