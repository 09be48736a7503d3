//! File attribute views
//!
//! Object stores only know sizes, timestamps and ACLs. These are presented as
//! a basic view (size, times, kind) and a POSIX-shaped view (owner and
//! permission bits derived from the owner's ACL grants).

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::traits::{Grant, Grantee, ObjectAcl, ObjectMeta, Permission};

const OWNER_READ: u32 = 0o400;
const OWNER_WRITE: u32 = 0o200;

/// POSIX permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PosixPermissions(u32);

impl PosixPermissions {
    pub fn from_mode(mode: u32) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(self) -> u32 {
        self.0
    }

    /// Owner bits granted by the ACL entries addressed to the owner
    pub fn from_acl(acl: &ObjectAcl) -> Self {
        let mut mode = 0;
        for grant in owner_grants(acl) {
            mode |= match grant.permission {
                Permission::FullControl => OWNER_READ | OWNER_WRITE,
                Permission::Read => OWNER_READ,
                Permission::Write => OWNER_WRITE,
                Permission::ReadAcp | Permission::WriteAcp => 0,
            };
        }
        Self(mode)
    }
}

fn owner_grants(acl: &ObjectAcl) -> impl Iterator<Item = &Grant> {
    acl.grants
        .iter()
        .filter(|g| matches!(&g.grantee, Grantee::Account(id) if *id == acl.owner.id))
}

impl std::fmt::Display for PosixPermissions {
    /// `rwxr-x---` notation
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const FLAGS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];
        for (bit, c) in FLAGS {
            write!(f, "{}", if self.0 & bit != 0 { c } else { '-' })?;
        }
        Ok(())
    }
}

impl Serialize for PosixPermissions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// POSIX-shaped extension of the basic attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PosixAttributes {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub permissions: PosixPermissions,
}

impl PosixAttributes {
    pub fn from_acl(acl: &ObjectAcl) -> Self {
        Self {
            owner: acl
                .owner
                .display_name
                .clone()
                .or_else(|| Some(acl.owner.id.clone()).filter(|id| !id.is_empty())),
            group: None,
            permissions: PosixPermissions::from_acl(acl),
        }
    }
}

/// Snapshot of a path's attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttributes {
    /// Key of the object the snapshot was derived from
    pub file_key: String,
    pub size: u64,
    pub last_modified_time: Option<Timestamp>,
    pub last_access_time: Option<Timestamp>,
    pub creation_time: Option<Timestamp>,
    pub is_directory: bool,
    pub is_regular_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posix: Option<PosixAttributes>,
}

impl FileAttributes {
    /// Regular file backed by `meta`
    pub fn file(meta: &ObjectMeta) -> Self {
        Self {
            file_key: meta.key.clone(),
            size: meta.size,
            last_modified_time: meta.last_modified,
            last_access_time: meta.last_modified,
            creation_time: meta.last_modified,
            is_directory: false,
            is_regular_file: true,
            posix: None,
        }
    }

    /// Directory, explicit (marker `meta`) or implicit (first child `meta`)
    pub fn directory(key: impl Into<String>, meta: Option<&ObjectMeta>) -> Self {
        let modified = meta.and_then(|m| m.last_modified);
        Self {
            file_key: key.into(),
            size: 0,
            last_modified_time: modified,
            last_access_time: modified,
            creation_time: modified,
            is_directory: true,
            is_regular_file: false,
            posix: None,
        }
    }

    pub fn with_posix(mut self, posix: PosixAttributes) -> Self {
        self.posix = Some(posix);
        self
    }

    fn basic_map(&self) -> BTreeMap<String, Value> {
        let time = |t: Option<Timestamp>| t.map_or(Value::Null, |t| Value::String(t.to_string()));
        BTreeMap::from([
            ("lastModifiedTime".to_string(), time(self.last_modified_time)),
            ("lastAccessTime".to_string(), time(self.last_access_time)),
            ("creationTime".to_string(), time(self.creation_time)),
            ("size".to_string(), Value::from(self.size)),
            ("isRegularFile".to_string(), Value::Bool(self.is_regular_file)),
            ("isDirectory".to_string(), Value::Bool(self.is_directory)),
            ("isSymbolicLink".to_string(), Value::Bool(false)),
            ("isOther".to_string(), Value::Bool(false)),
            ("fileKey".to_string(), Value::String(self.file_key.clone())),
        ])
    }

    /// Attribute map for the given selector
    pub fn to_map(&self, selector: &AttributeSelector) -> BTreeMap<String, Value> {
        let mut map = self.basic_map();

        if selector.posix {
            let posix = self.posix.as_ref();
            let opt = |s: Option<&String>| s.map_or(Value::Null, |s| Value::String(s.clone()));
            map.insert("owner".to_string(), opt(posix.and_then(|p| p.owner.as_ref())));
            map.insert("group".to_string(), opt(posix.and_then(|p| p.group.as_ref())));
            map.insert(
                "permissions".to_string(),
                posix.map_or(Value::Null, |p| Value::String(p.permissions.to_string())),
            );
        }

        if let Some(names) = &selector.names {
            map.retain(|k, _| names.iter().any(|n| n == k));
        }

        map
    }
}

/// Parsed attribute selector such as `basic:*` or `posix:size,owner`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Whether POSIX attributes are requested
    pub posix: bool,
    /// Requested names; `None` selects everything in the view
    pub names: Option<Vec<String>>,
}

impl AttributeSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Error::UnsupportedOption("empty attribute selector".to_string()));
        }

        match selector {
            "*" | "basic:*" => {
                return Ok(Self {
                    posix: false,
                    names: None,
                });
            }
            "posix:*" => {
                return Ok(Self {
                    posix: true,
                    names: None,
                });
            }
            _ => {}
        }

        let mut posix = false;
        let mut names = Vec::new();
        for item in selector.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let name = match item.split_once(':') {
                Some(("basic", name)) => name,
                Some(("posix", name)) => {
                    posix = true;
                    name
                }
                Some((view, _)) => {
                    return Err(Error::UnsupportedOption(format!(
                        "attribute view '{view}' is not supported, only basic and posix are"
                    )));
                }
                None => item,
            };
            names.push(name.to_string());
        }

        Ok(Self {
            posix,
            names: Some(names),
        })
    }
}
