//! Mapping of SDK failures onto the core error taxonomy

use aws_sdk_s3::error::SdkError;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use objfs_core::Error;

/// Format AWS SDK error into a detailed error message
pub(crate) fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E, HttpResponse>) -> String {
    match error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let meta = service_err.raw();
            let mut msg = format!("Service error: {err}");
            if let Some(code) = meta.headers().get("x-amz-error-code") {
                msg.push_str(&format!(" (code: {code})"));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => format!("Request construction failed: {err:?}"),
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
        SdkError::ResponseError(err) => format!("Response error: {err:?}"),
        _ => error.to_string(),
    }
}

/// Classify a failed request on `location` (`bucket/key`)
pub(crate) fn map_sdk_error<E: std::fmt::Display>(
    error: SdkError<E, HttpResponse>,
    location: &str,
) -> Error {
    let detail = format_sdk_error(&error);

    if matches!(error, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return Error::Transient(format!("{location}: {detail}"));
    }

    match error.raw_response().map(|r| r.status().as_u16()) {
        Some(status) => error_for_status(status, location, detail),
        None => Error::io(location, detail),
    }
}

/// Error for an HTTP status returned by the store
pub(crate) fn error_for_status(status: u16, location: &str, detail: String) -> Error {
    match status {
        404 => Error::NotFound(location.to_string()),
        403 => Error::AccessDenied(format!("{location}: {detail}")),
        429 | 500..=599 => Error::Transient(format!("{location}: {detail} (status {status})")),
        _ => Error::io(location, detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let detail = || "detail".to_string();
        assert!(matches!(error_for_status(404, "b/k", detail()), Error::NotFound(p) if p == "b/k"));
        assert!(matches!(error_for_status(403, "b/k", detail()), Error::AccessDenied(_)));
        assert!(matches!(error_for_status(503, "b/k", detail()), Error::Transient(_)));
        assert!(matches!(error_for_status(500, "b/k", detail()), Error::Transient(_)));
        assert!(matches!(error_for_status(429, "b/k", detail()), Error::Transient(_)));
        assert!(matches!(
            error_for_status(400, "b/k", detail()),
            Error::Io { ref path, .. } if path == "b/k"
        ));
    }
}
