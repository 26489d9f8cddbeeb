use serde::{Deserialize, Serialize};

/// Machine-readable error codes handed to the API layer.
/// Shared by every domain crate in the workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidPayload,
    NotFound,
    Conflict,
    ProvisioningFailed,
    IoError,
    Internal,
}

impl ErrorCode {
    /// Suggested HTTP status code for this error.
    /// Transport-agnostic (returns u16, not a framework type).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidPayload => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ProvisioningFailed => 502,
            Self::IoError | Self::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adding a new ErrorCode variant forces an update here until the
    /// status mapping is explicitly verified.
    #[test]
    fn all_error_code_variants_map_to_expected_http_status() {
        let cases = [
            (ErrorCode::InvalidPayload, 400),
            (ErrorCode::NotFound, 404),
            (ErrorCode::Conflict, 409),
            (ErrorCode::ProvisioningFailed, 502),
            (ErrorCode::IoError, 500),
            (ErrorCode::Internal, 500),
        ];
        for (code, expected_status) in &cases {
            assert_eq!(
                code.http_status(),
                *expected_status,
                "{code:?} should map to HTTP {expected_status}"
            );
        }
    }

    #[test]
    fn error_code_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::ProvisioningFailed).unwrap(),
            "provisioning_failed"
        );
        assert_eq!(
            serde_json::to_value(ErrorCode::InvalidPayload).unwrap(),
            "invalid_payload"
        );
        let parsed: ErrorCode = serde_json::from_str(r#""not_found""#).unwrap();
        assert_eq!(parsed, ErrorCode::NotFound);
    }
}
