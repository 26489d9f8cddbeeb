//! Authority domain error types.

use tern_common::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("issuer plugin failed: {0}")]
    Provisioning(String),

    #[error("role already exists with a different credential: {0}")]
    DuplicateRole(String),

    #[error("authority name already taken: {0}")]
    DuplicateName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthorityError>;

impl From<&AuthorityError> for ErrorCode {
    fn from(e: &AuthorityError) -> Self {
        match e {
            AuthorityError::Validation(_) => ErrorCode::InvalidPayload,
            AuthorityError::Provisioning(_) => ErrorCode::ProvisioningFailed,
            AuthorityError::DuplicateRole(_) | AuthorityError::DuplicateName(_) => {
                ErrorCode::Conflict
            }
            AuthorityError::NotFound(_) => ErrorCode::NotFound,
            AuthorityError::Io(_) => ErrorCode::IoError,
            AuthorityError::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_violations_are_conflicts() {
        let name = AuthorityError::DuplicateName("root-ca".into());
        let role = AuthorityError::DuplicateRole("root-ca_admin".into());
        assert_eq!(ErrorCode::from(&name), ErrorCode::Conflict);
        assert_eq!(ErrorCode::from(&role), ErrorCode::Conflict);
        assert_eq!(ErrorCode::from(&name).http_status(), 409);
    }

    #[test]
    fn plugin_failures_map_to_bad_gateway() {
        let e = AuthorityError::Provisioning("timed out".into());
        assert_eq!(ErrorCode::from(&e).http_status(), 502);
        assert_eq!(e.to_string(), "issuer plugin failed: timed out");
    }
}
