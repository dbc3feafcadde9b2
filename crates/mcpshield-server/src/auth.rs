//! Authentication placeholder.
//!
//! Deliberately deferred: when wired in, `tools/list` filters the merged
//! catalogue by principal and `tools/call` adds an authorization check before
//! dispatch. Until then [`AllowAll`] stands in.

use serde_json::Value;
use thiserror::Error;

/// Authenticated caller identity.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub service_account: String,
    pub namespace: String,
}

/// Authentication failure.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Authentication and authorization seam for the proxy.
pub trait Authenticator: Send + Sync {
    /// Validate a token and return the caller's identity.
    ///
    /// # Errors
    /// Returns an error if the token is rejected.
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;

    /// Restrict the merged catalogue to tools the principal may see.
    fn filter_tools(&self, principal: &Principal, catalogue: Vec<Value>) -> Vec<Value>;

    /// Whether the principal may invoke the tool behind this public name.
    fn authorize_call(&self, principal: &Principal, public_name: &str) -> bool;
}

/// Placeholder authenticator: any non-empty token maps to a fixed test
/// identity and everything is visible and allowed.
#[derive(Debug, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken("empty token".to_string()));
        }
        Ok(Principal {
            username: "test-user".to_string(),
            service_account: "default".to_string(),
            namespace: "default".to_string(),
        })
    }

    fn filter_tools(&self, _principal: &Principal, catalogue: Vec<Value>) -> Vec<Value> {
        catalogue
    }

    fn authorize_call(&self, _principal: &Principal, _public_name: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_token_rejected() {
        assert!(AllowAll.authenticate("").is_err());
    }

    #[test]
    fn non_empty_token_accepted_and_unrestricted() {
        let auth = AllowAll;
        let principal = auth.authenticate("anything").unwrap();
        assert_eq!(principal.username, "test-user");

        let catalogue = vec![json!({ "name": "ms_alpha_search" })];
        assert_eq!(auth.filter_tools(&principal, catalogue.clone()), catalogue);
        assert!(auth.authorize_call(&principal, "ms_alpha_search"));
    }
}
