//! Identity provider contract.
//!
//! The authentication exchange itself lives outside this workspace; the
//! coordination layer only needs a stable identifier for the signed-in user.

use std::sync::RwLock;

/// Yields the identifier of the currently signed-in user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// An identity provider backed by an in-process value.
///
/// Suitable for tests, the CLI, and hosts that resolve identity elsewhere and
/// push the result in via [`StaticIdentity::sign_in`].
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let identity = StaticIdentity::anonymous();
        assert_eq!(identity.current_user_id(), None);

        identity.sign_in("u1");
        assert_eq!(identity.current_user_id().as_deref(), Some("u1"));

        identity.sign_out();
        assert_eq!(identity.current_user_id(), None);
    }
}
