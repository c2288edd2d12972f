use quiz_core::model::UserId;

/// Answers "is someone logged in, and who".
///
/// Only used to decide whether a finished attempt is forwarded to persistence.
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn user_id(&self) -> Option<UserId>;
}

/// Fixed auth state, resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    User(UserId),
}

impl AuthState {
    #[must_use]
    pub fn from_user(user: Option<UserId>) -> Self {
        user.map_or(Self::Anonymous, Self::User)
    }
}

impl AuthProvider for AuthState {
    fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::User(_))
    }

    fn user_id(&self) -> Option<UserId> {
        match self {
            AuthState::Anonymous => None,
            AuthState::User(id) => Some(id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_identity() {
        let auth = AuthState::from_user(None);
        assert!(!auth.is_authenticated());
        assert_eq!(auth.user_id(), None);
    }

    #[test]
    fn user_state_exposes_identity() {
        let auth = AuthState::from_user(Some(UserId::new("u-1")));
        assert!(auth.is_authenticated());
        assert_eq!(auth.user_id(), Some(UserId::new("u-1")));
    }
}
