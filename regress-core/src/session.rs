//! Login session, kept apart from the persisted aggregate and handed to
//! every action that needs to know who is acting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::models::User;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self {
            user,
            logged_in_at: Utc::now(),
        }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    /// Administrator pages: folders, the script library, all projects
    pub fn require_admin(&self) -> StoreResult<()> {
        if !self.is_admin() {
            return Err(StoreError::validation(format!(
                "'{}' is not an administrator",
                self.user.username
            )));
        }
        Ok(())
    }
}

/// Unwraps an optional session, failing with a prompt to log in
pub fn require_session(session: Option<Session>) -> StoreResult<Session> {
    session.ok_or_else(|| StoreError::validation("Not logged in. Run `regress login` first."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_users;

    #[test]
    fn test_role_checks() {
        let users = default_users();
        let admin = Session::new(users[0].clone());
        let user = Session::new(users[1].clone());

        assert!(admin.require_admin().is_ok());
        assert!(matches!(user.require_admin(), Err(StoreError::Validation(_))));
        assert_eq!(user.username(), "user01");
    }

    #[test]
    fn test_require_session() {
        assert!(require_session(None).is_err());
        let session = Session::new(default_users()[1].clone());
        assert_eq!(require_session(Some(session.clone())).unwrap(), session);
    }
}
