//! Admin console gate.
//!
//! Plain string comparison against the configured passwords. The login
//! password and the reset passphrase are separate secrets: knowing one
//! never opens the other.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("パスワードが違います。")]
    WrongPassword,

    #[error("リセット用パスフレーズが違います。")]
    WrongResetPassphrase,

    #[error("管理者としてログインしてください。")]
    NotAuthenticated,
}

#[derive(Debug, Clone)]
pub struct AdminGate {
    admin_password: String,
    reset_password: String,
    authenticated: bool,
}

impl AdminGate {
    pub fn new(admin_password: impl Into<String>, reset_password: impl Into<String>) -> Self {
        Self {
            admin_password: admin_password.into(),
            reset_password: reset_password.into(),
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn login(&mut self, attempt: &str) -> Result<(), AdminError> {
        if attempt == self.admin_password {
            self.authenticated = true;
            Ok(())
        } else {
            Err(AdminError::WrongPassword)
        }
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }

    /// Check the passphrase that authorizes wiping every collection.
    /// The admin password never passes, even if configured as both.
    pub fn authorize_reset(&self, attempt: &str) -> Result<(), AdminError> {
        if !self.authenticated {
            return Err(AdminError::NotAuthenticated);
        }
        if attempt == self.reset_password && attempt != self.admin_password {
            Ok(())
        } else {
            Err(AdminError::WrongResetPassphrase)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AdminGate {
        AdminGate::new("shogi", "shogi-reset")
    }

    #[test]
    fn test_login() {
        let mut gate = gate();
        assert_eq!(gate.login("Shogi"), Err(AdminError::WrongPassword));
        assert!(!gate.is_authenticated());
        assert_eq!(gate.login("shogi"), Ok(()));
        assert!(gate.is_authenticated());
        gate.logout();
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_admin_password_does_not_authorize_reset() {
        let mut gate = gate();
        gate.login("shogi").expect("login");
        assert_eq!(
            gate.authorize_reset("shogi"),
            Err(AdminError::WrongResetPassphrase)
        );
        assert_eq!(gate.authorize_reset("shogi-reset"), Ok(()));
    }

    #[test]
    fn test_shared_secret_never_authorizes_reset() {
        let mut gate = AdminGate::new("shogi", "shogi");
        gate.login("shogi").expect("login");
        assert_eq!(
            gate.authorize_reset("shogi"),
            Err(AdminError::WrongResetPassphrase)
        );
    }

    #[test]
    fn test_reset_requires_login() {
        let gate = gate();
        assert_eq!(
            gate.authorize_reset("shogi-reset"),
            Err(AdminError::NotAuthenticated)
        );
    }
}
