use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "shogi-reception";

/// Keychain account holding the realtime database auth token.
const DB_TOKEN_ACCOUNT: &str = "database-token";

/// Secure OS-level storage for the realtime database credential.
pub struct CredentialStore;

impl CredentialStore {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, DB_TOKEN_ACCOUNT).context("Failed to create keyring entry")
    }

    /// Store the database token in the OS keychain
    pub fn store_db_token(token: &str) -> Result<()> {
        Self::entry()?
            .set_password(token)
            .context("Failed to store database token in keychain")?;
        Ok(())
    }

    /// Retrieve the database token, if one has been stored.
    pub fn db_token() -> Option<String> {
        match Self::entry().and_then(|e| {
            e.get_password()
                .context("Failed to retrieve database token from keychain")
        }) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "No database token available");
                None
            }
        }
    }

    pub fn delete_db_token() -> Result<()> {
        Self::entry()?
            .delete_credential()
            .context("Failed to delete database token from keychain")?;
        Ok(())
    }
}
