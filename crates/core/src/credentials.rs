//! Account passwords: OS keyring first, interactive prompt as fallback.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::execution::run_command;

/// Keyring service under which passwords are stored, keyed by account.
pub const KEYRING_SERVICE: &str = "sdm-credential";

const ZENITY: &str = "zenity";
/// Exit status zenity uses when the dialog is dismissed.
const ZENITY_CANCELLED: i32 = 1;

/// Persistent secret storage keyed by account.
pub trait SecretStore {
    /// `Ok(None)` when nothing is stored for `account`.
    fn get(&self, account: &str) -> Result<Option<String>>;
    fn set(&self, account: &str, secret: &str) -> Result<()>;
    /// Removing a secret that does not exist is not an error.
    fn delete(&self, account: &str) -> Result<()>;
}

/// Asks the user for a password.
pub trait PasswordPrompt {
    /// Returns [`Error::Cancelled`] when the user dismisses the prompt.
    fn prompt(&self, account: &str) -> Result<String>;
}

/// What the re-authentication protocol needs from credential handling.
pub trait CredentialProvider {
    /// A non-empty password for `account`.
    fn password(&self, account: &str) -> Result<String>;
    /// Forgets any stored password for `account`.
    fn forget(&self, account: &str) -> Result<()>;
}

/// Secrets in the platform keyring (Secret Service, Keychain, Credential Manager).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(account: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(KEYRING_SERVICE, account)?)
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, account: &str) -> Result<Option<String>> {
        match Self::entry(account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, account: &str, secret: &str) -> Result<()> {
        Self::entry(account)?.set_password(secret)?;
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<()> {
        match Self::entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Graphical password dialog, for use when there is no terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZenityPrompt;

impl PasswordPrompt for ZenityPrompt {
    fn prompt(&self, account: &str) -> Result<String> {
        let title = format!("Enter password for {account}");
        let output = run_command(ZENITY, &["--password", "--title", &title], None, None)?;

        if output.success() {
            return Ok(output.stdout.trim_end_matches(['\r', '\n']).to_string());
        }

        if output.status.code() == Some(ZENITY_CANCELLED) {
            debug!("Password dialog dismissed");
            return Err(Error::Cancelled);
        }

        Err(Error::Prompt(format!(
            "`{ZENITY}` exited with {}: {}",
            output.status,
            output.stderr.trim()
        )))
    }
}

pub struct Credentials {
    store: Box<dyn SecretStore>,
    prompt: Box<dyn PasswordPrompt>,
}

impl Credentials {
    pub fn new(store: Box<dyn SecretStore>, prompt: Box<dyn PasswordPrompt>) -> Self {
        Self { store, prompt }
    }
}

impl CredentialProvider for Credentials {
    fn password(&self, account: &str) -> Result<String> {
        if account.is_empty() {
            return Err(Error::MissingAccount);
        }

        match self.store.get(account) {
            Ok(Some(secret)) if !secret.is_empty() => {
                debug!("Password for `{account}` found in keyring");
                return Ok(secret);
            }
            Ok(_) => debug!("No password for `{account}` in keyring"),
            Err(e) => debug!("Failed to read keyring for `{account}`: {e}"),
        }

        let password = self.prompt.prompt(account)?;
        if password.is_empty() {
            warn!("Empty password provided");
            return Err(Error::EmptyPassword);
        }

        match self.store.set(account, &password) {
            Ok(()) => debug!("Saved password for `{account}` in keyring"),
            Err(e) => warn!("Failed to save password in keyring: {e}"),
        }

        Ok(password)
    }

    fn forget(&self, account: &str) -> Result<()> {
        debug!("Removing password for `{account}` from keyring");
        self.store.delete(account)
    }
}
