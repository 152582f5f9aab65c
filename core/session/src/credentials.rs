//! Loading of provider credentials from secret files.
//!
//! Each secret lives in its own file; only the first line is used, with
//! surrounding whitespace trimmed.

use std::io::ErrorKind;
use std::path::Path;

use vaultserve_common::{CredentialField, Error, Result, SecretString};

/// API credentials and unlock passphrase for one session.
///
/// Immutable once loaded. All three values are non-empty.
#[derive(Debug, Clone)]
pub struct Credentials {
    client_id: SecretString,
    client_secret: SecretString,
    passphrase: SecretString,
}

impl Credentials {
    /// Build credentials from in-memory values.
    ///
    /// # Errors
    /// - `InvalidCredentials` naming the first empty value
    pub fn new(
        client_id: impl Into<SecretString>,
        client_secret: impl Into<SecretString>,
        passphrase: impl Into<SecretString>,
    ) -> Result<Self> {
        let client_id = non_empty(CredentialField::ClientId, client_id.into())?;
        let client_secret = non_empty(CredentialField::ClientSecret, client_secret.into())?;
        let passphrase = non_empty(CredentialField::Passphrase, passphrase.into())?;

        Ok(Self {
            client_id,
            client_secret,
            passphrase,
        })
    }

    /// Load credentials from three secret files.
    ///
    /// # Preconditions
    /// - Each path names an existing, readable UTF-8 file
    ///
    /// # Errors
    /// - `InvalidCredentials` naming the first file that is missing,
    ///   unreadable, or whose first line is blank
    pub fn load(
        client_id_path: impl AsRef<Path>,
        client_secret_path: impl AsRef<Path>,
        passphrase_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let client_id = read_first_line(CredentialField::ClientId, client_id_path.as_ref())?;
        let client_secret =
            read_first_line(CredentialField::ClientSecret, client_secret_path.as_ref())?;
        let passphrase = read_first_line(CredentialField::Passphrase, passphrase_path.as_ref())?;

        Self::new(client_id, client_secret, passphrase)
    }

    pub fn client_id(&self) -> &SecretString {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn passphrase(&self) -> &SecretString {
        &self.passphrase
    }
}

fn non_empty(field: CredentialField, value: SecretString) -> Result<SecretString> {
    if value.is_empty() {
        return Err(Error::InvalidCredentials {
            field,
            reason: "value is empty".to_string(),
        });
    }
    Ok(value)
}

fn read_first_line(field: CredentialField, path: &Path) -> Result<SecretString> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::NotFound => format!("file not found: {}", path.display()),
            _ => format!("cannot read {}: {}", path.display(), e),
        };
        Error::InvalidCredentials { field, reason }
    })?;

    // Zeroized on drop along with the rest of the file.
    let contents = SecretString::new(contents);
    let text = contents.expose();
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let line = text.lines().next().unwrap_or_default().trim();

    if line.is_empty() {
        return Err(Error::InvalidCredentials {
            field,
            reason: format!("first line of {} is empty", path.display()),
        });
    }

    Ok(SecretString::new(line))
}
