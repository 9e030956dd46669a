//! # Key Material
//!
//! Secrets are read from the key files written by the Nimiq key generator
//! only when an action is about to be taken, and are zeroed when dropped.
//!
//! - Signing key and account key files: a line starting with `Private Key:`.
//! - Vote key file: a line containing `Secret Key:`, with the value two lines
//!   below it.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::KeyFiles;

const PRIVATE_KEY_PREFIX: &str = "Private Key:";
const SECRET_KEY_LABEL: &str = "Secret Key:";

/// Secret string that is zeroed on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the secret for an RPC call. Do not keep the reference around.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

/// Secrets needed for one lifecycle action.
#[derive(Debug)]
pub struct KeyBundle {
    pub signing: SecretKey,
    /// Only resolved for activation.
    pub voting: Option<SecretKey>,
    pub account: SecretKey,
}

/// Which action the keys are resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    Activation,
    Reactivation,
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Cannot read key file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No '{pattern}' entry in key file {}", path.display())]
    MissingPattern { path: PathBuf, pattern: &'static str },
}

/// Source of key material.
pub trait KeyProvider: Send + Sync {
    fn resolve(&self, purpose: KeyPurpose) -> Result<KeyBundle, KeyError>;
}

/// Reads keys from the configured files on every call.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    files: KeyFiles,
}

impl FileKeyProvider {
    pub fn new(files: KeyFiles) -> Self {
        Self { files }
    }
}

impl KeyProvider for FileKeyProvider {
    fn resolve(&self, purpose: KeyPurpose) -> Result<KeyBundle, KeyError> {
        let signing = read_key_file(&self.files.signing_key, parse_private_key, PRIVATE_KEY_PREFIX)?;
        let voting = match purpose {
            KeyPurpose::Activation => Some(read_key_file(
                &self.files.vote_key,
                parse_secret_key,
                SECRET_KEY_LABEL,
            )?),
            KeyPurpose::Reactivation => None,
        };
        let account = read_key_file(&self.files.address_key, parse_private_key, PRIVATE_KEY_PREFIX)?;

        Ok(KeyBundle {
            signing,
            voting,
            account,
        })
    }
}

fn read_key_file(
    path: &Path,
    parse: fn(&str) -> Option<SecretKey>,
    pattern: &'static str,
) -> Result<SecretKey, KeyError> {
    let mut content = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let key = parse(&content);
    content.zeroize();

    key.ok_or_else(|| KeyError::MissingPattern {
        path: path.to_path_buf(),
        pattern,
    })
}

/// Value of the first line starting with `Private Key:`.
pub fn parse_private_key(content: &str) -> Option<SecretKey> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(PRIVATE_KEY_PREFIX))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(SecretKey::new)
}

/// Value two lines below the first line containing `Secret Key:`.
pub fn parse_secret_key(content: &str) -> Option<SecretKey> {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .iter()
        .enumerate()
        .find(|(i, line)| line.contains(SECRET_KEY_LABEL) && i + 2 < lines.len())
        .map(|(i, _)| lines[i + 2].trim())
        .filter(|value| !value.is_empty())
        .map(SecretKey::new)
}
