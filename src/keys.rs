//! Key-storage file format (`spec.md` §6) and the minimal signing
//! collaborator interface.
//!
//! The concrete on-disk password prompt flow and the chain-specific signing
//! implementation are collaborator concerns (`spec.md` §1 Non-goals); this
//! module only defines the file's line format (grounded in `cryptor.py`'s
//! `get_wallet_keys`/`save_wallet_keys`) and the `Signer` trait the core
//! requires (`sign(tx)`).

use std::collections::HashMap;
use std::path::Path;

use crate::crypto;
use crate::error::{Error, Result};

/// The two key roles a gateway wallet file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Signs outgoing transactions.
    Active,
    /// Decrypts/encrypts memos.
    Memo,
}

impl KeyRole {
    fn label(self) -> &'static str {
        match self {
            KeyRole::Active => "active",
            KeyRole::Memo => "memo",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        match label {
            "active" => Some(KeyRole::Active),
            "memo" => Some(KeyRole::Memo),
            _ => None,
        }
    }
}

/// Decrypted key material for one account, keyed by role.
#[derive(Debug, Clone, Default)]
pub struct WalletKeys {
    keys: HashMap<KeyRole, String>,
}

impl WalletKeys {
    /// The key for `role`, if present.
    pub fn get(&self, role: KeyRole) -> Option<&str> {
        self.keys.get(&role).map(String::as_str)
    }
}

/// Parse `config/.<account>.keys` contents (`role:encrypted_b64` lines) and
/// decrypt each value with `password`.
pub fn load_wallet_keys(contents: &str, password: &str) -> Result<WalletKeys> {
    let mut keys = HashMap::new();
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let (label, encrypted) = line
            .split_once(':')
            .ok_or_else(|| Error::DecryptionError)?;
        let role = KeyRole::parse(label).ok_or_else(|| Error::DecryptionError)?;
        keys.insert(role, crypto::decrypt(encrypted, password)?);
    }
    Ok(WalletKeys { keys })
}

/// Serialize `active`/`memo` private keys into the `config/.<account>.keys`
/// file format, encrypting each under `password`.
pub fn save_wallet_keys(active_key: &str, memo_key: &str, password: &str) -> String {
    format!(
        "active:{}\nmemo:{}\n",
        crypto::encrypt(active_key, password),
        crypto::encrypt(memo_key, password),
    )
}

/// Build the conventional key-storage path for `account_name` under
/// `config_dir`.
pub fn wallet_keys_path(config_dir: &Path, account_name: &str) -> std::path::PathBuf {
    config_dir.join(format!(".{account_name}.keys"))
}

/// Signs unbroadcast transactions. A collaborator concern (`spec.md` §6):
/// the core only requires this method from whatever concrete chain SDK
/// integration a deployment plugs in.
pub trait Signer: Send + Sync {
    /// Sign `tx_bytes` with the active key, returning the signature bytes.
    fn sign(&self, tx_bytes: &[u8]) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let file = save_wallet_keys("active-priv-key", "memo-priv-key", "hunter2");
        let keys = load_wallet_keys(&file, "hunter2").unwrap();
        assert_eq!(keys.get(KeyRole::Active), Some("active-priv-key"));
        assert_eq!(keys.get(KeyRole::Memo), Some("memo-priv-key"));
    }

    #[test]
    fn wrong_password_fails_to_load() {
        let file = save_wallet_keys("active-priv-key", "memo-priv-key", "hunter2");
        assert!(load_wallet_keys(&file, "wrong").is_err());
    }
}
