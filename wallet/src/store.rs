//! The local wallet file: a JSON array of named ticket keys.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ledger_core::{generate_keypair, public_key_hex, secret_key_hex, signing_key_from_hex, SecretKey};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status shown for a wallet the node has not been asked about yet.
pub const NEW_STATUS: &str = "NEW";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub name: String,
    /// Ticket id: the hex public key.
    pub id: String,
    /// Hex-encoded ed25519 seed.
    pub secret_key: String,
    /// Last status reported by the node.
    pub status: String,
}

impl Wallet {
    pub fn generate(name: impl Into<String>) -> Self {
        let (public, secret) = generate_keypair();
        Self {
            name: name.into(),
            id: public_key_hex(&public),
            secret_key: secret_key_hex(&secret),
            status: NEW_STATUS.to_string(),
        }
    }

    /// Decode the stored seed and check it still matches the ticket id.
    pub fn signing_key(&self) -> Result<SecretKey> {
        let key = signing_key_from_hex(&self.secret_key)
            .with_context(|| format!("wallet {} has an unreadable secret key", self.name))?;
        if public_key_hex(&key.verifying_key()) != self.id {
            bail!("wallet {}: secret key does not match ticket id", self.name);
        }
        Ok(key)
    }
}

#[derive(Debug)]
pub struct WalletStore {
    path: PathBuf,
    wallets: Vec<Wallet>,
}

impl WalletStore {
    /// Load the wallet file; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let wallets = if path.exists() {
            warn_if_permissive(&path);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read wallet file: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse wallet file: {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self { path, wallets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn get(&self, name: &str) -> Result<&Wallet> {
        self.wallets
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| anyhow!("no wallet named {name} in {}", self.path.display()))
    }

    pub fn create(&mut self, name: &str) -> Result<&Wallet> {
        if name.trim().is_empty() {
            bail!("wallet name must not be empty");
        }
        if self.wallets.iter().any(|w| w.name == name) {
            bail!("wallet {name} already exists");
        }
        self.wallets.push(Wallet::generate(name));
        self.save()?;
        Ok(&self.wallets[self.wallets.len() - 1])
    }

    pub fn set_status(&mut self, name: &str, status: &str) -> Result<()> {
        let wallet = self
            .wallets
            .iter_mut()
            .find(|w| w.name == name)
            .ok_or_else(|| anyhow!("no wallet named {name}"))?;
        wallet.status = status.to_string();
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.wallets).context("failed to encode wallets")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write wallet file: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms).with_context(|| {
                format!("failed to set permissions on wallet file: {}", self.path.display())
            })?;
        }

        Ok(())
    }
}

fn warn_if_permissive(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(path) {
            let mode = meta.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                warn!(path = %path.display(), mode = %format!("{mode:o}"), "wallet file permissions are too permissive");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WalletStore::open(dir.path().join("wallets.json")).unwrap();
        assert!(store.wallets().is_empty());
    }

    #[test]
    fn create_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let mut store = WalletStore::open(&path).unwrap();
        let id = store.create("judge1").unwrap().id.clone();
        store.set_status("judge1", "ISSUED").unwrap();

        let reloaded = WalletStore::open(&path).unwrap();
        let w = reloaded.get("judge1").unwrap();
        assert_eq!(w.id, id);
        assert_eq!(w.status, "ISSUED");
        assert_eq!(public_key_hex(&w.signing_key().unwrap().verifying_key()), id);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"secretKey\""));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        WalletStore::open(&path).unwrap().create("a").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn duplicate_and_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WalletStore::open(dir.path().join("w.json")).unwrap();
        store.create("a").unwrap();
        assert!(store.create("a").is_err());
        assert!(store.get("b").is_err());
        assert!(store.set_status("b", "ACTIVE").is_err());
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let mut w = Wallet::generate("x");
        w.id = Wallet::generate("y").id;
        assert!(w.signing_key().is_err());
    }
}
