//! The local settings document and its single writer.
//!
//! Several flows mutate settings (identity creation and removal, theme
//! changes, whole-document edits from the UI). All of them are serialized
//! through one actor task that owns the current document, so there is no
//! read-modify-write race on the blob. Every accepted mutation bumps
//! `version`; a whole-document replacement must name the version it was
//! based on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use tessera_core::Ed25519PublicKey;
use tessera_mail::EncryptionKeypair;
use tessera_store::BlobStore;

use crate::config::{IdentityConfig, SettingsConfig};
use crate::error::SettingsError;
use crate::identity::{Identity, StoredIdentity};

type Result<T> = std::result::Result<T, SettingsError>;

/// The persisted settings document.
///
/// Every field defaults, so a blob written by an older peer (no `version`,
/// identities without encryption keys) still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u64,
    pub theme: String,
    pub identities: Vec<StoredIdentity>,
}

impl Settings {
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SettingsError::Serialization(e.to_string()))
    }

    /// The stored identity with signing key `pub_key`.
    pub fn identity(&self, pub_key: &Ed25519PublicKey) -> Option<&StoredIdentity> {
        self.identities.iter().find(|i| i.is(pub_key))
    }
}

enum Command {
    Snapshot(oneshot::Sender<Settings>),
    GenerateIdentity(oneshot::Sender<Result<Settings>>),
    RemoveIdentity(Ed25519PublicKey, oneshot::Sender<Result<Settings>>),
    SetTheme(String, oneshot::Sender<Result<Settings>>),
    Replace(Settings, oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the settings writer. Cheap to clone.
#[derive(Clone)]
pub struct SettingsHandle {
    tx: mpsc::Sender<Command>,
}

impl SettingsHandle {
    /// Load the settings blob, upgrade it if needed, and start the writer.
    ///
    /// An unreadable blob is replaced by defaults rather than failing
    /// startup. Identities without encryption keys get new ones, and an
    /// empty identity list gets a first identity when configured to.
    pub async fn spawn(
        blobs: Arc<dyn BlobStore>,
        settings: SettingsConfig,
        identity: IdentityConfig,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
        let mut writer = Writer {
            blobs,
            config: settings,
            identity,
            current: Settings::default(),
        };
        writer.load().await?;
        tokio::spawn(writer.run(rx));
        Ok(Self { tx })
    }

    /// The current document.
    pub async fn snapshot(&self) -> Result<Settings> {
        self.request(Command::Snapshot).await
    }

    /// Add a freshly generated identity.
    pub async fn generate_identity(&self) -> Result<Settings> {
        self.request(Command::GenerateIdentity).await?
    }

    /// Remove the identity with signing key `pub_key`. Removing an unknown
    /// identity changes nothing.
    pub async fn remove_identity(&self, pub_key: Ed25519PublicKey) -> Result<Settings> {
        self.request(|reply| Command::RemoveIdentity(pub_key, reply))
            .await?
    }

    pub async fn set_theme(&self, theme: impl Into<String>) -> Result<Settings> {
        let theme = theme.into();
        self.request(|reply| Command::SetTheme(theme, reply)).await?
    }

    /// Replace the whole document. `settings.version` must equal the
    /// current version.
    pub async fn replace(&self, settings: Settings) -> Result<()> {
        self.request(|reply| Command::Replace(settings, reply))
            .await?
    }

    /// Stop the writer after the mutations already queued.
    pub async fn shutdown(&self) {
        if self.request(Command::Shutdown).await.is_err() {
            debug!("settings writer already stopped");
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SettingsError::Closed)?;
        rx.await.map_err(|_| SettingsError::Closed)
    }
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

struct Writer {
    blobs: Arc<dyn BlobStore>,
    config: SettingsConfig,
    identity: IdentityConfig,
    current: Settings,
}

impl Writer {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.current.clone());
                }
                Command::GenerateIdentity(reply) => {
                    let _ = reply.send(self.generate_identity().await);
                }
                Command::RemoveIdentity(pub_key, reply) => {
                    let _ = reply.send(self.remove_identity(&pub_key).await);
                }
                Command::SetTheme(theme, reply) => {
                    let mut next = self.current.clone();
                    next.theme = theme;
                    let _ = reply.send(self.commit(next).await);
                }
                Command::Replace(settings, reply) => {
                    let _ = reply.send(self.replace(settings).await);
                }
                Command::Shutdown(reply) => {
                    let _ = reply.send(());
                    break;
                }
            }
        }
        debug!(version = self.current.version, "settings writer stopped");
    }

    async fn load(&mut self) -> Result<()> {
        let name = self.config.blob_name.clone();
        let loaded = match self.blobs.get_blob(&name).await? {
            None => Settings::default(),
            Some(bytes) => Settings::from_json(&bytes).unwrap_or_else(|e| {
                warn!(blob = %name, error = %e, "settings blob is corrupt, using defaults");
                Settings::default()
            }),
        };
        self.current = loaded.clone();

        let mut next = loaded;
        let upgraded = self.add_encryption_keys(&mut next).await?;
        let created = next.identities.is_empty() && self.identity.create_on_first_run;
        if created {
            next.identities.push(self.new_identity().await?);
            info!("created first identity");
        }

        if upgraded > 0 || created {
            self.commit(next).await?;
        }
        Ok(())
    }

    async fn generate_identity(&mut self) -> Result<Settings> {
        let stored = self.new_identity().await?;
        info!(pub_key = %stored.pub_key, "generated identity");
        let mut next = self.current.clone();
        next.identities.push(stored);
        self.commit(next).await
    }

    async fn remove_identity(&mut self, pub_key: &Ed25519PublicKey) -> Result<Settings> {
        let mut next = self.current.clone();
        next.identities.retain(|i| !i.is(pub_key));
        if next.identities.len() == self.current.identities.len() {
            debug!(pub_key = ?pub_key, "no such identity to remove");
            return Ok(self.current.clone());
        }
        info!(pub_key = ?pub_key, "removed identity");
        self.commit(next).await
    }

    async fn replace(&mut self, mut settings: Settings) -> Result<()> {
        if settings.version != self.current.version {
            return Err(SettingsError::Stale {
                current: self.current.version,
                supplied: settings.version,
            });
        }
        self.add_encryption_keys(&mut settings).await?;
        for stored in &settings.identities {
            stored
                .load()
                .map_err(|e| SettingsError::Identity(e.to_string()))?;
        }
        self.commit(settings).await.map(|_| ())
    }

    /// Give every identity that lacks them a fresh encryption keypair.
    /// Signing keys are left untouched.
    async fn add_encryption_keys(&self, settings: &mut Settings) -> Result<usize> {
        let mut upgraded = 0;
        for stored in settings
            .identities
            .iter_mut()
            .filter(|i| i.needs_encryption_keys())
        {
            let bits = self.identity.rsa_bits;
            let pair = tokio::task::spawn_blocking(move || EncryptionKeypair::generate(bits))
                .await
                .map_err(|e| SettingsError::Identity(format!("key generation task: {}", e)))??;
            stored.enc_pub_key = Some(pair.public.to_pem()?);
            stored.enc_priv_key = Some(pair.private.to_pem()?);
            info!(pub_key = %stored.pub_key, "added encryption keys to identity");
            upgraded += 1;
        }
        Ok(upgraded)
    }

    async fn new_identity(&self) -> Result<StoredIdentity> {
        let bits = self.identity.rsa_bits;
        let identity = tokio::task::spawn_blocking(move || Identity::generate(bits))
            .await
            .map_err(|e| SettingsError::Identity(format!("key generation task: {}", e)))??;
        identity
            .to_stored()
            .map_err(|e| SettingsError::Identity(e.to_string()))
    }

    /// Persist `next` as the successor of the current document.
    async fn commit(&mut self, mut next: Settings) -> Result<Settings> {
        next.version = self.current.version + 1;
        let json = next.to_json()?;
        let timeout = self.config.write_timeout;
        tokio::time::timeout(timeout, self.blobs.put_blob(&self.config.blob_name, &json))
            .await
            .map_err(|_| SettingsError::Timeout(timeout))??;
        debug!(version = next.version, "settings written");
        self.current = next;
        Ok(self.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Keypair;
    use tessera_store::MemoryStore;

    fn configs(create: bool) -> (SettingsConfig, IdentityConfig) {
        (
            SettingsConfig::default(),
            IdentityConfig {
                rsa_bits: 1024,
                create_on_first_run: create,
            },
        )
    }

    async fn spawn(store: &Arc<MemoryStore>, create: bool) -> SettingsHandle {
        let (settings, identity) = configs(create);
        SettingsHandle::spawn(store.clone(), settings, identity)
            .await
            .unwrap()
    }

    async fn stored_blob(store: &MemoryStore) -> Settings {
        let bytes = store.get_blob("settings").await.unwrap().unwrap();
        Settings::from_json(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_first_run_creates_identity() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, true).await;

        let settings = handle.snapshot().await.unwrap();
        assert_eq!(settings.identities.len(), 1);
        assert_eq!(settings.version, 1);
        assert!(settings.identities[0].load().is_ok());
        assert_eq!(stored_blob(&store).await, settings);

        // A second start finds the identity and writes nothing.
        let again = spawn(&store, true).await.snapshot().await.unwrap();
        assert_eq!(again, settings);
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.put_blob("settings", b"{not json").await.unwrap();

        let settings = spawn(&store, false).await.snapshot().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_legacy_identity_gets_encryption_keys() {
        let store = Arc::new(MemoryStore::new());
        let signing = Keypair::from_seed(&[5; 32]);
        let legacy = format!(
            r#"{{"theme":"dark","identities":[{{"tripcode":"!x","pubKey":"{}","privKey":"{}"}}]}}"#,
            signing.public_key().to_hex(),
            signing.secret_hex()
        );
        store.put_blob("settings", legacy.as_bytes()).await.unwrap();

        let settings = spawn(&store, true).await.snapshot().await.unwrap();
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.identities.len(), 1);
        let identity = settings.identities[0].load().unwrap();
        assert_eq!(identity.public_key(), signing.public_key());
        assert_eq!(identity.tripcode(), "!x");

        // Persisted, so the upgrade happens once.
        let upgraded = stored_blob(&store).await;
        assert_eq!(upgraded, settings);
        let again = spawn(&store, true).await.snapshot().await.unwrap();
        assert_eq!(again.identities, settings.identities);
    }

    #[tokio::test]
    async fn test_stale_replace_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, false).await;

        let base = handle.snapshot().await.unwrap();
        let themed = handle.set_theme("light").await.unwrap();
        assert_eq!(themed.version, base.version + 1);

        let mut edit = base.clone();
        edit.theme = "solarized".into();
        assert!(matches!(
            handle.replace(edit).await,
            Err(SettingsError::Stale { current, supplied }) if current == themed.version && supplied == base.version
        ));

        let mut edit = themed.clone();
        edit.theme = "solarized".into();
        handle.replace(edit).await.unwrap();
        let now = handle.snapshot().await.unwrap();
        assert_eq!(now.theme, "solarized");
        assert_eq!(now.version, themed.version + 1);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, false).await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.set_theme(format!("t{}", i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let settings = handle.snapshot().await.unwrap();
        assert_eq!(settings.version, 8);
        assert_eq!(stored_blob(&store).await.version, 8);
    }

    #[tokio::test]
    async fn test_generate_and_remove_identity() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, false).await;

        let settings = handle.generate_identity().await.unwrap();
        assert_eq!(settings.identities.len(), 1);
        let pub_key = settings.identities[0].load().unwrap().public_key();
        assert!(settings.identity(&pub_key).is_some());

        let removed = handle.remove_identity(pub_key).await.unwrap();
        assert!(removed.identities.is_empty());
        assert_eq!(removed.version, settings.version + 1);

        // Unknown identity: no change, no version bump.
        let same = handle.remove_identity(pub_key).await.unwrap();
        assert_eq!(same, removed);
    }

    #[tokio::test]
    async fn test_replace_rejects_broken_identity() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, false).await;

        let mut edit = handle.snapshot().await.unwrap();
        edit.identities.push(StoredIdentity {
            pub_key: "zz".into(),
            priv_key: "zz".into(),
            ..Default::default()
        });
        assert!(matches!(
            handle.replace(edit).await,
            Err(SettingsError::Identity(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(&store, false).await;
        handle.shutdown().await;
        assert!(matches!(
            handle.set_theme("x").await,
            Err(SettingsError::Closed)
        ));
    }
}
