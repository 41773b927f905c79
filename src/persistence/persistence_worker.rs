use super::{settings_store::SettingsStore, AppSettings};
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc::{channel, error::TrySendError, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

macro_rules! handle_action {
    ($action:expr, $response_tx:expr) => {
        let result = $action.await;
        if let Err(e) = &result {
            error!("Settings action failed: {}", e);
        }
        if let Some(tx) = $response_tx {
            if tx.send(result).is_err() {
                debug!("Settings requester went away before the response");
            }
        }
    };
}

/// Owns the settings store and performs all writes on a background task
pub struct PersistenceManager {
    tx: Sender<SettingsAction>,
    worker_handle: tokio::task::JoinHandle<()>,
    store: SettingsStore,
}

impl PersistenceManager {
    pub fn spawn(store: SettingsStore) -> Self {
        let (tx, mut rx) = channel::<SettingsAction>(16);
        let worker_store = store.clone();

        let worker_handle = tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                match action {
                    SettingsAction::Save {
                        settings,
                        response_tx,
                    } => {
                        handle_action!(worker_store.save(&settings), response_tx);
                    }
                    SettingsAction::Shutdown => break,
                }
            }
            info!("Persistence worker stopped");
        });

        Self {
            tx,
            worker_handle,
            store,
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn client(&self) -> SettingsClient {
        SettingsClient {
            tx: self.tx.clone(),
        }
    }

    /// Lets queued saves finish, then stops the worker
    pub async fn shutdown(self) {
        if self.tx.send(SettingsAction::Shutdown).await.is_err() {
            warn!("Persistence worker already gone");
        }
        if let Err(e) = self.worker_handle.await {
            error!("Persistence worker panicked: {}", e);
        }
    }
}

#[derive(Debug)]
pub enum SettingsAction {
    Save {
        settings: Box<AppSettings>,
        response_tx: Option<oneshot::Sender<Result<()>>>,
    },
    Shutdown,
}

/// Cheap handle the UI uses to request saves
#[derive(Clone, Debug)]
pub struct SettingsClient {
    tx: Sender<SettingsAction>,
}

impl SettingsClient {
    /// Queues a save without waiting; returns false if the queue is full or closed
    pub fn save(&self, settings: &AppSettings) -> bool {
        let action = SettingsAction::Save {
            settings: Box::new(settings.clone()),
            response_tx: None,
        };
        match self.tx.try_send(action) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Settings save queue full, dropping request");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Persistence worker closed, settings not saved");
                false
            }
        }
    }

    /// Saves and waits for the write to finish
    pub async fn save_and_wait(&self, settings: &AppSettings) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SettingsAction::Save {
                settings: Box::new(settings.clone()),
                response_tx: Some(response_tx),
            })
            .await
            .map_err(|_| eyre!("Persistence worker is not running"))?;
        response_rx
            .await
            .map_err(|_| eyre!("Persistence worker dropped the request"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_through_worker() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        let manager = PersistenceManager::spawn(store.clone());
        let client = manager.client();

        let mut settings = AppSettings::default();
        settings.theme = "dark".to_string();
        client.save_and_wait(&settings).await.unwrap();

        assert_eq!(store.load().await, settings);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn queued_save_finishes_before_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        let manager = PersistenceManager::spawn(store.clone());

        let mut settings = AppSettings::default();
        settings.auto_connect = true;
        assert!(manager.client().save(&settings));
        manager.shutdown().await;

        assert!(store.load().await.auto_connect);
    }

    #[tokio::test]
    async fn client_after_shutdown_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::spawn(SettingsStore::new(dir.path().join("s.toml")));
        let client = manager.client();
        manager.shutdown().await;

        assert!(!client.save(&AppSettings::default()));
        assert!(client.save_and_wait(&AppSettings::default()).await.is_err());
    }
}
