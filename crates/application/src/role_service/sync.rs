use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::*;

/// Running subscription that keeps the local cache in step with the bus.
#[derive(Debug)]
pub struct RoleCacheSyncHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RoleCacheSyncHandle {
    /// Stops applying events and waits for the background task to finish.
    pub async fn shutdown(self) {
        let Self { stop, task } = self;
        let _ = stop.send(());

        if let Err(error) = task.await {
            warn!(error = %error, "role cache sync task ended abnormally");
        }
    }
}

impl RoleService {
    /// Subscribes to role events and applies them to the cache in the
    /// background until the returned handle is shut down.
    pub async fn start_cache_sync(&self) -> AppResult<RoleCacheSyncHandle> {
        let mut subscription = self.event_bus.subscribe().await?;
        let cache = Arc::clone(&self.cache);
        let (stop, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    event = subscription.recv() => match event {
                        Some(event) => cache.apply(&event).await,
                        None => {
                            warn!("role event subscription closed");
                            break;
                        }
                    },
                }
            }
        });

        info!("started role cache sync");
        Ok(RoleCacheSyncHandle { stop, task })
    }

    /// Evicts expired cache entries. Returns the number of user lists dropped.
    pub async fn prune_cache(&self) -> usize {
        self.cache.prune().await
    }

    /// Drops all cached role data.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}
