//! Service startup and shutdown

use super::DatabaseService;
use crate::core::adapter::StorageAdapter;
use crate::core::error::ThisResult;
use std::time::Duration;

impl<A: StorageAdapter> DatabaseService<A> {
    /// Connect to the backend, retrying until it succeeds
    ///
    /// Each failed attempt is logged and followed by a fixed
    /// `reconnect_delay_ms` pause. There is no attempt limit.
    pub async fn started(&self) {
        let delay = Duration::from_millis(self.settings.reconnect_delay_ms);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match self.adapter.connect().await {
                Ok(()) => {
                    tracing::info!(
                        service = %self.settings.name,
                        backend = self.adapter.backend_name(),
                        attempt,
                        "Connected to storage"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        service = %self.settings.name,
                        backend = self.adapter.backend_name(),
                        attempt,
                        error = %e,
                        "Storage connection failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Disconnect from the backend
    pub async fn stopped(&self) -> ThisResult<()> {
        self.adapter.disconnect().await?;
        tracing::info!(service = %self.settings.name, "Disconnected from storage");
        Ok(())
    }
}
