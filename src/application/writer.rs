use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error};

use crate::storage::Store;

use super::LedgerEvent;

pub(crate) enum WriteCommand {
    /// Store the full serialized transaction sequence.
    Save(String),
    /// Reply once every earlier command has been handled, with the first
    /// failure seen since the previous flush.
    Flush(oneshot::Sender<Option<anyhow::Error>>),
}

/// Handle to the background task that writes ledger payloads in order.
pub(crate) struct Writer {
    commands: mpsc::UnboundedSender<WriteCommand>,
}

impl Writer {
    pub(crate) fn spawn<S: Store>(
        store: Arc<S>,
        key: String,
        events: broadcast::Sender<LedgerEvent>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(store, key, receiver, events));
        Self { commands }
    }

    /// Queue a payload for writing without waiting for it.
    pub(crate) fn enqueue(&self, payload: String) -> Result<(), anyhow::Error> {
        self.commands
            .send(WriteCommand::Save(payload))
            .map_err(|_| anyhow::anyhow!("Background writer has stopped"))
    }

    /// Wait for all queued writes to settle.
    pub(crate) async fn flush(&self) -> Result<(), anyhow::Error> {
        let (reply, settled) = oneshot::channel();
        self.commands
            .send(WriteCommand::Flush(reply))
            .map_err(|_| anyhow::anyhow!("Background writer has stopped"))?;

        match settled.await {
            Ok(None) => Ok(()),
            Ok(Some(err)) => Err(err),
            Err(_) => Err(anyhow::anyhow!("Background writer has stopped")),
        }
    }
}

async fn run<S: Store>(
    store: Arc<S>,
    key: String,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    events: broadcast::Sender<LedgerEvent>,
) {
    let mut first_failure: Option<anyhow::Error> = None;

    while let Some(command) = commands.recv().await {
        match command {
            WriteCommand::Save(payload) => match store.save(&key, &payload).await {
                Ok(()) => debug!("Persisted {} bytes under '{}'", payload.len(), key),
                Err(e) => {
                    error!("Failed to persist transactions: {:#}", e);
                    let _ = events.send(LedgerEvent::PersistenceFailed {
                        message: format!("{:#}", e),
                    });
                    first_failure.get_or_insert(e);
                }
            },
            WriteCommand::Flush(reply) => {
                let _ = reply.send(first_failure.take());
            }
        }
    }

    debug!("Writer for '{}' stopped", key);
}
