//! Pipeline Runtime
//!
//! Single cooperative task driving a `FeedFilterService`. Every input
//! (document mutations, bus messages, settings changes, timers and
//! shutdown) is awaited in one `select!`, so the pipeline state never
//! needs a lock.

use crate::adapters::outbound::BusInbox;
use crate::application::feed_filter_service::FeedFilterService;
use crate::domain::entities::MutationBatch;
use crate::infrastructure::config_bridge::{ConfigBridge, ConfigDelta};
use crate::infrastructure::shutdown::ShutdownController;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Event loop owning the pipeline.
pub struct PipelineRuntime {
    service: FeedFilterService,
    mutations: mpsc::UnboundedReceiver<MutationBatch>,
    inbox: BusInbox,
    bridge: Arc<ConfigBridge>,
    config_rx: broadcast::Receiver<ConfigDelta>,
    shutdown: ShutdownController,
}

impl PipelineRuntime {
    /// Wire the runtime. Subscribes to settings changes immediately so
    /// nothing published after this call is missed.
    pub fn new(
        service: FeedFilterService,
        mutations: mpsc::UnboundedReceiver<MutationBatch>,
        inbox: BusInbox,
        bridge: Arc<ConfigBridge>,
        shutdown: ShutdownController,
    ) -> Self {
        let config_rx = bridge.subscribe();
        Self {
            service,
            mutations,
            inbox,
            bridge,
            config_rx,
            shutdown,
        }
    }

    /// Run the pipeline on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown, or until the document or the bus goes away.
    pub async fn run(mut self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_shutdown() {
            return;
        }

        self.service.scan_document();
        tracing::info!("feed filter pipeline started");

        let mut config_open = true;

        loop {
            let wakeup = self.service.next_wakeup();

            tokio::select! {
                batch = self.mutations.recv() => match batch {
                    Some(batch) => self.service.on_mutation(&batch),
                    None => {
                        tracing::info!("feed document closed");
                        break;
                    }
                },
                message = self.inbox.recv() => match message {
                    Some(message) => self.service.handle_message(message),
                    None => {
                        tracing::info!("lookup channel closed");
                        break;
                    }
                },
                delta = self.config_rx.recv(), if config_open => match delta {
                    Ok(delta) => self.service.apply_config_delta(delta),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "missed settings changes, resyncing");
                        let settings = self.bridge.get_config().await;
                        self.service.apply_config_delta(ConfigDelta {
                            block_list: Some(settings.block_list),
                            debug: Some(settings.debug),
                        });
                    }
                    // Bridge dropped; keep the last settings
                    Err(RecvError::Closed) => config_open = false,
                },
                _ = async {
                    match wakeup {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => self.service.on_timer(),
                _ = shutdown_rx.recv() => {
                    tracing::info!("feed filter pipeline stopping");
                    break;
                }
            }
        }
    }
}
