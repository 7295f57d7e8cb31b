use bytes::Bytes;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Forwards webhook deliveries to a secondary internal endpoint.
///
/// Delivery is at-most-once with no guarantee: the copy is sent on a detached
/// task, and its outcome is logged and dropped. Nothing waits on it.
#[derive(Clone)]
pub struct WebhookRelay {
    client: Client,
    target: Option<String>,
}

impl WebhookRelay {
    pub fn new(target: Option<String>) -> Self {
        Self {
            client: Client::new(),
            target,
        }
    }

    /// Spawns the forward and returns immediately. `None` when no target is configured.
    pub fn dispatch(&self, payload: Bytes) -> Option<JoinHandle<()>> {
        let target = self.target.clone()?;
        let client = self.client.clone();

        Some(tokio::spawn(async move {
            let result = client
                .post(&target)
                .header("content-type", "application/json")
                .body(payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Relayed webhook delivery to {target}");
                }
                Ok(response) => {
                    warn!("Webhook relay to {target} answered {}", response.status());
                }
                Err(e) => warn!("Webhook relay to {target} failed: {e}"),
            }
        }))
    }
}
