use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{Level, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub(crate) struct SpanSummary {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub(crate) struct NotificationEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) file: Option<String>,
    pub(crate) line: Option<u32>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSummary>,
}

#[async_trait]
pub(crate) trait NotificationProvider: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Fans alerts out to providers from a background task. Never blocks the
/// logging call site; a full queue drops the event.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub(crate) fn new(providers: Vec<Arc<dyn NotificationProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<NotificationEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&event).await {
                        // Below the alert threshold, so this cannot loop back.
                        tracing::info!(
                            provider = provider.provider_name(),
                            error = %error,
                            "observability: alert delivery failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(target: "observability", "observability: alert queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(target: "observability", "observability: alert queue closed, event dropped");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingProvider {
        pub(crate) received: Mutex<Vec<NotificationEvent>>,
    }

    #[async_trait]
    impl NotificationProvider for RecordingProvider {
        async fn send(&self, event: &NotificationEvent) -> Result<()> {
            self.received.lock().await.push(event.clone());
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "recording"
        }
    }

    pub(crate) fn event(message: &str) -> NotificationEvent {
        NotificationEvent {
            level: Level::WARN,
            timestamp: Utc::now(),
            service_name: "fitbook-payments".to_string(),
            environment: "local".to_string(),
            component: "api".to_string(),
            target: "payments::fallback".to_string(),
            file: None,
            line: None,
            message: Some(message.to_string()),
            fields: BTreeMap::new(),
            spans: Vec::new(),
        }
    }

    #[tokio::test]
    async fn delivers_queued_events_to_every_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let notifier = Notifier::new(vec![provider.clone()]);

        notifier.try_notify(event("payments: primary store down"));

        for _ in 0..50 {
            if !provider.received.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let received = provider.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].message.as_deref(),
            Some("payments: primary store down")
        );
    }
}
