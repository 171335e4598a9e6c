//! Notifier: best-effort fire-and-forget summary delivery. The real
//! transport is Telegram; this module only defines the interface.

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: String);
}

/// Default implementation: logs the summary instead of sending it
/// anywhere. "Best-effort" here means there is nothing to fail — a real
/// transport would swallow its own send errors rather than propagate
/// them to the engine.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, text: String) {
        tracing::info!(summary = %text, "notifier: summary");
    }
}
