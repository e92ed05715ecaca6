//! # Outbound Notifications
//!
//! Fire-and-forget messages to customers after ledger changes (debt
//! opened, debt paid off). Delivery is best-effort and happens AFTER
//! the owning transaction commits, so a failed send can never roll
//! back a settled sale.

use tracing::debug;

/// Sink for outbound customer messages.
///
/// Implementations must not block for long and must not fail loudly;
/// dropping a message is acceptable, corrupting a settlement is not.
pub trait Notifier: Send + Sync {
    /// Sends `message` to `phone`. Errors are swallowed by the
    /// implementation and at most logged.
    fn send(&self, phone: &str, message: &str);
}

/// Default sink: logs the message and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, phone: &str, message: &str) {
        debug!(%phone, %message, "Notification dropped (no sink configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test sink that records every message.
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, phone: &str, message: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((phone.to_string(), message.to_string()));
        }
    }

    #[test]
    fn noop_notifier_swallows_messages() {
        NoopNotifier.send("+998901234567", "hello");
    }

    #[test]
    fn recording_notifier_captures_messages() {
        let sink = RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        };
        sink.send("+998901234567", "debt opened");
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }
}
