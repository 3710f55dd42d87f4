use uuid::Uuid;

/// Best-effort user messaging. Delivery is fire-and-forget; callers never
/// branch on the outcome.
pub trait Notifier: Send + Sync {
    fn send_reminder(&self, user_id: Uuid, message: &str);
}

/// Default sink: writes the notification to the log stream.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_reminder(&self, user_id: Uuid, message: &str) {
        tracing::info!("Notification sent to user {}: {}", user_id, message);
    }
}
