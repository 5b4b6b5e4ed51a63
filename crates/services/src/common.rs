use serde::{Deserialize, Serialize};

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Transient user-visible notifications (toast-style). Only session
/// construction and explicit login/logout failures go through here; the
/// enrichment pipeline logs and never notifies.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str);
}

/// Default notifier backed by the tracing pipeline
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
        match kind {
            NoticeKind::Info => tracing::info!(title, "{message}"),
            NoticeKind::Warning => tracing::warn!(title, "{message}"),
            NoticeKind::Error => tracing::error!(title, "{message}"),
        }
    }
}

/// Request context captured at sign-in and recorded on the enriched profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every notification for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<(NoticeKind, String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
            self.notices
                .lock()
                .unwrap()
                .push((kind, title.to_string(), message.to_string()));
        }
    }
}
