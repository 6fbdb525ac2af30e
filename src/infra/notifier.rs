//! User-facing notification sinks.
//!
//! The router sends notices to the desktop notification daemon when that is
//! enabled and compiled in, and to the log-backed toast sink otherwise.

use std::sync::Arc;

use crate::{
    domain::notification::Notification,
    infra::config::NotificationsConfig,
    usecases::contracts::Notifier,
};

const NOTIFY_TOAST: &str = "NOTIFY_TOAST";
const NOTIFY_FAILURE: &str = "NOTIFY_FAILURE";

/// In-app notice sink; the CLI has no toast area so it writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToastNotifier;

impl Notifier for ToastNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            code = NOTIFY_TOAST,
            conversation_id = notification.conversation_id,
            title = %notification.title,
            body = %notification.body,
            "new message"
        );
    }

    fn notify_failure(&self, title: &str, detail: &str) {
        tracing::warn!(code = NOTIFY_FAILURE, title, detail, "operation failed");
    }
}

/// Runs `job` on the blocking pool when a runtime is current, inline otherwise.
#[cfg(any(test, feature = "desktop-notifications"))]
fn run_blocking<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => job(),
    }
}

#[cfg(feature = "desktop-notifications")]
mod native {
    use notify_rust::{Notification as DesktopNotification, Timeout};

    use super::{run_blocking, ToastNotifier};
    use crate::{domain::notification::Notification, usecases::contracts::Notifier};

    const APP_NAME: &str = "inbox-sync";
    const DEFAULT_TIMEOUT_MS: u32 = 5_000;
    const MESSAGE_ICON: &str = "mail-unread-symbolic";
    const FAILURE_ICON: &str = "dialog-error-symbolic";
    const NOTIFY_NATIVE_FAILED: &str = "NOTIFY_NATIVE_FAILED";

    /// Desktop notifications through the freedesktop daemon. Falls back to
    /// the toast sink when the daemon cannot be reached.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NativeNotifier {
        fallback: ToastNotifier,
    }

    impl NativeNotifier {
        fn deliver<F>(&self, title: String, body: String, icon: &'static str, on_failure: F)
        where
            F: FnOnce(ToastNotifier) + Send + 'static,
        {
            let fallback = self.fallback;
            run_blocking(move || {
                if !show(&title, &body, icon) {
                    on_failure(fallback);
                }
            });
        }
    }

    /// Blocks on the session bus until the daemon answers.
    fn show(title: &str, body: &str, icon: &str) -> bool {
        match DesktopNotification::new()
            .appname(APP_NAME)
            .summary(title)
            .body(body)
            .icon(icon)
            .timeout(Timeout::Milliseconds(DEFAULT_TIMEOUT_MS))
            .show()
        {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(
                    code = NOTIFY_NATIVE_FAILED,
                    error = %error,
                    "desktop notification failed"
                );
                false
            }
        }
    }

    impl Notifier for NativeNotifier {
        fn notify(&self, notification: &Notification) {
            let notification = notification.clone();
            self.deliver(
                notification.title.clone(),
                notification.body.clone(),
                MESSAGE_ICON,
                move |toast| toast.notify(&notification),
            );
        }

        fn notify_failure(&self, title: &str, detail: &str) {
            let (title, detail) = (title.to_owned(), detail.to_owned());
            self.deliver(
                title.clone(),
                detail.clone(),
                FAILURE_ICON,
                move |toast| toast.notify_failure(&title, &detail),
            );
        }
    }
}

#[cfg(feature = "desktop-notifications")]
pub use native::NativeNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Native,
    Toast,
}

#[derive(Clone)]
pub struct NotificationRouter {
    target: Arc<dyn Notifier>,
    kind: NotifierKind,
}

impl NotificationRouter {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self::with_targets(native_target(config.native), Arc::new(ToastNotifier))
    }

    pub fn with_targets(native: Option<Arc<dyn Notifier>>, toast: Arc<dyn Notifier>) -> Self {
        match native {
            Some(target) => Self {
                target,
                kind: NotifierKind::Native,
            },
            None => Self {
                target: toast,
                kind: NotifierKind::Toast,
            },
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn kind(&self) -> NotifierKind {
        self.kind
    }
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Notifier for NotificationRouter {
    fn notify(&self, notification: &Notification) {
        self.target.notify(notification);
    }

    fn notify_failure(&self, title: &str, detail: &str) {
        self.target.notify_failure(title, detail);
    }
}

#[cfg(feature = "desktop-notifications")]
fn native_target(requested: bool) -> Option<Arc<dyn Notifier>> {
    requested.then(|| Arc::new(NativeNotifier::default()) as Arc<dyn Notifier>)
}

#[cfg(not(feature = "desktop-notifications"))]
fn native_target(_requested: bool) -> Option<Arc<dyn Notifier>> {
    None
}
