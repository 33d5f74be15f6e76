use notify_rust::{Notification, Timeout};

use crate::{Presenter, ToastDuration};

/// Shows toasts as desktop notifications.
#[derive(Debug, Clone)]
pub struct DesktopPresenter {
    app_name: String,
}

impl DesktopPresenter {
    /// Notifications are attributed to `app_name`.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Presenter for DesktopPresenter {
    fn show(&self, message: &str, duration: ToastDuration) {
        let shown = Notification::new()
            .appname(&self.app_name)
            .summary(&self.app_name)
            .body(message)
            .timeout(Timeout::Milliseconds(duration.millis()))
            .show();

        if let Err(err) = shown {
            log::warn!("failed to show toast {message:?}: {err}");
        }
    }
}
