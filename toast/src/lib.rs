//! Short-lived status messages.
//!
//! Toasts are fire-and-forget: display failures are logged and never reach
//! the caller.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

/// How long a toast stays on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ToastDuration {
    /// About two seconds.
    #[default]
    Short,
    /// About three and a half seconds.
    Long,
}

impl ToastDuration {
    /// Display time in milliseconds, matching Android's toast durations.
    #[must_use]
    pub const fn millis(self) -> u32 {
        match self {
            Self::Short => 2_000,
            Self::Long => 3_500,
        }
    }

    /// Android `Toast.LENGTH_*` constant.
    #[must_use]
    pub const fn android_code(self) -> i32 {
        match self {
            Self::Short => 0,
            Self::Long => 1,
        }
    }
}

/// Something that can put a message in front of the user.
pub trait Presenter: Send + Sync {
    /// Shows `message` for `duration`.
    fn show(&self, message: &str, duration: ToastDuration);
}

/// A message waiting to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    message: String,
    duration: ToastDuration,
}

impl Toast {
    /// A short toast with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration: ToastDuration::Short,
        }
    }

    /// Sets how long the toast stays visible.
    #[must_use]
    pub const fn duration(mut self, duration: ToastDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Text of the toast.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Shows the toast through `presenter`.
    pub fn show_with(self, presenter: &dyn Presenter) {
        presenter.show(&self.message, self.duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, ToastDuration)>>);

    impl Presenter for Recorder {
        fn show(&self, message: &str, duration: ToastDuration) {
            self.0.lock().unwrap().push((message.to_owned(), duration));
        }
    }

    #[test]
    fn toasts_default_to_short() {
        let recorder = Recorder::default();
        Toast::new("Turn On Location").show_with(&recorder);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![("Turn On Location".to_owned(), ToastDuration::Short)]
        );
    }

    #[test]
    fn long_toasts_keep_their_duration() {
        let recorder = Recorder::default();
        Toast::new("Fix in Settings.")
            .duration(ToastDuration::Long)
            .show_with(&recorder);
        assert_eq!(recorder.0.lock().unwrap()[0].1, ToastDuration::Long);
    }
}
