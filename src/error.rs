use locator_location::LocationError;
use locator_toast::ToastDuration;
use thiserror::Error;

/// Failures of the location flow. `Display` is the text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Permission is missing and the platform will not prompt right now.
    #[error("Need Location Permission")]
    PermissionRequired,

    /// The user denied the permission prompt for good.
    #[error("Location permission denied. Enable it in Settings.")]
    PermissionDenied,

    /// Both GPS and network providers are off.
    #[error("Turn On Location")]
    LocationServiceDisabled,

    /// Device settings need a manual change.
    #[error("Location settings are inadequate, and cannot be fixed here. Fix in Settings.")]
    SettingsUnresolvable,

    /// Settings kept failing until the retry budget ran out.
    #[error("Unable to resolve location settings")]
    SettingsRetriesExhausted,

    /// The fusion service failed to return the last location.
    #[error("Error trying to get last GPS location")]
    FetchFailure(#[source] LocationError),

    /// The update subscription could not be started.
    #[error("Unable to start location updates")]
    SubscriptionFailed(#[source] LocationError),
}

impl FlowError {
    /// Toast text for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// How long the failure stays on screen.
    #[must_use]
    pub const fn duration(&self) -> ToastDuration {
        match self {
            Self::SettingsUnresolvable => ToastDuration::Long,
            _ => ToastDuration::Short,
        }
    }
}

/// Errors that can occur when loading a [`ScreenConfig`](crate::ScreenConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for a screen.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
