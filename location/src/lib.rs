//! Fused location access.
//!
//! Three platform collaborators sit behind traits here: provider status
//! ([`ProviderStatus`]), the location-fusion service ([`FusedLocationProvider`])
//! and the settings client ([`SettingsClient`]). Update streams are owned by a
//! [`Subscription`], which removes itself from the provider when dropped.

#![warn(missing_docs)]

mod request;
mod subscription;

/// Platform-specific implementations.
pub mod sys;

use std::time::{SystemTime, UNIX_EPOCH};

use async_channel::Sender;
use futures::future::BoxFuture;

pub use request::{LocationRequest, Priority};
pub use subscription::{Subscription, SubscriptionId};

/// A location fix handed over by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Capture time as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl LocationSample {
    /// Creates a sample stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: now_millis(),
        }
    }

    /// Creates a sample with an explicit capture time.
    #[must_use]
    pub const fn at(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Text shown to the user: longitude first, then latitude.
    #[must_use]
    pub fn coordinates_text(&self) -> String {
        format!("{},{}", self.longitude, self.latitude)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Location sources the device may have switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Satellite positioning.
    Gps,
    /// Wi-Fi and cell triangulation.
    Network,
}

/// Outcome of checking device settings against a [`LocationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsOutcome {
    /// Current settings satisfy the request.
    Satisfied,
    /// Settings can be fixed by showing the system resolution prompt.
    ResolvableViaPrompt,
    /// Settings cannot be fixed from within the application.
    UnresolvableError,
}

/// What the user did with the settings-resolution prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionOutcome {
    /// The user accepted the change.
    Accepted,
    /// The user dismissed the prompt.
    Declined,
}

impl ResolutionOutcome {
    /// Android's `Activity.RESULT_OK`.
    pub const ANDROID_RESULT_OK: i32 = -1;

    /// Converts an Android activity result code.
    #[must_use]
    pub const fn from_android(result_code: i32) -> Self {
        if result_code == Self::ANDROID_RESULT_OK {
            Self::Accepted
        } else {
            Self::Declined
        }
    }
}

/// Errors that can occur when accessing location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// Location permission was not granted.
    #[error("location permission denied")]
    PermissionDenied,
    /// Location services are disabled on the device.
    #[error("location services disabled")]
    ServiceDisabled,
    /// Location is not available.
    #[error("location not available")]
    NotAvailable,
    /// The operation is not supported on this platform.
    #[error("not supported on this platform")]
    NotSupported,
    /// The platform layer reported an error.
    #[error("platform error: {message}")]
    Platform {
        /// Description reported by the platform layer.
        message: String,
    },
}

/// Result type for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

/// Reports whether individual location providers are switched on.
pub trait ProviderStatus: Send + Sync {
    /// Whether `provider` is enabled. Failures to query count as disabled.
    fn is_provider_enabled(&self, provider: Provider) -> bool;
}

/// Returns true iff BOTH the GPS and network providers are disabled.
#[must_use]
pub fn is_location_off(status: &dyn ProviderStatus) -> bool {
    !status.is_provider_enabled(Provider::Gps) && !status.is_provider_enabled(Provider::Network)
}

/// The platform location-fusion service.
pub trait FusedLocationProvider: Send + Sync {
    /// The cached fix, if the platform has one.
    fn last_location(&self) -> BoxFuture<'static, LocationResult<Option<LocationSample>>>;

    /// Starts streaming fixes into `sink` until [`remove_updates`](Self::remove_updates).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refused the request.
    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: Sender<LocationSample>,
    ) -> LocationResult<SubscriptionId>;

    /// Stops a stream started by [`request_updates`](Self::request_updates).
    /// Unknown ids are ignored.
    fn remove_updates(&self, id: SubscriptionId);
}

/// The platform settings client.
pub trait SettingsClient: Send + Sync {
    /// Checks whether device settings satisfy `request`.
    fn check_settings(&self, request: &LocationRequest) -> BoxFuture<'static, SettingsOutcome>;

    /// Shows the resolution prompt for the last resolvable check.
    ///
    /// The user's answer is delivered by the host as a [`ResolutionOutcome`].
    ///
    /// # Errors
    ///
    /// Returns an error if there is nothing to resolve or the prompt could not be shown.
    fn start_resolution(&self, request_code: i32) -> LocationResult<()>;
}
