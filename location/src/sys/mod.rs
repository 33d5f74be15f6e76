//! Platform-specific location implementations.

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "android")]
pub use android::AndroidLocation;

#[cfg(target_os = "linux")]
pub use linux::GeoClueLocation;

#[cfg(not(any(target_os = "android", target_os = "linux")))]
mod unsupported {
    use async_channel::Sender;
    use futures::future::BoxFuture;

    use crate::{
        FusedLocationProvider, LocationError, LocationRequest, LocationResult, LocationSample,
        Provider, ProviderStatus, SettingsClient, SettingsOutcome, SubscriptionId,
    };

    /// Fallback for platforms without a location backend.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnsupportedLocation;

    impl ProviderStatus for UnsupportedLocation {
        fn is_provider_enabled(&self, _provider: Provider) -> bool {
            false
        }
    }

    impl FusedLocationProvider for UnsupportedLocation {
        fn last_location(&self) -> BoxFuture<'static, LocationResult<Option<LocationSample>>> {
            Box::pin(async { Err(LocationError::NotSupported) })
        }

        fn request_updates(
            &self,
            _request: &LocationRequest,
            _sink: Sender<LocationSample>,
        ) -> LocationResult<SubscriptionId> {
            Err(LocationError::NotSupported)
        }

        fn remove_updates(&self, _id: SubscriptionId) {}
    }

    impl SettingsClient for UnsupportedLocation {
        fn check_settings(&self, _request: &LocationRequest) -> BoxFuture<'static, SettingsOutcome> {
            Box::pin(async { SettingsOutcome::UnresolvableError })
        }

        fn start_resolution(&self, _request_code: i32) -> LocationResult<()> {
            Err(LocationError::NotSupported)
        }
    }
}

#[cfg(not(any(target_os = "android", target_os = "linux")))]
pub use unsupported::UnsupportedLocation;
