//! Platform-specific preference stores.
//!
//! Desktop platforms use [`FilePreferences`](crate::FilePreferences) directly.

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;

#[cfg(target_os = "android")]
pub use android::SharedPreferences;
