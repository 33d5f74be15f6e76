//! Platform-specific permission implementations.

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "android")]
pub use android::AndroidPermissions;

#[cfg(target_os = "linux")]
pub use linux::LinuxPermissions;

#[cfg(not(any(target_os = "android", target_os = "linux")))]
mod unsupported {
    use crate::{Permission, PermissionBackend, PermissionError, PermissionResult, PermissionStatus};

    /// Fallback for platforms without a permission backend.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnsupportedPermissions;

    impl PermissionBackend for UnsupportedPermissions {
        fn check(&self, _permission: Permission) -> PermissionStatus {
            PermissionStatus::Unknown
        }

        fn should_show_rationale(&self, _permission: Permission) -> bool {
            false
        }

        fn request(&self, _permissions: &[Permission], _request_code: i32) -> PermissionResult<()> {
            Err(PermissionError::NotSupported)
        }
    }
}

#[cfg(not(any(target_os = "android", target_os = "linux")))]
pub use unsupported::UnsupportedPermissions;
