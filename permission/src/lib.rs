//! Location permission checks and requests.
//!
//! This crate answers two questions for the screen: are fine and coarse
//! location both granted, and how to ask for them when they are not.
//! Platform access goes through [`PermissionBackend`]; the request result is
//! delivered later by the host as a grant array, which
//! [`validate_granted_permissions`] interprets.

#![warn(missing_docs)]

/// Platform-specific implementations.
pub mod sys;

/// Location permissions the screen depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// GPS-precision location access.
    FineLocation,
    /// Network-precision location access.
    CoarseLocation,
}

impl Permission {
    /// Platform identifier of the permission, as understood by Android.
    #[must_use]
    pub const fn android_name(self) -> &'static str {
        match self {
            Self::FineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Self::CoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
        }
    }
}

/// Both permissions required before a location can be fetched.
pub const LOCATION_PERMISSIONS: [Permission; 2] =
    [Permission::FineLocation, Permission::CoarseLocation];

/// The current status of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// The platform could not tell.
    Unknown,
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
}

/// Per-permission outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantResult {
    /// The permission was granted.
    Granted,
    /// The permission was denied.
    Denied,
}

impl GrantResult {
    /// Android's `PackageManager.PERMISSION_GRANTED`.
    pub const ANDROID_GRANTED: i32 = 0;

    /// Converts an Android grant code. Anything but `PERMISSION_GRANTED` is a denial.
    #[must_use]
    pub const fn from_android(code: i32) -> Self {
        if code == Self::ANDROID_GRANTED {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// Errors that can occur when checking or requesting permissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// Runtime permission prompts are not available on this platform.
    #[error("permission requests not supported on this platform")]
    NotSupported,
    /// The platform call failed.
    #[error("platform error: {message}")]
    Platform {
        /// Description reported by the platform layer.
        message: String,
    },
}

/// Result type for permission operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// Platform permission API.
///
/// `request` only shows the prompt. The outcome is reported back by the host
/// (on Android through `onRequestPermissionsResult`) and never through this trait.
pub trait PermissionBackend: Send + Sync {
    /// Current status of a single permission.
    fn check(&self, permission: Permission) -> PermissionStatus;

    /// Whether the platform wants an explanation shown before asking again.
    ///
    /// True after a single denial, false once the user picked "don't ask again".
    fn should_show_rationale(&self, permission: Permission) -> bool;

    /// Shows the platform prompt for `permissions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt could not be shown.
    fn request(&self, permissions: &[Permission], request_code: i32) -> PermissionResult<()>;
}

/// Returns true iff fine and coarse location are both granted.
#[must_use]
pub fn has_required_permission(backend: &dyn PermissionBackend) -> bool {
    LOCATION_PERMISSIONS
        .iter()
        .all(|permission| backend.check(*permission) == PermissionStatus::Granted)
}

/// Interprets the grant array delivered after a permission request.
///
/// An empty array means the request was interrupted and counts as not granted.
#[must_use]
pub fn validate_granted_permissions(grants: &[GrantResult]) -> bool {
    !grants.is_empty() && grants.iter().all(|grant| *grant == GrantResult::Granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedPermissions(HashMap<Permission, PermissionStatus>);

    impl PermissionBackend for FixedPermissions {
        fn check(&self, permission: Permission) -> PermissionStatus {
            self.0
                .get(&permission)
                .copied()
                .unwrap_or(PermissionStatus::Unknown)
        }

        fn should_show_rationale(&self, _permission: Permission) -> bool {
            false
        }

        fn request(&self, _permissions: &[Permission], _request_code: i32) -> PermissionResult<()> {
            Ok(())
        }
    }

    fn backend(fine: PermissionStatus, coarse: PermissionStatus) -> FixedPermissions {
        FixedPermissions(HashMap::from([
            (Permission::FineLocation, fine),
            (Permission::CoarseLocation, coarse),
        ]))
    }

    #[test]
    fn required_permission_needs_both_grants() {
        use PermissionStatus::{Denied, Granted, Unknown};

        for fine in [Granted, Denied, Unknown] {
            for coarse in [Granted, Denied, Unknown] {
                let expected = fine == Granted && coarse == Granted;
                assert_eq!(
                    has_required_permission(&backend(fine, coarse)),
                    expected,
                    "fine={fine:?} coarse={coarse:?}"
                );
            }
        }
    }

    #[test]
    fn empty_grants_are_not_granted() {
        assert!(!validate_granted_permissions(&[]));
    }

    #[test]
    fn any_denial_rejects_the_request() {
        assert!(!validate_granted_permissions(&[
            GrantResult::Granted,
            GrantResult::Denied
        ]));
        assert!(!validate_granted_permissions(&[GrantResult::Denied]));
    }

    #[test]
    fn all_granted_accepts_the_request() {
        assert!(validate_granted_permissions(&[
            GrantResult::Granted,
            GrantResult::Granted
        ]));
    }

    #[test]
    fn android_codes_map_to_grants() {
        assert_eq!(GrantResult::from_android(0), GrantResult::Granted);
        assert_eq!(GrantResult::from_android(-1), GrantResult::Denied);
    }
}
