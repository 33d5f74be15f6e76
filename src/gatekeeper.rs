//! Location permission decisions.

use std::fmt;
use std::sync::Arc;

use locator_permission::{
    GrantResult, LOCATION_PERMISSIONS, Permission, PermissionBackend, PermissionResult,
    has_required_permission, validate_granted_permissions,
};
use locator_prefs::PreferenceStore;

use crate::ScreenConfig;

/// What to do when location permission is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    /// Show the platform permission prompt.
    Request,
    /// Tell the user permission is needed without prompting.
    Explain,
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCheck {
    /// Both location permissions are granted.
    Granted,
    /// Permission is missing; the action says how to proceed.
    Missing(PermissionAction),
}

/// Decides whether and how to obtain location permission.
///
/// A persisted flag remembers that the prompt has been shown once, so a user
/// who ticked "don't ask again" gets an explanation instead of a silent no-op.
pub struct Gatekeeper {
    backend: Arc<dyn PermissionBackend>,
    preferences: Arc<dyn PreferenceStore>,
    flag_key: String,
    request_code: i32,
}

impl fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("flag_key", &self.flag_key)
            .field("request_code", &self.request_code)
            .finish_non_exhaustive()
    }
}

impl Gatekeeper {
    /// Creates a gatekeeper using the flag key and request code from `config`.
    pub fn new(
        backend: Arc<dyn PermissionBackend>,
        preferences: Arc<dyn PreferenceStore>,
        config: &ScreenConfig,
    ) -> Self {
        Self {
            backend,
            preferences,
            flag_key: config.permission_flag_key.clone(),
            request_code: config.permission_request_code,
        }
    }

    /// True only if fine and coarse location are both granted.
    #[must_use]
    pub fn has_required_permission(&self) -> bool {
        has_required_permission(self.backend.as_ref())
    }

    /// Whether the platform would show the prompt with a rationale.
    #[must_use]
    pub fn should_show_rationale(&self) -> bool {
        self.backend.should_show_rationale(Permission::FineLocation)
    }

    /// Whether the permission prompt was issued before, on any run.
    #[must_use]
    pub fn has_requested_before(&self) -> bool {
        self.preferences.get_bool(&self.flag_key, false)
    }

    /// Chooses between prompting and explaining.
    ///
    /// The platform's rationale hint wins; otherwise only a first-ever request
    /// prompts.
    #[must_use]
    pub fn decide(&self) -> PermissionAction {
        if self.should_show_rationale() || !self.has_requested_before() {
            PermissionAction::Request
        } else {
            PermissionAction::Explain
        }
    }

    /// Checks the grant state and decides the follow-up when it is missing.
    #[must_use]
    pub fn check(&self) -> PermissionCheck {
        if self.has_required_permission() {
            PermissionCheck::Granted
        } else {
            PermissionCheck::Missing(self.decide())
        }
    }

    /// Records the request and shows the platform prompt.
    ///
    /// The answer arrives later as a permission result for the configured
    /// request code.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform could not show the prompt.
    pub fn request_permission(&self) -> PermissionResult<()> {
        if let Err(err) = self.preferences.set_bool(&self.flag_key, true) {
            log::warn!("failed to persist {:?}: {err}", self.flag_key);
        }
        log::debug!("requesting location permissions");
        self.backend.request(&LOCATION_PERMISSIONS, self.request_code)
    }

    /// Interprets the grants delivered for a permission request.
    ///
    /// Returns whether everything was granted and, if not, whether the
    /// platform still offers a rationale.
    #[must_use]
    pub fn evaluate(&self, grants: &[GrantResult]) -> (bool, bool) {
        if validate_granted_permissions(grants) {
            (true, false)
        } else {
            (
                false,
                self.backend.should_show_rationale(Permission::CoarseLocation),
            )
        }
    }

    /// Request code the answer is expected under.
    #[must_use]
    pub const fn request_code(&self) -> i32 {
        self.request_code
    }
}
