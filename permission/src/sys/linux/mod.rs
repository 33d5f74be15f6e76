//! Linux permission implementation.
//!
//! Traditional Linux desktops have no runtime permission prompts. GeoClue
//! decides per desktop id whether a client may read the location, so from the
//! application's point of view both location permissions are granted.

use crate::{Permission, PermissionBackend, PermissionResult, PermissionStatus};

/// Permission backend for Linux desktops.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxPermissions;

impl PermissionBackend for LinuxPermissions {
    fn check(&self, _permission: Permission) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn should_show_rationale(&self, _permission: Permission) -> bool {
        false
    }

    fn request(&self, permissions: &[Permission], request_code: i32) -> PermissionResult<()> {
        // Nothing to prompt for; sandboxed apps go through portals instead
        log::debug!("ignoring permission request {request_code} for {permissions:?}");
        Ok(())
    }
}
