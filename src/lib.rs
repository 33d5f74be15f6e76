//! # Locator
//!
//! A single-screen location app. One button asks for the device location;
//! the answer is shown as a toast.
//!
//! The fetch sequence is a pure state machine ([`Flow`]) driven by
//! [`LocationScreen`], which runs each [`Command`] against the platform
//! collaborators and feeds the results back as [`FlowEvent`]s:
//!
//! 1. check location permission, prompting or explaining when missing;
//! 2. give up with "Turn On Location" if GPS and network are both off;
//! 3. show the last known location if there is one;
//! 4. otherwise validate device settings, subscribe to updates and show the
//!    first sample.
//!
//! Platform backends live in the member crates, re-exported here.
//!
//! ## Example
//!
//! ```rust,no_run
//! use locator::{LocationScreen, Platform, ScreenConfig, ScreenEvent};
//!
//! async fn show_location(platform: Platform) {
//!     let (events, receiver) = async_channel::unbounded();
//!     let screen = LocationScreen::new(platform, ScreenConfig::default());
//!     events.send(ScreenEvent::Created).await.ok();
//!     screen.run(receiver).await;
//! }
//! ```

mod config;
mod error;
pub mod flow;
mod gatekeeper;
mod screen;

pub use config::ScreenConfig;
pub use error::{ConfigError, FlowError};
pub use flow::{Command, Flow, FlowEvent, FlowState, Notice};
pub use gatekeeper::{Gatekeeper, PermissionAction, PermissionCheck};
pub use screen::{LocationScreen, Platform, ScreenContext, ScreenEvent};

pub use locator_location as location;
pub use locator_permission as permission;
pub use locator_prefs as prefs;
pub use locator_toast as toast;
