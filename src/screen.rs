//! The location screen: drives [`Flow`] against real collaborators.

use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use async_channel::Receiver;
use futures::future::{self, Either};
use locator_location::{
    FusedLocationProvider, LocationSample, ProviderStatus, ResolutionOutcome, SettingsClient,
    SettingsOutcome, Subscription, is_location_off,
};
use locator_permission::{GrantResult, PermissionBackend};
use locator_prefs::PreferenceStore;
use locator_toast::{Presenter, Toast};

use crate::flow::{Command, Flow, FlowEvent, FlowState};
use crate::{Gatekeeper, ScreenConfig};

/// Platform collaborators of the screen.
#[derive(Clone)]
pub struct Platform {
    /// Permission checks and prompts.
    pub permissions: Arc<dyn PermissionBackend>,
    /// GPS/network provider switches.
    pub providers: Arc<dyn ProviderStatus>,
    /// The location-fusion service.
    pub location: Arc<dyn FusedLocationProvider>,
    /// Device settings validation.
    pub settings: Arc<dyn SettingsClient>,
    /// Persistent flags.
    pub preferences: Arc<dyn PreferenceStore>,
    /// Toasts.
    pub presenter: Arc<dyn Presenter>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

/// Host callbacks delivered to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    /// The screen was created.
    Created,
    /// The location button was pressed.
    ButtonPressed,
    /// The permission prompt was answered.
    PermissionResult {
        /// Code the prompt was issued with.
        request_code: i32,
        /// One entry per requested permission.
        grants: Vec<GrantResult>,
    },
    /// The settings-resolution prompt was closed.
    ResolutionResult {
        /// Code the prompt was issued with.
        request_code: i32,
        /// What the user chose.
        outcome: ResolutionOutcome,
    },
    /// The screen is being destroyed.
    Destroyed,
}

/// Everything a screen instance owns.
#[derive(Debug)]
pub struct ScreenContext {
    platform: Platform,
    config: ScreenConfig,
    gatekeeper: Gatekeeper,
    subscription: Option<Subscription>,
}

impl ScreenContext {
    fn new(platform: Platform, config: ScreenConfig) -> Self {
        let gatekeeper = Gatekeeper::new(
            platform.permissions.clone(),
            platform.preferences.clone(),
            &config,
        );
        Self {
            platform,
            config,
            gatekeeper,
            subscription: None,
        }
    }

    /// Permission decisions for this screen.
    #[must_use]
    pub const fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScreenConfig {
        &self.config
    }
}

/// A single location screen.
///
/// Feed it host callbacks through [`handle`](Self::handle) and update samples
/// through [`handle_update`](Self::handle_update), or hand both sources to
/// [`run`](Self::run). Dropping the screen drops its update subscription.
#[derive(Debug)]
pub struct LocationScreen {
    context: ScreenContext,
    flow: Flow,
}

impl LocationScreen {
    /// Creates a screen. Nothing happens until [`ScreenEvent::Created`].
    #[must_use]
    pub fn new(platform: Platform, config: ScreenConfig) -> Self {
        let flow = Flow::new(config.max_settings_retries);
        Self {
            context: ScreenContext::new(platform, config),
            flow,
        }
    }

    /// Title bar text.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.context.config.title
    }

    /// Current flow state.
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.flow.state()
    }

    /// Whether an update subscription is alive.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.context.subscription.is_some()
    }

    /// The screen's context.
    #[must_use]
    pub const fn context(&self) -> &ScreenContext {
        &self.context
    }

    /// Samples of the live subscription, if any.
    #[must_use]
    pub fn updates(&self) -> Option<Receiver<LocationSample>> {
        self.context.subscription.as_ref().map(Subscription::samples)
    }

    /// Handles one host callback.
    pub async fn handle(&mut self, event: ScreenEvent) {
        log::debug!("screen event: {event:?}");
        match event {
            ScreenEvent::Created | ScreenEvent::ButtonPressed => {
                self.dispatch(FlowEvent::Triggered).await;
            }
            ScreenEvent::PermissionResult {
                request_code,
                grants,
            } => {
                if request_code != self.context.gatekeeper.request_code() {
                    log::debug!("ignoring permission result for request {request_code}");
                    return;
                }
                let (granted, rationale) = self.context.gatekeeper.evaluate(&grants);
                self.dispatch(FlowEvent::PermissionAnswered { granted, rationale })
                    .await;
            }
            ScreenEvent::ResolutionResult {
                request_code,
                outcome,
            } => {
                if request_code != self.context.config.resolution_request_code {
                    log::debug!("ignoring activity result for request {request_code}");
                    return;
                }
                self.dispatch(FlowEvent::ResolutionAnswered(outcome)).await;
            }
            ScreenEvent::Destroyed => {
                self.dispatch(FlowEvent::TornDown).await;
                self.context.subscription = None;
            }
        }
    }

    /// Handles a sample from the update subscription.
    pub async fn handle_update(&mut self, sample: LocationSample) {
        self.dispatch(FlowEvent::UpdateReceived(sample)).await;
    }

    /// Runs the screen until [`ScreenEvent::Destroyed`] arrives or every
    /// event sender is gone.
    pub async fn run(mut self, events: Receiver<ScreenEvent>) {
        log::info!("{} screen running", self.title());
        loop {
            let updates = self.updates();
            let next = {
                let event = pin!(events.recv());
                let update = pin!(async move {
                    match updates {
                        Some(updates) => updates.recv().await.ok(),
                        None => future::pending().await,
                    }
                });
                match future::select(event, update).await {
                    Either::Left((event, _)) => Either::Left(event.ok()),
                    Either::Right((sample, _)) => Either::Right(sample),
                }
            };

            match next {
                Either::Left(None | Some(ScreenEvent::Destroyed)) => {
                    self.handle(ScreenEvent::Destroyed).await;
                    break;
                }
                Either::Left(Some(event)) => self.handle(event).await,
                Either::Right(Some(sample)) => self.handle_update(sample).await,
                Either::Right(None) => {
                    log::warn!("location update stream closed by the provider");
                    self.dispatch(FlowEvent::UpdatesEnded).await;
                    self.context.subscription = None;
                }
            }
        }
        log::info!("{} screen stopped", self.title());
    }

    async fn dispatch(&mut self, event: FlowEvent) {
        let mut pending: VecDeque<Command> = self.flow.handle(event).into();
        while let Some(command) = pending.pop_front() {
            if let Some(event) = self.execute(command).await {
                pending.extend(self.flow.handle(event));
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Option<FlowEvent> {
        let context = &mut self.context;
        match command {
            Command::CheckPermission => Some(FlowEvent::PermissionChecked(
                context.gatekeeper.check(),
            )),
            Command::RequestPermission => match context.gatekeeper.request_permission() {
                Ok(()) => None,
                Err(err) => {
                    log::error!("failed to request location permission: {err}");
                    Some(FlowEvent::PermissionRequestFailed)
                }
            },
            Command::CheckAvailability => Some(FlowEvent::AvailabilityChecked {
                location_off: is_location_off(context.platform.providers.as_ref()),
            }),
            Command::FetchLastLocation => {
                let result = context.platform.location.last_location().await;
                if let Err(err) = &result {
                    log::error!("Error trying to get last GPS location: {err}");
                }
                Some(FlowEvent::LastLocation(result))
            }
            Command::CheckSettings => {
                let outcome = context
                    .platform
                    .settings
                    .check_settings(&context.config.request)
                    .await;
                match outcome {
                    SettingsOutcome::Satisfied => {
                        log::info!("All location settings are satisfied.");
                    }
                    SettingsOutcome::ResolvableViaPrompt => log::info!(
                        "Location settings are not satisfied. Attempting to upgrade location settings"
                    ),
                    SettingsOutcome::UnresolvableError => log::error!(
                        "Location settings are inadequate, and cannot be fixed here. Fix in Settings."
                    ),
                }
                Some(FlowEvent::SettingsChecked(outcome))
            }
            Command::StartResolution => {
                match context
                    .platform
                    .settings
                    .start_resolution(context.config.resolution_request_code)
                {
                    Ok(()) => None,
                    Err(err) => {
                        log::info!("PendingIntent unable to execute request. ({err})");
                        Some(FlowEvent::ResolutionUnavailable)
                    }
                }
            }
            Command::Subscribe => {
                context.subscription = None;
                match Subscription::start(
                    context.platform.location.clone(),
                    &context.config.request,
                ) {
                    Ok(subscription) => {
                        context.subscription = Some(subscription);
                        None
                    }
                    Err(err) => {
                        log::error!("failed to request location updates: {err}");
                        Some(FlowEvent::SubscribeFailed(err))
                    }
                }
            }
            Command::Unsubscribe => {
                if let Some(subscription) = context.subscription.take() {
                    subscription.cancel();
                }
                None
            }
            Command::Show(notice) => {
                Toast::new(notice.text())
                    .duration(notice.duration())
                    .show_with(context.platform.presenter.as_ref());
                None
            }
        }
    }
}
