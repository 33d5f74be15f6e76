//! The location request state machine.
//!
//! [`Flow`] is pure: it consumes [`FlowEvent`]s and answers with the
//! [`Command`]s the driver has to run. Every platform result is fed back in as
//! another event, so the whole fetch sequence can be exercised without a
//! device.

use locator_location::{
    LocationError, LocationResult, LocationSample, ResolutionOutcome, SettingsOutcome,
};
use locator_toast::ToastDuration;

use crate::{FlowError, PermissionAction, PermissionCheck};

/// Where a fetch run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting for the permission check.
    CheckingPermission,
    /// Waiting for provider status.
    CheckingAvailability,
    /// Waiting for the last known location.
    FetchingLast,
    /// Waiting for the settings check or the resolution prompt.
    ValidatingSettings,
    /// Subscribed and waiting for the first update.
    AwaitingUpdate,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// The user asked for a location, or the screen came up.
    Triggered,
    /// Result of [`Command::CheckPermission`].
    PermissionChecked(PermissionCheck),
    /// The permission prompt could not be shown.
    PermissionRequestFailed,
    /// The user answered the permission prompt.
    PermissionAnswered {
        /// Every requested permission was granted.
        granted: bool,
        /// The platform would still show a rationale.
        rationale: bool,
    },
    /// Result of [`Command::CheckAvailability`].
    AvailabilityChecked {
        /// Both providers are disabled.
        location_off: bool,
    },
    /// Result of [`Command::FetchLastLocation`].
    LastLocation(LocationResult<Option<LocationSample>>),
    /// Result of [`Command::CheckSettings`].
    SettingsChecked(SettingsOutcome),
    /// The resolution prompt could not be started.
    ResolutionUnavailable,
    /// The user closed the resolution prompt.
    ResolutionAnswered(ResolutionOutcome),
    /// The update subscription could not be started.
    SubscribeFailed(LocationError),
    /// A sample arrived on the update subscription.
    UpdateReceived(LocationSample),
    /// The provider closed the update stream.
    UpdatesEnded,
    /// The screen is going away.
    TornDown,
}

/// Something the user should see.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A location fix.
    Coordinates(LocationSample),
    /// No cached fix; waiting for a fresh one.
    Searching,
    /// A failure with its own message.
    Failure(FlowError),
}

impl Notice {
    /// Toast text.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Coordinates(sample) => sample.coordinates_text(),
            Self::Searching => "Location searching ...".to_owned(),
            Self::Failure(error) => error.user_message(),
        }
    }

    /// Toast duration.
    #[must_use]
    pub const fn duration(&self) -> ToastDuration {
        match self {
            Self::Failure(error) => error.duration(),
            _ => ToastDuration::Short,
        }
    }
}

/// Work requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Check the grant state; answers with [`FlowEvent::PermissionChecked`].
    CheckPermission,
    /// Show the permission prompt. The answer arrives from the host.
    RequestPermission,
    /// Query providers; answers with [`FlowEvent::AvailabilityChecked`].
    CheckAvailability,
    /// Ask for the cached fix; answers with [`FlowEvent::LastLocation`].
    FetchLastLocation,
    /// Validate settings; answers with [`FlowEvent::SettingsChecked`].
    CheckSettings,
    /// Show the settings-resolution prompt.
    StartResolution,
    /// Replace any update subscription with a fresh one.
    Subscribe,
    /// Drop the update subscription.
    Unsubscribe,
    /// Present a notice.
    Show(Notice),
}

/// The location request state machine.
#[derive(Debug, Clone)]
pub struct Flow {
    state: FlowState,
    subscribed: bool,
    retries: u32,
    max_retries: u32,
}

impl Flow {
    /// A machine allowing `max_retries` settings-driven re-entries per run.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            state: FlowState::Idle,
            subscribed: false,
            retries: 0,
            max_retries,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> FlowState {
        self.state
    }

    /// Whether an update subscription is outstanding.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Re-entries used by the current run.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Advances the machine.
    pub fn handle(&mut self, event: FlowEvent) -> Vec<Command> {
        use FlowEvent as E;
        use FlowState as S;

        log::trace!("{:?} <- {event:?}", self.state);

        match event {
            E::Triggered => {
                self.retries = 0;
                self.state = S::CheckingPermission;
                vec![Command::CheckPermission]
            }

            E::PermissionChecked(check) if self.state == S::CheckingPermission => match check {
                PermissionCheck::Granted => self.check_availability(),
                PermissionCheck::Missing(PermissionAction::Request) => {
                    self.state = S::Idle;
                    vec![Command::RequestPermission]
                }
                PermissionCheck::Missing(PermissionAction::Explain) => {
                    self.fail(FlowError::PermissionRequired)
                }
            },

            E::PermissionRequestFailed => self.fail(FlowError::PermissionRequired),

            E::PermissionAnswered { granted: true, .. } => {
                self.retries = 0;
                self.check_availability()
            }
            E::PermissionAnswered {
                granted: false,
                rationale,
            } => self.fail(if rationale {
                FlowError::PermissionRequired
            } else {
                FlowError::PermissionDenied
            }),

            E::AvailabilityChecked { location_off } if self.state == S::CheckingAvailability => {
                if location_off {
                    self.fail(FlowError::LocationServiceDisabled)
                } else {
                    self.state = S::FetchingLast;
                    vec![Command::FetchLastLocation]
                }
            }

            E::LastLocation(result) if self.state == S::FetchingLast => match result {
                Ok(Some(sample)) => {
                    self.state = S::Idle;
                    let mut commands = vec![Command::Show(Notice::Coordinates(sample))];
                    commands.extend(self.release());
                    commands
                }
                Ok(None) => {
                    self.state = S::ValidatingSettings;
                    vec![Command::Show(Notice::Searching), Command::CheckSettings]
                }
                Err(err) => self.fail(FlowError::FetchFailure(err)),
            },

            E::SettingsChecked(outcome) if self.state == S::ValidatingSettings => match outcome {
                SettingsOutcome::Satisfied => {
                    self.state = S::AwaitingUpdate;
                    self.subscribed = true;
                    vec![Command::Subscribe]
                }
                SettingsOutcome::ResolvableViaPrompt => vec![Command::StartResolution],
                SettingsOutcome::UnresolvableError => self.retry(vec![Command::Show(
                    Notice::Failure(FlowError::SettingsUnresolvable),
                )]),
            },

            E::ResolutionUnavailable if self.state == S::ValidatingSettings => self.retry(Vec::new()),

            E::ResolutionAnswered(outcome) if self.state == S::ValidatingSettings => {
                log::info!("settings resolution finished: {outcome:?}");
                self.retry(Vec::new())
            }

            E::SubscribeFailed(err) => {
                self.subscribed = false;
                self.fail(FlowError::SubscriptionFailed(err))
            }

            E::UpdateReceived(sample) if self.subscribed => {
                if self.state == S::AwaitingUpdate {
                    self.state = S::Idle;
                }
                let mut commands = vec![Command::Show(Notice::Coordinates(sample))];
                commands.extend(self.release());
                commands
            }

            E::UpdatesEnded => {
                if self.state == S::AwaitingUpdate {
                    self.state = S::Idle;
                }
                self.release()
            }

            E::TornDown => {
                self.state = S::Idle;
                self.release()
            }

            event => {
                log::debug!("ignoring {event:?} in {:?}", self.state);
                Vec::new()
            }
        }
    }

    fn check_availability(&mut self) -> Vec<Command> {
        self.state = FlowState::CheckingAvailability;
        vec![Command::CheckAvailability]
    }

    fn fail(&mut self, error: FlowError) -> Vec<Command> {
        self.state = FlowState::Idle;
        vec![Command::Show(Notice::Failure(error))]
    }

    fn release(&mut self) -> Vec<Command> {
        if std::mem::take(&mut self.subscribed) {
            vec![Command::Unsubscribe]
        } else {
            Vec::new()
        }
    }

    fn retry(&mut self, mut commands: Vec<Command>) -> Vec<Command> {
        if self.retries < self.max_retries {
            self.retries += 1;
            log::info!(
                "re-entering location flow ({}/{})",
                self.retries,
                self.max_retries
            );
            commands.extend(self.check_availability());
        } else {
            log::warn!("giving up after {} settings retries", self.max_retries);
            commands.extend(self.fail(FlowError::SettingsRetriesExhausted));
        }
        commands
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_at(state: FlowState) -> Flow {
        let mut flow = Flow::new(3);
        flow.state = state;
        flow
    }

    #[test]
    fn trigger_checks_permission() {
        let mut flow = Flow::default();
        assert_eq!(flow.handle(FlowEvent::Triggered), vec![Command::CheckPermission]);
        assert_eq!(flow.state(), FlowState::CheckingPermission);
    }

    #[test]
    fn missing_permission_requests_or_explains() {
        let mut flow = flow_at(FlowState::CheckingPermission);
        assert_eq!(
            flow.handle(FlowEvent::PermissionChecked(PermissionCheck::Missing(
                PermissionAction::Request
            ))),
            vec![Command::RequestPermission]
        );
        assert_eq!(flow.state(), FlowState::Idle);

        let mut flow = flow_at(FlowState::CheckingPermission);
        assert_eq!(
            flow.handle(FlowEvent::PermissionChecked(PermissionCheck::Missing(
                PermissionAction::Explain
            ))),
            vec![Command::Show(Notice::Failure(FlowError::PermissionRequired))]
        );
    }

    #[test]
    fn granted_answer_enters_the_fetch_flow() {
        let mut flow = Flow::default();
        assert_eq!(
            flow.handle(FlowEvent::PermissionAnswered {
                granted: true,
                rationale: false
            }),
            vec![Command::CheckAvailability]
        );
    }

    #[test]
    fn denied_answer_is_reported() {
        let mut flow = Flow::default();
        assert_eq!(
            flow.handle(FlowEvent::PermissionAnswered {
                granted: false,
                rationale: false
            }),
            vec![Command::Show(Notice::Failure(FlowError::PermissionDenied))]
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn location_off_aborts_before_fetching() {
        let mut flow = flow_at(FlowState::CheckingAvailability);
        let commands = flow.handle(FlowEvent::AvailabilityChecked { location_off: true });
        assert_eq!(
            commands,
            vec![Command::Show(Notice::Failure(
                FlowError::LocationServiceDisabled
            ))]
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn cached_fix_releases_the_subscription() {
        let mut flow = flow_at(FlowState::FetchingLast);
        flow.subscribed = true;
        let sample = LocationSample::at(56.78, 12.34, 0);
        assert_eq!(
            flow.handle(FlowEvent::LastLocation(Ok(Some(sample)))),
            vec![
                Command::Show(Notice::Coordinates(sample)),
                Command::Unsubscribe
            ]
        );
        assert!(!flow.is_subscribed());
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn missing_fix_searches_then_validates() {
        let mut flow = flow_at(FlowState::FetchingLast);
        assert_eq!(
            flow.handle(FlowEvent::LastLocation(Ok(None))),
            vec![Command::Show(Notice::Searching), Command::CheckSettings]
        );
        assert_eq!(
            flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::Satisfied)),
            vec![Command::Subscribe]
        );
        assert_eq!(flow.state(), FlowState::AwaitingUpdate);
        assert!(flow.is_subscribed());
    }

    #[test]
    fn fetch_failure_is_not_retried() {
        let mut flow = flow_at(FlowState::FetchingLast);
        let commands = flow.handle(FlowEvent::LastLocation(Err(LocationError::NotAvailable)));
        assert_eq!(
            commands,
            vec![Command::Show(Notice::Failure(FlowError::FetchFailure(
                LocationError::NotAvailable
            )))]
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn resolvable_settings_wait_for_the_prompt() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        assert_eq!(
            flow.handle(FlowEvent::SettingsChecked(
                SettingsOutcome::ResolvableViaPrompt
            )),
            vec![Command::StartResolution]
        );
        assert_eq!(flow.state(), FlowState::ValidatingSettings);

        assert_eq!(
            flow.handle(FlowEvent::ResolutionAnswered(ResolutionOutcome::Declined)),
            vec![Command::CheckAvailability]
        );
        assert_eq!(flow.retries(), 1);
    }

    #[test]
    fn unavailable_prompt_retries_immediately() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        assert_eq!(
            flow.handle(FlowEvent::ResolutionUnavailable),
            vec![Command::CheckAvailability]
        );
    }

    #[test]
    fn unresolvable_settings_warn_and_retry() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        let commands = flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::UnresolvableError));
        assert_eq!(
            commands,
            vec![
                Command::Show(Notice::Failure(FlowError::SettingsUnresolvable)),
                Command::CheckAvailability
            ]
        );
        assert_eq!(
            Notice::Failure(FlowError::SettingsUnresolvable).duration(),
            ToastDuration::Long
        );
    }

    #[test]
    fn retries_are_capped() {
        let mut flow = Flow::new(1);
        flow.state = FlowState::ValidatingSettings;
        flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::UnresolvableError));

        flow.state = FlowState::ValidatingSettings;
        let commands = flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::UnresolvableError));
        assert_eq!(
            commands.last(),
            Some(&Command::Show(Notice::Failure(
                FlowError::SettingsRetriesExhausted
            )))
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn trigger_resets_the_retry_budget() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        flow.handle(FlowEvent::ResolutionUnavailable);
        assert_eq!(flow.retries(), 1);
        flow.handle(FlowEvent::Triggered);
        assert_eq!(flow.retries(), 0);
    }

    #[test]
    fn first_update_is_shown_once() {
        let mut flow = flow_at(FlowState::AwaitingUpdate);
        flow.subscribed = true;
        let sample = LocationSample::at(1.0, 2.0, 0);
        assert_eq!(
            flow.handle(FlowEvent::UpdateReceived(sample)),
            vec![
                Command::Show(Notice::Coordinates(sample)),
                Command::Unsubscribe
            ]
        );
        assert_eq!(flow.state(), FlowState::Idle);
        assert!(flow.handle(FlowEvent::UpdateReceived(sample)).is_empty());
    }

    #[test]
    fn teardown_releases_the_subscription() {
        let mut flow = flow_at(FlowState::AwaitingUpdate);
        flow.subscribed = true;
        assert_eq!(flow.handle(FlowEvent::TornDown), vec![Command::Unsubscribe]);
        assert!(flow.handle(FlowEvent::TornDown).is_empty());
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut flow = Flow::default();
        assert!(
            flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::Satisfied))
                .is_empty()
        );
        assert!(
            flow.handle(FlowEvent::ResolutionAnswered(ResolutionOutcome::Accepted))
                .is_empty()
        );
        assert_eq!(flow.state(), FlowState::Idle);
    }

    #[test]
    fn subscribe_failure_is_reported_and_clears_the_subscription() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        assert_eq!(
            flow.handle(FlowEvent::SettingsChecked(SettingsOutcome::Satisfied)),
            vec![Command::Subscribe]
        );
        assert!(flow.is_subscribed());

        let commands = flow.handle(FlowEvent::SubscribeFailed(LocationError::NotAvailable));
        assert_eq!(
            commands,
            vec![Command::Show(Notice::Failure(FlowError::SubscriptionFailed(
                LocationError::NotAvailable
            )))]
        );
        assert_eq!(
            Notice::Failure(FlowError::SubscriptionFailed(LocationError::NotAvailable)).text(),
            "Unable to start location updates"
        );
        assert!(!flow.is_subscribed());
        assert_eq!(flow.state(), FlowState::Idle);
        assert!(flow.handle(FlowEvent::TornDown).is_empty());
    }

    #[test]
    fn ended_updates_release_the_subscription() {
        let mut flow = flow_at(FlowState::AwaitingUpdate);
        flow.subscribed = true;
        assert_eq!(flow.handle(FlowEvent::UpdatesEnded), vec![Command::Unsubscribe]);
        assert_eq!(flow.state(), FlowState::Idle);
        assert!(!flow.is_subscribed());
        assert!(
            flow.handle(FlowEvent::UpdateReceived(LocationSample::at(1.0, 2.0, 0)))
                .is_empty()
        );
    }

    #[test]
    fn granted_answer_resets_the_retry_budget() {
        let mut flow = flow_at(FlowState::ValidatingSettings);
        flow.handle(FlowEvent::ResolutionUnavailable);
        flow.state = FlowState::ValidatingSettings;
        flow.handle(FlowEvent::ResolutionUnavailable);
        assert_eq!(flow.retries(), 2);

        let commands = flow.handle(FlowEvent::PermissionAnswered {
            granted: true,
            rationale: false,
        });
        assert_eq!(commands, vec![Command::CheckAvailability]);
        assert_eq!(flow.retries(), 0);
        assert_eq!(flow.state(), FlowState::CheckingAvailability);
    }

    #[test]
    fn notice_texts() {
        assert_eq!(
            Notice::Coordinates(LocationSample::at(56.78, 12.34, 0)).text(),
            "12.34,56.78"
        );
        assert_eq!(Notice::Searching.text(), "Location searching ...");
        assert_eq!(
            Notice::Failure(FlowError::LocationServiceDisabled).text(),
            "Turn On Location"
        );
    }
}
