//! In-memory collaborators for driving a `LocationScreen` in tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_channel::Sender;
use futures::future::BoxFuture;
use locator::location::{
    FusedLocationProvider, LocationError, LocationRequest, LocationResult, LocationSample,
    Provider, ProviderStatus, SettingsClient, SettingsOutcome, SubscriptionId,
};
use locator::permission::{Permission, PermissionBackend, PermissionResult, PermissionStatus};
use locator::prefs::MemoryPreferences;
use locator::toast::{Presenter, ToastDuration};
use locator::{LocationScreen, Platform, ScreenConfig};

#[derive(Default)]
pub struct FakePermissions {
    pub granted: AtomicBool,
    pub rationale: AtomicBool,
    pub requests: Mutex<Vec<i32>>,
}

impl PermissionBackend for FakePermissions {
    fn check(&self, _permission: Permission) -> PermissionStatus {
        if self.granted.load(Ordering::SeqCst) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    fn should_show_rationale(&self, _permission: Permission) -> bool {
        self.rationale.load(Ordering::SeqCst)
    }

    fn request(&self, _permissions: &[Permission], request_code: i32) -> PermissionResult<()> {
        self.requests.lock().unwrap().push(request_code);
        Ok(())
    }
}

pub struct FakeProviders {
    pub gps: AtomicBool,
    pub network: AtomicBool,
}

impl ProviderStatus for FakeProviders {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gps => self.gps.load(Ordering::SeqCst),
            Provider::Network => self.network.load(Ordering::SeqCst),
        }
    }
}

#[derive(Default)]
pub struct FakeLocation {
    pub last: Mutex<VecDeque<LocationResult<Option<LocationSample>>>>,
    pub last_calls: AtomicUsize,
    pub requests: Mutex<Vec<LocationRequest>>,
    pub removed: Mutex<Vec<SubscriptionId>>,
    sinks: Mutex<HashMap<SubscriptionId, Sender<LocationSample>>>,
    next_id: AtomicU64,
}

impl FakeLocation {
    pub fn push_last(&self, result: LocationResult<Option<LocationSample>>) {
        self.last.lock().unwrap().push_back(result);
    }

    /// Delivers `sample` to every live stream.
    pub fn emit(&self, sample: LocationSample) {
        for sink in self.sinks.lock().unwrap().values() {
            let _ = sink.try_send(sample);
        }
    }

    pub fn active_streams(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

impl FusedLocationProvider for FakeLocation {
    fn last_location(&self) -> BoxFuture<'static, LocationResult<Option<LocationSample>>> {
        self.last_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.last.lock().unwrap().pop_front().unwrap_or(Ok(None));
        Box::pin(async move { result })
    }

    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: Sender<LocationSample>,
    ) -> LocationResult<SubscriptionId> {
        self.requests.lock().unwrap().push(*request);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sinks.lock().unwrap().insert(id, sink);
        Ok(id)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        self.removed.lock().unwrap().push(id);
        self.sinks.lock().unwrap().remove(&id);
    }
}

pub struct FakeSettings {
    pub outcomes: Mutex<VecDeque<SettingsOutcome>>,
    pub checks: AtomicUsize,
    pub resolutions: Mutex<Vec<i32>>,
    pub resolution_supported: AtomicBool,
}

impl FakeSettings {
    pub fn push(&self, outcome: SettingsOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }
}

impl SettingsClient for FakeSettings {
    fn check_settings(&self, _request: &LocationRequest) -> BoxFuture<'static, SettingsOutcome> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SettingsOutcome::Satisfied);
        Box::pin(async move { outcome })
    }

    fn start_resolution(&self, request_code: i32) -> LocationResult<()> {
        self.resolutions.lock().unwrap().push(request_code);
        if self.resolution_supported.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LocationError::NotSupported)
        }
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Mutex<Vec<(String, ToastDuration)>>,
}

impl RecordingPresenter {
    pub fn messages(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn show(&self, message: &str, duration: ToastDuration) {
        self.shown
            .lock()
            .unwrap()
            .push((message.to_owned(), duration));
    }
}

/// A device with permission granted and both providers on.
pub struct Device {
    pub permissions: Arc<FakePermissions>,
    pub providers: Arc<FakeProviders>,
    pub location: Arc<FakeLocation>,
    pub settings: Arc<FakeSettings>,
    pub preferences: Arc<MemoryPreferences>,
    pub presenter: Arc<RecordingPresenter>,
}

impl Device {
    pub fn new() -> Self {
        Self {
            permissions: Arc::new(FakePermissions {
                granted: AtomicBool::new(true),
                ..Default::default()
            }),
            providers: Arc::new(FakeProviders {
                gps: AtomicBool::new(true),
                network: AtomicBool::new(true),
            }),
            location: Arc::new(FakeLocation::default()),
            settings: Arc::new(FakeSettings {
                outcomes: Mutex::new(VecDeque::new()),
                checks: AtomicUsize::new(0),
                resolutions: Mutex::new(Vec::new()),
                resolution_supported: AtomicBool::new(true),
            }),
            preferences: Arc::new(MemoryPreferences::new()),
            presenter: Arc::new(RecordingPresenter::default()),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            permissions: self.permissions.clone(),
            providers: self.providers.clone(),
            location: self.location.clone(),
            settings: self.settings.clone(),
            preferences: self.preferences.clone(),
            presenter: self.presenter.clone(),
        }
    }

    pub fn screen(&self) -> LocationScreen {
        self.screen_with(ScreenConfig::default())
    }

    pub fn screen_with(&self, config: ScreenConfig) -> LocationScreen {
        LocationScreen::new(self.platform(), config)
    }

    pub fn messages(&self) -> Vec<String> {
        self.presenter.messages()
    }
}
