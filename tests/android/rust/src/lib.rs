//! Android JNI harness for the location screen.
//!
//! This crate is only compiled for Android targets.
//! To build: cargo ndk -t arm64-v8a build -p locator-android
//!
//! The host `com.locator.app.MainActivity` forwards its lifecycle and result
//! callbacks to the `native*` functions below. The screen itself runs on a
//! worker thread so the UI thread never blocks on platform callbacks.

#![cfg(target_os = "android")]
#![allow(non_snake_case)]

use std::sync::{Arc, Mutex};
use std::thread;

use async_channel::Sender;
use jni::JNIEnv;
use jni::objects::{JIntArray, JObject};
use jni::sys::jint;
use locator::location::ResolutionOutcome;
use locator::location::sys::AndroidLocation;
use locator::permission::GrantResult;
use locator::permission::sys::AndroidPermissions;
use locator::prefs::sys::SharedPreferences;
use locator::toast::sys::AndroidPresenter;
use locator::{LocationScreen, Platform, ScreenConfig, ScreenEvent};

/// Event sender of the live screen, if one was created.
static SCREEN: Mutex<Option<Sender<ScreenEvent>>> = Mutex::new(None);

fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("locator"),
    );
}

fn platform(env: &mut JNIEnv, activity: &JObject) -> Result<Platform, String> {
    let location = Arc::new(AndroidLocation::new(env, activity).map_err(|e| e.to_string())?);
    Ok(Platform {
        permissions: Arc::new(AndroidPermissions::new(env, activity).map_err(|e| e.to_string())?),
        providers: location.clone(),
        location: location.clone(),
        settings: location,
        preferences: Arc::new(
            SharedPreferences::default_for(env, activity).map_err(|e| e.to_string())?,
        ),
        presenter: Arc::new(AndroidPresenter::new(env, activity)?),
    })
}

fn send(event: ScreenEvent) {
    let sender = SCREEN.lock().expect("screen mutex poisoned").clone();
    match sender {
        Some(sender) => {
            if sender.send_blocking(event).is_err() {
                log::warn!("location screen already stopped");
            }
        }
        None => log::warn!("no location screen for {event:?}"),
    }
}

/// Creates the screen and starts the fetch flow.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_locator_app_MainActivity_nativeCreate(
    mut env: JNIEnv,
    activity: JObject,
) {
    init_logging();

    let platform = match platform(&mut env, &activity) {
        Ok(platform) => platform,
        Err(err) => {
            log::error!("failed to set up location screen: {err}");
            return;
        }
    };

    let (events, receiver) = async_channel::unbounded();
    let screen = LocationScreen::new(platform, ScreenConfig::default());

    let spawned = thread::Builder::new()
        .name("locator-screen".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("failed to start screen runtime: {err}");
                    return;
                }
            };
            runtime.block_on(screen.run(receiver));
        });
    if let Err(err) = spawned {
        log::error!("failed to spawn screen thread: {err}");
        return;
    }

    // Replacing an older sender closes its channel, which stops that screen.
    *SCREEN.lock().expect("screen mutex poisoned") = Some(events);
    send(ScreenEvent::Created);
}

/// The location button was pressed.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_locator_app_MainActivity_nativeButtonPressed(
    _env: JNIEnv,
    _activity: JObject,
) {
    send(ScreenEvent::ButtonPressed);
}

/// Forwards `onRequestPermissionsResult`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_locator_app_MainActivity_nativeRequestPermissionsResult(
    mut env: JNIEnv,
    _activity: JObject,
    request_code: jint,
    grant_results: JIntArray,
) {
    let grants = match read_grants(&mut env, &grant_results) {
        Ok(grants) => grants,
        Err(err) => {
            log::error!("failed to read grant results: {err}");
            Vec::new()
        }
    };
    send(ScreenEvent::PermissionResult {
        request_code,
        grants,
    });
}

fn read_grants(env: &mut JNIEnv, grant_results: &JIntArray) -> jni::errors::Result<Vec<GrantResult>> {
    if grant_results.is_null() {
        return Ok(Vec::new());
    }
    let len = usize::try_from(env.get_array_length(grant_results)?).unwrap_or_default();
    let mut codes = vec![0; len];
    env.get_int_array_region(grant_results, 0, &mut codes)?;
    Ok(codes.into_iter().map(GrantResult::from_android).collect())
}

/// Forwards `onActivityResult` for the settings-resolution prompt.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_locator_app_MainActivity_nativeActivityResult(
    _env: JNIEnv,
    _activity: JObject,
    request_code: jint,
    result_code: jint,
) {
    send(ScreenEvent::ResolutionResult {
        request_code,
        outcome: ResolutionOutcome::from_android(result_code),
    });
}

/// Tears the screen down.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_locator_app_MainActivity_nativeDestroy(
    _env: JNIEnv,
    _activity: JObject,
) {
    send(ScreenEvent::Destroyed);
    SCREEN.lock().expect("screen mutex poisoned").take();
}
