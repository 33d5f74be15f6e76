//! Android location implementation using JNI.
//!
//! The fused location provider and the settings client only exist as Java
//! APIs with listener callbacks. An embedded Kotlin `LocationBridge` owns the
//! listeners and calls back into the native methods registered below; each
//! call carries the backend handle and a token that resolves the matching
//! Rust future or feeds the matching update stream.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_channel::Sender;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jboolean, jdouble, jint, jlong};
use jni::{JNIEnv, JavaVM, NativeMethod};

use crate::{
    FusedLocationProvider, LocationError, LocationRequest, LocationResult, LocationSample,
    Provider, ProviderStatus, SettingsClient, SettingsOutcome, SubscriptionId,
};

/// Embedded DEX bytecode containing the `LocationBridge` class.
/// Generated at build time by kotlinc + D8.
static DEX_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/classes.dex"));

/// Cached class loader for the embedded DEX.
static CLASS_LOADER: OnceLock<GlobalRef> = OnceLock::new();

/// Bridge class with its native methods registered.
static BRIDGE_CLASS: OnceLock<GlobalRef> = OnceLock::new();

const BRIDGE_CLASS_NAME: &str = "locator.location.LocationBridge";

/// Settings outcome constants (must match Kotlin).
const OUTCOME_SATISFIED: jint = 0;
const OUTCOME_RESOLVABLE: jint = 1;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static BACKENDS: OnceLock<Mutex<HashMap<u64, Arc<Pending>>>> = OnceLock::new();

fn backends() -> &'static Mutex<HashMap<u64, Arc<Pending>>> {
    BACKENDS.get_or_init(|| Mutex::new(HashMap::new()))
}

type LastLocationReply = oneshot::Sender<LocationResult<Option<LocationSample>>>;

/// Requests waiting on the Kotlin side, keyed by token.
#[derive(Default)]
struct Pending {
    last_location: Mutex<HashMap<u64, LastLocationReply>>,
    settings: Mutex<HashMap<u64, oneshot::Sender<SettingsOutcome>>>,
    /// Fed from callbacks on the main looper. The lock only covers the map
    /// lookup; samples are sent after it is released.
    streams: Mutex<HashMap<u64, Sender<LocationSample>>>,
}

#[allow(clippy::needless_pass_by_value)]
fn map_jni_error(err: jni::errors::Error) -> LocationError {
    LocationError::Platform {
        message: err.to_string(),
    }
}

/// Initialize the DEX class loader. Must be called with a valid Context.
///
/// # Errors
/// Returns an error if the DEX could not be written or loaded.
pub fn init_with_context(env: &mut JNIEnv, context: &JObject) -> LocationResult<()> {
    if CLASS_LOADER.get().is_some() {
        return Ok(());
    }

    // Write DEX to cache directory
    let cache_dir = env
        .call_method(context, "getCacheDir", "()Ljava/io/File;", &[])
        .and_then(|v| v.l())
        .map_err(map_jni_error)?;

    let cache_path = env
        .call_method(&cache_dir, "getAbsolutePath", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(map_jni_error)?;

    let cache_path_str: String = env
        .get_string((&cache_path).into())
        .map_err(map_jni_error)?
        .into();
    let dex_path = format!("{cache_path_str}/locator_location.dex");

    std::fs::write(&dex_path, DEX_BYTES).map_err(|e| LocationError::Platform {
        message: format!("write DEX failed: {e}"),
    })?;

    let dex_path_jstring = env.new_string(&dex_path).map_err(map_jni_error)?;

    let parent_loader = env
        .call_method(context, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .and_then(|v| v.l())
        .map_err(map_jni_error)?;

    let class_loader = env
        .new_object(
            "dalvik/system/DexClassLoader",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/ClassLoader;)V",
            &[
                JValue::Object(&dex_path_jstring),
                JValue::Object(&cache_path),
                JValue::Object(&JObject::null()),
                JValue::Object(&parent_loader),
            ],
        )
        .map_err(map_jni_error)?;

    let global_ref = env.new_global_ref(class_loader).map_err(map_jni_error)?;

    let _ = CLASS_LOADER.set(global_ref);
    Ok(())
}

fn bridge_class(env: &mut JNIEnv) -> LocationResult<&'static GlobalRef> {
    if let Some(class) = BRIDGE_CLASS.get() {
        return Ok(class);
    }

    let class_loader = CLASS_LOADER.get().ok_or_else(|| LocationError::Platform {
        message: "class loader not initialized".into(),
    })?;

    let name = env.new_string(BRIDGE_CLASS_NAME).map_err(map_jni_error)?;
    let class: JClass = env
        .call_method(
            class_loader.as_obj(),
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&name)],
        )
        .and_then(|v| v.l())
        .map_err(map_jni_error)?
        .into();

    // Classes from a DexClassLoader do not see symbols of the host library,
    // so the callbacks are bound explicitly.
    env.register_native_methods(
        &class,
        &[
            NativeMethod {
                name: "nativeLastLocation".into(),
                sig: "(JJZDDJ)V".into(),
                fn_ptr: native_last_location as *mut c_void,
            },
            NativeMethod {
                name: "nativeLastLocationFailed".into(),
                sig: "(JJLjava/lang/String;)V".into(),
                fn_ptr: native_last_location_failed as *mut c_void,
            },
            NativeMethod {
                name: "nativeSettingsResult".into(),
                sig: "(JJI)V".into(),
                fn_ptr: native_settings_result as *mut c_void,
            },
            NativeMethod {
                name: "nativeLocationUpdate".into(),
                sig: "(JJDDJ)V".into(),
                fn_ptr: native_location_update as *mut c_void,
            },
        ],
    )
    .map_err(map_jni_error)?;

    let global = env.new_global_ref(class).map_err(map_jni_error)?;
    Ok(BRIDGE_CLASS.get_or_init(|| global))
}

/// Location backend bound to the screen's Activity.
pub struct AndroidLocation {
    vm: JavaVM,
    bridge: GlobalRef,
    handle: u64,
    next_token: AtomicU64,
    pending: Arc<Pending>,
}

impl fmt::Debug for AndroidLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidLocation")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl AndroidLocation {
    /// Creates the Kotlin bridge for `activity`.
    ///
    /// # Errors
    /// Returns an error if the bridge could not be loaded or constructed.
    pub fn new(env: &mut JNIEnv, activity: &JObject) -> LocationResult<Self> {
        init_with_context(env, activity)?;
        let class = bridge_class(env)?;
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);

        let class: &JClass = class.as_obj().into();
        let bridge = env
            .new_object(
                class,
                "(Landroid/app/Activity;J)V",
                &[JValue::Object(activity), JValue::Long(to_jlong(handle))],
            )
            .map_err(map_jni_error)?;

        let pending = Arc::new(Pending::default());
        backends()
            .lock()
            .expect("backend registry mutex poisoned")
            .insert(handle, pending.clone());

        Ok(Self {
            vm: env.get_java_vm().map_err(map_jni_error)?,
            bridge: env.new_global_ref(bridge).map_err(map_jni_error)?,
            handle,
            next_token: AtomicU64::new(1),
            pending,
        })
    }

    fn token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn with_bridge<T, F>(&self, action: F) -> LocationResult<T>
    where
        F: FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> jni::errors::Result<T>,
    {
        let mut env = self.vm.attach_current_thread().map_err(map_jni_error)?;
        action(&mut env, self.bridge.as_obj()).map_err(map_jni_error)
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn to_jlong(value: u64) -> jlong {
    value as jlong
}

fn request_args(request: &LocationRequest) -> [JValue<'static, 'static>; 3] {
    [
        JValue::Long(to_jlong(request.interval_ms)),
        JValue::Long(to_jlong(request.fastest_interval_ms)),
        JValue::Int(request.priority.android_code()),
    ]
}

impl ProviderStatus for AndroidLocation {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        let name = match provider {
            Provider::Gps => "gps",
            Provider::Network => "network",
        };

        let result = self.with_bridge(|env, bridge| {
            let name = env.new_string(name)?;
            env.call_method(
                bridge,
                "isProviderEnabled",
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&name)],
            )?
            .z()
        });

        result.unwrap_or_else(|err| {
            log::error!("failed to query {provider:?} provider: {err}");
            false
        })
    }
}

impl FusedLocationProvider for AndroidLocation {
    fn last_location(&self) -> BoxFuture<'static, LocationResult<Option<LocationSample>>> {
        let token = self.token();
        let (reply, response) = oneshot::channel();
        self.pending
            .last_location
            .lock()
            .expect("pending mutex poisoned")
            .insert(token, reply);

        let started = self.with_bridge(|env, bridge| {
            env.call_method(
                bridge,
                "getLastLocation",
                "(J)V",
                &[JValue::Long(to_jlong(token))],
            )?;
            Ok(())
        });

        if let Err(err) = started {
            self.pending
                .last_location
                .lock()
                .expect("pending mutex poisoned")
                .remove(&token);
            return Box::pin(async move { Err(err) });
        }

        Box::pin(async move {
            response.await.unwrap_or_else(|_| {
                Err(LocationError::Platform {
                    message: "location bridge dropped the request".into(),
                })
            })
        })
    }

    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: Sender<LocationSample>,
    ) -> LocationResult<SubscriptionId> {
        let id = self.token();
        self.pending
            .streams
            .lock()
            .expect("pending mutex poisoned")
            .insert(id, sink);

        let [interval, fastest, priority] = request_args(request);
        let started = self.with_bridge(|env, bridge| {
            env.call_method(
                bridge,
                "requestUpdates",
                "(JJJI)V",
                &[JValue::Long(to_jlong(id)), interval, fastest, priority],
            )?;
            Ok(())
        });

        if let Err(err) = started {
            self.pending
                .streams
                .lock()
                .expect("pending mutex poisoned")
                .remove(&id);
            return Err(err);
        }
        Ok(SubscriptionId(id))
    }

    fn remove_updates(&self, id: SubscriptionId) {
        self.pending
            .streams
            .lock()
            .expect("pending mutex poisoned")
            .remove(&id.0);

        if let Err(err) = self.with_bridge(|env, bridge| {
            env.call_method(bridge, "removeUpdates", "(J)V", &[JValue::Long(to_jlong(id.0))])?;
            Ok(())
        }) {
            log::error!("failed to remove Android location updates: {err}");
        }
    }
}

impl SettingsClient for AndroidLocation {
    fn check_settings(&self, request: &LocationRequest) -> BoxFuture<'static, SettingsOutcome> {
        let token = self.token();
        let (reply, response) = oneshot::channel();
        self.pending
            .settings
            .lock()
            .expect("pending mutex poisoned")
            .insert(token, reply);

        let [interval, fastest, priority] = request_args(request);
        let started = self.with_bridge(|env, bridge| {
            env.call_method(
                bridge,
                "checkSettings",
                "(JJJI)V",
                &[JValue::Long(to_jlong(token)), interval, fastest, priority],
            )?;
            Ok(())
        });

        if let Err(err) = started {
            log::error!("failed to check location settings: {err}");
            self.pending
                .settings
                .lock()
                .expect("pending mutex poisoned")
                .remove(&token);
            return Box::pin(async { SettingsOutcome::UnresolvableError });
        }

        Box::pin(async move {
            response
                .await
                .unwrap_or(SettingsOutcome::UnresolvableError)
        })
    }

    fn start_resolution(&self, request_code: i32) -> LocationResult<()> {
        let started = self.with_bridge(|env, bridge| {
            env.call_method(
                bridge,
                "startResolution",
                "(I)Z",
                &[JValue::Int(request_code)],
            )?
            .z()
        })?;

        if started {
            Ok(())
        } else {
            Err(LocationError::NotAvailable)
        }
    }
}

impl Drop for AndroidLocation {
    fn drop(&mut self) {
        if let Some(map) = BACKENDS.get() {
            let mut guard = map.lock().expect("backend registry mutex poisoned");
            guard.remove(&self.handle);
        }
    }
}

#[allow(clippy::cast_sign_loss)]
fn pending_for(handle: jlong) -> Option<Arc<Pending>> {
    let pending = backends()
        .lock()
        .expect("backend registry mutex poisoned")
        .get(&(handle as u64))
        .cloned();
    if pending.is_none() {
        log::error!("received Android location callback for unknown handle {handle}");
    }
    pending
}

#[allow(clippy::cast_sign_loss)]
fn sample(latitude: jdouble, longitude: jdouble, time: jlong) -> LocationSample {
    LocationSample::at(latitude, longitude, time as u64)
}

#[allow(clippy::cast_sign_loss, clippy::too_many_arguments)]
extern "system" fn native_last_location(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    token: jlong,
    found: jboolean,
    latitude: jdouble,
    longitude: jdouble,
    time: jlong,
) {
    let Some(pending) = pending_for(handle) else {
        return;
    };
    let reply = pending
        .last_location
        .lock()
        .expect("pending mutex poisoned")
        .remove(&(token as u64));

    if let Some(reply) = reply {
        let result = (found != 0).then(|| sample(latitude, longitude, time));
        let _ = reply.send(Ok(result));
    }
}

#[allow(clippy::cast_sign_loss)]
extern "system" fn native_last_location_failed(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    token: jlong,
    message: JString<'_>,
) {
    let message = match env.get_string(&message) {
        Ok(value) => value.into(),
        Err(err) => err.to_string(),
    };

    let Some(pending) = pending_for(handle) else {
        return;
    };
    let reply = pending
        .last_location
        .lock()
        .expect("pending mutex poisoned")
        .remove(&(token as u64));

    if let Some(reply) = reply {
        let _ = reply.send(Err(LocationError::Platform { message }));
    }
}

#[allow(clippy::cast_sign_loss)]
extern "system" fn native_settings_result(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    token: jlong,
    outcome: jint,
) {
    let Some(pending) = pending_for(handle) else {
        return;
    };
    let reply = pending
        .settings
        .lock()
        .expect("pending mutex poisoned")
        .remove(&(token as u64));

    if let Some(reply) = reply {
        let outcome = match outcome {
            OUTCOME_SATISFIED => SettingsOutcome::Satisfied,
            OUTCOME_RESOLVABLE => SettingsOutcome::ResolvableViaPrompt,
            _ => SettingsOutcome::UnresolvableError,
        };
        let _ = reply.send(outcome);
    }
}

#[allow(clippy::cast_sign_loss)]
extern "system" fn native_location_update(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    id: jlong,
    latitude: jdouble,
    longitude: jdouble,
    time: jlong,
) {
    let Some(pending) = pending_for(handle) else {
        return;
    };
    let sink = pending
        .streams
        .lock()
        .expect("pending mutex poisoned")
        .get(&(id as u64))
        .cloned();

    if let Some(sink) = sink {
        if let Err(err) = sink.try_send(sample(latitude, longitude, time)) {
            log::warn!("dropping location update: {err}");
        }
    }
}
