//! Android permission implementation using JNI.

use crate::{Permission, PermissionBackend, PermissionError, PermissionResult, PermissionStatus};
use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::sys::jint;
use jni::{JNIEnv, JavaVM};
use std::fmt;
use std::sync::OnceLock;

/// Embedded DEX bytecode containing the `PermissionHelper` class.
/// Generated at build time by kotlinc + D8.
static DEX_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/classes.dex"));

/// Cached class loader for the embedded DEX.
static CLASS_LOADER: OnceLock<GlobalRef> = OnceLock::new();

const HELPER_CLASS: &str = "locator.permission.PermissionHelper";

/// Status constants (must match Kotlin).
const STATUS_DENIED: jint = 1;
const STATUS_GRANTED: jint = 2;

fn status_from_jint(status: jint) -> PermissionStatus {
    match status {
        STATUS_GRANTED => PermissionStatus::Granted,
        STATUS_DENIED => PermissionStatus::Denied,
        _ => PermissionStatus::Unknown,
    }
}

fn platform(context: &str) -> impl FnOnce(jni::errors::Error) -> PermissionError + '_ {
    move |e| PermissionError::Platform {
        message: format!("{context}: {e}"),
    }
}

/// Initialize the DEX class loader. Must be called with a valid Activity.
///
/// # Errors
/// Returns an error if the DEX could not be written or loaded.
pub fn init_with_activity(env: &mut JNIEnv, activity: &JObject) -> PermissionResult<()> {
    if CLASS_LOADER.get().is_some() {
        return Ok(());
    }

    // Write DEX to cache directory
    let cache_dir = env
        .call_method(activity, "getCacheDir", "()Ljava/io/File;", &[])
        .and_then(|v| v.l())
        .map_err(platform("getCacheDir"))?;

    let cache_path = env
        .call_method(&cache_dir, "getAbsolutePath", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(platform("getAbsolutePath"))?;

    let cache_path_str: String = env
        .get_string((&cache_path).into())
        .map_err(platform("get_string"))?
        .into();
    let dex_path = format!("{cache_path_str}/locator_permission.dex");

    std::fs::write(&dex_path, DEX_BYTES).map_err(|e| PermissionError::Platform {
        message: format!("write DEX failed: {e}"),
    })?;

    let dex_path_jstring = env.new_string(&dex_path).map_err(platform("new_string"))?;

    let parent_loader = env
        .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .and_then(|v| v.l())
        .map_err(platform("getClassLoader"))?;

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
        .map_err(platform("new DexClassLoader"))?;

    let global_ref = env
        .new_global_ref(class_loader)
        .map_err(platform("new_global_ref"))?;

    let _ = CLASS_LOADER.set(global_ref);
    Ok(())
}

fn helper_class<'local>(env: &mut JNIEnv<'local>) -> PermissionResult<JClass<'local>> {
    let class_loader = CLASS_LOADER.get().ok_or_else(|| PermissionError::Platform {
        message: "class loader not initialized".into(),
    })?;

    let name = env.new_string(HELPER_CLASS).map_err(platform("new_string"))?;
    let class = env
        .call_method(
            class_loader.as_obj(),
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&name)],
        )
        .and_then(|v| v.l())
        .map_err(platform("loadClass"))?;

    Ok(class.into())
}

/// Permission backend bound to the screen's Activity.
pub struct AndroidPermissions {
    vm: JavaVM,
    activity: GlobalRef,
}

impl fmt::Debug for AndroidPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidPermissions").finish_non_exhaustive()
    }
}

impl AndroidPermissions {
    /// Creates a backend for `activity`, loading the helper DEX if needed.
    ///
    /// # Errors
    /// Returns an error if the helper could not be loaded.
    pub fn new(env: &mut JNIEnv, activity: &JObject) -> PermissionResult<Self> {
        init_with_activity(env, activity)?;
        Ok(Self {
            vm: env.get_java_vm().map_err(platform("get_java_vm"))?,
            activity: env.new_global_ref(activity).map_err(platform("new_global_ref"))?,
        })
    }

    fn with_helper<T>(
        &self,
        action: impl for<'local> FnOnce(
            &mut JNIEnv<'local>,
            &JClass<'local>,
            &JObject,
        ) -> PermissionResult<T>,
    ) -> PermissionResult<T> {
        let mut env = self
            .vm
            .attach_current_thread()
            .map_err(platform("attach_current_thread"))?;
        let class = helper_class(&mut env)?;
        action(&mut env, &class, self.activity.as_obj())
    }
}

impl PermissionBackend for AndroidPermissions {
    fn check(&self, permission: Permission) -> PermissionStatus {
        let result = self.with_helper(|env, class, activity| {
            let name = env
                .new_string(permission.android_name())
                .map_err(platform("new_string"))?;
            env.call_static_method(
                class,
                "checkPermission",
                "(Landroid/app/Activity;Ljava/lang/String;)I",
                &[JValue::Object(activity), JValue::Object(&name)],
            )
            .and_then(|v| v.i())
            .map_err(platform("checkPermission"))
        });

        match result {
            Ok(status) => status_from_jint(status),
            Err(err) => {
                log::error!("failed to check {permission:?}: {err}");
                PermissionStatus::Unknown
            }
        }
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        let result = self.with_helper(|env, class, activity| {
            let name = env
                .new_string(permission.android_name())
                .map_err(platform("new_string"))?;
            env.call_static_method(
                class,
                "shouldShowRationale",
                "(Landroid/app/Activity;Ljava/lang/String;)Z",
                &[JValue::Object(activity), JValue::Object(&name)],
            )
            .and_then(|v| v.z())
            .map_err(platform("shouldShowRationale"))
        });

        result.unwrap_or_else(|err| {
            log::error!("failed to query rationale for {permission:?}: {err}");
            false
        })
    }

    fn request(&self, permissions: &[Permission], request_code: i32) -> PermissionResult<()> {
        self.with_helper(|env, class, activity| {
            let length = jni::sys::jsize::try_from(permissions.len()).map_err(|e| {
                PermissionError::Platform {
                    message: format!("too many permissions: {e}"),
                }
            })?;
            let names = env
                .new_object_array(length, "java/lang/String", JObject::null())
                .map_err(platform("new_object_array"))?;
            for (index, permission) in (0..).zip(permissions) {
                let name = env
                    .new_string(permission.android_name())
                    .map_err(platform("new_string"))?;
                env.set_object_array_element(&names, index, name)
                    .map_err(platform("set_object_array_element"))?;
            }

            env.call_static_method(
                class,
                "requestPermissions",
                "(Landroid/app/Activity;[Ljava/lang/String;I)V",
                &[
                    JValue::Object(activity),
                    JValue::Object(&names),
                    JValue::Int(request_code),
                ],
            )
            .map_err(platform("requestPermissions"))?;
            Ok(())
        })
    }
}
