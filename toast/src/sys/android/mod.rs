//! Android toast implementation using JNI.

use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::{JNIEnv, JavaVM};
use std::fmt;
use std::sync::OnceLock;

use crate::{Presenter, ToastDuration};

/// Embedded DEX bytecode containing the `ToastHelper` class.
static DEX_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/classes.dex"));

/// Cached class loader for the embedded DEX.
static CLASS_LOADER: OnceLock<GlobalRef> = OnceLock::new();

/// Initialize the DEX class loader. Must be called with a valid Context.
///
/// # Errors
/// Returns a description of the failing JNI call.
pub fn init_with_context(env: &mut JNIEnv, context: &JObject) -> Result<(), String> {
    if CLASS_LOADER.get().is_some() {
        return Ok(());
    }

    // Write DEX to cache directory
    let cache_dir = env
        .call_method(context, "getCacheDir", "()Ljava/io/File;", &[])
        .map_err(|e| format!("getCacheDir failed: {e}"))?
        .l()
        .map_err(|e| format!("getCacheDir result: {e}"))?;

    let cache_path = env
        .call_method(&cache_dir, "getAbsolutePath", "()Ljava/lang/String;", &[])
        .map_err(|e| format!("getAbsolutePath failed: {e}"))?
        .l()
        .map_err(|e| format!("getAbsolutePath result: {e}"))?;

    let dex_path = format!(
        "{}/locator_toast.dex",
        env.get_string((&cache_path).into())
            .map_err(|e| format!("get_string failed: {e}"))?
            .to_str()
            .map_err(|e| format!("to_str failed: {e}"))?
    );

    std::fs::write(&dex_path, DEX_BYTES).map_err(|e| format!("write DEX failed: {e}"))?;

    let dex_path_jstring = env
        .new_string(&dex_path)
        .map_err(|e| format!("new_string failed: {e}"))?;

    let parent_loader = env
        .call_method(context, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .map_err(|e| format!("getClassLoader failed: {e}"))?
        .l()
        .map_err(|e| format!("getClassLoader result: {e}"))?;

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
        .map_err(|e| format!("new DexClassLoader: {e}"))?;

    let global_ref = env
        .new_global_ref(class_loader)
        .map_err(|e| format!("new_global_ref: {e}"))?;

    let _ = CLASS_LOADER.set(global_ref);
    Ok(())
}

/// Shows a toast through `context`. Safe to call from any thread.
///
/// # Errors
/// Returns a description of the failing JNI call.
pub fn show_toast_with_context(
    env: &mut JNIEnv,
    context: &JObject,
    message: &str,
    duration: ToastDuration,
) -> Result<(), String> {
    init_with_context(env, context)?;

    let class_loader = CLASS_LOADER.get().ok_or("Class loader not initialized")?;

    let helper_class_name = env
        .new_string("locator.toast.ToastHelper")
        .map_err(|e| format!("new_string: {e}"))?;

    let helper_class = env
        .call_method(
            class_loader.as_obj(),
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&helper_class_name)],
        )
        .map_err(|e| format!("loadClass: {e}"))?
        .l()
        .map_err(|e| format!("loadClass result: {e}"))?;

    let helper_jclass: JClass = helper_class.into();

    let jmessage = env
        .new_string(message)
        .map_err(|e| format!("new_string: {e}"))?;

    env.call_static_method(
        helper_jclass,
        "showToast",
        "(Landroid/content/Context;Ljava/lang/String;I)V",
        &[
            JValue::Object(context),
            JValue::Object(&jmessage),
            JValue::Int(duration.android_code()),
        ],
    )
    .map_err(|e| format!("showToast call failed: {e}"))?;

    Ok(())
}

/// Presenter bound to an Android context.
pub struct AndroidPresenter {
    vm: JavaVM,
    context: GlobalRef,
}

impl fmt::Debug for AndroidPresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidPresenter").finish_non_exhaustive()
    }
}

impl AndroidPresenter {
    /// Creates a presenter for `context`.
    ///
    /// # Errors
    /// Returns a description of the failing JNI call.
    pub fn new(env: &mut JNIEnv, context: &JObject) -> Result<Self, String> {
        init_with_context(env, context)?;
        Ok(Self {
            vm: env.get_java_vm().map_err(|e| format!("get_java_vm: {e}"))?,
            context: env
                .new_global_ref(context)
                .map_err(|e| format!("new_global_ref: {e}"))?,
        })
    }
}

impl Presenter for AndroidPresenter {
    fn show(&self, message: &str, duration: ToastDuration) {
        let shown = self
            .vm
            .attach_current_thread()
            .map_err(|e| format!("attach_current_thread: {e}"))
            .and_then(|mut env| {
                show_toast_with_context(&mut env, self.context.as_obj(), message, duration)
            });

        if let Err(err) = shown {
            log::warn!("failed to show toast {message:?}: {err}");
        }
    }
}
