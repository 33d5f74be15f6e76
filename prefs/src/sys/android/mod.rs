//! Android preferences backed by `SharedPreferences` through raw JNI.

use std::fmt;

use jni::objects::{GlobalRef, JObject, JValue};
use jni::{JNIEnv, JavaVM};

use crate::{PreferenceError, PreferenceResult, PreferenceStore};

/// `Context.MODE_PRIVATE`.
const MODE_PRIVATE: i32 = 0;

#[allow(clippy::needless_pass_by_value)]
fn map_jni_error(err: jni::errors::Error) -> PreferenceError {
    PreferenceError::Platform(err.to_string())
}

/// The application's default `SharedPreferences` file.
pub struct SharedPreferences {
    vm: JavaVM,
    prefs: GlobalRef,
}

impl fmt::Debug for SharedPreferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPreferences").finish_non_exhaustive()
    }
}

impl SharedPreferences {
    /// Opens `<package>_preferences`, the file `PreferenceManager` uses by default.
    ///
    /// # Errors
    /// Returns an error if the preferences could not be opened.
    pub fn default_for(env: &mut JNIEnv, context: &JObject) -> PreferenceResult<Self> {
        let package = env
            .call_method(context, "getPackageName", "()Ljava/lang/String;", &[])
            .and_then(|v| v.l())
            .map_err(map_jni_error)?;
        let package: String = env
            .get_string((&package).into())
            .map_err(map_jni_error)?
            .into();

        Self::named(env, context, &format!("{package}_preferences"))
    }

    /// Opens the preferences file `name`.
    ///
    /// # Errors
    /// Returns an error if the preferences could not be opened.
    pub fn named(env: &mut JNIEnv, context: &JObject, name: &str) -> PreferenceResult<Self> {
        let name = env.new_string(name).map_err(map_jni_error)?;

        // context.getSharedPreferences(name, Context.MODE_PRIVATE)
        let prefs = env
            .call_method(
                context,
                "getSharedPreferences",
                "(Ljava/lang/String;I)Landroid/content/SharedPreferences;",
                &[JValue::Object(&name), JValue::Int(MODE_PRIVATE)],
            )
            .and_then(|v| v.l())
            .map_err(map_jni_error)?;

        Ok(Self {
            vm: env.get_java_vm().map_err(map_jni_error)?,
            prefs: env.new_global_ref(prefs).map_err(map_jni_error)?,
        })
    }

    fn with_env<T>(
        &self,
        action: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<T>,
    ) -> PreferenceResult<T> {
        let mut env = self.vm.attach_current_thread().map_err(map_jni_error)?;
        action(&mut env, self.prefs.as_obj()).map_err(map_jni_error)
    }
}

impl PreferenceStore for SharedPreferences {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        let result = self.with_env(|env, prefs| {
            let key = env.new_string(key)?;
            env.call_method(
                prefs,
                "getBoolean",
                "(Ljava/lang/String;Z)Z",
                &[JValue::Object(&key), JValue::Bool(u8::from(default))],
            )?
            .z()
        });

        result.unwrap_or_else(|err| {
            log::error!("failed to read preference {key}: {err}");
            default
        })
    }

    fn set_bool(&self, key: &str, value: bool) -> PreferenceResult<()> {
        let committed = self.with_env(|env, prefs| {
            // editor = prefs.edit()
            let editor = env
                .call_method(
                    prefs,
                    "edit",
                    "()Landroid/content/SharedPreferences$Editor;",
                    &[],
                )?
                .l()?;

            let key = env.new_string(key)?;
            env.call_method(
                &editor,
                "putBoolean",
                "(Ljava/lang/String;Z)Landroid/content/SharedPreferences$Editor;",
                &[JValue::Object(&key), JValue::Bool(u8::from(value))],
            )?;

            // commit() rather than apply(): the write must land before we return
            env.call_method(&editor, "commit", "()Z", &[])?.z()
        })?;

        if committed {
            Ok(())
        } else {
            Err(PreferenceError::Platform(format!(
                "SharedPreferences refused to commit {key}"
            )))
        }
    }
}
