// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android Keystore backend via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Every operation runs inside the
// `AndroidKeyStore` provider; key bytes never cross into Rust.
//
// ## Tier mapping
//
//   Software       plain KeyGenParameterSpec
//   Standard       plain KeyGenParameterSpec (TEE when the device has one)
//   HighAssurance  setIsStrongBoxBacked(true)
//
// `StrongBoxUnavailableException` and `SecureKeyImportUnavailableException`
// become `HardwareUnavailable`; user-authentication exceptions become
// `AuthorizationFailed`.

#![cfg(target_os = "android")]

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use jni::JNIEnv;
use jni::objects::{JByteArray, JObject, JObjectArray, JString, JValue, JValueOwned};

use keyward_core::error::{KeywardError, Result};
use keyward_core::types::{
    AuthPolicy, HardwareTier, KeyGenSpec, KeyHandle, KeyKind, KeyPurpose, SignatureScheme,
};

use crate::traits::SecureKeyBackend;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const PROVIDER: &str = "AndroidKeyStore";

// KeyProperties.PURPOSE_*
const PURPOSE_ENCRYPT: i32 = 1;
const PURPOSE_DECRYPT: i32 = 2;
const PURPOSE_SIGN: i32 = 4;
const PURPOSE_VERIFY: i32 = 8;
const PURPOSE_WRAP_KEY: i32 = 32;

// KeyProperties.AUTH_BIOMETRIC_STRONG | AUTH_DEVICE_CREDENTIAL
const AUTH_BIOMETRIC_OR_CREDENTIAL: i32 = 1 | 2;

// Cipher modes
const ENCRYPT_MODE: i32 = 1;
const DECRYPT_MODE: i32 = 2;

// KeyProperties.SECURITY_LEVEL_* (API 31)
const SECURITY_LEVEL_TRUSTED_ENVIRONMENT: i32 = 1;
const SECURITY_LEVEL_STRONGBOX: i32 = 2;

const SPEC_BUILDER: &str = "android/security/keystore/KeyGenParameterSpec$Builder";
const BUILDER_SIG: &str = "Landroid/security/keystore/KeyGenParameterSpec$Builder;";

type Fail = fn(String) -> KeywardError;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Obtain a [`JNIEnv`] handle from the global Android context.
fn jni_env() -> Result<JNIEnv<'static>> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { jni::JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| KeywardError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    vm.attach_current_thread_permanently()
        .map_err(|e| KeywardError::Bridge(format!("failed to attach JNI thread: {e}")))
}

fn jni_err(context: &str, e: jni::errors::Error) -> KeywardError {
    KeywardError::Bridge(format!("{context}: {e}"))
}

fn is_instance(env: &mut JNIEnv<'_>, throwable: &JObject<'_>, class: &str) -> bool {
    env.is_instance_of(throwable, class).unwrap_or(false)
}

/// Turn a pending Java exception into a `KeywardError`.
///
/// Known key store exceptions map to their taxonomy variant; anything else
/// goes through `fail` with the exception's `toString()`.
fn java_failure(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error, fail: Fail) -> KeywardError {
    if !matches!(e, jni::errors::Error::JavaException) {
        return jni_err(context, e);
    }
    let throwable = match env.exception_occurred() {
        Ok(t) => t,
        Err(e) => return jni_err(context, e),
    };
    let _ = env.exception_clear();

    let message = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .and_then(|obj| env.get_string(&JString::from(obj)).map(String::from))
        .unwrap_or_else(|_| "unknown Java exception".to_owned());
    let detail = format!("{context}: {message}");

    if is_instance(env, &throwable, "android/security/keystore/StrongBoxUnavailableException")
        || is_instance(env, &throwable, "android/security/keystore/SecureKeyImportUnavailableException")
    {
        KeywardError::HardwareUnavailable(detail)
    } else if is_instance(env, &throwable, "android/security/keystore/UserNotAuthenticatedException")
        || is_instance(env, &throwable, "android/security/keystore/KeyPermanentlyInvalidatedException")
    {
        KeywardError::AuthorizationFailed(detail)
    } else if is_instance(env, &throwable, "javax/crypto/AEADBadTagException") {
        KeywardError::DecryptionFailed(detail)
    } else {
        fail(detail)
    }
}

fn call<'l>(
    env: &mut JNIEnv<'l>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
    fail: Fail,
) -> Result<JValueOwned<'l>> {
    match env.call_method(obj, name, sig, args) {
        Ok(value) => Ok(value),
        Err(e) => Err(java_failure(env, name, e, fail)),
    }
}

fn call_object<'l>(
    env: &mut JNIEnv<'l>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
    fail: Fail,
) -> Result<JObject<'l>> {
    call(env, obj, name, sig, args, fail)?
        .l()
        .map_err(|e| jni_err(name, e))
}

fn call_static_object<'l>(
    env: &mut JNIEnv<'l>,
    class: &str,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
    fail: Fail,
) -> Result<JObject<'l>> {
    match env.call_static_method(class, name, sig, args) {
        Ok(value) => value.l().map_err(|e| jni_err(name, e)),
        Err(e) => Err(java_failure(env, name, e, fail)),
    }
}

fn construct<'l>(
    env: &mut JNIEnv<'l>,
    class: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
    fail: Fail,
) -> Result<JObject<'l>> {
    match env.new_object(class, sig, args) {
        Ok(obj) => Ok(obj),
        Err(e) => Err(java_failure(env, class, e, fail)),
    }
}

fn jstring<'l>(env: &mut JNIEnv<'l>, value: &str) -> Result<JString<'l>> {
    env.new_string(value).map_err(|e| jni_err("new_string", e))
}

fn string_array<'l>(env: &mut JNIEnv<'l>, items: &[&str]) -> Result<JObjectArray<'l>> {
    let array = env
        .new_object_array(items.len() as i32, "java/lang/String", JObject::null())
        .map_err(|e| jni_err("new_object_array", e))?;
    for (i, item) in items.iter().enumerate() {
        let s = jstring(env, item)?;
        env.set_object_array_element(&array, i as i32, s)
            .map_err(|e| jni_err("set_object_array_element", e))?;
    }
    Ok(array)
}

fn byte_array<'l>(env: &mut JNIEnv<'l>, bytes: &[u8]) -> Result<JByteArray<'l>> {
    env.byte_array_from_slice(bytes)
        .map_err(|e| jni_err("byte_array_from_slice", e))
}

fn bytes_of(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Vec<u8>> {
    env.convert_byte_array(JByteArray::from(obj))
        .map_err(|e| jni_err("convert_byte_array", e))
}

/// `KeyStore.getInstance("AndroidKeyStore").load(null)`.
fn keystore<'l>(env: &mut JNIEnv<'l>) -> Result<JObject<'l>> {
    let provider = jstring(env, PROVIDER)?;
    let ks = call_static_object(
        env,
        "java/security/KeyStore",
        "getInstance",
        "(Ljava/lang/String;)Ljava/security/KeyStore;",
        &[JValue::Object(&provider)],
        KeywardError::Bridge,
    )?;
    call(
        env,
        &ks,
        "load",
        "(Ljava/security/KeyStore$LoadStoreParameter;)V",
        &[JValue::Object(&JObject::null())],
        KeywardError::Bridge,
    )?;
    Ok(ks)
}

fn stored_key<'l>(env: &mut JNIEnv<'l>, ks: &JObject<'_>, alias: &str, fail: Fail) -> Result<JObject<'l>> {
    let j_alias = jstring(env, alias)?;
    let key = call_object(
        env,
        ks,
        "getKey",
        "(Ljava/lang/String;[C)Ljava/security/Key;",
        &[JValue::Object(&j_alias), JValue::Object(&JObject::null())],
        fail,
    )?;
    if key.is_null() {
        return Err(KeywardError::KeyNotFound(alias.to_owned()));
    }
    Ok(key)
}

// ---------------------------------------------------------------------------
// Backend struct
// ---------------------------------------------------------------------------

/// Android Keystore implementation of [`SecureKeyBackend`].
///
/// Zero state on the Rust side apart from the cached API level; all keys
/// live in the `AndroidKeyStore` provider.
pub struct AndroidKeystoreBackend {
    api_level: OnceLock<u32>,
}

impl Default for AndroidKeystoreBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AndroidKeystoreBackend {
    /// Create the backend. No JNI call happens until the first operation.
    pub fn new() -> Self {
        Self {
            api_level: OnceLock::new(),
        }
    }

    fn read_api_level() -> Result<u32> {
        let mut env = jni_env()?;
        let level = env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
            .and_then(|v| v.i())
            .map_err(|e| jni_err("Build.VERSION.SDK_INT", e))?;
        Ok(u32::try_from(level).unwrap_or(0))
    }

    /// Build the `KeyGenParameterSpec` for `spec`.
    fn parameter_spec<'l>(env: &mut JNIEnv<'l>, spec: &KeyGenSpec) -> Result<JObject<'l>> {
        let fail: Fail = KeywardError::KeyGenerationFailed;
        let purposes = spec
            .authorizations
            .purposes
            .iter()
            .map(|p| match p {
                KeyPurpose::Encrypt => PURPOSE_ENCRYPT,
                KeyPurpose::Decrypt => PURPOSE_DECRYPT,
                KeyPurpose::Sign => PURPOSE_SIGN,
                KeyPurpose::Verify => PURPOSE_VERIFY,
                KeyPurpose::WrapKey => PURPOSE_WRAP_KEY,
            })
            .fold(0, |acc, bit| acc | bit);

        let alias = jstring(env, &spec.alias)?;
        let builder = construct(
            env,
            SPEC_BUILDER,
            "(Ljava/lang/String;I)V",
            &[JValue::Object(&alias), JValue::Int(purposes)],
            fail,
        )?;

        let set_strings = |env: &mut JNIEnv<'l>, method: &str, values: &[&str]| -> Result<()> {
            let array = string_array(env, values)?;
            call(
                env,
                &builder,
                method,
                &format!("([Ljava/lang/String;){BUILDER_SIG}"),
                &[JValue::Object(&array)],
                fail,
            )
            .map(|_| ())
        };

        match spec.kind {
            KeyKind::Aes256 => {
                set_strings(env, "setBlockModes", &["GCM"])?;
                set_strings(env, "setEncryptionPaddings", &["NoPadding"])?;
                // The caller supplies every IV.
                call(
                    env,
                    &builder,
                    "setRandomizedEncryptionRequired",
                    &format!("(Z){BUILDER_SIG}"),
                    &[JValue::Bool(0)],
                    fail,
                )?;
            }
            KeyKind::EcP256 => {
                set_strings(env, "setDigests", &["SHA-512", "NONE"])?;
                let curve = jstring(env, "secp256r1")?;
                let curve_spec = construct(
                    env,
                    "java/security/spec/ECGenParameterSpec",
                    "(Ljava/lang/String;)V",
                    &[JValue::Object(&curve)],
                    fail,
                )?;
                call(
                    env,
                    &builder,
                    "setAlgorithmParameterSpec",
                    &format!("(Ljava/security/spec/AlgorithmParameterSpec;){BUILDER_SIG}"),
                    &[JValue::Object(&curve_spec)],
                    fail,
                )?;
            }
            KeyKind::Rsa { .. } => {
                set_strings(env, "setBlockModes", &["ECB"])?;
                set_strings(env, "setDigests", &["SHA-256", "SHA-512"])?;
                set_strings(env, "setEncryptionPaddings", &["OAEPPadding"])?;
                set_strings(env, "setSignaturePaddings", &["PKCS1"])?;
            }
        }

        call(
            env,
            &builder,
            "setKeySize",
            &format!("(I){BUILDER_SIG}"),
            &[JValue::Int(spec.kind.key_size_bits() as i32)],
            fail,
        )?;

        match spec.auth_policy {
            AuthPolicy::None => {}
            AuthPolicy::ValidityWindow { seconds } => {
                call(
                    env,
                    &builder,
                    "setUserAuthenticationRequired",
                    &format!("(Z){BUILDER_SIG}"),
                    &[JValue::Bool(1)],
                    fail,
                )?;
                call(
                    env,
                    &builder,
                    "setUserAuthenticationValidityDurationSeconds",
                    &format!("(I){BUILDER_SIG}"),
                    &[JValue::Int(seconds as i32)],
                    fail,
                )?;
            }
            AuthPolicy::BiometricOrCredential { seconds } => {
                call(
                    env,
                    &builder,
                    "setUserAuthenticationRequired",
                    &format!("(Z){BUILDER_SIG}"),
                    &[JValue::Bool(1)],
                    fail,
                )?;
                call(
                    env,
                    &builder,
                    "setUserAuthenticationParameters",
                    &format!("(II){BUILDER_SIG}"),
                    &[JValue::Int(seconds as i32), JValue::Int(AUTH_BIOMETRIC_OR_CREDENTIAL)],
                    fail,
                )?;
            }
        }

        if spec.tier == HardwareTier::HighAssurance {
            call(
                env,
                &builder,
                "setIsStrongBoxBacked",
                &format!("(Z){BUILDER_SIG}"),
                &[JValue::Bool(1)],
                fail,
            )?;
        }

        call_object(
            env,
            &builder,
            "build",
            "()Landroid/security/keystore/KeyGenParameterSpec;",
            &[],
            fail,
        )
    }

    /// Read a `KeyInfo` for the stored key and turn it into a handle.
    fn describe(env: &mut JNIEnv<'_>, ks: &JObject<'_>, alias: &str) -> Result<KeyHandle> {
        let fail: Fail = KeywardError::Bridge;
        let key = stored_key(env, ks, alias, fail)?;
        let algorithm_obj = call_object(env, &key, "getAlgorithm", "()Ljava/lang/String;", &[], fail)?;
        let algorithm: String = env
            .get_string(&JString::from(algorithm_obj))
            .map_err(|e| jni_err("getAlgorithm", e))?
            .into();

        let provider = jstring(env, PROVIDER)?;
        let j_algorithm = jstring(env, &algorithm)?;
        let info_class = env
            .find_class("android/security/keystore/KeyInfo")
            .map_err(|e| jni_err("KeyInfo", e))?;

        let (kind, info) = if algorithm == "AES" {
            let factory = call_static_object(
                env,
                "javax/crypto/SecretKeyFactory",
                "getInstance",
                "(Ljava/lang/String;Ljava/lang/String;)Ljavax/crypto/SecretKeyFactory;",
                &[JValue::Object(&j_algorithm), JValue::Object(&provider)],
                fail,
            )?;
            let info = call_object(
                env,
                &factory,
                "getKeySpec",
                "(Ljavax/crypto/SecretKey;Ljava/lang/Class;)Ljava/security/spec/KeySpec;",
                &[JValue::Object(&key), JValue::Object(&info_class)],
                fail,
            )?;
            (KeyKind::Aes256, info)
        } else {
            let factory = call_static_object(
                env,
                "java/security/KeyFactory",
                "getInstance",
                "(Ljava/lang/String;Ljava/lang/String;)Ljava/security/KeyFactory;",
                &[JValue::Object(&j_algorithm), JValue::Object(&provider)],
                fail,
            )?;
            let info = call_object(
                env,
                &factory,
                "getKeySpec",
                "(Ljava/security/Key;Ljava/lang/Class;)Ljava/security/spec/KeySpec;",
                &[JValue::Object(&key), JValue::Object(&info_class)],
                fail,
            )?;
            let bits = call(env, &info, "getKeySize", "()I", &[], fail)?
                .i()
                .map_err(|e| jni_err("getKeySize", e))?;
            let kind = match algorithm.as_str() {
                "EC" => KeyKind::EcP256,
                "RSA" => KeyKind::Rsa { bits: bits as u32 },
                other => {
                    return Err(KeywardError::Bridge(format!(
                        "{alias} has unsupported algorithm {other}"
                    )));
                }
            };
            (kind, info)
        };

        let level = call(env, &info, "getSecurityLevel", "()I", &[], fail)?
            .i()
            .map_err(|e| jni_err("getSecurityLevel", e))?;
        let tier = match level {
            SECURITY_LEVEL_STRONGBOX => HardwareTier::HighAssurance,
            SECURITY_LEVEL_TRUSTED_ENVIRONMENT => HardwareTier::Standard,
            _ => HardwareTier::Software,
        };

        let auth_required = call(env, &info, "isUserAuthenticationRequired", "()Z", &[], fail)?
            .z()
            .map_err(|e| jni_err("isUserAuthenticationRequired", e))?;
        let auth_policy = if auth_required {
            let seconds = call(env, &info, "getUserAuthenticationValidityDurationSeconds", "()I", &[], fail)?
                .i()
                .map_err(|e| jni_err("getUserAuthenticationValidityDurationSeconds", e))?;
            let types = call(env, &info, "getUserAuthenticationType", "()I", &[], fail)?
                .i()
                .map_err(|e| jni_err("getUserAuthenticationType", e))?;
            let seconds = seconds.max(0) as u32;
            if types == AUTH_BIOMETRIC_OR_CREDENTIAL {
                AuthPolicy::BiometricOrCredential { seconds }
            } else {
                AuthPolicy::ValidityWindow { seconds }
            }
        } else {
            AuthPolicy::None
        };

        let mask = call(env, &info, "getPurposes", "()I", &[], fail)?
            .i()
            .map_err(|e| jni_err("getPurposes", e))?;
        let purposes = [
            (PURPOSE_ENCRYPT, KeyPurpose::Encrypt),
            (PURPOSE_DECRYPT, KeyPurpose::Decrypt),
            (PURPOSE_SIGN, KeyPurpose::Sign),
            (PURPOSE_VERIFY, KeyPurpose::Verify),
            (PURPOSE_WRAP_KEY, KeyPurpose::WrapKey),
        ]
        .into_iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, purpose)| purpose)
        .collect();

        let j_alias = jstring(env, alias)?;
        let date = call_object(
            env,
            ks,
            "getCreationDate",
            "(Ljava/lang/String;)Ljava/util/Date;",
            &[JValue::Object(&j_alias)],
            fail,
        )?;
        let created_at = if date.is_null() {
            Utc::now()
        } else {
            let millis = call(env, &date, "getTime", "()J", &[], fail)?
                .j()
                .map_err(|e| jni_err("getTime", e))?;
            DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
        };

        Ok(KeyHandle {
            alias: alias.to_owned(),
            kind,
            tier,
            auth_policy,
            purposes,
            created_at,
        })
    }

    fn cipher<'l>(
        env: &mut JNIEnv<'l>,
        transformation: &str,
        mode: i32,
        key: &JObject<'_>,
        params: &JObject<'_>,
        fail: Fail,
    ) -> Result<JObject<'l>> {
        let j_transformation = jstring(env, transformation)?;
        let cipher = call_static_object(
            env,
            "javax/crypto/Cipher",
            "getInstance",
            "(Ljava/lang/String;)Ljavax/crypto/Cipher;",
            &[JValue::Object(&j_transformation)],
            fail,
        )?;
        call(
            env,
            &cipher,
            "init",
            "(ILjava/security/Key;Ljava/security/spec/AlgorithmParameterSpec;)V",
            &[JValue::Int(mode), JValue::Object(key), JValue::Object(params)],
            fail,
        )?;
        Ok(cipher)
    }

    fn gcm(&self, alias: &str, mode: i32, iv: &[u8], aad: &[u8], input: &[u8], fail: Fail) -> Result<Vec<u8>> {
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let key = stored_key(&mut env, &ks, alias, fail)?;

        let j_iv = byte_array(&mut env, iv)?;
        let params = construct(
            &mut env,
            "javax/crypto/spec/GCMParameterSpec",
            "(I[B)V",
            &[JValue::Int(128), JValue::Object(&j_iv)],
            fail,
        )?;
        let cipher = Self::cipher(&mut env, "AES/GCM/NoPadding", mode, &key, &params, fail)?;

        if !aad.is_empty() {
            let j_aad = byte_array(&mut env, aad)?;
            call(&mut env, &cipher, "updateAAD", "([B)V", &[JValue::Object(&j_aad)], fail)?;
        }
        let j_input = byte_array(&mut env, input)?;
        let out = call_object(&mut env, &cipher, "doFinal", "([B)[B", &[JValue::Object(&j_input)], fail)?;
        bytes_of(&mut env, out)
    }
}

// ---------------------------------------------------------------------------
// SecureKeyBackend
// ---------------------------------------------------------------------------

impl SecureKeyBackend for AndroidKeystoreBackend {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn platform_version(&self) -> u32 {
        *self.api_level.get_or_init(|| {
            Self::read_api_level().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Android: could not read API level");
                0
            })
        })
    }

    fn entry(&self, alias: &str) -> Result<Option<KeyHandle>> {
        if !self.contains(alias)? {
            return Ok(None);
        }
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        Self::describe(&mut env, &ks, alias).map(Some)
    }

    fn contains(&self, alias: &str) -> Result<bool> {
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let j_alias = jstring(&mut env, alias)?;
        call(
            &mut env,
            &ks,
            "containsAlias",
            "(Ljava/lang/String;)Z",
            &[JValue::Object(&j_alias)],
            KeywardError::Bridge,
        )?
        .z()
        .map_err(|e| jni_err("containsAlias", e))
    }

    fn generate(&self, spec: &KeyGenSpec) -> Result<KeyHandle> {
        if self.contains(&spec.alias)? {
            return Err(KeywardError::KeyAlreadyExists(spec.alias.clone()));
        }
        let fail: Fail = KeywardError::KeyGenerationFailed;
        let mut env = jni_env()?;

        tracing::info!(alias = %spec.alias, kind = %spec.kind, tier = %spec.tier, "Android: generating key");

        let params = Self::parameter_spec(&mut env, spec)?;
        let provider = jstring(&mut env, PROVIDER)?;

        match spec.kind {
            KeyKind::Aes256 => {
                let algorithm = jstring(&mut env, "AES")?;
                let generator = call_static_object(
                    &mut env,
                    "javax/crypto/KeyGenerator",
                    "getInstance",
                    "(Ljava/lang/String;Ljava/lang/String;)Ljavax/crypto/KeyGenerator;",
                    &[JValue::Object(&algorithm), JValue::Object(&provider)],
                    fail,
                )?;
                call(
                    &mut env,
                    &generator,
                    "init",
                    "(Ljava/security/spec/AlgorithmParameterSpec;)V",
                    &[JValue::Object(&params)],
                    fail,
                )?;
                call(&mut env, &generator, "generateKey", "()Ljavax/crypto/SecretKey;", &[], fail)?;
            }
            KeyKind::EcP256 | KeyKind::Rsa { .. } => {
                let name = if spec.kind == KeyKind::EcP256 { "EC" } else { "RSA" };
                let algorithm = jstring(&mut env, name)?;
                let generator = call_static_object(
                    &mut env,
                    "java/security/KeyPairGenerator",
                    "getInstance",
                    "(Ljava/lang/String;Ljava/lang/String;)Ljava/security/KeyPairGenerator;",
                    &[JValue::Object(&algorithm), JValue::Object(&provider)],
                    fail,
                )?;
                call(
                    &mut env,
                    &generator,
                    "initialize",
                    "(Ljava/security/spec/AlgorithmParameterSpec;)V",
                    &[JValue::Object(&params)],
                    fail,
                )?;
                call(&mut env, &generator, "generateKeyPair", "()Ljava/security/KeyPair;", &[], fail)?;
            }
        }

        let ks = keystore(&mut env)?;
        let mut handle = Self::describe(&mut env, &ks, &spec.alias)?;
        // KeyInfo reports the policy as stored; keep the requested one when the
        // platform cannot express it (e.g. the authentication type below API 30).
        handle.auth_policy = spec.auth_policy;
        tracing::info!(alias = %spec.alias, tier = %handle.tier, "Android: key generated");
        Ok(handle)
    }

    fn delete(&self, alias: &str) -> Result<()> {
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let j_alias = jstring(&mut env, alias)?;
        let reason = |detail: String| KeywardError::Bridge(detail);
        match env.call_method(&ks, "deleteEntry", "(Ljava/lang/String;)V", &[JValue::Object(&j_alias)]) {
            Ok(_) => {
                tracing::info!(alias, "Android: key deleted");
                Ok(())
            }
            Err(e) => Err(KeywardError::KeyDeletionFailed {
                alias: alias.to_owned(),
                reason: java_failure(&mut env, "deleteEntry", e, reason).to_string(),
            }),
        }
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>> {
        let fail: Fail = KeywardError::Bridge;
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let j_alias = jstring(&mut env, alias)?;
        let certificate = call_object(
            &mut env,
            &ks,
            "getCertificate",
            "(Ljava/lang/String;)Ljava/security/cert/Certificate;",
            &[JValue::Object(&j_alias)],
            fail,
        )?;
        if certificate.is_null() {
            return if self.contains(alias)? {
                Err(KeywardError::OperationUnsupported(format!(
                    "{alias} is a symmetric key and has no public key"
                )))
            } else {
                Err(KeywardError::KeyNotFound(alias.to_owned()))
            };
        }
        let public = call_object(&mut env, &certificate, "getPublicKey", "()Ljava/security/PublicKey;", &[], fail)?;
        let encoded = call_object(&mut env, &public, "getEncoded", "()[B", &[], fail)?;
        bytes_of(&mut env, encoded)
    }

    fn aead_seal(&self, alias: &str, iv: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.gcm(alias, ENCRYPT_MODE, iv, aad, plaintext, KeywardError::EncryptionFailed)
    }

    fn aead_open(&self, alias: &str, iv: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>> {
        self.gcm(alias, DECRYPT_MODE, iv, aad, ciphertext_and_tag, KeywardError::DecryptionFailed)
    }

    fn rsa_decrypt(&self, alias: &str, ciphertext: &[u8], label: Option<&[u8]>) -> Result<Vec<u8>> {
        let fail: Fail = KeywardError::DecryptionFailed;
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let key = stored_key(&mut env, &ks, alias, fail)?;

        let j_label = byte_array(&mut env, label.unwrap_or_default())?;
        let source = construct(
            &mut env,
            "javax/crypto/spec/PSource$PSpecified",
            "([B)V",
            &[JValue::Object(&j_label)],
            fail,
        )?;
        let mgf1_sha1 = env
            .get_static_field(
                "java/security/spec/MGF1ParameterSpec",
                "SHA1",
                "Ljava/security/spec/MGF1ParameterSpec;",
            )
            .and_then(|v| v.l())
            .map_err(|e| jni_err("MGF1ParameterSpec.SHA1", e))?;
        let digest = jstring(&mut env, "SHA-256")?;
        let mgf = jstring(&mut env, "MGF1")?;
        let params = construct(
            &mut env,
            "javax/crypto/spec/OAEPParameterSpec",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/security/spec/AlgorithmParameterSpec;Ljavax/crypto/spec/PSource;)V",
            &[
                JValue::Object(&digest),
                JValue::Object(&mgf),
                JValue::Object(&mgf1_sha1),
                JValue::Object(&source),
            ],
            fail,
        )?;

        let cipher = Self::cipher(
            &mut env,
            "RSA/ECB/OAEPWithSHA-256AndMGF1Padding",
            DECRYPT_MODE,
            &key,
            &params,
            fail,
        )?;
        let j_input = byte_array(&mut env, ciphertext)?;
        let out = call_object(&mut env, &cipher, "doFinal", "([B)[B", &[JValue::Object(&j_input)], fail)?;
        bytes_of(&mut env, out)
    }

    fn sign(&self, alias: &str, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>> {
        let fail: Fail = KeywardError::SigningFailed;
        let algorithm = match scheme {
            SignatureScheme::EcdsaSha512 => "SHA512withECDSA",
            SignatureScheme::EcdsaRawDigest => "NONEwithECDSA",
            SignatureScheme::RsaPkcs1Sha512 => "SHA512withRSA",
        };
        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;
        let key = stored_key(&mut env, &ks, alias, fail)?;

        let j_algorithm = jstring(&mut env, algorithm)?;
        let signer = call_static_object(
            &mut env,
            "java/security/Signature",
            "getInstance",
            "(Ljava/lang/String;)Ljava/security/Signature;",
            &[JValue::Object(&j_algorithm)],
            fail,
        )?;
        call(&mut env, &signer, "initSign", "(Ljava/security/PrivateKey;)V", &[JValue::Object(&key)], fail)?;
        let j_data = byte_array(&mut env, data)?;
        call(&mut env, &signer, "update", "([B)V", &[JValue::Object(&j_data)], fail)?;
        let signature = call_object(&mut env, &signer, "sign", "()[B", &[], fail)?;
        bytes_of(&mut env, signature)
    }

    fn supports_raw_digest_signing(&self) -> bool {
        true
    }

    fn import_wrapped(&self, wrapping_alias: &str, imported_alias: &str, bundle_der: &[u8]) -> Result<KeyHandle> {
        let fail: Fail = KeywardError::ImportRejected;
        if !self.contains(wrapping_alias)? {
            return Err(KeywardError::KeyNotFound(wrapping_alias.to_owned()));
        }
        if self.contains(imported_alias)? {
            return Err(KeywardError::KeyAlreadyExists(imported_alias.to_owned()));
        }

        let mut env = jni_env()?;
        let ks = keystore(&mut env)?;

        // Unwrap parameters: the wrapping key is used with OAEP/SHA-256.
        let j_wrapping = jstring(&mut env, wrapping_alias)?;
        let builder = construct(
            &mut env,
            SPEC_BUILDER,
            "(Ljava/lang/String;I)V",
            &[JValue::Object(&j_wrapping), JValue::Int(PURPOSE_WRAP_KEY)],
            fail,
        )?;
        let digests = string_array(&mut env, &["SHA-256"])?;
        call(
            &mut env,
            &builder,
            "setDigests",
            &format!("([Ljava/lang/String;){BUILDER_SIG}"),
            &[JValue::Object(&digests)],
            fail,
        )?;
        let unwrap_spec = call_object(
            &mut env,
            &builder,
            "build",
            "()Landroid/security/keystore/KeyGenParameterSpec;",
            &[],
            fail,
        )?;

        let j_bundle = byte_array(&mut env, bundle_der)?;
        let transformation = jstring(&mut env, "RSA/ECB/OAEPPadding")?;
        let entry = construct(
            &mut env,
            "android/security/keystore/WrappedKeyEntry",
            "([BLjava/lang/String;Ljava/lang/String;Ljava/security/spec/AlgorithmParameterSpec;)V",
            &[
                JValue::Object(&j_bundle),
                JValue::Object(&j_wrapping),
                JValue::Object(&transformation),
                JValue::Object(&unwrap_spec),
            ],
            fail,
        )?;

        let j_imported = jstring(&mut env, imported_alias)?;
        call(
            &mut env,
            &ks,
            "setEntry",
            "(Ljava/lang/String;Ljava/security/KeyStore$Entry;Ljava/security/KeyStore$ProtectionParameter;)V",
            &[
                JValue::Object(&j_imported),
                JValue::Object(&entry),
                JValue::Object(&JObject::null()),
            ],
            fail,
        )?;

        tracing::info!(wrapping = wrapping_alias, imported = imported_alias, "Android: wrapped key imported");
        Self::describe(&mut env, &ks, imported_alias)
    }
}
