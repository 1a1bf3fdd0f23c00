//! Error type shared by every layer of the bridge.

use std::ffi::NulError;

use crate::sys::jni;

/// Errors returned by the bridge.
///
/// Every error is fatal to the call that produced it only; the VM, the
/// environment and all handles stay usable afterwards.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `JNI_GetDefaultJavaVMInitArgs` rejected the pinned version.
    #[error("JVM argument initialization failed: {code}")]
    Init { code: jni::jint },

    /// `JNI_CreateJavaVM` failed.
    #[error("JVM creation error: {code}")]
    Create { code: jni::jint },

    /// A VM was already created from this `libjvm`; JNI allows only one.
    #[error("a JVM has already been created in this process")]
    AlreadyCreated,

    #[error("failed to load libjvm: {0}")]
    Load(String),

    #[error("{0}")]
    Locate(String),

    /// `GetEnv` failed, typically `JNI_EDETACHED` on a thread the VM never attached.
    #[error("Can't get JNIEnv: {code}")]
    EnvLookup { code: jni::jint },

    #[error("Can't attach current thread: {code}")]
    Attach { code: jni::jint },

    #[error("Can't detach current thread: {code}")]
    Detach { code: jni::jint },

    #[error("JNIEnv used from a thread other than the one that obtained it")]
    WrongThread,

    /// The thread detached after this `JNIEnv` was obtained.
    #[error("JNIEnv used after its thread detached from the JVM")]
    Detached,

    #[error("JVM destruction error: {code}")]
    Destroy { code: jni::jint },

    #[error("the JVM has been destroyed")]
    VmDestroyed,

    /// A handle argument carries the wrong kind tag.
    #[error("wrong argument type {found} (expected {expected})")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unsupported argument type {kind} (expected Float, String or JObject)")]
    UnsupportedArgumentType { kind: &'static str },

    #[error("{kind} handle has already been released")]
    Released { kind: &'static str },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error("field not found: {name} {descriptor}")]
    FieldNotFound { name: String, descriptor: String },

    #[error("method not found: {name}{signature}")]
    MethodNotFound { name: String, signature: String },

    /// Java string bytes that are not valid modified UTF-8.
    #[error("{op} returned malformed modified UTF-8")]
    ModifiedUtf8 { op: &'static str },

    #[error("{op} returned null")]
    NullResult { op: &'static str },

    /// A Java exception was pending after the call; see `Env::last_exception`.
    #[error("Java exception thrown during {op}")]
    JavaException { op: &'static str },

    #[error("string contains a NUL byte: {0}")]
    Nul(#[from] NulError),
}

impl Error {
    /// The native status code carried by lifecycle errors, if any.
    pub fn code(&self) -> Option<jni::jint> {
        match self {
            Error::Init { code }
            | Error::Create { code }
            | Error::EnvLookup { code }
            | Error::Attach { code }
            | Error::Detach { code }
            | Error::Destroy { code } => Some(*code),
            _ => None,
        }
    }

    /// True for errors caused by a value of the wrong kind rather than by the VM.
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            Error::TypeMismatch { .. }
                | Error::UnsupportedArgumentType { .. }
                | Error::Released { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
