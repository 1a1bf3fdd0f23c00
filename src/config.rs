//! Bridge configuration.
//!
//! The JVM itself takes no options and the JNI version is pinned; what can be
//! configured is where `libjvm` comes from and what happens to Java exceptions
//! left pending by a native call.

use std::path::PathBuf;

/// Environment variable selecting the [`ExceptionPolicy`] in [`BridgeConfig::from_env`].
pub const EXCEPTIONS_ENV: &str = "JVM_BRIDGE_EXCEPTIONS";

/// What to do with a Java exception pending after a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionPolicy {
    /// Capture and clear the exception, then fail the call with
    /// [`Error::JavaException`](crate::Error::JavaException).
    #[default]
    Propagate,
    /// Leave the exception pending; the caller queries and clears it.
    Leave,
}

impl ExceptionPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "propagate" => Some(ExceptionPolicy::Propagate),
            "leave" => Some(ExceptionPolicy::Leave),
            _ => None,
        }
    }
}

/// Where to load `libjvm` from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LibjvmSource {
    /// `JVM_LIB_PATH`, then `JAVA_HOME`.
    #[default]
    Auto,
    /// An explicit path to the shared library.
    Path(PathBuf),
    /// A JDK/JRE installation to probe.
    JavaHome(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub exception_policy: ExceptionPolicy,
    pub libjvm: LibjvmSource,
}

impl BridgeConfig {
    /// Build a config from the process environment.
    ///
    /// Unrecognized `JVM_BRIDGE_EXCEPTIONS` values fall back to the default
    /// policy with a warning.
    pub fn from_env() -> Self {
        let mut config = BridgeConfig::default();
        if let Ok(raw) = std::env::var(EXCEPTIONS_ENV) {
            match ExceptionPolicy::parse(&raw) {
                Some(policy) => config.exception_policy = policy,
                None => tracing::warn!(value = %raw, "ignoring unknown {EXCEPTIONS_ENV}"),
            }
        }
        config
    }

    pub fn with_exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.exception_policy = policy;
        self
    }

    pub fn with_libjvm(mut self, source: LibjvmSource) -> Self {
        self.libjvm = source;
        self
    }
}
