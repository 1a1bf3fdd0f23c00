//! Common imports for embedding a JVM.
//!
//! Covers the lifecycle, the environment, handles and script values.

pub use crate::config::{BridgeConfig, ExceptionPolicy, LibjvmSource};
pub use crate::env::Env;
pub use crate::error::{Error, Result};
pub use crate::handle::{Handle, HandleKind};
pub use crate::script::{Bridge, Value};
pub use crate::sys::jni;
pub use crate::vm::VirtualMachine;
