//! # jvm-bridge
//!
//! Create a JVM inside the current process and drive it from a
//! dynamically-typed script host.
//!
//! The surface is deliberately small: VM lifecycle, class/field/method
//! lookup, string creation, and `void`/`float` method calls. Every native
//! pointer handed to the host is wrapped in a kind-tagged [`Handle`], and
//! every call checks the tags before touching the VM.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jvm_bridge::prelude::*;
//!
//! let vm = VirtualMachine::create(&BridgeConfig::from_env())?;
//! let env = vm.environment()?;
//!
//! let math = env.find_class("java/lang/Math")?;
//! let abs = env.static_method_id(&math, "abs", "(F)F")?;
//! assert_eq!(env.call_static_float_method(&math, &abs, &[Value::Float(-2.0)])?, 2.0);
//! ```
//!
//! The same calls are reachable from a script runtime through
//! [`script::Bridge`], which registers the `JNI` module and its classes:
//!
//! ```rust,ignore
//! let bridge = Bridge::new(BridgeConfig::from_env());
//! let vm = bridge.instantiate("JNI::VirtualMachine", &[])?;
//! let env = bridge.call(&vm, "env", &[])?;
//! let system = bridge.call(&env, "find_class", &["java/lang/System".into()])?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Script host                           │
//! │        Value, JNI::VirtualMachine, JNI::Env, ...        │
//! ├─────────────────────────────────────────────────────────┤
//! │              Binding layer (script module)              │
//! │   Bridge: class table, arity checks, method dispatch    │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Safe wrappers                           │
//! │   vm::VirtualMachine - create / attach / destroy        │
//! │   env::Env - lookups, strings, calls, exceptions        │
//! │   handle::Handle - kind-tagged pointers                 │
//! │   marshal - script values to jvalue arrays              │
//! ├─────────────────────────────────────────────────────────┤
//! │              Raw FFI Bindings (sys module)              │
//! │   sys::jni - JNI types, vtable, invocation API          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys::jni`] | Raw JNI types and function tables |
//! | [`vm`] | Locating `libjvm`, creating and destroying the VM |
//! | [`env`] | Per-thread environment: lookups and calls |
//! | [`handle`] | Kind tags and release policy |
//! | [`marshal`] | Argument classification and packing |
//! | [`script`] | The `JNI` module as seen by a script runtime |
//! | [`config`] | Exception policy and `libjvm` source |
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` for VM lifecycle, `trace` for
//! lookups and calls, `warn` when a Java exception is found pending. Install
//! any subscriber to see them.

pub mod config;
pub mod env;
pub mod error;
pub mod handle;
pub mod marshal;
pub mod prelude;
pub mod script;
pub mod sys;
pub mod vm;

pub use crate::sys::jni;

pub use config::{BridgeConfig, ExceptionPolicy, LibjvmSource};
pub use env::Env;
pub use error::{Error, Result};
pub use handle::{Handle, HandleKind, ReleasePolicy};
pub use script::{Bridge, ScriptError, Value};
pub use vm::{find_libjvm, JvmLibrary, VirtualMachine, DEFAULT_JNI_VERSION};
