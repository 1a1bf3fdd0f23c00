//! The script runtime side of the bridge.
//!
//! [`Value`] is the runtime's dynamic value; [`Bridge`] is the `JNI` module
//! registered into it, dispatching script method calls onto
//! [`VirtualMachine`](crate::VirtualMachine) and [`Env`](crate::Env).

mod bindings;
mod value;

pub use bindings::{
    Arity, Bridge, ClassDef, MethodDef, NativeFn, ScriptError, ERROR_CLASS, MODULE_NAME,
};
pub use value::{Data, Value};
