//! Dynamic values of the script runtime.

use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::handle::{Handle, HandleKind};
use crate::vm::VirtualMachine;

/// A dynamically-typed script value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Data(Data),
}

/// A native object owned by the script runtime.
#[derive(Clone)]
pub enum Data {
    Vm(VirtualMachine),
    Env(Rc<Env>),
    Ref(Handle),
}

impl Data {
    pub fn kind(&self) -> HandleKind {
        match self {
            Data::Vm(_) => HandleKind::Vm,
            Data::Env(_) => HandleKind::Env,
            Data::Ref(handle) => handle.kind(),
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Vm(vm) => write!(f, "JVM({:p})", vm.raw()),
            Data::Env(env) => write!(f, "JNIEnv({:p})", env.raw()),
            Data::Ref(handle) => write!(f, "{}({:p})", handle.kind(), handle.as_raw()),
        }
    }
}

impl Value {
    /// The runtime type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Data(data) => data.kind().name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&Data> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Data(Data::Ref(handle)) => Some(handle),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Handle> for Value {
    fn from(value: Handle) -> Self {
        Value::Data(Data::Ref(value))
    }
}

impl From<VirtualMachine> for Value {
    fn from(value: VirtualMachine) -> Self {
        Value::Data(Data::Vm(value))
    }
}

impl From<Env> for Value {
    fn from(value: Env) -> Self {
        Value::Data(Data::Env(Rc::new(value)))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}
