//! Class registration and method dispatch for the `JNI` script module.
//!
//! The module mirrors the native types one class per handle kind:
//!
//! | Class | Kind | Superclass |
//! |-------|------|------------|
//! | `JNI::VirtualMachine` | VM | |
//! | `JNI::Env` | Env | |
//! | `JNI::JObject` | Object | |
//! | `JNI::JClass` | Class | `JObject` |
//! | `JNI::JString` | String | `JObject` |
//! | `JNI::JMethodID` | MethodID | |
//! | `JNI::JFieldID` | FieldID | |
//!
//! Native failures surface as `JNIError`; tag and kind mismatches as
//! `TypeError`.

use std::fmt;

use crate::config::BridgeConfig;
use crate::env::Env;
use crate::error::Error;
use crate::handle::{Handle, HandleKind};
use crate::marshal;
use crate::vm::{JvmLibrary, VirtualMachine};

use super::{Data, Value};

pub const MODULE_NAME: &str = "JNI";
pub const ERROR_CLASS: &str = "JNIError";

/// An error raised into the script runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct ScriptError {
    pub class: &'static str,
    pub message: String,
}

impl ScriptError {
    fn new(class: &'static str, message: impl Into<String>) -> Self {
        ScriptError { class, message: message.into() }
    }

    fn type_error(expected: &str, found: &Value) -> Self {
        ScriptError::new(
            "TypeError",
            format!("wrong argument type {} (expected {expected})", found.type_name()),
        )
    }
}

impl From<Error> for ScriptError {
    fn from(err: Error) -> Self {
        let class = if err.is_type_error() { "TypeError" } else { ERROR_CLASS };
        ScriptError::new(class, err.to_string())
    }
}

type Result<T> = std::result::Result<T, ScriptError>;

/// A native method: `(bridge, receiver, arguments) -> value`.
pub type NativeFn = fn(&Bridge, &Value, &[Value]) -> Result<Value>;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Req(usize),
    /// At least this many, then any number of extra arguments.
    ReqRest(usize),
}

impl Arity {
    fn check(self, given: usize) -> Result<()> {
        let ok = match self {
            Arity::None => given == 0,
            Arity::Req(n) => given == n,
            Arity::ReqRest(n) => given >= n,
        };
        if ok {
            return Ok(());
        }
        Err(ScriptError::new(
            "ArgumentError",
            format!("wrong number of arguments (given {given}, expected {self})"),
        ))
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => f.write_str("0"),
            Arity::Req(n) => write!(f, "{n}"),
            Arity::ReqRest(n) => write!(f, "{n}+"),
        }
    }
}

#[derive(Clone)]
pub struct MethodDef {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: &'static str,
    pub superclass: Option<&'static str>,
    pub kind: HandleKind,
    methods: Vec<MethodDef>,
}

impl ClassDef {
    fn new(name: &'static str, superclass: Option<&'static str>, kind: HandleKind) -> Self {
        ClassDef { name, superclass, kind, methods: Vec::new() }
    }

    fn define_method(&mut self, name: &'static str, arity: Arity, func: NativeFn) -> &mut Self {
        self.methods.push(MethodDef { name, arity, func });
        self
    }

    /// `JNI::<name>`.
    pub fn qualified_name(&self) -> String {
        format!("{MODULE_NAME}::{}", self.name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter()
    }

    fn own_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// The `JNI` module as registered into a script runtime.
pub struct Bridge {
    config: BridgeConfig,
    library: Option<&'static JvmLibrary>,
    classes: Vec<ClassDef>,
}

impl Bridge {
    /// Register the module; VMs come from the system `libjvm`.
    pub fn new(config: BridgeConfig) -> Self {
        let mut bridge = Bridge { config, library: None, classes: Vec::new() };
        bridge.register();
        bridge
    }

    /// Register the module with VMs created from a specific library.
    pub fn with_library(config: BridgeConfig, library: &'static JvmLibrary) -> Self {
        let mut bridge = Bridge { config, library: Some(library), classes: Vec::new() };
        bridge.register();
        bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn define_class(
        &mut self,
        name: &'static str,
        superclass: Option<&'static str>,
        kind: HandleKind,
    ) -> &mut ClassDef {
        self.classes.push(ClassDef::new(name, superclass, kind));
        let last = self.classes.len() - 1;
        &mut self.classes[last]
    }

    fn register(&mut self) {
        self.define_class("VirtualMachine", None, HandleKind::Vm)
            .define_method("env", Arity::None, vm_env)
            .define_method("attach", Arity::None, vm_attach)
            .define_method("detach", Arity::None, vm_detach)
            .define_method("destroy", Arity::None, vm_destroy)
            .define_method("destroyed?", Arity::None, vm_destroyed_p);

        self.define_class("Env", None, HandleKind::Env)
            .define_method("find_class", Arity::Req(1), env_find_class)
            .define_method("static_field_id", Arity::Req(3), env_static_field_id)
            .define_method("static_object_field", Arity::Req(2), env_static_object_field)
            .define_method("object_class", Arity::Req(1), env_object_class)
            .define_method("method_id", Arity::Req(3), env_method_id)
            .define_method("static_method_id", Arity::Req(3), env_static_method_id)
            .define_method("new_string_utf", Arity::Req(1), env_new_string_utf)
            .define_method("string_utf", Arity::Req(1), env_string_utf)
            .define_method("call_void_method", Arity::ReqRest(2), env_call_void_method)
            .define_method("call_float_method", Arity::ReqRest(2), env_call_float_method)
            .define_method(
                "call_static_float_method",
                Arity::ReqRest(2),
                env_call_static_float_method,
            )
            .define_method("version", Arity::None, env_version)
            .define_method("same_object?", Arity::Req(2), env_same_object_p)
            .define_method("delete_local_ref", Arity::Req(1), env_delete_local_ref)
            .define_method("exception_check", Arity::None, env_exception_check)
            .define_method("exception_clear", Arity::None, env_exception_clear)
            .define_method("exception_describe", Arity::None, env_exception_describe)
            .define_method("last_exception", Arity::None, env_last_exception);

        self.define_class("JObject", None, HandleKind::Object)
            .define_method("released?", Arity::None, jobject_released_p)
            .define_method("kind", Arity::None, jobject_kind);
        self.define_class("JClass", Some("JObject"), HandleKind::Class);
        self.define_class("JString", Some("JObject"), HandleKind::String);
        self.define_class("JMethodID", None, HandleKind::MethodId);
        self.define_class("JFieldID", None, HandleKind::FieldId);
    }

    /// Look up a class by bare (`Env`) or qualified (`JNI::Env`) name.
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        let bare = name
            .strip_prefix(MODULE_NAME)
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(name);
        self.classes.iter().find(|c| c.name == bare)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }

    /// The class of a value, if it is one of this module's objects.
    pub fn class_of(&self, value: &Value) -> Option<&ClassDef> {
        let kind = value.as_data()?.kind();
        self.classes.iter().find(|c| c.kind == kind)
    }

    /// Whether `value` is an instance of `class` or one of its subclasses.
    pub fn is_a(&self, value: &Value, class: &str) -> bool {
        let Some(target) = self.class(class) else {
            return false;
        };
        let mut current = self.class_of(value);
        while let Some(cls) = current {
            if cls.name == target.name {
                return true;
            }
            current = cls.superclass.and_then(|s| self.class(s));
        }
        false
    }

    fn resolve<'a>(&'a self, class: &'a ClassDef, method: &str) -> Option<&'a MethodDef> {
        let mut current = Some(class);
        while let Some(cls) = current {
            if let Some(m) = cls.own_method(method) {
                return Some(m);
            }
            current = cls.superclass.and_then(|s| self.class(s));
        }
        None
    }

    /// `<Class>.new(*args)`. Only `VirtualMachine` can be constructed; every
    /// other object comes out of the VM.
    pub fn instantiate(&self, class: &str, args: &[Value]) -> Result<Value> {
        let def = self.class(class).ok_or_else(|| {
            ScriptError::new("NameError", format!("uninitialized constant {class}"))
        })?;
        if def.kind != HandleKind::Vm {
            return Err(ScriptError::new(
                "NoMethodError",
                format!("undefined method 'new' for {}", def.qualified_name()),
            ));
        }
        Arity::None.check(args.len())?;
        let library = match self.library {
            Some(lib) => lib,
            None => JvmLibrary::system(&self.config.libjvm)?,
        };
        Ok(library.create_vm(&self.config)?.into())
    }

    /// Dispatch `receiver.method(*args)`.
    pub fn call(&self, receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
        let no_method = || {
            let owner = self
                .class_of(receiver)
                .map(ClassDef::qualified_name)
                .unwrap_or_else(|| receiver.type_name().to_string());
            ScriptError::new("NoMethodError", format!("undefined method '{method}' for {owner}"))
        };
        let class = self.class_of(receiver).ok_or_else(no_method)?;
        let def = self.resolve(class, method).ok_or_else(no_method)?;
        def.arity.check(args.len())?;
        (def.func)(self, receiver, args)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("classes", &self.classes.iter().map(|c| c.name).collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Argument extraction
// =============================================================================

fn recv_vm(recv: &Value) -> Result<&VirtualMachine> {
    match recv {
        Value::Data(Data::Vm(vm)) => Ok(vm),
        other => Err(ScriptError::type_error("JNI::VirtualMachine", other)),
    }
}

fn recv_env(recv: &Value) -> Result<&Env> {
    match recv {
        Value::Data(Data::Env(env)) => Ok(env),
        other => Err(ScriptError::type_error("JNI::Env", other)),
    }
}

fn recv_handle(recv: &Value) -> Result<&Handle> {
    recv.as_handle().ok_or_else(|| ScriptError::type_error("JNI::JObject", recv))
}

fn arg_str(args: &[Value], i: usize) -> Result<&str> {
    args[i].as_str().ok_or_else(|| ScriptError::type_error("String", &args[i]))
}

fn arg_handle(args: &[Value], i: usize, expected: HandleKind) -> Result<&Handle> {
    match &args[i] {
        Value::Data(Data::Ref(handle)) => Ok(handle),
        Value::Data(data) => Err(Error::TypeMismatch {
            expected: expected.name(),
            found: data.kind().name(),
        }
        .into()),
        other => Err(ScriptError::type_error(expected.name(), other)),
    }
}

// =============================================================================
// JNI::VirtualMachine
// =============================================================================

fn vm_env(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_vm(recv)?.environment()?.into())
}

fn vm_attach(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_vm(recv)?.attach_current_thread()?.into())
}

fn vm_detach(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    recv_vm(recv)?.detach_current_thread()?;
    Ok(Value::Nil)
}

fn vm_destroy(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    recv_vm(recv)?.destroy()?;
    Ok(Value::Nil)
}

fn vm_destroyed_p(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_vm(recv)?.is_destroyed().into())
}

// =============================================================================
// JNI::Env
// =============================================================================

fn env_find_class(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    Ok(env.find_class(arg_str(args, 0)?)?.into())
}

fn env_static_field_id(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let cls = arg_handle(args, 0, HandleKind::Class)?;
    Ok(env.static_field_id(cls, arg_str(args, 1)?, arg_str(args, 2)?)?.into())
}

fn env_static_object_field(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let cls = arg_handle(args, 0, HandleKind::Class)?;
    let field = arg_handle(args, 1, HandleKind::FieldId)?;
    Ok(env.static_object_field(cls, field)?.into())
}

fn env_object_class(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    Ok(env.object_class(arg_handle(args, 0, HandleKind::Object)?)?.into())
}

fn env_method_id(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let cls = arg_handle(args, 0, HandleKind::Class)?;
    Ok(env.method_id(cls, arg_str(args, 1)?, arg_str(args, 2)?)?.into())
}

fn env_static_method_id(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let cls = arg_handle(args, 0, HandleKind::Class)?;
    Ok(env.static_method_id(cls, arg_str(args, 1)?, arg_str(args, 2)?)?.into())
}

fn env_new_string_utf(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    Ok(env.new_string_utf(arg_str(args, 0)?)?.into())
}

fn env_string_utf(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    Ok(env.string_utf(arg_handle(args, 0, HandleKind::String)?)?.into())
}

fn env_call_void_method(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let obj = arg_handle(args, 0, HandleKind::Object)?;
    let method = arg_handle(args, 1, HandleKind::MethodId)?;
    env.call_void_method(obj, method, &args[2..])?;
    Ok(Value::Nil)
}

fn env_call_float_method(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let obj = arg_handle(args, 0, HandleKind::Object)?;
    let method = arg_handle(args, 1, HandleKind::MethodId)?;
    Ok(marshal::float_value(env.call_float_method(obj, method, &args[2..])?))
}

fn env_call_static_float_method(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let cls = arg_handle(args, 0, HandleKind::Class)?;
    let method = arg_handle(args, 1, HandleKind::MethodId)?;
    Ok(marshal::float_value(env.call_static_float_method(cls, method, &args[2..])?))
}

fn env_version(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(recv_env(recv)?.version()?.into()))
}

fn env_same_object_p(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    let a = arg_handle(args, 0, HandleKind::Object)?;
    let b = arg_handle(args, 1, HandleKind::Object)?;
    Ok(env.is_same_object(a, b)?.into())
}

fn env_delete_local_ref(_: &Bridge, recv: &Value, args: &[Value]) -> Result<Value> {
    let env = recv_env(recv)?;
    env.delete_local_ref(arg_handle(args, 0, HandleKind::Object)?)?;
    Ok(Value::Nil)
}

fn env_exception_check(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_env(recv)?.exception_check()?.into())
}

fn env_exception_clear(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    recv_env(recv)?.exception_clear()?;
    Ok(Value::Nil)
}

fn env_exception_describe(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    recv_env(recv)?.exception_describe()?;
    Ok(Value::Nil)
}

fn env_last_exception(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_env(recv)?.last_exception().map_or(Value::Nil, Value::from))
}

// =============================================================================
// JNI::JObject
// =============================================================================

fn jobject_released_p(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_handle(recv)?.is_released().into())
}

fn jobject_kind(_: &Bridge, recv: &Value, _: &[Value]) -> Result<Value> {
    Ok(recv_handle(recv)?.kind().name().into())
}
