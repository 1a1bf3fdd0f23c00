//! Conversion between script values and JNI call arguments.
//!
//! Arguments go through two steps. [`classify`] maps a dynamic [`Value`] to
//! an [`ArgSlot`] without touching the VM. [`CallArgs::marshal`] then turns
//! slots into the packed `jvalue` array the `Call*MethodA` entry points take,
//! allocating a fresh Java string for every text slot.
//!
//! Only floats, text and object-kind handles are accepted. Everything else
//! is rejected up front so that no null reference reaches the JVM in place
//! of a value the caller actually supplied.

use crate::env::Env;
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleKind};
use crate::script::{Data, Value};
use crate::sys::jni;

/// A classified call argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgSlot<'a> {
    /// Narrowed to `jfloat`.
    Float(jni::jfloat),
    /// Becomes a new `java.lang.String` for this call only.
    Text(&'a str),
    /// An existing object, class or string reference.
    Object(jni::jobject),
}

/// Classify one script value.
pub fn classify(value: &Value) -> Result<ArgSlot<'_>> {
    match value {
        Value::Float(f) => Ok(ArgSlot::Float(*f as jni::jfloat)),
        Value::Str(s) => Ok(ArgSlot::Text(s)),
        // classes and strings satisfy the object kind
        Value::Data(Data::Ref(handle)) => handle.expect(HandleKind::Object).map(ArgSlot::Object),
        Value::Data(data) => Err(Error::TypeMismatch {
            expected: HandleKind::Object.name(),
            found: data.kind().name(),
        }),
        other => Err(Error::UnsupportedArgumentType { kind: other.type_name() }),
    }
}

/// A packed argument array plus the temporary strings created for it.
///
/// The temporaries are local references owned by this call; they are
/// deleted when the `CallArgs` is dropped.
pub(crate) struct CallArgs<'e> {
    env: &'e Env,
    values: Vec<jni::jvalue>,
    temporaries: Vec<jni::jobject>,
}

impl<'e> CallArgs<'e> {
    pub(crate) fn marshal(env: &'e Env, args: &[Value]) -> Result<Self> {
        let mut packed = CallArgs {
            env,
            values: Vec::with_capacity(args.len()),
            temporaries: Vec::new(),
        };
        for arg in args {
            let value = match classify(arg)? {
                ArgSlot::Float(f) => jni::jvalue { f },
                ArgSlot::Object(l) => jni::jvalue { l },
                ArgSlot::Text(text) => {
                    let l = env.new_string_raw(text)?;
                    packed.temporaries.push(l);
                    jni::jvalue { l }
                }
            };
            packed.values.push(value);
        }
        Ok(packed)
    }

    pub(crate) fn as_ptr(&self) -> *const jni::jvalue {
        if self.values.is_empty() {
            std::ptr::null()
        } else {
            self.values.as_ptr()
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

impl Drop for CallArgs<'_> {
    fn drop(&mut self) {
        for obj in self.temporaries.drain(..) {
            self.env.delete_local_raw(obj);
        }
    }
}

/// Wrap a float return value.
pub fn float_value(f: jni::jfloat) -> Value {
    Value::Float(f as f64)
}

/// Wrap a non-null native reference or ID.
pub(crate) fn wrap(kind: HandleKind, ptr: *mut std::ffi::c_void) -> Handle {
    Handle::new(kind, ptr)
}
