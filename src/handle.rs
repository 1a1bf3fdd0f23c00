//! Tagged native handles.
//!
//! Every native pointer that crosses into the script runtime is wrapped with
//! a [`HandleKind`] tag. The tag is the only type information the bridge has
//! about the pointer; it is checked before the pointer is unwrapped for a
//! native call.
//!
//! # Release policy
//!
//! Only the VM kind tears anything down when its wrapper goes away. Object,
//! class, string, field-ID and method-ID handles are leaked: dropping the
//! last clone of a [`Handle`] never calls back into the JVM. Object-kind
//! handles can be released explicitly through
//! [`Env::delete_local_ref`](crate::Env::delete_local_ref).

use std::cell::Cell;
use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};

/// The fixed set of handle kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Vm,
    Env,
    Object,
    Class,
    String,
    FieldId,
    MethodId,
}

/// What happens to the native resource when a wrapper is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Releasing the wrapper destroys the native resource.
    Teardown,
    /// Releasing the wrapper leaves the native resource alive.
    Leak,
}

impl HandleKind {
    pub const ALL: [HandleKind; 7] = [
        HandleKind::Vm,
        HandleKind::Env,
        HandleKind::Object,
        HandleKind::Class,
        HandleKind::String,
        HandleKind::FieldId,
        HandleKind::MethodId,
    ];

    /// Native type name, as reported in type errors.
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Vm => "JVM",
            HandleKind::Env => "JNIEnv",
            HandleKind::Object => "JObject",
            HandleKind::Class => "JClass",
            HandleKind::String => "JString",
            HandleKind::FieldId => "JFieldID",
            HandleKind::MethodId => "JMethodID",
        }
    }

    pub fn release_policy(self) -> ReleasePolicy {
        match self {
            HandleKind::Vm => ReleasePolicy::Teardown,
            _ => ReleasePolicy::Leak,
        }
    }

    /// Class and string references are objects too.
    pub fn is_object(self) -> bool {
        matches!(self, HandleKind::Object | HandleKind::Class | HandleKind::String)
    }

    /// Whether a handle of this kind may be passed where `expected` is required.
    pub fn satisfies(self, expected: HandleKind) -> bool {
        self == expected || (expected == HandleKind::Object && self.is_object())
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct RawHandle {
    kind: HandleKind,
    ptr: *mut c_void,
    released: Cell<bool>,
}

/// A reference, field ID or method ID returned by the JVM.
///
/// Clones share the same native pointer and the same released flag. Handles
/// are `!Send`: JNI local references are only meaningful on the thread that
/// produced them.
#[derive(Clone)]
pub struct Handle {
    raw: Rc<RawHandle>,
}

impl Handle {
    /// Wrap a non-null native pointer.
    ///
    /// VM and Env pointers are owned by [`VirtualMachine`](crate::VirtualMachine)
    /// and [`Env`](crate::Env), not by handles.
    pub(crate) fn new(kind: HandleKind, ptr: *mut c_void) -> Self {
        debug_assert!(!ptr.is_null(), "wrapping a null {kind}");
        debug_assert!(!matches!(kind, HandleKind::Vm | HandleKind::Env));
        Handle {
            raw: Rc::new(RawHandle {
                kind,
                ptr,
                released: Cell::new(false),
            }),
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.raw.kind
    }

    pub fn is_released(&self) -> bool {
        self.raw.released.get()
    }

    /// The raw pointer, without any tag check.
    pub fn as_raw(&self) -> *mut c_void {
        self.raw.ptr
    }

    /// Unwrap the pointer if this handle satisfies `expected`.
    pub fn expect(&self, expected: HandleKind) -> Result<*mut c_void> {
        if !self.kind().satisfies(expected) {
            return Err(Error::TypeMismatch {
                expected: expected.name(),
                found: self.kind().name(),
            });
        }
        if self.is_released() {
            return Err(Error::Released { kind: self.kind().name() });
        }
        Ok(self.raw.ptr)
    }

    pub(crate) fn mark_released(&self) -> Result<()> {
        if self.raw.released.replace(true) {
            return Err(Error::Released { kind: self.kind().name() });
        }
        Ok(())
    }

    /// True if both handles wrap the same pointer value.
    ///
    /// This is wrapper identity, not Java identity; use
    /// [`Env::is_same_object`](crate::Env::is_same_object) for the latter.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        self.raw.ptr == other.raw.ptr
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.kind())
            .field("ptr", &self.raw.ptr)
            .field("released", &self.is_released())
            .finish()
    }
}
