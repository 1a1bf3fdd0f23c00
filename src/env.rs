//! The per-thread JNI execution context.
//!
//! An [`Env`] is obtained from a [`VirtualMachine`](crate::VirtualMachine) and
//! every lookup and call goes through it. Before each native call it checks
//! that it is still on the thread that obtained it, that the thread has not
//! detached since, and that the VM has not been destroyed. Each handle
//! argument is checked for its kind tag.
//!
//! ```rust,ignore
//! use jvm_bridge::prelude::*;
//!
//! let vm = VirtualMachine::create(&BridgeConfig::from_env())?;
//! let env = vm.environment()?;
//!
//! let system = env.find_class("java/lang/System")?;
//! let out_id = env.static_field_id(&system, "out", "Ljava/io/PrintStream;")?;
//! let out = env.static_object_field(&system, &out_id)?;
//! let stream = env.object_class(&out)?;
//! let println = env.method_id(&stream, "println", "(Ljava/lang/String;)V")?;
//! env.call_void_method(&out, &println, &[Value::from("Hello World!")])?;
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::{trace, warn};

use crate::config::ExceptionPolicy;
use crate::error::{Error, Result};
use crate::handle::{Handle, HandleKind};
use crate::marshal::{self, CallArgs};
use crate::script::Value;
use crate::sys::jni;
use crate::vm::VmShared;

/// Wrapper around a `JNIEnv*` bound to the thread that obtained it.
///
/// # Thread Safety
///
/// `Env` is `!Send`. It also records the owning thread and refuses to run
/// on any other, so a pointer smuggled across threads fails with
/// [`Error::WrongThread`] instead of corrupting the VM.
pub struct Env {
    env: *mut jni::JNIEnv,
    vm: Arc<VmShared>,
    owner: ThreadId,
    attachment: u64,
    last_exception: RefCell<Option<Handle>>,
}

impl Env {
    /// # Safety
    ///
    /// `env` must be the valid `JNIEnv*` of the current thread for `vm`.
    pub(crate) unsafe fn from_raw(env: *mut jni::JNIEnv, vm: Arc<VmShared>) -> Self {
        let owner = thread::current().id();
        Env {
            env,
            attachment: vm.attachment(owner),
            vm,
            owner,
            last_exception: RefCell::new(None),
        }
    }

    /// Returns the raw JNI environment pointer.
    pub fn raw(&self) -> *mut jni::JNIEnv {
        self.env
    }

    pub fn exception_policy(&self) -> ExceptionPolicy {
        self.vm.exception_policy()
    }

    fn enter(&self) -> Result<*mut jni::JNIEnv> {
        if thread::current().id() != self.owner {
            return Err(Error::WrongThread);
        }
        if self.vm.is_destroyed() {
            return Err(Error::VmDestroyed);
        }
        if self.vm.attachment(self.owner) != self.attachment {
            return Err(Error::Detached);
        }
        Ok(self.env)
    }

    // =========================================================================
    // Exception state
    // =========================================================================

    /// Under [`ExceptionPolicy::Propagate`], move a pending exception into
    /// `last_exception` and clear it. Returns whether one was pending.
    fn take_pending(&self, op: &'static str) -> bool {
        if self.exception_policy() == ExceptionPolicy::Leave {
            return false;
        }
        unsafe {
            let vtable = *self.env;
            if ((*vtable).ExceptionCheck)(self.env) == jni::JNI_FALSE {
                return false;
            }
            let throwable = ((*vtable).ExceptionOccurred)(self.env);
            ((*vtable).ExceptionClear)(self.env);
            warn!(op, "Java exception pending after native call");
            *self.last_exception.borrow_mut() =
                (!throwable.is_null()).then(|| marshal::wrap(HandleKind::Object, throwable));
        }
        true
    }

    fn check_exception(&self, op: &'static str) -> Result<()> {
        if self.take_pending(op) {
            return Err(Error::JavaException { op });
        }
        Ok(())
    }

    /// Checks if an exception is pending.
    pub fn exception_check(&self) -> Result<bool> {
        let env = self.enter()?;
        Ok(unsafe { crate::jni_call!(env, ExceptionCheck) } != jni::JNI_FALSE)
    }

    /// Clears any pending exception.
    pub fn exception_clear(&self) -> Result<()> {
        let env = self.enter()?;
        unsafe { crate::jni_call!(env, ExceptionClear) };
        Ok(())
    }

    /// Prints the pending exception and stack trace to stderr.
    pub fn exception_describe(&self) -> Result<()> {
        let env = self.enter()?;
        unsafe { crate::jni_call!(env, ExceptionDescribe) };
        Ok(())
    }

    /// The throwable captured by the most recent [`Error::JavaException`].
    pub fn last_exception(&self) -> Option<Handle> {
        self.last_exception.borrow().clone()
    }

    // =========================================================================
    // Version
    // =========================================================================

    /// Returns the JNI version of the running VM.
    pub fn version(&self) -> Result<jni::jint> {
        let env = self.enter()?;
        Ok(unsafe { crate::jni_call!(env, GetVersion) })
    }

    // =========================================================================
    // Class, field and method lookup
    // =========================================================================

    /// Finds a class by its fully qualified name (`java/lang/String`).
    pub fn find_class(&self, name: &str) -> Result<Handle> {
        let env = self.enter()?;
        let c_name = CString::new(name)?;
        let cls = unsafe { crate::jni_call!(env, FindClass, c_name.as_ptr()) };
        if cls.is_null() {
            self.take_pending("FindClass");
            return Err(Error::ClassNotFound { name: name.to_string() });
        }
        trace!(name, "found class");
        Ok(marshal::wrap(HandleKind::Class, cls))
    }

    /// Looks up a static field of `cls` by name and type descriptor.
    pub fn static_field_id(&self, cls: &Handle, name: &str, descriptor: &str) -> Result<Handle> {
        let env = self.enter()?;
        let cls = cls.expect(HandleKind::Class)?;
        let c_name = CString::new(name)?;
        let c_sig = CString::new(descriptor)?;
        let field = unsafe {
            crate::jni_call!(env, GetStaticFieldID, cls, c_name.as_ptr(), c_sig.as_ptr())
        };
        if field.is_null() {
            self.take_pending("GetStaticFieldID");
            return Err(Error::FieldNotFound {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            });
        }
        Ok(marshal::wrap(HandleKind::FieldId, field))
    }

    /// Reads the value of an object-typed static field.
    pub fn static_object_field(&self, cls: &Handle, field: &Handle) -> Result<Handle> {
        let env = self.enter()?;
        let cls = cls.expect(HandleKind::Class)?;
        let field = field.expect(HandleKind::FieldId)?;
        let obj = unsafe { crate::jni_call!(env, GetStaticObjectField, cls, field) };
        self.check_exception("GetStaticObjectField")?;
        if obj.is_null() {
            return Err(Error::NullResult { op: "GetStaticObjectField" });
        }
        Ok(marshal::wrap(HandleKind::Object, obj))
    }

    /// Gets the runtime class of an object.
    pub fn object_class(&self, obj: &Handle) -> Result<Handle> {
        let env = self.enter()?;
        let obj = obj.expect(HandleKind::Object)?;
        let cls = unsafe { crate::jni_call!(env, GetObjectClass, obj) };
        self.check_exception("GetObjectClass")?;
        if cls.is_null() {
            return Err(Error::NullResult { op: "GetObjectClass" });
        }
        Ok(marshal::wrap(HandleKind::Class, cls))
    }

    /// Looks up an instance method.
    pub fn method_id(&self, cls: &Handle, name: &str, signature: &str) -> Result<Handle> {
        self.lookup_method(cls, name, signature, false)
    }

    /// Looks up a static method.
    pub fn static_method_id(&self, cls: &Handle, name: &str, signature: &str) -> Result<Handle> {
        self.lookup_method(cls, name, signature, true)
    }

    fn lookup_method(
        &self,
        cls: &Handle,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Result<Handle> {
        let env = self.enter()?;
        let cls = cls.expect(HandleKind::Class)?;
        let c_name = CString::new(name)?;
        let c_sig = CString::new(signature)?;
        let (op, method) = unsafe {
            if is_static {
                let m = crate::jni_call!(
                    env,
                    GetStaticMethodID,
                    cls,
                    c_name.as_ptr(),
                    c_sig.as_ptr()
                );
                ("GetStaticMethodID", m)
            } else {
                let m = crate::jni_call!(env, GetMethodID, cls, c_name.as_ptr(), c_sig.as_ptr());
                ("GetMethodID", m)
            }
        };
        if method.is_null() {
            self.take_pending(op);
            return Err(Error::MethodNotFound {
                name: name.to_string(),
                signature: signature.to_string(),
            });
        }
        trace!(name, signature, is_static, "found method");
        Ok(marshal::wrap(HandleKind::MethodId, method))
    }

    // =========================================================================
    // String Operations
    // =========================================================================

    /// `NewStringUTF` takes modified UTF-8: supplementary characters become
    /// surrogate pairs and NUL becomes `0xC0 0x80`.
    pub(crate) fn new_string_raw(&self, text: &str) -> Result<jni::jstring> {
        let env = self.enter()?;
        let c_text = CString::new(cesu8::to_java_cesu8(text).into_owned())?;
        let s = unsafe { crate::jni_call!(env, NewStringUTF, c_text.as_ptr()) };
        if s.is_null() {
            self.take_pending("NewStringUTF");
            return Err(Error::NullResult { op: "NewStringUTF" });
        }
        Ok(s)
    }

    /// Creates a new Java string from UTF-8 text.
    pub fn new_string_utf(&self, text: &str) -> Result<Handle> {
        self.new_string_raw(text)
            .map(|s| marshal::wrap(HandleKind::String, s))
    }

    /// Reads a Java string back as Rust text.
    pub fn string_utf(&self, s: &Handle) -> Result<String> {
        let env = self.enter()?;
        let s = s.expect(HandleKind::String)?;
        unsafe {
            let chars = crate::jni_call!(env, GetStringUTFChars, s, ptr::null_mut());
            if chars.is_null() {
                self.take_pending("GetStringUTFChars");
                return Err(Error::NullResult { op: "GetStringUTFChars" });
            }
            let text = cesu8::from_java_cesu8(CStr::from_ptr(chars).to_bytes())
                .map(|text| text.into_owned());
            crate::jni_call!(env, ReleaseStringUTFChars, s, chars);
            text.map_err(|_| Error::ModifiedUtf8 { op: "GetStringUTFChars" })
        }
    }

    // =========================================================================
    // Method Calls
    // =========================================================================

    /// Calls an instance method returning `void`.
    pub fn call_void_method(&self, obj: &Handle, method: &Handle, args: &[Value]) -> Result<()> {
        let env = self.enter()?;
        let obj = obj.expect(HandleKind::Object)?;
        let method = method.expect(HandleKind::MethodId)?;
        let packed = CallArgs::marshal(self, args)?;
        trace!(args = packed.len(), "CallVoidMethodA");
        unsafe { crate::jni_call!(env, CallVoidMethodA, obj, method, packed.as_ptr()) };
        drop(packed);
        self.check_exception("CallVoidMethodA")
    }

    /// Calls an instance method returning `float`.
    pub fn call_float_method(
        &self,
        obj: &Handle,
        method: &Handle,
        args: &[Value],
    ) -> Result<jni::jfloat> {
        let env = self.enter()?;
        let obj = obj.expect(HandleKind::Object)?;
        let method = method.expect(HandleKind::MethodId)?;
        let packed = CallArgs::marshal(self, args)?;
        trace!(args = packed.len(), "CallFloatMethodA");
        let result =
            unsafe { crate::jni_call!(env, CallFloatMethodA, obj, method, packed.as_ptr()) };
        drop(packed);
        self.check_exception("CallFloatMethodA")?;
        Ok(result)
    }

    /// Calls a static method returning `float`.
    pub fn call_static_float_method(
        &self,
        cls: &Handle,
        method: &Handle,
        args: &[Value],
    ) -> Result<jni::jfloat> {
        let env = self.enter()?;
        let cls = cls.expect(HandleKind::Class)?;
        let method = method.expect(HandleKind::MethodId)?;
        let packed = CallArgs::marshal(self, args)?;
        trace!(args = packed.len(), "CallStaticFloatMethodA");
        let result =
            unsafe { crate::jni_call!(env, CallStaticFloatMethodA, cls, method, packed.as_ptr()) };
        drop(packed);
        self.check_exception("CallStaticFloatMethodA")?;
        Ok(result)
    }

    // =========================================================================
    // Reference Management
    // =========================================================================

    /// Tests whether two references refer to the same Java object.
    pub fn is_same_object(&self, a: &Handle, b: &Handle) -> Result<bool> {
        let env = self.enter()?;
        let a = a.expect(HandleKind::Object)?;
        let b = b.expect(HandleKind::Object)?;
        Ok(unsafe { crate::jni_call!(env, IsSameObject, a, b) } != jni::JNI_FALSE)
    }

    /// Explicitly deletes the local reference behind an object-kind handle.
    ///
    /// Every clone of the handle is marked released and rejected afterwards.
    pub fn delete_local_ref(&self, obj: &Handle) -> Result<()> {
        let env = self.enter()?;
        let raw = obj.expect(HandleKind::Object)?;
        obj.mark_released()?;
        unsafe { crate::jni_call!(env, DeleteLocalRef, raw) };
        Ok(())
    }

    pub(crate) fn delete_local_raw(&self, obj: jni::jobject) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).DeleteLocalRef)(self.env, obj);
        }
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("env", &self.env)
            .field("owner", &self.owner)
            .finish()
    }
}
