//! An in-process stand-in for `libjvm`, used by the unit tests.
//!
//! The function tables are real `#[repr(C)]` tables filled with
//! `extern "system"` functions, so the bridge drives them through exactly the
//! same vtable calls it makes against HotSpot. Object state lives in a
//! thread-local [`World`]; each test thread gets its own.
//!
//! The world knows a handful of classes:
//!
//! - `java/lang/System` with static `out: Ljava/io/PrintStream;`
//! - `java/io/PrintStream` with `println(Ljava/lang/String;)V`, recording text
//! - `java/lang/Math` with static `abs(F)F` and `max(FF)F`
//! - `bridge/Holder` with static `INSTANCE`, static `last: Ljava/lang/Object;`
//!   (initially null), static `identity(F)F`, and instance methods
//!   `twice(F)F`, `store(Ljava/lang/Object;)V` (writes `last`) and `fail()V`
//!   (throws `java/lang/IllegalStateException`)

use std::cell::{Cell, RefCell};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::BridgeConfig;
use crate::env::Env;
use crate::sys::jni::*;
use crate::vm::{JvmLibrary, VirtualMachine};

enum Obj {
    Class(String),
    Str(CString),
    Instance(jclass),
    Throwable(jclass),
}

struct Field {
    class: jclass,
    name: &'static str,
    sig: &'static str,
    value: jobject,
}

#[derive(Clone, Copy)]
enum Body {
    Println,
    Abs,
    Max,
    Identity,
    Twice,
    Store,
    Fail,
}

struct Method {
    class: jclass,
    name: &'static str,
    sig: &'static str,
    is_static: bool,
    body: Body,
}

pub(crate) struct World {
    objects: Vec<Obj>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    pending: jthrowable,
    printed: Vec<String>,
    strings_created: usize,
    deleted_local_refs: usize,
    calls: usize,
}

fn id(index: usize) -> *mut c_void {
    ((index + 1) * 8) as *mut c_void
}

fn index(ptr: *mut c_void) -> Option<usize> {
    let raw = ptr as usize;
    (raw != 0 && raw % 8 == 0).then(|| raw / 8 - 1)
}

impl World {
    fn new() -> Self {
        let mut w = World {
            objects: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            pending: ptr::null_mut(),
            printed: Vec::new(),
            strings_created: 0,
            deleted_local_refs: 0,
            calls: 0,
        };
        for name in [
            "java/lang/Object",
            "java/lang/Class",
            "java/lang/String",
            "java/lang/NoClassDefFoundError",
            "java/lang/NoSuchFieldError",
            "java/lang/NoSuchMethodError",
            "java/lang/NullPointerException",
            "java/lang/IllegalStateException",
        ] {
            w.alloc(Obj::Class(name.to_string()));
        }
        let system = w.alloc(Obj::Class("java/lang/System".into()));
        let stream = w.alloc(Obj::Class("java/io/PrintStream".into()));
        let math = w.alloc(Obj::Class("java/lang/Math".into()));
        let holder = w.alloc(Obj::Class("bridge/Holder".into()));

        let out = w.alloc(Obj::Instance(stream));
        w.field(system, "out", "Ljava/io/PrintStream;", out);
        let instance = w.alloc(Obj::Instance(holder));
        w.field(holder, "INSTANCE", "Lbridge/Holder;", instance);
        w.field(holder, "last", "Ljava/lang/Object;", ptr::null_mut());

        w.method(stream, "println", "(Ljava/lang/String;)V", false, Body::Println);
        w.method(math, "abs", "(F)F", true, Body::Abs);
        w.method(math, "max", "(FF)F", true, Body::Max);
        w.method(holder, "identity", "(F)F", true, Body::Identity);
        w.method(holder, "twice", "(F)F", false, Body::Twice);
        w.method(holder, "store", "(Ljava/lang/Object;)V", false, Body::Store);
        w.method(holder, "fail", "()V", false, Body::Fail);
        w
    }

    fn alloc(&mut self, obj: Obj) -> jobject {
        self.objects.push(obj);
        id(self.objects.len() - 1)
    }

    fn field(&mut self, class: jclass, name: &'static str, sig: &'static str, value: jobject) {
        self.fields.push(Field { class, name, sig, value });
    }

    fn method(
        &mut self,
        class: jclass,
        name: &'static str,
        sig: &'static str,
        is_static: bool,
        body: Body,
    ) {
        self.methods.push(Method { class, name, sig, is_static, body });
    }

    fn obj(&self, ptr: jobject) -> Option<&Obj> {
        index(ptr).and_then(|i| self.objects.get(i))
    }

    fn class_named(&self, name: &str) -> Option<jclass> {
        self.objects.iter().position(|o| matches!(o, Obj::Class(n) if n == name)).map(id)
    }

    fn throw(&mut self, class: &str) {
        let cls = self.class_named(class).unwrap_or(ptr::null_mut());
        self.pending = self.alloc(Obj::Throwable(cls));
    }

    fn class_of(&self, obj: jobject) -> jclass {
        match self.obj(obj) {
            Some(Obj::Instance(cls)) | Some(Obj::Throwable(cls)) => *cls,
            Some(Obj::Str(_)) => self.class_named("java/lang/String").unwrap_or(ptr::null_mut()),
            Some(Obj::Class(_)) => self.class_named("java/lang/Class").unwrap_or(ptr::null_mut()),
            None => ptr::null_mut(),
        }
    }

    fn lookup_method(&mut self, cls: jclass, name: &str, sig: &str, is_static: bool) -> jmethodID {
        let found = self.methods.iter().position(|m| {
            m.class == cls && m.name == name && m.sig == sig && m.is_static == is_static
        });
        match found {
            Some(i) => id(i),
            None => {
                self.throw("java/lang/NoSuchMethodError");
                ptr::null_mut()
            }
        }
    }

    unsafe fn invoke(&mut self, method: jmethodID, args: *const jvalue) -> jfloat {
        self.calls += 1;
        let Some(body) = index(method).and_then(|i| self.methods.get(i)).map(|m| m.body) else {
            self.throw("java/lang/NoSuchMethodError");
            return 0.0;
        };
        let arg = |i: usize| *args.add(i);
        match body {
            Body::Println => {
                let text = match self.obj(arg(0).l) {
                    Some(Obj::Str(s)) => cesu8::from_java_cesu8(s.as_bytes())
                        .ok()
                        .map(|text| text.into_owned()),
                    _ => None,
                };
                match text {
                    Some(text) => self.printed.push(text),
                    None => self.throw("java/lang/NullPointerException"),
                }
                0.0
            }
            Body::Abs => arg(0).f.abs(),
            Body::Max => arg(0).f.max(arg(1).f),
            Body::Identity => arg(0).f,
            Body::Twice => arg(0).f * 2.0,
            Body::Store => {
                let value = arg(0).l;
                if let Some(field) = self.fields.iter_mut().find(|f| f.name == "last") {
                    field.value = value;
                }
                0.0
            }
            Body::Fail => {
                self.throw("java/lang/IllegalStateException");
                0.0
            }
        }
    }

    pub(crate) fn printed(&self) -> Vec<String> {
        self.printed.clone()
    }

    /// The bytes stored for a string object, as `NewStringUTF` received them.
    pub(crate) fn string_bytes(&self, s: jobject) -> Option<Vec<u8>> {
        match self.obj(s) {
            Some(Obj::Str(text)) => Some(text.as_bytes().to_vec()),
            _ => None,
        }
    }

    /// A string object holding arbitrary bytes.
    pub(crate) fn raw_string(&mut self, bytes: &[u8]) -> jstring {
        let text = CString::new(bytes).expect("no NUL in raw string bytes");
        self.alloc(Obj::Str(text))
    }

    pub(crate) fn strings_created(&self) -> usize {
        self.strings_created
    }

    pub(crate) fn deleted_local_refs(&self) -> usize {
        self.deleted_local_refs
    }

    /// Number of `Call*MethodA` invocations that reached the fake VM.
    pub(crate) fn calls(&self) -> usize {
        self.calls
    }
}

thread_local! {
    static WORLD: RefCell<World> = RefCell::new(World::new());
    static ATTACHED: Cell<bool> = const { Cell::new(false) };
    static INIT_STATUS: Cell<jint> = const { Cell::new(JNI_OK) };
    static CREATE_STATUS: Cell<jint> = const { Cell::new(JNI_OK) };
    static LAST_INIT_ARGS: Cell<Option<(jint, jint)>> = const { Cell::new(None) };
    static DESTROYED: Cell<u32> = const { Cell::new(0) };
}

pub(crate) fn with_world<R>(f: impl FnOnce(&mut World) -> R) -> R {
    WORLD.with(|w| f(&mut w.borrow_mut()))
}

pub(crate) fn set_init_status(code: jint) {
    INIT_STATUS.with(|c| c.set(code));
}

pub(crate) fn set_create_status(code: jint) {
    CREATE_STATUS.with(|c| c.set(code));
}

/// `(version, nOptions)` as passed to the last `JNI_CreateJavaVM`.
pub(crate) fn last_init_args() -> Option<(jint, jint)> {
    LAST_INIT_ARGS.with(|c| c.get())
}

/// `DestroyJavaVM` calls made on this thread since the last VM creation.
pub(crate) fn destroyed_count() -> u32 {
    DESTROYED.with(|c| c.get())
}

/// A fresh library whose single VM has not been created yet.
pub(crate) fn library() -> &'static JvmLibrary {
    Box::leak(Box::new(unsafe { JvmLibrary::from_raw(get_default_args, create_vm) }))
}

pub(crate) fn boot() -> (VirtualMachine, Env) {
    boot_with(&BridgeConfig::default())
}

pub(crate) fn boot_with(config: &BridgeConfig) -> (VirtualMachine, Env) {
    let vm = library().create_vm(config).expect("fake VM creation");
    let env = vm.environment().expect("creating thread is attached");
    (vm, env)
}

// =============================================================================
// Function tables
// =============================================================================

struct Table<T>(T);
unsafe impl<T> Sync for Table<T> {}

const NO: Slot = ptr::null_mut();

static NATIVE: Table<JNINativeInterface_> = Table(JNINativeInterface_ {
    reserved: [NO; 4],
    GetVersion: get_version,
    _pad5: [NO; 1],
    FindClass: find_class,
    _pad7: [NO; 8],
    ExceptionOccurred: exception_occurred,
    ExceptionDescribe: exception_describe,
    ExceptionClear: exception_clear,
    _pad18: [NO; 5],
    DeleteLocalRef: delete_local_ref,
    IsSameObject: is_same_object,
    _pad25: [NO; 6],
    GetObjectClass: get_object_class,
    _pad32: [NO; 1],
    GetMethodID: get_method_id,
    _pad34: [NO; 23],
    CallFloatMethodA: call_float_method_a,
    _pad58: [NO; 5],
    CallVoidMethodA: call_void_method_a,
    _pad64: [NO; 49],
    GetStaticMethodID: get_static_method_id,
    _pad114: [NO; 23],
    CallStaticFloatMethodA: call_static_float_method_a,
    _pad138: [NO; 6],
    GetStaticFieldID: get_static_field_id,
    GetStaticObjectField: get_static_object_field,
    _pad146: [NO; 21],
    NewStringUTF: new_string_utf,
    _pad168: [NO; 1],
    GetStringUTFChars: get_string_utf_chars,
    ReleaseStringUTFChars: release_string_utf_chars,
    _pad171: [NO; 57],
    ExceptionCheck: exception_check,
    _pad229: [NO; 7],
});

static ENV: Table<JNIEnv> = Table(&NATIVE.0);

static INVOKE: Table<JNIInvokeInterface_> = Table(JNIInvokeInterface_ {
    reserved0: NO,
    reserved1: NO,
    reserved2: NO,
    DestroyJavaVM: destroy_java_vm,
    AttachCurrentThread: attach_current_thread,
    DetachCurrentThread: detach_current_thread,
    GetEnv: get_env,
    AttachCurrentThreadAsDaemon: attach_current_thread,
});

static VM: Table<JavaVM> = Table(&INVOKE.0);

fn env_ptr() -> *mut JNIEnv {
    &ENV.0 as *const JNIEnv as *mut JNIEnv
}

fn vm_ptr() -> *mut JavaVM {
    &VM.0 as *const JavaVM as *mut JavaVM
}

// =============================================================================
// Invocation API
// =============================================================================

unsafe extern "system" fn get_default_args(args: *mut JavaVMInitArgs) -> jint {
    let status = INIT_STATUS.with(|c| c.get());
    if status == JNI_OK {
        (*args).nOptions = 0;
        (*args).options = ptr::null_mut();
    }
    status
}

unsafe extern "system" fn create_vm(
    pvm: *mut *mut JavaVM,
    penv: *mut *mut JNIEnv,
    args: *mut JavaVMInitArgs,
) -> jint {
    LAST_INIT_ARGS.with(|c| c.set(Some(((*args).version, (*args).nOptions))));
    let status = CREATE_STATUS.with(|c| c.get());
    if status != JNI_OK {
        return status;
    }
    WORLD.with(|w| *w.borrow_mut() = World::new());
    DESTROYED.with(|c| c.set(0));
    ATTACHED.with(|a| a.set(true));
    *pvm = vm_ptr();
    *penv = env_ptr();
    JNI_OK
}

unsafe extern "system" fn destroy_java_vm(_vm: *mut JavaVM) -> jint {
    DESTROYED.with(|c| c.set(c.get() + 1));
    ATTACHED.with(|a| a.set(false));
    JNI_OK
}

unsafe extern "system" fn attach_current_thread(
    _vm: *mut JavaVM,
    penv: *mut *mut c_void,
    _args: *mut c_void,
) -> jint {
    ATTACHED.with(|a| a.set(true));
    *penv = env_ptr() as *mut c_void;
    JNI_OK
}

unsafe extern "system" fn detach_current_thread(_vm: *mut JavaVM) -> jint {
    ATTACHED.with(|a| a.set(false));
    JNI_OK
}

unsafe extern "system" fn get_env(_vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint {
    if !ATTACHED.with(|a| a.get()) {
        *penv = ptr::null_mut();
        return JNI_EDETACHED;
    }
    if version > JNI_VERSION_1_8 {
        return JNI_EVERSION;
    }
    *penv = env_ptr() as *mut c_void;
    JNI_OK
}

// =============================================================================
// Native interface
// =============================================================================

unsafe extern "system" fn get_version(_env: *mut JNIEnv) -> jint {
    JNI_VERSION_1_8
}

unsafe extern "system" fn find_class(_env: *mut JNIEnv, name: *const c_char) -> jclass {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    with_world(|w| match w.class_named(&name) {
        Some(cls) => cls,
        None => {
            w.throw("java/lang/NoClassDefFoundError");
            ptr::null_mut()
        }
    })
}

unsafe extern "system" fn exception_occurred(_env: *mut JNIEnv) -> jthrowable {
    with_world(|w| w.pending)
}

unsafe extern "system" fn exception_describe(_env: *mut JNIEnv) {}

unsafe extern "system" fn exception_clear(_env: *mut JNIEnv) {
    with_world(|w| w.pending = ptr::null_mut());
}

unsafe extern "system" fn exception_check(_env: *mut JNIEnv) -> jboolean {
    if with_world(|w| w.pending.is_null()) {
        JNI_FALSE
    } else {
        JNI_TRUE
    }
}

unsafe extern "system" fn delete_local_ref(_env: *mut JNIEnv, _obj: jobject) {
    with_world(|w| w.deleted_local_refs += 1);
}

unsafe extern "system" fn is_same_object(_env: *mut JNIEnv, a: jobject, b: jobject) -> jboolean {
    if a == b {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

unsafe extern "system" fn get_object_class(_env: *mut JNIEnv, obj: jobject) -> jclass {
    with_world(|w| w.class_of(obj))
}

unsafe extern "system" fn get_method_id(
    _env: *mut JNIEnv,
    cls: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    let name = CStr::from_ptr(name).to_string_lossy();
    let sig = CStr::from_ptr(sig).to_string_lossy();
    with_world(|w| w.lookup_method(cls, &name, &sig, false))
}

unsafe extern "system" fn get_static_method_id(
    _env: *mut JNIEnv,
    cls: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    let name = CStr::from_ptr(name).to_string_lossy();
    let sig = CStr::from_ptr(sig).to_string_lossy();
    with_world(|w| w.lookup_method(cls, &name, &sig, true))
}

unsafe extern "system" fn call_float_method_a(
    _env: *mut JNIEnv,
    _obj: jobject,
    method: jmethodID,
    args: *const jvalue,
) -> jfloat {
    with_world(|w| w.invoke(method, args))
}

unsafe extern "system" fn call_void_method_a(
    _env: *mut JNIEnv,
    _obj: jobject,
    method: jmethodID,
    args: *const jvalue,
) {
    with_world(|w| w.invoke(method, args));
}

unsafe extern "system" fn call_static_float_method_a(
    _env: *mut JNIEnv,
    _cls: jclass,
    method: jmethodID,
    args: *const jvalue,
) -> jfloat {
    with_world(|w| w.invoke(method, args))
}

unsafe extern "system" fn get_static_field_id(
    _env: *mut JNIEnv,
    cls: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jfieldID {
    let name = CStr::from_ptr(name).to_string_lossy();
    let sig = CStr::from_ptr(sig).to_string_lossy();
    with_world(|w| {
        match w.fields.iter().position(|f| f.class == cls && f.name == name && f.sig == sig) {
            Some(i) => id(i),
            None => {
                w.throw("java/lang/NoSuchFieldError");
                ptr::null_mut()
            }
        }
    })
}

unsafe extern "system" fn get_static_object_field(
    _env: *mut JNIEnv,
    _cls: jclass,
    field: jfieldID,
) -> jobject {
    with_world(|w| {
        index(field)
            .and_then(|i| w.fields.get(i))
            .map_or(ptr::null_mut(), |f| f.value)
    })
}

unsafe extern "system" fn new_string_utf(_env: *mut JNIEnv, utf: *const c_char) -> jstring {
    let text = CStr::from_ptr(utf).to_owned();
    with_world(|w| {
        w.strings_created += 1;
        w.alloc(Obj::Str(text))
    })
}

unsafe extern "system" fn get_string_utf_chars(
    _env: *mut JNIEnv,
    s: jstring,
    _is_copy: *mut jboolean,
) -> *const c_char {
    with_world(|w| match w.obj(s) {
        Some(Obj::Str(text)) => text.as_ptr(),
        _ => ptr::null(),
    })
}

unsafe extern "system" fn release_string_utf_chars(
    _env: *mut JNIEnv,
    _s: jstring,
    _chars: *const c_char,
) {
}
