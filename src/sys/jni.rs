// jvm-bridge/src/sys/jni.rs
//
// JNI (Java Native Interface) ABI subset used by the bridge.
//
// The JNI interface has been stable since JDK 1.6 and newer JDKs only append
// functions at the END of the vtable, so a prefix of the table laid out with
// the same slot indices is valid against every JDK from 8 onwards.
//
// Slots the bridge never calls are declared as opaque pointer padding. The
// comment above each named slot gives its index in the JDK header.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::os::raw::c_char;

// =============================================================================
// Primitive Types
// =============================================================================

pub type jint = i32;
pub type jlong = i64;
pub type jbyte = i8;
pub type jboolean = u8;
pub type jchar = u16;
pub type jshort = i16;
pub type jfloat = f32;
pub type jdouble = f64;
pub type jsize = jint;

// =============================================================================
// Reference and ID Types (opaque pointers)
// =============================================================================

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jstring = jobject;
pub type jthrowable = jobject;

pub type jmethodID = *mut c_void;
pub type jfieldID = *mut c_void;

// =============================================================================
// jvalue Union
// =============================================================================

/// One argument slot of a `Call<Type>MethodA` argument array.
#[repr(C)]
#[derive(Copy, Clone)]
pub union jvalue {
    pub z: jboolean,
    pub b: jbyte,
    pub c: jchar,
    pub s: jshort,
    pub i: jint,
    pub j: jlong,
    pub f: jfloat,
    pub d: jdouble,
    pub l: jobject,
}

// =============================================================================
// Constants
// =============================================================================

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EDETACHED: jint = -2;
pub const JNI_EVERSION: jint = -3;
pub const JNI_ENOMEM: jint = -4;
pub const JNI_EEXIST: jint = -5;
pub const JNI_EINVAL: jint = -6;

pub const JNI_TRUE: jboolean = 1;
pub const JNI_FALSE: jboolean = 0;

pub const JNI_VERSION_1_1: jint = 0x00010001;
pub const JNI_VERSION_1_2: jint = 0x00010002;
pub const JNI_VERSION_1_4: jint = 0x00010004;
pub const JNI_VERSION_1_6: jint = 0x00010006;
pub const JNI_VERSION_1_8: jint = 0x00010008;

// =============================================================================
// JNINativeInterface_ - The JNI function table (vtable), prefix
// =============================================================================
//
// JNIEnv is a pointer to a pointer to this struct. The full table has 236
// slots (4 reserved + 232 functions); the trailing padding keeps the struct
// the same size as the JDK's.

pub type Slot = *mut c_void;

#[repr(C)]
pub struct JNINativeInterface_ {
    // 0-3
    pub reserved: [Slot; 4],

    // 4
    pub GetVersion: unsafe extern "system" fn(env: *mut JNIEnv) -> jint,

    // 5: DefineClass
    pub _pad5: [Slot; 1],

    // 6
    pub FindClass: unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass,

    // 7-14: reflection, hierarchy, Throw/ThrowNew
    pub _pad7: [Slot; 8],

    // 15-17
    pub ExceptionOccurred: unsafe extern "system" fn(env: *mut JNIEnv) -> jthrowable,
    pub ExceptionDescribe: unsafe extern "system" fn(env: *mut JNIEnv),
    pub ExceptionClear: unsafe extern "system" fn(env: *mut JNIEnv),

    // 18-22: FatalError, Push/PopLocalFrame, New/DeleteGlobalRef
    pub _pad18: [Slot; 5],

    // 23-24
    pub DeleteLocalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    pub IsSameObject:
        unsafe extern "system" fn(env: *mut JNIEnv, obj1: jobject, obj2: jobject) -> jboolean,

    // 25-30: NewLocalRef, EnsureLocalCapacity, AllocObject, NewObject*
    pub _pad25: [Slot; 6],

    // 31
    pub GetObjectClass: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jclass,

    // 32: IsInstanceOf
    pub _pad32: [Slot; 1],

    // 33
    pub GetMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,

    // 34-56: Call{Object,Boolean,Byte,Char,Short,Int,Long}Method*, CallFloatMethod/V
    pub _pad34: [Slot; 23],

    // 57
    pub CallFloatMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        obj: jobject,
        methodID: jmethodID,
        args: *const jvalue,
    ) -> jfloat,

    // 58-62: CallDoubleMethod*, CallVoidMethod/V
    pub _pad58: [Slot; 5],

    // 63
    pub CallVoidMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        obj: jobject,
        methodID: jmethodID,
        args: *const jvalue,
    ),

    // 64-112: CallNonvirtual*, GetFieldID, Get/Set<Type>Field
    pub _pad64: [Slot; 49],

    // 113
    pub GetStaticMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,

    // 114-136: CallStatic{Object..Long}Method*, CallStaticFloatMethod/V
    pub _pad114: [Slot; 23],

    // 137
    pub CallStaticFloatMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        methodID: jmethodID,
        args: *const jvalue,
    ) -> jfloat,

    // 138-143: CallStaticDoubleMethod*, CallStaticVoidMethod*
    pub _pad138: [Slot; 6],

    // 144-145
    pub GetStaticFieldID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jfieldID,
    pub GetStaticObjectField:
        unsafe extern "system" fn(env: *mut JNIEnv, clazz: jclass, fieldID: jfieldID) -> jobject,

    // 146-166: GetStatic<Prim>Field, SetStatic<Type>Field, NewString..ReleaseStringChars
    pub _pad146: [Slot; 21],

    // 167
    pub NewStringUTF: unsafe extern "system" fn(env: *mut JNIEnv, utf: *const c_char) -> jstring,

    // 168: GetStringUTFLength
    pub _pad168: [Slot; 1],

    // 169-170
    pub GetStringUTFChars: unsafe extern "system" fn(
        env: *mut JNIEnv,
        str: jstring,
        isCopy: *mut jboolean,
    ) -> *const c_char,
    pub ReleaseStringUTFChars:
        unsafe extern "system" fn(env: *mut JNIEnv, str: jstring, chars: *const c_char),

    // 171-227: arrays, natives, monitors, critical regions, weak refs
    pub _pad171: [Slot; 57],

    // 228 (JNI 1.2)
    pub ExceptionCheck: unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean,

    // 229-235: direct buffers, GetObjectRefType, GetModule, IsVirtualThread,
    // GetStringUTFLengthAsLong
    pub _pad229: [Slot; 7],
}

// =============================================================================
// JNIEnv - Pointer to the JNI function table
// =============================================================================
//
// In C JNI, JNIEnv is directly a pointer to the vtable:
//   typedef const struct JNINativeInterface_ *JNIEnv;

/// JNIEnv is directly the vtable pointer (C ABI definition)
pub type JNIEnv = *const JNINativeInterface_;

// =============================================================================
// JNIInvokeInterface_ - The JavaVM function table
// =============================================================================

#[repr(C)]
pub struct JNIInvokeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,

    pub DestroyJavaVM: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub AttachCurrentThread: unsafe extern "system" fn(
        vm: *mut JavaVM,
        penv: *mut *mut c_void,
        args: *mut c_void,
    ) -> jint,
    pub DetachCurrentThread: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub GetEnv:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint,
    pub AttachCurrentThreadAsDaemon: unsafe extern "system" fn(
        vm: *mut JavaVM,
        penv: *mut *mut c_void,
        args: *mut c_void,
    ) -> jint,
}

/// JavaVM is directly the vtable pointer (C ABI definition)
pub type JavaVM = *const JNIInvokeInterface_;

// =============================================================================
// JavaVMInitArgs and the exported invocation entry points
// =============================================================================

#[repr(C)]
pub struct JavaVMOption {
    pub optionString: *mut c_char,
    pub extraInfo: *mut c_void,
}

#[repr(C)]
pub struct JavaVMInitArgs {
    pub version: jint,
    pub nOptions: jint,
    pub options: *mut JavaVMOption,
    pub ignoreUnrecognized: jboolean,
}

/// `jint JNI_GetDefaultJavaVMInitArgs(void *args)`, exported by `libjvm`.
pub type JNI_GetDefaultJavaVMInitArgs =
    unsafe extern "system" fn(args: *mut JavaVMInitArgs) -> jint;

/// `jint JNI_CreateJavaVM(JavaVM **pvm, void **penv, void *args)`, exported by `libjvm`.
pub type JNI_CreateJavaVM = unsafe extern "system" fn(
    pvm: *mut *mut JavaVM,
    penv: *mut *mut JNIEnv,
    args: *mut JavaVMInitArgs,
) -> jint;

// =============================================================================
// Helper macros
// =============================================================================

/// Helper to call JNI functions through the vtable.
/// env_ptr: *mut JNIEnv = *mut *const JNINativeInterface_
/// Usage: jni_call!(env, FindClass, name.as_ptr())
#[macro_export]
macro_rules! jni_call {
    ($env:expr, $func:ident $(, $args:expr)*) => {{
        let env_ptr = $env;
        ((**env_ptr).$func)(env_ptr $(, $args)*)
    }};
}

/// Helper to call JavaVM functions through the vtable.
/// vm_ptr: *mut JavaVM = *mut *const JNIInvokeInterface_
#[macro_export]
macro_rules! jvm_call {
    ($vm:expr, $func:ident $(, $args:expr)*) => {{
        let vm_ptr = $vm;
        ((**vm_ptr).$func)(vm_ptr $(, $args)*)
    }};
}
