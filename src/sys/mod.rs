//! Raw FFI bindings.
//!
//! Only the parts of the JNI ABI the bridge actually calls are named; the
//! rest of each function table is opaque padding so that slot offsets still
//! match the JDK headers.

pub mod jni;

#[cfg(test)]
pub(crate) mod fake;
