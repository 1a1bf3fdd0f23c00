//! Creating, attaching to and destroying the embedded JVM.
//!
//! `libjvm` is located through `JVM_LIB_PATH` or `JAVA_HOME` and loaded with
//! `libloading` once per process. JNI supports a single VM per loaded
//! library, so [`JvmLibrary::create_vm`] succeeds at most once.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use crate::config::{BridgeConfig, ExceptionPolicy, LibjvmSource};
use crate::env::Env;
use crate::error::{Error, Result};
use crate::handle::{HandleKind, ReleasePolicy};
use crate::sys::jni;

/// The JNI version every environment is requested at.
pub const DEFAULT_JNI_VERSION: jni::jint = jni::JNI_VERSION_1_6;

fn libjvm_filename() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "jvm.dll"
    }
    #[cfg(target_os = "macos")]
    {
        "libjvm.dylib"
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        "libjvm.so"
    }
}

fn candidates_from_java_home(java_home: &Path) -> Vec<PathBuf> {
    let filename = libjvm_filename();
    let arch = std::env::consts::ARCH;

    let mut rels = vec![
        format!("lib/server/{filename}"),
        format!("jre/lib/server/{filename}"),
        format!("lib/{arch}/server/{filename}"),
        format!("jre/lib/{arch}/server/{filename}"),
    ];

    if cfg!(target_os = "windows") {
        rels.push(format!("bin/server/{filename}"));
        rels.push(format!("jre/bin/server/{filename}"));
        rels.push(format!("bin/client/{filename}"));
        rels.push(format!("jre/bin/client/{filename}"));
    }

    rels.into_iter().map(|r| java_home.join(r)).collect()
}

fn find_in_java_home(java_home: &Path) -> Result<PathBuf> {
    candidates_from_java_home(java_home)
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            Error::Locate(format!(
                "Could not find {} under JAVA_HOME={}. Set JVM_LIB_PATH explicitly.",
                libjvm_filename(),
                java_home.display()
            ))
        })
}

/// Try to locate `libjvm` using `JVM_LIB_PATH` or `JAVA_HOME`.
pub fn find_libjvm() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("JVM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        return Err(Error::Locate(format!(
            "JVM_LIB_PATH is set but does not exist: {}",
            path.display()
        )));
    }

    if let Some(java_home) = std::env::var_os("JAVA_HOME") {
        return find_in_java_home(Path::new(&java_home));
    }

    Err(Error::Locate(
        "JAVA_HOME is not set. Set JAVA_HOME or JVM_LIB_PATH to locate libjvm.".to_string(),
    ))
}

fn resolve(source: &LibjvmSource) -> Result<PathBuf> {
    match source {
        LibjvmSource::Auto => find_libjvm(),
        LibjvmSource::Path(path) if path.exists() => Ok(path.clone()),
        LibjvmSource::Path(path) => Err(Error::Locate(format!(
            "libjvm path does not exist: {}",
            path.display()
        ))),
        LibjvmSource::JavaHome(home) => find_in_java_home(home),
    }
}

struct SystemLibjvm {
    source: LibjvmSource,
    library: JvmLibrary,
}

static SYSTEM_LIBJVM: OnceLock<SystemLibjvm> = OnceLock::new();

/// The invocation entry points of a `libjvm`.
pub struct JvmLibrary {
    get_default_args: jni::JNI_GetDefaultJavaVMInitArgs,
    create_vm: jni::JNI_CreateJavaVM,
    created: AtomicBool,
    _lib: Option<libloading::Library>,
}

impl JvmLibrary {
    /// Load `libjvm` from `path` and resolve its invocation entry points.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading libjvm");
        let lib = unsafe {
            libloading::Library::new(path).map_err(|e| Error::Load(e.to_string()))?
        };

        let get_default_args = unsafe {
            *lib.get::<jni::JNI_GetDefaultJavaVMInitArgs>(b"JNI_GetDefaultJavaVMInitArgs\0")
                .map_err(|e| Error::Load(e.to_string()))?
        };
        let create_vm = unsafe {
            *lib.get::<jni::JNI_CreateJavaVM>(b"JNI_CreateJavaVM\0")
                .map_err(|e| Error::Load(e.to_string()))?
        };

        Ok(JvmLibrary {
            get_default_args,
            create_vm,
            created: AtomicBool::new(false),
            _lib: Some(lib),
        })
    }

    /// Build from raw entry points, e.g. when `libjvm` is linked statically.
    ///
    /// # Safety
    /// Both function pointers must implement the JNI invocation API and stay
    /// valid for the lifetime of the process.
    pub unsafe fn from_raw(
        get_default_args: jni::JNI_GetDefaultJavaVMInitArgs,
        create_vm: jni::JNI_CreateJavaVM,
    ) -> Self {
        JvmLibrary {
            get_default_args,
            create_vm,
            created: AtomicBool::new(false),
            _lib: None,
        }
    }

    /// The process-wide library, loaded on first use.
    ///
    /// Once loaded, later calls get the same library whatever `source` they
    /// pass; a different source is logged and otherwise ignored.
    pub fn system(source: &LibjvmSource) -> Result<&'static JvmLibrary> {
        let loaded = match SYSTEM_LIBJVM.get() {
            Some(loaded) => loaded,
            None => {
                let library = JvmLibrary::load(resolve(source)?)?;
                SYSTEM_LIBJVM.get_or_init(move || SystemLibjvm {
                    source: source.clone(),
                    library,
                })
            }
        };
        if loaded.source != *source {
            warn!(
                loaded = ?loaded.source,
                requested = ?source,
                "libjvm already loaded; ignoring requested source"
            );
        }
        Ok(&loaded.library)
    }

    /// Whether a VM has been created from this library.
    pub fn has_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Create the VM with default arguments and no options.
    pub fn create_vm(&'static self, config: &BridgeConfig) -> Result<VirtualMachine> {
        if self.created.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyCreated);
        }
        let result = unsafe { self.create_vm_unchecked(config) };
        if result.is_err() {
            self.created.store(false, Ordering::Release);
        }
        result
    }

    unsafe fn create_vm_unchecked(&'static self, config: &BridgeConfig) -> Result<VirtualMachine> {
        let mut args = jni::JavaVMInitArgs {
            version: DEFAULT_JNI_VERSION,
            nOptions: 0,
            options: ptr::null_mut(),
            ignoreUnrecognized: jni::JNI_FALSE,
        };

        let ret = (self.get_default_args)(&mut args);
        if ret != jni::JNI_OK {
            return Err(Error::Init { code: ret });
        }

        // No options, whatever the defaults suggested.
        args.nOptions = 0;
        args.options = ptr::null_mut();

        let mut vm: *mut jni::JavaVM = ptr::null_mut();
        let mut env: *mut jni::JNIEnv = ptr::null_mut();
        let ret = (self.create_vm)(&mut vm, &mut env, &mut args);
        if ret != jni::JNI_OK {
            return Err(Error::Create { code: ret });
        }
        if vm.is_null() {
            return Err(Error::Create { code: jni::JNI_ERR });
        }

        debug!(vm = ?vm, "created JVM");
        Ok(VirtualMachine {
            shared: Arc::new(VmShared {
                vm,
                destroyed: AtomicBool::new(false),
                detaches: Mutex::new(HashMap::new()),
                policy: config.exception_policy,
                _library: self,
            }),
        })
    }
}

pub(crate) struct VmShared {
    vm: *mut jni::JavaVM,
    destroyed: AtomicBool,
    /// Detach count per thread. An `Env` is only valid for the count it
    /// was obtained under.
    detaches: Mutex<HashMap<ThreadId, u64>>,
    policy: ExceptionPolicy,
    _library: &'static JvmLibrary,
}

// A JavaVM* may be used from any thread.
unsafe impl Send for VmShared {}
unsafe impl Sync for VmShared {}

impl VmShared {
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn exception_policy(&self) -> ExceptionPolicy {
        self.policy
    }

    /// The attachment generation of `thread`.
    pub(crate) fn attachment(&self, thread: ThreadId) -> u64 {
        let detaches = self.detaches.lock().unwrap_or_else(|e| e.into_inner());
        detaches.get(&thread).copied().unwrap_or(0)
    }

    fn record_detach(&self, thread: ThreadId) {
        let mut detaches = self.detaches.lock().unwrap_or_else(|e| e.into_inner());
        *detaches.entry(thread).or_insert(0) += 1;
    }
}

impl Drop for VmShared {
    fn drop(&mut self) {
        if HandleKind::Vm.release_policy() != ReleasePolicy::Teardown {
            return;
        }
        if self.destroyed.swap(true, Ordering::AcqRel) || self.vm.is_null() {
            return;
        }
        let res = unsafe { crate::jvm_call!(self.vm, DestroyJavaVM) };
        debug!(code = res, "JVM torn down on release");
    }
}

/// Handle to the embedded JVM.
///
/// Clones share the same VM. Environments keep it alive; when the last
/// clone and the last environment are gone an undestroyed VM is torn down.
#[derive(Clone)]
pub struct VirtualMachine {
    shared: Arc<VmShared>,
}

impl VirtualMachine {
    /// Load the configured `libjvm` and create the process's VM.
    pub fn create(config: &BridgeConfig) -> Result<Self> {
        JvmLibrary::system(&config.libjvm)?.create_vm(config)
    }

    /// Return the raw `JavaVM*` pointer.
    pub fn raw(&self) -> *mut jni::JavaVM {
        self.shared.vm
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
    }

    fn live(&self) -> Result<*mut jni::JavaVM> {
        if self.is_destroyed() {
            return Err(Error::VmDestroyed);
        }
        Ok(self.shared.vm)
    }

    /// The calling thread's environment.
    ///
    /// Fails with [`Error::EnvLookup`] on a thread the VM never attached.
    pub fn environment(&self) -> Result<Env> {
        let vm = self.live()?;
        let mut env: *mut c_void = ptr::null_mut();
        let res = unsafe { crate::jvm_call!(vm, GetEnv, &mut env, DEFAULT_JNI_VERSION) };
        if res != jni::JNI_OK || env.is_null() {
            return Err(Error::EnvLookup { code: res });
        }
        Ok(unsafe { Env::from_raw(env as *mut jni::JNIEnv, Arc::clone(&self.shared)) })
    }

    /// Attach the current thread to the JVM and return its environment.
    pub fn attach_current_thread(&self) -> Result<Env> {
        let vm = self.live()?;
        let mut env: *mut c_void = ptr::null_mut();
        let res = unsafe { crate::jvm_call!(vm, AttachCurrentThread, &mut env, ptr::null_mut()) };
        if res != jni::JNI_OK || env.is_null() {
            return Err(Error::Attach { code: res });
        }
        debug!(thread = ?thread::current().id(), "attached thread");
        Ok(unsafe { Env::from_raw(env as *mut jni::JNIEnv, Arc::clone(&self.shared)) })
    }

    /// Detach the current thread from the JVM.
    ///
    /// Every [`Env`] this thread obtained earlier fails with
    /// [`Error::Detached`] from then on.
    pub fn detach_current_thread(&self) -> Result<()> {
        let vm = self.live()?;
        let res = unsafe { crate::jvm_call!(vm, DetachCurrentThread) };
        if res != jni::JNI_OK {
            return Err(Error::Detach { code: res });
        }
        self.shared.record_detach(thread::current().id());
        debug!(thread = ?thread::current().id(), "detached thread");
        Ok(())
    }

    /// Destroy the JVM.
    ///
    /// Only the first call reaches `DestroyJavaVM`; later calls, from any
    /// clone, fail with [`Error::VmDestroyed`].
    pub fn destroy(&self) -> Result<()> {
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return Err(Error::VmDestroyed);
        }
        let res = unsafe { crate::jvm_call!(self.shared.vm, DestroyJavaVM) };
        debug!(code = res, "destroyed JVM");
        if res != jni::JNI_OK {
            return Err(Error::Destroy { code: res });
        }
        Ok(())
    }
}

impl std::fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("vm", &self.shared.vm)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
