//! Dynamic library loading behind a swappable [`Loader`]

use crate::{Error, Result};
use std::env;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Overrides the location of the DXC library
pub const DXCOMPILER_PATH_ENV: &str = "XSHADE_DXCOMPILER_PATH";
/// Overrides the location of the SPIRV-Cross C library
pub const SPIRV_CROSS_PATH_ENV: &str = "XSHADE_SPIRV_CROSS_PATH";

#[cfg(windows)]
pub const DXCOMPILER_NAMES: &[&str] = &["dxcompiler.dll"];
#[cfg(target_os = "macos")]
pub const DXCOMPILER_NAMES: &[&str] = &["libdxcompiler.dylib"];
#[cfg(all(unix, not(target_os = "macos")))]
pub const DXCOMPILER_NAMES: &[&str] = &["libdxcompiler.so"];

#[cfg(windows)]
pub const SPIRV_CROSS_NAMES: &[&str] = &["spirv-cross-c-shared.dll"];
#[cfg(target_os = "macos")]
pub const SPIRV_CROSS_NAMES: &[&str] = &["libspirv-cross-c-shared.dylib"];
#[cfg(all(unix, not(target_os = "macos")))]
pub const SPIRV_CROSS_NAMES: &[&str] = &["libspirv-cross-c-shared.so.0", "libspirv-cross-c-shared.so"];

static DETACHING: AtomicBool = AtomicBool::new(false);

/// Marks the process as shutting down. Every later [`Library::open`] fails
/// with [`Error::Detaching`].
pub fn begin_detach() {
    DETACHING.store(true, Ordering::SeqCst);
}

pub fn is_detaching() -> bool {
    DETACHING.load(Ordering::SeqCst)
}

/// Platform module handle as returned by a [`Loader`]
#[derive(Debug)]
pub struct RawHandle(pub *mut c_void);

// dlopen/LoadLibrary handles may be used from any thread.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

/// Opens modules and resolves symbols from them.
pub trait Loader: Send + Sync {
    fn open(&self, path: &Path) -> Result<RawHandle>;
    fn resolve(&self, handle: &RawHandle, symbol: &str) -> Option<*const c_void>;
    fn close(&self, handle: RawHandle);
}

/// `dlopen` on unix, `LoadLibraryW` on Windows
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

#[cfg(unix)]
impl SystemLoader {
    fn last_error() -> String {
        let err = unsafe { libc::dlerror() };
        if err.is_null() {
            "unknown error".to_string()
        } else {
            unsafe { std::ffi::CStr::from_ptr(err) }
                .to_string_lossy()
                .into_owned()
        }
    }
}

#[cfg(unix)]
impl Loader for SystemLoader {
    fn open(&self, path: &Path) -> Result<RawHandle> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::Load {
            path: path.display().to_string(),
            reason: "path contains a NUL byte".to_string(),
        })?;
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(Error::Load {
                path: path.display().to_string(),
                reason: Self::last_error(),
            });
        }
        Ok(RawHandle(handle))
    }

    fn resolve(&self, handle: &RawHandle, symbol: &str) -> Option<*const c_void> {
        let name = std::ffi::CString::new(symbol).ok()?;
        let ptr = unsafe { libc::dlsym(handle.0, name.as_ptr()) };
        (!ptr.is_null()).then_some(ptr as *const c_void)
    }

    fn close(&self, handle: RawHandle) {
        unsafe {
            libc::dlclose(handle.0);
        }
    }
}

#[cfg(windows)]
mod kernel32 {
    use std::ffi::{c_char, c_void};

    #[link(name = "kernel32")]
    unsafe extern "system" {
        pub fn LoadLibraryW(file_name: *const u16) -> *mut c_void;
        pub fn GetProcAddress(module: *mut c_void, name: *const c_char) -> *mut c_void;
        pub fn FreeLibrary(module: *mut c_void) -> i32;
        pub fn GetLastError() -> u32;
    }
}

#[cfg(windows)]
impl Loader for SystemLoader {
    fn open(&self, path: &Path) -> Result<RawHandle> {
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        let handle = unsafe { kernel32::LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            let code = unsafe { kernel32::GetLastError() };
            return Err(Error::Load {
                path: path.display().to_string(),
                reason: format!("LoadLibraryW failed with error {code}"),
            });
        }
        Ok(RawHandle(handle))
    }

    fn resolve(&self, handle: &RawHandle, symbol: &str) -> Option<*const c_void> {
        let name = std::ffi::CString::new(symbol).ok()?;
        let ptr = unsafe { kernel32::GetProcAddress(handle.0, name.as_ptr()) };
        (!ptr.is_null()).then_some(ptr as *const c_void)
    }

    fn close(&self, handle: RawHandle) {
        unsafe {
            kernel32::FreeLibrary(handle.0);
        }
    }
}

/// An open module. Closed on drop unless [`Library::leak`] was called.
pub struct Library {
    handle: Option<RawHandle>,
    path: PathBuf,
    loader: Arc<dyn Loader>,
}

impl Library {
    pub fn open(loader: Arc<dyn Loader>, path: &Path) -> Result<Self> {
        if is_detaching() {
            return Err(Error::Detaching);
        }
        let handle = loader.open(path)?;
        debug_log!(path = %path.display(), "opened library");
        Ok(Library {
            handle: Some(handle),
            path: path.to_path_buf(),
            loader,
        })
    }

    /// Tries each candidate in order and returns the first that opens.
    pub fn open_first(loader: Arc<dyn Loader>, candidates: &[PathBuf]) -> Result<Self> {
        let mut last_error = None;
        for path in candidates {
            match Library::open(loader.clone(), path) {
                Ok(library) => return Ok(library),
                Err(Error::Detaching) => return Err(Error::Detaching),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Load {
            path: String::new(),
            reason: "no candidate paths".to_string(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbol(&self, name: &str) -> Result<*const c_void> {
        self.handle
            .as_ref()
            .and_then(|handle| self.loader.resolve(handle, name))
            .ok_or_else(|| Error::SymbolNotFound(name.to_string()))
    }

    /// Keeps the module mapped for the rest of the process.
    pub fn leak(mut self) {
        self.handle = None;
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.loader.close(handle);
        }
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

/// Paths to try for a library: the override variable alone when set,
/// otherwise each name next to the executable and then bare.
pub fn candidate_paths(env_var: &str, names: &[&str]) -> Vec<PathBuf> {
    if let Some(path) = env::var_os(env_var).filter(|p| !p.is_empty()) {
        return vec![PathBuf::from(path)];
    }

    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    let mut paths = Vec::with_capacity(names.len() * 2);
    for name in names {
        if let Some(dir) = &exe_dir {
            paths.push(dir.join(name));
        }
        paths.push(PathBuf::from(name));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_without_override() {
        let paths = candidate_paths("XSHADE_TEST_UNSET_VARIABLE", &["liba.so", "libb.so"]);
        assert_eq!(paths.last(), Some(&PathBuf::from("libb.so")));
        assert!(paths.contains(&PathBuf::from("liba.so")));
        let bare = paths.iter().position(|p| p == Path::new("liba.so")).unwrap();
        if paths.len() == 4 {
            assert!(paths[bare - 1].ends_with("liba.so"));
            assert!(paths[bare - 1].is_absolute());
        }
    }

    #[test]
    fn test_missing_library_is_load_error() {
        let loader: Arc<dyn Loader> = Arc::new(SystemLoader);
        let result = Library::open(loader, Path::new("/nonexistent/libxshade_missing.so"));
        match result {
            Err(Error::Load { path, .. }) => assert!(path.contains("libxshade_missing")),
            Err(Error::Detaching) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
