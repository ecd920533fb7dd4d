//! Loaded native libraries: dxcompiler and SPIRV-Cross
//!
//! Each library is opened once per process through [`Dxcompiler::instance`]
//! and [`SpirvCross::instance`]. Tests and tools that want their own copy can
//! use `load_with` and drop it when done.

use crate::com::ComPtr;
use crate::{Error, Result};
use std::ffi::c_void;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use xshade_sys::loader::{
    self, candidate_paths, Library, Loader, SystemLoader, DXCOMPILER_NAMES, DXCOMPILER_PATH_ENV,
    SPIRV_CROSS_NAMES, SPIRV_CROSS_PATH_ENV,
};
use xshade_sys::spvc::SpvcApi;
use xshade_sys::{
    ComInterface, DxcCreateInstanceProc, ID3D12ShaderReflection, IDxcBlob, IDxcBlobEncoding,
    IDxcCompiler, IDxcContainerReflection, IDxcLibrary, IDxcLinker, CLSID_DxcCompiler,
    CLSID_DxcContainerReflection, CLSID_DxcLibrary, CLSID_DxcLinker, CP_UTF8, DFCC_DXIL, GUID,
    DXC_CREATE_INSTANCE,
};

type LoadResult<T> = std::result::Result<T, xshade_sys::Error>;

/// The dxcompiler library with its long-lived compiler and library objects
///
/// Linkers and container reflections are created per call.
pub struct Dxcompiler {
    // Field order is drop order: COM objects go before the module.
    compiler: ComPtr<IDxcCompiler>,
    library: ComPtr<IDxcLibrary>,
    link_support: bool,
    reflection_support: bool,
    create_instance: DxcCreateInstanceProc,
    module: Library,
}

// DXC objects are free-threaded.
unsafe impl Send for Dxcompiler {}
unsafe impl Sync for Dxcompiler {}

unsafe fn create<T: ComInterface>(
    create_instance: DxcCreateInstanceProc,
    clsid: &GUID,
) -> Result<ComPtr<T>> {
    unsafe {
        ComPtr::from_out_param("DxcCreateInstance", |out: *mut *mut T| {
            create_instance(clsid, &T::IID, out.cast::<*mut c_void>())
        })
    }
}

impl Dxcompiler {
    /// Opens dxcompiler from `XSHADE_DXCOMPILER_PATH`, next to the
    /// executable, or from the system search path.
    pub fn load() -> Result<Self> {
        Ok(Self::load_default()?)
    }

    /// Opens dxcompiler at `path` through a custom loader.
    pub fn load_with(loader: Arc<dyn Loader>, path: &Path) -> Result<Self> {
        Ok(Self::open(Library::open(loader, path)?)?)
    }

    /// The process-wide instance, loaded on first use
    ///
    /// A failed load is remembered; later calls return the same error.
    pub fn instance() -> Result<&'static Dxcompiler> {
        static INSTANCE: OnceLock<LoadResult<Dxcompiler>> = OnceLock::new();
        INSTANCE
            .get_or_init(Self::load_default)
            .as_ref()
            .map_err(|e| Error::Native(e.clone()))
    }

    fn load_default() -> LoadResult<Self> {
        let candidates = candidate_paths(DXCOMPILER_PATH_ENV, DXCOMPILER_NAMES);
        Self::open(Library::open_first(Arc::new(SystemLoader), &candidates)?)
    }

    fn open(module: Library) -> LoadResult<Self> {
        let symbol = module.symbol(DXC_CREATE_INSTANCE)?;
        let create_instance: DxcCreateInstanceProc = unsafe { std::mem::transmute(symbol) };

        let path = module.path().display().to_string();
        let load_error = |e: Error| xshade_sys::Error::Load {
            path: path.clone(),
            reason: e.to_string(),
        };

        let compiler = unsafe { create::<IDxcCompiler>(create_instance, &CLSID_DxcCompiler) }
            .map_err(load_error)?;
        let library = unsafe { create::<IDxcLibrary>(create_instance, &CLSID_DxcLibrary) }
            .map_err(load_error)?;

        // Probe the optional classes once; the objects are not kept.
        let link_support =
            unsafe { create::<IDxcLinker>(create_instance, &CLSID_DxcLinker) }.is_ok();
        let reflection_support = unsafe {
            create::<IDxcContainerReflection>(create_instance, &CLSID_DxcContainerReflection)
        }
        .is_ok();

        info!(path = %path, link_support, reflection_support, "loaded dxcompiler");

        Ok(Dxcompiler {
            compiler,
            library,
            link_support,
            reflection_support,
            create_instance,
            module,
        })
    }

    /// Whether this dxcompiler build has a linker
    pub fn link_support(&self) -> bool {
        self.link_support
    }

    pub fn path(&self) -> &Path {
        self.module.path()
    }

    /// Closes the library. Only for instances from [`load`](Self::load)
    /// or [`load_with`](Self::load_with).
    pub fn shutdown(self) {
        debug!(path = %self.module.path().display(), "unloading dxcompiler");
    }

    /// Stops using the library without unloading it.
    ///
    /// Meant for process exit, where the library may already have run its
    /// own teardown and releasing its objects would crash. Every later load
    /// in this process fails.
    pub fn detach_for_process_exit(self) {
        loader::begin_detach();
        let Dxcompiler {
            compiler,
            library,
            module,
            ..
        } = self;
        std::mem::forget(compiler);
        std::mem::forget(library);
        module.leak();
    }

    pub(crate) fn compiler(&self) -> &IDxcCompiler {
        &self.compiler
    }

    pub(crate) fn library(&self) -> &ComPtr<IDxcLibrary> {
        &self.library
    }

    /// Copies `bytes` into a DXC-owned blob.
    pub(crate) fn create_blob(&self, bytes: &[u8]) -> Result<ComPtr<IDxcBlobEncoding>> {
        let size = u32::try_from(bytes.len()).map_err(|_| {
            Error::InvalidParameter(format!("{} bytes is too large for a blob", bytes.len()))
        })?;
        unsafe {
            ComPtr::from_out_param("IDxcLibrary::CreateBlobWithEncodingOnHeapCopy", |out| {
                self.library.create_blob_with_encoding_on_heap_copy(
                    bytes.as_ptr().cast(),
                    size,
                    CP_UTF8,
                    out,
                )
            })
        }
    }

    /// A fresh linker. Fails with [`Error::LinkUnsupported`] when the
    /// library has none.
    pub(crate) fn create_linker(&self) -> Result<ComPtr<IDxcLinker>> {
        if !self.link_support {
            return Err(Error::LinkUnsupported);
        }
        unsafe { create(self.create_instance, &CLSID_DxcLinker) }
    }

    /// Reflection of the DXIL part of a container.
    pub(crate) fn shader_reflection(&self, dxil: &[u8]) -> Result<ComPtr<ID3D12ShaderReflection>> {
        if !self.reflection_support {
            return Err(Error::Com {
                call: "DxcCreateInstance",
                hresult: crate::HResult::E_NOINTERFACE,
            });
        }
        let container = unsafe {
            create::<IDxcContainerReflection>(self.create_instance, &CLSID_DxcContainerReflection)
        }?;
        let blob = self.create_blob(dxil)?;

        unsafe {
            crate::HResult::check(
                container.load(blob.as_ptr().cast::<IDxcBlob>()),
                "IDxcContainerReflection::Load",
            )?;
            let mut index = 0u32;
            crate::HResult::check(
                container.find_first_part_kind(DFCC_DXIL, &mut index),
                "IDxcContainerReflection::FindFirstPartKind",
            )?;
            ComPtr::from_out_param(
                "IDxcContainerReflection::GetPartReflection",
                |out: *mut *mut ID3D12ShaderReflection| {
                    container.get_part_reflection(
                        index,
                        &ID3D12ShaderReflection::IID,
                        out.cast::<*mut c_void>(),
                    )
                },
            )
        }
    }
}

impl std::fmt::Debug for Dxcompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dxcompiler")
            .field("module", &self.module)
            .field("link_support", &self.link_support)
            .field("reflection_support", &self.reflection_support)
            .finish()
    }
}

/// The SPIRV-Cross C library and its resolved entry points
pub struct SpirvCross {
    api: SpvcApi,
    module: Library,
}

// The function table is plain code pointers; contexts are per call.
unsafe impl Send for SpirvCross {}
unsafe impl Sync for SpirvCross {}

impl SpirvCross {
    /// Opens SPIRV-Cross from `XSHADE_SPIRV_CROSS_PATH`, next to the
    /// executable, or from the system search path.
    pub fn load() -> Result<Self> {
        Ok(Self::load_default()?)
    }

    pub fn load_with(loader: Arc<dyn Loader>, path: &Path) -> Result<Self> {
        Ok(Self::open(Library::open(loader, path)?)?)
    }

    /// The process-wide instance, loaded on first use
    pub fn instance() -> Result<&'static SpirvCross> {
        static INSTANCE: OnceLock<LoadResult<SpirvCross>> = OnceLock::new();
        INSTANCE
            .get_or_init(Self::load_default)
            .as_ref()
            .map_err(|e| Error::Native(e.clone()))
    }

    fn load_default() -> LoadResult<Self> {
        let candidates = candidate_paths(SPIRV_CROSS_PATH_ENV, SPIRV_CROSS_NAMES);
        Self::open(Library::open_first(Arc::new(SystemLoader), &candidates)?)
    }

    fn open(module: Library) -> LoadResult<Self> {
        let api = SpvcApi::load(&module).inspect_err(|e| {
            warn!(path = %module.path().display(), error = %e, "incomplete SPIRV-Cross library");
        })?;
        info!(path = %module.path().display(), "loaded SPIRV-Cross");
        Ok(SpirvCross { api, module })
    }

    pub fn path(&self) -> &Path {
        self.module.path()
    }

    pub fn shutdown(self) {
        debug!(path = %self.module.path().display(), "unloading SPIRV-Cross");
    }

    /// See [`Dxcompiler::detach_for_process_exit`].
    pub fn detach_for_process_exit(self) {
        loader::begin_detach();
        self.module.leak();
    }

    pub(crate) fn api(&self) -> &SpvcApi {
        &self.api
    }
}

impl std::fmt::Debug for SpirvCross {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpirvCross")
            .field("module", &self.module)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use xshade_sys::loader::RawHandle;

    /// Opens anything, resolves nothing, records what it was asked for.
    #[derive(Default)]
    struct EmptyLoader {
        closed: Mutex<Vec<PathBuf>>,
    }

    impl Loader for EmptyLoader {
        fn open(&self, _path: &Path) -> LoadResult<RawHandle> {
            Ok(RawHandle(std::ptr::null_mut()))
        }

        fn resolve(&self, _handle: &RawHandle, _symbol: &str) -> Option<*const c_void> {
            None
        }

        fn close(&self, _handle: RawHandle) {
            self.closed.lock().unwrap().push(PathBuf::from("closed"));
        }
    }

    #[test]
    fn test_missing_factory_symbol() {
        let loader = Arc::new(EmptyLoader::default());
        let err = Dxcompiler::load_with(loader.clone(), Path::new("libdxcompiler.so")).unwrap_err();
        assert!(matches!(
            err,
            Error::Native(xshade_sys::Error::SymbolNotFound(ref name)) if name == DXC_CREATE_INSTANCE
        ));
        // The module is closed again on failure.
        assert_eq!(loader.closed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_incomplete_spirv_cross() {
        let loader = Arc::new(EmptyLoader::default());
        let err = SpirvCross::load_with(loader, Path::new("libspirv-cross-c-shared.so")).unwrap_err();
        assert!(matches!(
            err,
            Error::Native(xshade_sys::Error::SymbolNotFound(ref name))
                if name == SpvcApi::SYMBOLS[0]
        ));
    }
}
