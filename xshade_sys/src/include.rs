//! `IDxcIncludeHandler` implemented in Rust
//!
//! DXC calls `LoadSource` for every `#include`. The handler forwards the
//! request to a Rust callback and copies whatever it returns into a DXC blob.

use crate::{
    CP_UTF8, ComInterface, E_FAIL, E_INVALIDARG, E_NOINTERFACE, E_POINTER, FAILED, GUID, HRESULT, IDxcBlob,
    IDxcBlobEncoding, IDxcIncludeHandler, IDxcIncludeHandlerVtbl, IDxcLibrary, IUnknown,
    IUnknownVtbl, LPCWSTR, S_OK, ULONG, wide,
};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Include callback: file name in, file contents out
pub type IncludeCallback<'a> = dyn Fn(&str) -> Option<Vec<u8>> + 'a;

#[repr(C)]
struct IncludeHandler {
    // Must stay first: DXC sees this struct as an IDxcIncludeHandler.
    vtable: *const IDxcIncludeHandlerVtbl,
    refs: AtomicU32,
    library: *mut IDxcLibrary,
    callback: *const IncludeCallback<'static>,
}

static VTABLE: IDxcIncludeHandlerVtbl = IDxcIncludeHandlerVtbl {
    base: IUnknownVtbl {
        QueryInterface: query_interface,
        AddRef: add_ref,
        Release: release,
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        Destructor: destructor,
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        DeletingDestructor: destructor,
    },
    LoadSource: load_source,
};

unsafe extern "system" fn query_interface(
    this: *mut IUnknown,
    riid: *const GUID,
    object: *mut *mut c_void,
) -> HRESULT {
    if object.is_null() || riid.is_null() {
        return E_POINTER;
    }
    let riid = unsafe { *riid };
    if riid == IDxcIncludeHandler::IID || riid == IUnknown::IID {
        unsafe {
            add_ref(this);
            *object = this.cast();
        }
        S_OK
    } else {
        unsafe { *object = ptr::null_mut() };
        E_NOINTERFACE
    }
}

unsafe extern "system" fn add_ref(this: *mut IUnknown) -> ULONG {
    let handler = unsafe { &*(this as *const IncludeHandler) };
    let refs = handler.refs.fetch_add(1, Ordering::AcqRel) + 1;
    debug_log!(refs, "IDxcIncludeHandler::AddRef");
    refs
}

unsafe extern "system" fn release(this: *mut IUnknown) -> ULONG {
    let handler = this as *mut IncludeHandler;
    let refs = unsafe { (*handler).refs.fetch_sub(1, Ordering::AcqRel) } - 1;
    debug_log!(refs, "IDxcIncludeHandler::Release");
    if refs == 0 {
        drop(unsafe { Box::from_raw(handler) });
    }
    refs
}

#[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
unsafe extern "system" fn destructor(_this: *mut IUnknown) {}

/// Blob sizes are `UINT32`; anything longer is rejected, not truncated.
fn blob_size(len: usize) -> Result<u32, HRESULT> {
    u32::try_from(len).map_err(|_| E_INVALIDARG)
}

unsafe extern "system" fn load_source(
    this: *mut IDxcIncludeHandler,
    file_name: LPCWSTR,
    include_source: *mut *mut IDxcBlob,
) -> HRESULT {
    if include_source.is_null() {
        return E_POINTER;
    }
    unsafe { *include_source = ptr::null_mut() };

    let handler = unsafe { &*(this as *const IncludeHandler) };
    let Some(name) = (unsafe { wide::decode(file_name) }) else {
        return E_FAIL;
    };
    let name = name.strip_prefix("./").unwrap_or(&name);

    let callback = unsafe { &*handler.callback };
    let bytes = match panic::catch_unwind(AssertUnwindSafe(|| callback(name))) {
        Ok(Some(bytes)) if !bytes.is_empty() => bytes,
        Ok(_) => {
            tracing::debug!(name, "include not resolved");
            return E_FAIL;
        }
        Err(_) => {
            tracing::warn!(name, "include callback panicked");
            return E_FAIL;
        }
    };
    tracing::debug!(name, size = bytes.len(), "include loaded");
    let size = match blob_size(bytes.len()) {
        Ok(size) => size,
        Err(hr) => {
            tracing::warn!(name, size = bytes.len(), "include too large for a DXC blob");
            return hr;
        }
    };

    let mut blob: *mut IDxcBlobEncoding = ptr::null_mut();
    let hr = unsafe {
        (*handler.library).create_blob_with_encoding_on_heap_copy(
            bytes.as_ptr().cast(),
            size,
            CP_UTF8,
            &mut blob,
        )
    };
    if FAILED(hr) {
        return hr;
    }
    unsafe { *include_source = blob.cast() };
    S_OK
}

/// Owning reference to a Rust include handler.
///
/// The handler borrows its callback for `'a`. DXC only calls it during the
/// compile it was passed to, which must finish before this guard drops.
pub struct IncludeHandlerRef<'a> {
    raw: *mut IncludeHandler,
    _callback: PhantomData<&'a IncludeCallback<'a>>,
}

impl<'a> IncludeHandlerRef<'a> {
    /// # Safety
    /// `library` must be a live `IDxcLibrary` for as long as the handler is.
    pub unsafe fn new(library: *mut IDxcLibrary, callback: &'a IncludeCallback<'a>) -> Self {
        let callback: *const IncludeCallback<'a> = callback;
        // The lifetime is carried by the guard instead of the raw pointer.
        let callback = unsafe {
            std::mem::transmute::<*const IncludeCallback<'a>, *const IncludeCallback<'static>>(
                callback,
            )
        };
        let raw = Box::into_raw(Box::new(IncludeHandler {
            vtable: &VTABLE,
            refs: AtomicU32::new(1),
            library,
            callback,
        }));
        IncludeHandlerRef {
            raw,
            _callback: PhantomData,
        }
    }

    pub fn as_raw(&self) -> *mut IDxcIncludeHandler {
        self.raw.cast()
    }
}

impl Drop for IncludeHandlerRef<'_> {
    fn drop(&mut self) {
        unsafe {
            release(self.raw.cast());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn make_handler<'a>(callback: &'a IncludeCallback<'a>) -> IncludeHandlerRef<'a> {
        // LoadSource is never reached with a null library in these tests.
        unsafe { IncludeHandlerRef::new(ptr::null_mut(), callback) }
    }

    #[test]
    fn test_blob_size_is_checked() {
        assert_eq!(blob_size(12), Ok(12));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(blob_size(u32::MAX as usize + 1), Err(E_INVALIDARG));
    }

    #[test]
    fn test_query_interface() {
        let callback = |_: &str| -> Option<Vec<u8>> { None };
        let handler = make_handler(&callback);
        let raw = handler.as_raw();

        let mut object = ptr::null_mut();
        unsafe {
            assert_eq!((*raw).query_interface(&IDxcIncludeHandler::IID, &mut object), S_OK);
            assert_eq!(object, raw.cast::<c_void>());
            assert_eq!((*raw).release(), 1);

            assert_eq!((*raw).query_interface(&IDxcBlob::IID, &mut object), E_NOINTERFACE);
            assert!(object.is_null());
        }
    }

    #[test]
    fn test_unresolved_include_fails() {
        let seen = Cell::new(None::<String>);
        let callback = |name: &str| -> Option<Vec<u8>> {
            seen.set(Some(name.to_string()));
            None
        };
        let handler = make_handler(&callback);
        let name = wide::encode("./common.hlsli");
        let mut blob = ptr::null_mut();
        let hr = unsafe { (*handler.as_raw()).load_source(name.as_ptr(), &mut blob) };
        assert_eq!(hr, E_FAIL);
        assert!(blob.is_null());
        assert_eq!(seen.take().as_deref(), Some("common.hlsli"));
    }

    #[test]
    fn test_panicking_callback_fails() {
        let callback = |_: &str| -> Option<Vec<u8>> { panic!("loader exploded") };
        let handler = make_handler(&callback);
        let name = wide::encode("a.hlsl");
        let mut blob = ptr::null_mut();
        let hr = unsafe { (*handler.as_raw()).load_source(name.as_ptr(), &mut blob) };
        assert_eq!(hr, E_FAIL);
    }

    #[test]
    fn test_empty_content_fails() {
        let callback = |_: &str| Some(Vec::<u8>::new());
        let handler = make_handler(&callback);
        let name = wide::encode("empty.hlsl");
        let mut blob = ptr::null_mut();
        let hr = unsafe { (*handler.as_raw()).load_source(name.as_ptr(), &mut blob) };
        assert_eq!(hr, E_FAIL);
    }
}
