//! Reference-counted COM pointers

use crate::{Blob, Error, HResult, Result};
use std::ffi::c_void;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use xshade_sys::{ComInterface, IDxcBlob, IUnknown, E_POINTER, HRESULT};

/// Owns one reference to a COM object and releases it on drop.
pub(crate) struct ComPtr<T: ComInterface> {
    ptr: NonNull<T>,
}

impl<T: ComInterface> ComPtr<T> {
    /// Takes over a reference returned through an out-parameter.
    ///
    /// # Safety
    /// `ptr` must be null or a live COM object of type `T` whose reference
    /// the caller owns.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| ComPtr { ptr })
    }

    /// Calls `f` with an out-parameter and wraps what it writes.
    ///
    /// A failing HRESULT becomes [`Error::Com`], as does a success that
    /// leaves the pointer null.
    ///
    /// # Safety
    /// `f` must follow COM out-parameter rules for `T`.
    pub unsafe fn from_out_param(
        call: &'static str,
        f: impl FnOnce(*mut *mut T) -> HRESULT,
    ) -> Result<Self> {
        let mut raw: *mut T = ptr::null_mut();
        HResult::check(f(&mut raw), call)?;
        unsafe { Self::from_raw(raw) }.ok_or(Error::Com {
            call,
            hresult: HResult(E_POINTER),
        })
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    fn as_unknown(&self) -> &IUnknown {
        // Every interface starts with the IUnknown vtable.
        unsafe { &*self.ptr.as_ptr().cast::<IUnknown>() }
    }

    /// `QueryInterface` for `U`
    #[allow(dead_code)]
    pub fn cast<U: ComInterface>(&self) -> Result<ComPtr<U>> {
        unsafe {
            ComPtr::from_out_param("QueryInterface", |out: *mut *mut U| {
                self.as_unknown()
                    .query_interface(&U::IID, out.cast::<*mut c_void>())
            })
        }
    }
}

impl<T: ComInterface> Deref for ComPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ComInterface> Clone for ComPtr<T> {
    fn clone(&self) -> Self {
        unsafe {
            self.as_unknown().add_ref();
        }
        ComPtr { ptr: self.ptr }
    }
}

impl<T: ComInterface> Drop for ComPtr<T> {
    fn drop(&mut self) {
        unsafe {
            self.as_unknown().release();
        }
    }
}

/// Copies the contents of a DXC blob.
pub(crate) fn copy_blob(blob: &IDxcBlob) -> Blob {
    unsafe {
        Blob::from_raw_parts(
            blob.get_buffer_pointer().cast::<u8>().cast_const(),
            blob.get_buffer_size(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use xshade_sys::{GUID, IUnknownVtbl, ULONG, E_NOINTERFACE, S_OK};

    // A bare IUnknown that counts references, enough to exercise ComPtr.
    #[repr(C)]
    struct Counted {
        vtable: *const IUnknownVtbl,
        refs: AtomicU32,
    }

    unsafe extern "system" fn query_interface(
        this: *mut IUnknown,
        riid: *const GUID,
        out: *mut *mut c_void,
    ) -> HRESULT {
        unsafe {
            if *riid == IUnknown::IID {
                add_ref(this);
                *out = this.cast();
                S_OK
            } else {
                *out = ptr::null_mut();
                E_NOINTERFACE
            }
        }
    }

    unsafe extern "system" fn add_ref(this: *mut IUnknown) -> ULONG {
        unsafe { (*this.cast::<Counted>()).refs.fetch_add(1, Ordering::SeqCst) + 1 }
    }

    unsafe extern "system" fn release(this: *mut IUnknown) -> ULONG {
        unsafe { (*this.cast::<Counted>()).refs.fetch_sub(1, Ordering::SeqCst) - 1 }
    }

    #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
    unsafe extern "system" fn noop(_this: *mut IUnknown) {}

    static VTABLE: IUnknownVtbl = IUnknownVtbl {
        QueryInterface: query_interface,
        AddRef: add_ref,
        Release: release,
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        Destructor: noop,
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        DeletingDestructor: noop,
    };

    #[test]
    fn test_clone_and_drop_balance_refs() {
        let object = Counted {
            vtable: &VTABLE,
            refs: AtomicU32::new(1),
        };
        let raw = &object as *const Counted as *mut IUnknown;

        let first = unsafe { ComPtr::from_raw(raw) }.unwrap();
        let second = first.clone();
        assert_eq!(object.refs.load(Ordering::SeqCst), 2);

        let third = first.cast::<IUnknown>().unwrap();
        assert_eq!(object.refs.load(Ordering::SeqCst), 3);

        drop(first);
        drop(second);
        drop(third);
        assert_eq!(object.refs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_null_out_param_is_an_error() {
        let result =
            unsafe { ComPtr::<IUnknown>::from_out_param("CreateInstance", |_out| S_OK) };
        assert!(matches!(
            result,
            Err(Error::Com { call: "CreateInstance", hresult }) if hresult == HResult(E_POINTER)
        ));
    }
}
