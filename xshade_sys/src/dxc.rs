//! DXC COM interfaces, class ids and the `DxcCreateInstance` entry point

use crate::{BOOL, GUID, HRESULT, LPCWSTR, SIZE_T, UINT, ULONG};
use std::ffi::c_void;
use xshade_proc::com_interface;

/// Exported factory function of the dxcompiler library
pub const DXC_CREATE_INSTANCE: &str = "DxcCreateInstance";

pub type DxcCreateInstanceProc =
    unsafe extern "system" fn(rclsid: *const GUID, riid: *const GUID, ppv: *mut *mut c_void) -> HRESULT;

pub const CLSID_DxcCompiler: GUID = GUID::from_u128(0x73e22d93_e6ce_47f3_b5bf_f0664f39c1b0);
pub const CLSID_DxcLinker: GUID = GUID::from_u128(0xef6a8087_b0ea_4d56_9e45_d07e1a8b7806);
pub const CLSID_DxcLibrary: GUID = GUID::from_u128(0x6245d6af_66e0_48fd_80b4_4d271796748c);
pub const CLSID_DxcContainerReflection: GUID =
    GUID::from_u128(0xb9f54489_55b8_400c_ba3a_1675e4728b91);

/// FourCC of the DXIL program part inside a DXBC container
pub const DFCC_DXIL: u32 = u32::from_le_bytes(*b"DXIL");

/// Preprocessor define handed to `IDxcCompiler::Compile`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DxcDefine {
    pub Name: LPCWSTR,
    pub Value: LPCWSTR,
}

com_interface! {
    /// Base of every DXC interface
    interface IUnknown {
        iid: "00000000-0000-0000-c000-000000000046",
        fn QueryInterface(riid: *const GUID, object: *mut *mut c_void) -> HRESULT;
        fn AddRef() -> ULONG;
        fn Release() -> ULONG;
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        fn Destructor();
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        fn DeletingDestructor();
    }

    /// Immutable byte buffer
    interface IDxcBlob: IUnknown {
        iid: "8ba5fb08-5195-40e2-ac58-0d989c3a0102",
        fn GetBufferPointer() -> *mut c_void;
        fn GetBufferSize() -> SIZE_T;
    }

    /// Byte buffer with a known text encoding
    interface IDxcBlobEncoding: IDxcBlob {
        iid: "7241d424-2646-4191-97c0-98e96e42fc68",
        fn GetEncoding(known: *mut BOOL, code_page: *mut u32) -> HRESULT;
    }

    interface IDxcLibrary: IUnknown {
        iid: "e5204dc7-d18c-4c3c-bdfb-851673980fe7",
        fn SetMalloc(malloc: *mut c_void) -> HRESULT;
        fn CreateBlobFromBlob(blob: *mut IDxcBlob, offset: UINT, length: UINT, result: *mut *mut IDxcBlob) -> HRESULT;
        fn CreateBlobFromFile(file_name: LPCWSTR, code_page: *const u32, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
        fn CreateBlobWithEncodingFromPinned(text: *const c_void, size: UINT, code_page: u32, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
        fn CreateBlobWithEncodingOnHeapCopy(text: *const c_void, size: UINT, code_page: u32, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
        fn CreateBlobWithEncodingOnMalloc(text: *const c_void, malloc: *mut c_void, size: UINT, code_page: u32, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
        fn CreateIncludeHandler(result: *mut *mut IDxcIncludeHandler) -> HRESULT;
        fn CreateStreamFromBlobReadOnly(blob: *mut IDxcBlob, stream: *mut *mut c_void) -> HRESULT;
        fn GetBlobAsUtf8(blob: *mut IDxcBlob, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
        fn GetBlobAsUtf16(blob: *mut IDxcBlob, blob_encoding: *mut *mut IDxcBlobEncoding) -> HRESULT;
    }

    /// Outcome of a compile, link or preprocess call
    interface IDxcOperationResult: IUnknown {
        iid: "cedb484a-d4e9-445a-b991-ca21ca157dc2",
        fn GetStatus(status: *mut HRESULT) -> HRESULT;
        fn GetResult(result: *mut *mut IDxcBlob) -> HRESULT;
        fn GetErrorBuffer(errors: *mut *mut IDxcBlobEncoding) -> HRESULT;
    }

    interface IDxcIncludeHandler: IUnknown {
        iid: "7f61fc7d-950d-467f-b3e3-3c02fb49187c",
        fn LoadSource(file_name: LPCWSTR, include_source: *mut *mut IDxcBlob) -> HRESULT;
    }

    interface IDxcCompiler: IUnknown {
        iid: "8c210bf3-011f-4422-8d70-6f9acb8db617",
        fn Compile(
            source: *mut IDxcBlob,
            source_name: LPCWSTR,
            entry_point: LPCWSTR,
            target_profile: LPCWSTR,
            arguments: *const LPCWSTR,
            arg_count: u32,
            defines: *const DxcDefine,
            define_count: u32,
            include_handler: *mut IDxcIncludeHandler,
            result: *mut *mut IDxcOperationResult
        ) -> HRESULT;
        fn Preprocess(
            source: *mut IDxcBlob,
            source_name: LPCWSTR,
            arguments: *const LPCWSTR,
            arg_count: u32,
            defines: *const DxcDefine,
            define_count: u32,
            include_handler: *mut IDxcIncludeHandler,
            result: *mut *mut IDxcOperationResult
        ) -> HRESULT;
        fn Disassemble(source: *mut IDxcBlob, disassembly: *mut *mut IDxcBlobEncoding) -> HRESULT;
    }

    interface IDxcLinker: IUnknown {
        iid: "f1b5be2a-62dd-4327-a1c2-42ac1e1e78e6",
        fn RegisterLibrary(lib_name: LPCWSTR, lib: *mut IDxcBlob) -> HRESULT;
        fn Link(
            entry_name: LPCWSTR,
            target_profile: LPCWSTR,
            lib_names: *const LPCWSTR,
            lib_count: u32,
            arguments: *const LPCWSTR,
            arg_count: u32,
            result: *mut *mut IDxcOperationResult
        ) -> HRESULT;
    }

    interface IDxcContainerReflection: IUnknown {
        iid: "d2c21b26-8350-4bdc-976a-331ce6f4c54c",
        fn Load(container: *mut IDxcBlob) -> HRESULT;
        fn GetPartCount(result: *mut u32) -> HRESULT;
        fn GetPartKind(idx: u32, result: *mut u32) -> HRESULT;
        fn GetPartContent(idx: u32, result: *mut *mut IDxcBlob) -> HRESULT;
        fn FindFirstPartKind(kind: u32, result: *mut u32) -> HRESULT;
        fn GetPartReflection(idx: u32, iid: *const GUID, object: *mut *mut c_void) -> HRESULT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComInterface;
    use std::mem::size_of;

    #[test]
    fn test_dxil_fourcc() {
        assert_eq!(DFCC_DXIL, 0x4c49_5844);
    }

    #[test]
    fn test_vtable_layout() {
        let slot = size_of::<usize>();
        let base = size_of::<IUnknownVtbl>();
        #[cfg(not(all(feature = "dxc-virtual-dtor", not(windows))))]
        assert_eq!(base, 3 * slot);
        #[cfg(all(feature = "dxc-virtual-dtor", not(windows)))]
        assert_eq!(base, 5 * slot);

        assert_eq!(size_of::<IDxcBlobVtbl>(), base + 2 * slot);
        assert_eq!(size_of::<IDxcBlobEncodingVtbl>(), base + 3 * slot);
        assert_eq!(size_of::<IDxcLibraryVtbl>(), base + 10 * slot);
        assert_eq!(size_of::<IDxcCompilerVtbl>(), base + 3 * slot);
        assert_eq!(size_of::<IDxcContainerReflectionVtbl>(), base + 6 * slot);
    }

    #[test]
    fn test_iids() {
        assert_eq!(
            IDxcCompiler::IID.to_uuid().to_string(),
            "8c210bf3-011f-4422-8d70-6f9acb8db617"
        );
        assert_ne!(IDxcBlob::IID, IDxcBlobEncoding::IID);
    }
}
