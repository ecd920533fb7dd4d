//! Runtime-loaded bindings for DXC and SPIRV-Cross
//!
//! Neither library is linked at build time. [`loader`] opens them with the
//! platform loader, [`dxc`] and [`d3d12`] describe the COM interfaces DXC
//! hands back, and [`spvc`] resolves the SPIRV-Cross C API into a function
//! table. [`wide`] and [`include`] cover the two places where Rust data has
//! to cross into DXC: wide-string arguments and the include callback.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::missing_transmute_annotations)]

macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-logs")]
        tracing::trace!($($arg)*)
    };
}

pub mod d3d12;
pub mod dxc;
pub mod include;
pub mod loader;
pub mod spvc;
pub mod wide;

pub use d3d12::*;
pub use dxc::*;

use std::ffi::{c_char, c_void};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Function not found: {0}")]
    SymbolNotFound(String),
    #[error("Native libraries were detached for process exit")]
    Detaching,
}

pub type Result<T> = std::result::Result<T, Error>;

pub type HRESULT = i32;
pub type UINT = u32;
pub type ULONG = u32;
pub type BOOL = i32;
pub type SIZE_T = usize;
pub type LPCSTR = *const c_char;
pub type LPCWSTR = *const libc::wchar_t;
pub type LPVOID = *mut c_void;

pub const S_OK: HRESULT = 0;
pub const S_FALSE: HRESULT = 1;
pub const E_NOTIMPL: HRESULT = 0x80004001u32 as i32;
pub const E_NOINTERFACE: HRESULT = 0x80004002u32 as i32;
pub const E_POINTER: HRESULT = 0x80004003u32 as i32;
pub const E_FAIL: HRESULT = 0x80004005u32 as i32;
pub const E_INVALIDARG: HRESULT = 0x80070057u32 as i32;

pub const CP_UTF8: u32 = 65001;

#[inline]
pub fn SUCCEEDED(hr: HRESULT) -> bool {
    hr >= 0
}

#[inline]
pub fn FAILED(hr: HRESULT) -> bool {
    hr < 0
}

/// COM GUID with the Windows field layout
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GUID {
    pub Data1: u32,
    pub Data2: u16,
    pub Data3: u16,
    pub Data4: [u8; 8],
}

impl GUID {
    /// Builds a GUID from its canonical 128-bit big-endian value.
    pub const fn from_u128(value: u128) -> Self {
        GUID {
            Data1: (value >> 96) as u32,
            Data2: (value >> 80) as u16,
            Data3: (value >> 64) as u16,
            Data4: (value as u64).to_be_bytes(),
        }
    }

    pub fn to_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_fields(self.Data1, self.Data2, self.Data3, &self.Data4)
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.to_uuid())
    }
}

/// Interfaces that can be requested through `QueryInterface`/`CreateInstance`.
pub trait ComInterface {
    const IID: GUID;
}
