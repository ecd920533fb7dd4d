//! Error types for xshade operations

use std::fmt;
use thiserror::Error;

/// HRESULT returned by a DXC call
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    pub const S_OK: HResult = HResult(0);
    pub const E_FAIL: HResult = HResult(0x80004005u32 as i32);
    pub const E_NOINTERFACE: HResult = HResult(0x80004002u32 as i32);

    /// Returns true if the result indicates success
    #[inline]
    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }

    /// Returns true if the result indicates an error
    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn code(&self) -> i32 {
        self.0
    }

    /// `Ok(())` on success, [`Error::Com`] naming `call` otherwise.
    pub(crate) fn check(hr: i32, call: &'static str) -> Result<()> {
        let hresult = HResult(hr);
        if hresult.is_success() {
            Ok(())
        } else {
            Err(Error::Com { call, hresult })
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult(0x{:08x})", self.0 as u32)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

impl From<i32> for HResult {
    fn from(hr: i32) -> Self {
        HResult(hr)
    }
}

/// Error type for xshade operations
///
/// Compiler diagnostics are not errors: they come back inside
/// [`ResultDesc`](crate::ResultDesc) with `has_error` set. This type covers
/// bad configuration and a missing or broken native library.
#[derive(Error, Debug)]
pub enum Error {
    /// A native library could not be loaded or is missing a symbol
    #[error(transparent)]
    Native(#[from] xshade_sys::Error),

    /// A DXC call that is not expected to fail did
    #[error("{call} failed (HRESULT: {hresult})")]
    Com {
        /// Name of the failing call
        call: &'static str,
        /// The HRESULT error code
        hresult: HResult,
    },

    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Bytes that do not form a well-formed DXBC container
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// The loaded DXC has no linker
    #[error("Linking is not supported by the loaded dxcompiler")]
    LinkUnsupported,

    /// UTF-8 encoding error
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Include file not found
    #[error("COULDN'T load included file {0}.")]
    IncludeNotFound(String),

    /// IO error during include resolution
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for xshade operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hresult_format() {
        assert_eq!(HResult::E_FAIL.to_string(), "0x80004005");
        assert_eq!(format!("{:?}", HResult::S_OK), "HResult(0x00000000)");
        assert!(HResult::E_FAIL.is_error());
    }

    #[test]
    fn test_check() {
        assert!(HResult::check(0, "Compile").is_ok());
        let err = HResult::check(HResult::E_NOINTERFACE.0, "GetPartReflection").unwrap_err();
        assert_eq!(
            err.to_string(),
            "GetPartReflection failed (HRESULT: 0x80004002)"
        );
    }

    #[test]
    fn test_include_message() {
        let err = Error::IncludeNotFound("common.hlsli".to_string());
        assert_eq!(err.to_string(), "COULDN'T load included file common.hlsli.");
    }
}
