//! Owned byte buffer for shader sources, binaries and diagnostics

use crate::Result;
use std::ops::Deref;

/// Owned bytes: a compiled binary, generated source or diagnostic text
///
/// Data coming out of DXC or SPIRV-Cross is copied in, so a `Blob` never
/// refers to memory owned by a native library.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new() -> Self {
        Blob(Vec::new())
    }

    /// Copies `len` bytes from native memory.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes, or `len` must be zero.
    pub(crate) unsafe fn from_raw_parts(ptr: *const u8, len: usize) -> Self {
        if ptr.is_null() || len == 0 {
            return Blob::new();
        }
        Blob(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
    }

    /// Returns the blob data as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Drops trailing NUL bytes left by C-string producers.
    pub(crate) fn trim_trailing_nul(mut self) -> Self {
        let len = trim_nul(&self.0).len();
        self.0.truncate(len);
        self
    }

    /// Appends bytes to the end of the blob.
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Interprets the blob as a UTF-8 string.
    ///
    /// Trailing null bytes are trimmed.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(trim_nul(&self.0)).map_err(Into::into)
    }

    /// Converts the blob to a String, trimming trailing nulls.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(trim_nul(&self.0)).into_owned()
    }
}

/// Copies a NUL-terminated C string, replacing invalid UTF-8. Null gives an
/// empty string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn string_from_ptr(ptr: *const std::ffi::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { std::ffi::CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| &bytes[..=i])
        .unwrap_or(&[])
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Blob(text.as_bytes().to_vec())
    }
}

impl From<String> for Blob {
    fn from(text: String) -> Self {
        Blob(text.into_bytes())
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob").field("len", &self.len()).finish()
    }
}
