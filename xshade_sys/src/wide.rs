//! NUL-terminated `wchar_t` strings for DXC arguments
//!
//! DXC takes `LPCWSTR` everywhere. `wchar_t` is UTF-16 on Windows and
//! UTF-32 elsewhere, so strings are encoded per platform and kept in a
//! [`WideArena`] until the native call returns.

use crate::LPCWSTR;
use libc::wchar_t;

/// Index of a string interned in a [`WideArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideId(usize);

/// Owns every wide string a single native call needs.
///
/// Strings are addressed by [`WideId`]; pointers are taken only right before
/// handing them to DXC and are valid while the arena is alive.
#[derive(Debug, Default)]
pub struct WideArena {
    strings: Vec<Vec<wchar_t>>,
}

impl WideArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, s: &str) -> WideId {
        self.strings.push(encode(s));
        WideId(self.strings.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn ptr(&self, id: WideId) -> LPCWSTR {
        self.strings[id.0].as_ptr()
    }

    pub fn ptrs(&self, ids: &[WideId]) -> Vec<LPCWSTR> {
        ids.iter().map(|&id| self.ptr(id)).collect()
    }

    /// Decodes a string back, mainly for logging.
    pub fn get(&self, id: WideId) -> String {
        let units = &self.strings[id.0];
        decode_units(&units[..units.len() - 1]).unwrap_or_default()
    }
}

#[cfg(windows)]
pub fn encode(s: &str) -> Vec<wchar_t> {
    s.encode_utf16().chain(Some(0)).collect()
}

#[cfg(not(windows))]
pub fn encode(s: &str) -> Vec<wchar_t> {
    s.chars().map(|c| c as u32 as wchar_t).chain(Some(0)).collect()
}

#[cfg(windows)]
fn decode_units(units: &[wchar_t]) -> Option<String> {
    String::from_utf16(units).ok()
}

#[cfg(not(windows))]
fn decode_units(units: &[wchar_t]) -> Option<String> {
    units.iter().map(|&u| char::from_u32(u as u32)).collect()
}

/// Reads a NUL-terminated wide string. Returns `None` for null pointers and
/// invalid code points.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated `wchar_t` buffer.
pub unsafe fn decode(ptr: LPCWSTR) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        decode_units(std::slice::from_raw_parts(ptr, len))
    }
}
