//! Per-target compile output

use crate::{Blob, Reflection};

/// Output of one target: the payload, diagnostics and optional reflection
///
/// A failed compile is still a `ResultDesc`: `has_error` is set and the
/// compiler's messages are in `diagnostics`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultDesc {
    /// Binary or source text, empty on error
    pub target: Blob,
    /// True when `target` is source text rather than a binary
    pub is_text: bool,
    /// Errors and warnings, possibly empty even on success
    pub diagnostics: Blob,
    pub has_error: bool,
    pub reflection: Reflection,
}

impl ResultDesc {
    /// Adds a message after any existing diagnostics and marks the result
    /// as failed.
    pub(crate) fn append_error(&mut self, message: &str) {
        if !self.diagnostics.is_empty() && !message.is_empty() {
            self.diagnostics.extend_from_slice(b"\n");
        }
        self.diagnostics.extend_from_slice(message.as_bytes());
        self.has_error = true;
    }

    /// Diagnostics as text
    pub fn diagnostics_text(&self) -> String {
        self.diagnostics.to_string_lossy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_error_joins_with_newline() {
        let mut result = ResultDesc {
            diagnostics: Blob::from("warning: implicit truncation"),
            ..Default::default()
        };
        result.append_error("MSL doesn't have GS.");
        assert!(result.has_error);
        assert_eq!(
            result.diagnostics_text(),
            "warning: implicit truncation\nMSL doesn't have GS."
        );
    }

    #[test]
    fn test_append_error_to_empty() {
        let mut result = ResultDesc::default();
        result.append_error("GS, HS, and DS has not been supported yet.");
        assert_eq!(
            result.diagnostics.as_str().unwrap(),
            "GS, HS, and DS has not been supported yet."
        );
        assert!(result.target.is_empty());
    }
}
