//! SPIR-V disassembly
//!
//! DXIL goes through the loaded dxcompiler; SPIR-V is parsed in Rust.

use crate::{Blob, ResultDesc};
use rspirv::binary::Disassemble;
use tracing::debug;

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Disassembles a SPIR-V module into text.
///
/// A malformed module is reported in the diagnostics.
pub(crate) fn disassemble_spirv(binary: &[u8]) -> ResultDesc {
    let mut result = ResultDesc {
        is_text: true,
        ..Default::default()
    };

    if binary.len() % 4 != 0 {
        result.append_error(&format!(
            "SPIR-V binary of {} bytes is not a whole number of words",
            binary.len()
        ));
        return result;
    }

    let words: Vec<u32> = binary
        .chunks_exact(4)
        .map(|word| u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
        .collect();

    match rspirv::dr::load_words(&words) {
        Ok(module) => {
            result.target = Blob::from(module.disassemble());
            debug!(words = words.len(), "disassembled SPIR-V");
        }
        Err(e) => result.append_error(&format!("invalid SPIR-V: {e:?}")),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rspirv::binary::Assemble;
    use rspirv::dr::Builder;
    use spirv::{AddressingModel, Capability, MemoryModel};

    fn to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_ne_bytes()).collect()
    }

    #[test]
    fn test_disassemble_module() {
        let mut builder = Builder::new();
        builder.capability(Capability::Shader);
        builder.memory_model(AddressingModel::Logical, MemoryModel::GLSL450);
        let words = builder.module().assemble();
        assert_eq!(words[0], SPIRV_MAGIC);

        let result = disassemble_spirv(&to_bytes(&words));
        assert!(!result.has_error, "{}", result.diagnostics_text());
        assert!(result.is_text);
        let text = result.target.to_string_lossy();
        assert!(text.contains("OpCapability Shader"), "{text}");
        assert!(text.contains("OpMemoryModel Logical GLSL450"), "{text}");
    }

    #[test]
    fn test_garbage_is_a_diagnostic() {
        let result = disassemble_spirv(&to_bytes(&[0xdead_beef, 1, 2, 3, 4]));
        assert!(result.has_error);
        assert!(result.target.is_empty());
        assert!(result.diagnostics_text().starts_with("invalid SPIR-V"));
    }

    #[test]
    fn test_partial_word() {
        let result = disassemble_spirv(&[0x03, 0x02, 0x23]);
        assert!(result.has_error);
        assert!(result.diagnostics_text().contains("3 bytes"));
    }
}
