//! Input/output signature parameter reflection

use super::DataType;
use crate::ComponentMask;
use xshade_sys::{
    D3D_REGISTER_COMPONENT_FLOAT16, D3D_REGISTER_COMPONENT_FLOAT32, D3D_REGISTER_COMPONENT_SINT16,
    D3D_REGISTER_COMPONENT_SINT32, D3D_REGISTER_COMPONENT_UINT16, D3D_REGISTER_COMPONENT_UINT32,
};

/// One element of an input, output or patch-constant signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureParameterDesc {
    /// Semantic without its index, e.g. `TEXCOORD`
    pub semantic: String,
    pub semantic_index: u32,
    /// Register, or `Location` for SPIR-V
    pub location: u32,
    pub component_type: DataType,
    pub mask: ComponentMask,
}

impl SignatureParameterDesc {
    /// The semantic as written in HLSL, e.g. `TEXCOORD3`
    ///
    /// Index 0 is left implicit.
    pub fn full_semantic(&self) -> String {
        if self.semantic_index == 0 {
            self.semantic.clone()
        } else {
            format!("{}{}", self.semantic, self.semantic_index)
        }
    }
}

/// Splits trailing decimal digits off a semantic.
///
/// `TEXCOORD3` gives `("TEXCOORD", 3)` and `COLOR` gives `("COLOR", 0)`. A
/// name made only of digits has no semantic.
pub fn split_semantic(name: &str) -> (&str, u32) {
    let digits = name.bytes().rev().take_while(|b| b.is_ascii_digit()).count();
    if digits == name.len() {
        return ("", 0);
    }
    let (semantic, index) = name.split_at(name.len() - digits);
    (semantic, index.parse().unwrap_or(0))
}

/// Maps a `D3D_REGISTER_COMPONENT_TYPE`.
///
/// # Panics
/// On `UNKNOWN` or any value this crate does not know.
pub(crate) fn component_type_from_d3d(ty: u32) -> DataType {
    match ty {
        D3D_REGISTER_COMPONENT_UINT32 => DataType::Uint,
        D3D_REGISTER_COMPONENT_SINT32 => DataType::Int,
        D3D_REGISTER_COMPONENT_FLOAT32 => DataType::Float,
        D3D_REGISTER_COMPONENT_UINT16 => DataType::Uint16,
        D3D_REGISTER_COMPONENT_SINT16 => DataType::Int16,
        D3D_REGISTER_COMPONENT_FLOAT16 => DataType::Half,
        _ => panic!("unsupported D3D register component type {ty}"),
    }
}
