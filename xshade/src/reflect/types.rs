//! Variable type reflection

use super::VariableDesc;
use std::fmt;
use xshade_sys::{
    D3D_SVC_STRUCT, D3D_SVT_BOOL, D3D_SVT_FLOAT, D3D_SVT_FLOAT16, D3D_SVT_INT, D3D_SVT_INT16,
    D3D_SVT_MIN16FLOAT, D3D_SVT_MIN16INT, D3D_SVT_MIN16UINT, D3D_SVT_UINT, D3D_SVT_UINT16,
    D3D_SVT_VOID,
};

/// Scalar type of a variable, or `Struct` for aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Void,
    Bool,
    Int,
    Uint,
    Float,
    Half,
    Int16,
    Uint16,
    Struct,
}

impl DataType {
    /// Maps a `D3D_SHADER_VARIABLE_TYPE` and class.
    ///
    /// # Panics
    /// On a type this crate does not reflect, such as textures inside a
    /// constant buffer.
    pub(crate) fn from_d3d(ty: u32, class: u32) -> Self {
        match ty {
            D3D_SVT_BOOL => DataType::Bool,
            D3D_SVT_INT => DataType::Int,
            D3D_SVT_UINT => DataType::Uint,
            D3D_SVT_FLOAT => DataType::Float,
            D3D_SVT_MIN16FLOAT | D3D_SVT_FLOAT16 => DataType::Half,
            D3D_SVT_MIN16INT | D3D_SVT_INT16 => DataType::Int16,
            D3D_SVT_MIN16UINT | D3D_SVT_UINT16 => DataType::Uint16,
            D3D_SVT_VOID if class == D3D_SVC_STRUCT => DataType::Struct,
            D3D_SVT_VOID => DataType::Void,
            _ => panic!("unsupported D3D shader variable type {ty}"),
        }
    }

    /// HLSL spelling of the scalar, empty for `Struct`
    pub fn hlsl_name(&self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Uint => "uint",
            DataType::Float => "float",
            DataType::Half => "half",
            DataType::Int16 => "int16_t",
            DataType::Uint16 => "uint16_t",
            DataType::Struct => "",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Struct => f.write_str("struct"),
            other => f.write_str(other.hlsl_name()),
        }
    }
}

/// Type of a constant-buffer variable or struct member
///
/// Structs own their members, so a type is a tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableType {
    /// Type name, e.g. `float4x4` or the struct's name
    pub name: String,
    pub data_type: DataType,
    /// Matrix rows, 1 for scalars and vectors
    pub rows: u32,
    /// Vector or matrix width
    pub columns: u32,
    /// Array length, 0 when not an array
    pub elements: u32,
    /// Bytes between array elements, 0 when not an array
    pub element_stride: u32,
    /// Struct members in declaration order
    pub members: Vec<VariableDesc>,
}

impl VariableType {
    pub fn is_struct(&self) -> bool {
        self.data_type == DataType::Struct
    }

    pub fn is_array(&self) -> bool {
        self.elements > 0
    }

    /// Finds a struct member by name.
    pub fn member(&self, name: &str) -> Option<&VariableDesc> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_d3d() {
        assert_eq!(DataType::from_d3d(D3D_SVT_FLOAT, 1), DataType::Float);
        assert_eq!(DataType::from_d3d(D3D_SVT_MIN16FLOAT, 0), DataType::Half);
        assert_eq!(DataType::from_d3d(D3D_SVT_UINT16, 0), DataType::Uint16);
        assert_eq!(DataType::from_d3d(D3D_SVT_VOID, D3D_SVC_STRUCT), DataType::Struct);
        assert_eq!(DataType::from_d3d(D3D_SVT_VOID, 0), DataType::Void);
    }

    #[test]
    #[should_panic(expected = "unsupported D3D shader variable type")]
    fn test_texture_type_panics() {
        // D3D_SVT_TEXTURE2D
        DataType::from_d3d(7, 4);
    }

    #[test]
    fn test_member_lookup() {
        let ty = VariableType {
            name: "Light".to_string(),
            data_type: DataType::Struct,
            members: vec![VariableDesc {
                name: "color".to_string(),
                ty: VariableType {
                    name: "float3".to_string(),
                    data_type: DataType::Float,
                    rows: 1,
                    columns: 3,
                    ..Default::default()
                },
                offset: 0,
                size: 12,
            }],
            ..Default::default()
        };
        assert!(ty.is_struct());
        assert!(!ty.is_array());
        assert_eq!(ty.member("color").unwrap().size, 12);
        assert!(ty.member("intensity").is_none());
        assert_eq!(DataType::Int16.to_string(), "int16_t");
    }
}
