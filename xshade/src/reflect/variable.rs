//! Constant-buffer variables and struct members

use super::VariableType;

/// A named value at a byte offset: a constant-buffer variable or a struct
/// member
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableDesc {
    pub name: String,
    pub ty: VariableType,
    /// Byte offset from the start of the buffer or enclosing struct
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

impl VariableDesc {
    /// First byte past the variable
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Size of a D3D member: full 16-byte rows for every element but the last,
/// which only takes its declared components.
pub(crate) fn packed_member_size(rows: u32, columns: u32, elements: u32, stride: u32) -> u32 {
    let leading = if elements > 0 { (elements - 1) * stride } else { 0 };
    leading + rows * columns * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_member_size() {
        // float4x4
        assert_eq!(packed_member_size(4, 4, 0, 0), 64);
        // float2 values[3], stride one register
        assert_eq!(packed_member_size(1, 2, 3, 16), 40);
        // float scalar
        assert_eq!(packed_member_size(1, 1, 0, 0), 4);
    }

    #[test]
    fn test_end() {
        let var = VariableDesc {
            name: "tint".to_string(),
            offset: 64,
            size: 16,
            ..Default::default()
        };
        assert_eq!(var.end(), 80);
    }
}
