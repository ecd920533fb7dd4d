//! Constant buffer reflection

use super::VariableDesc;

/// A constant buffer (`cbuffer` or uniform block) and its variables
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstantBuffer {
    pub name: String,
    /// Total size in bytes
    pub size: u32,
    /// Variables in declaration order
    pub variables: Vec<VariableDesc>,
}

impl ConstantBuffer {
    pub fn variable(&self, index: usize) -> Option<&VariableDesc> {
        self.variables.get(index)
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&VariableDesc> {
        self.variables.iter().find(|v| v.name == name)
    }
}
