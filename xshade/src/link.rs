//! Inputs for linking DXIL libraries and for disassembly

use crate::{Blob, ShaderStage, ShadingLanguage};

/// A DXIL library compiled with [`TargetDesc::as_module`](crate::TargetDesc::as_module)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDesc {
    /// Name the linker registers the library under
    pub name: String,
    pub target: Blob,
}

impl ModuleDesc {
    pub fn new(name: impl Into<String>, target: impl Into<Blob>) -> Self {
        ModuleDesc {
            name: name.into(),
            target: target.into(),
        }
    }
}

/// Libraries to link into one entry point
#[derive(Debug, Clone)]
pub struct LinkDesc<'a> {
    pub entry_point: String,
    pub stage: ShaderStage,
    pub modules: &'a [&'a ModuleDesc],
}

impl<'a> LinkDesc<'a> {
    pub fn new(entry_point: impl Into<String>, stage: ShaderStage, modules: &'a [&'a ModuleDesc]) -> Self {
        LinkDesc {
            entry_point: entry_point.into(),
            stage,
            modules,
        }
    }
}

/// A binary to turn back into text
#[derive(Debug, Clone, Copy)]
pub struct DisassembleDesc<'a> {
    /// [`ShadingLanguage::Dxil`] or [`ShadingLanguage::SpirV`]
    pub language: ShadingLanguage,
    pub binary: &'a [u8],
}

impl<'a> DisassembleDesc<'a> {
    pub fn new(language: ShadingLanguage, binary: &'a [u8]) -> Self {
        DisassembleDesc { language, binary }
    }
}
