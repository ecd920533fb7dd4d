//! Compile inputs: source description and compile-wide options

use crate::include::IncludeLoader;
use crate::{OptimizationLevel, ShaderModel, ShaderStage};
use std::fmt;
use std::sync::Arc;

/// A preprocessor macro definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroDefine {
    pub name: String,
    /// `None` defines the macro without a value
    pub value: Option<String>,
}

impl MacroDefine {
    /// Creates a define with a value
    ///
    /// # Example
    /// ```
    /// use xshade::MacroDefine;
    /// let define = MacroDefine::new("DEBUG", "1");
    /// assert_eq!(define.to_string(), "DEBUG=1");
    /// ```
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        MacroDefine {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a define without a value
    pub fn flag(name: impl Into<String>) -> Self {
        MacroDefine {
            name: name.into(),
            value: None,
        }
    }
}

impl fmt::Display for MacroDefine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// Per-call input: the HLSL source and how to enter it
///
/// # Example
/// ```
/// use xshade::{ShaderStage, SourceDesc};
///
/// let source = SourceDesc::new("float4 main() : SV_Target { return 1; }", ShaderStage::Pixel)
///     .file_name("solid.hlsl")
///     .define("USE_RED", "1")
///     .define_flag("FAST_PATH");
/// assert_eq!(source.entry_point(), "main");
/// ```
#[derive(Clone)]
pub struct SourceDesc {
    pub source: String,
    pub file_name: String,
    entry_point: String,
    pub stage: ShaderStage,
    pub defines: Vec<MacroDefine>,
    pub loader: Option<Arc<dyn IncludeLoader>>,
}

impl SourceDesc {
    pub fn new(source: impl Into<String>, stage: ShaderStage) -> Self {
        SourceDesc {
            source: source.into(),
            file_name: String::new(),
            entry_point: String::new(),
            stage,
            defines: Vec::new(),
            loader: None,
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn with_entry_point(mut self, entry: impl Into<String>) -> Self {
        self.entry_point = entry.into();
        self
    }

    /// The entry point, `"main"` when none was set
    pub fn entry_point(&self) -> &str {
        if self.entry_point.is_empty() {
            "main"
        } else {
            &self.entry_point
        }
    }

    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push(MacroDefine::new(name, value));
        self
    }

    pub fn define_flag(mut self, name: impl Into<String>) -> Self {
        self.defines.push(MacroDefine::flag(name));
        self
    }

    pub fn with_define(mut self, define: MacroDefine) -> Self {
        self.defines.push(define);
        self
    }

    /// Resolves `#include` through `loader` instead of the file system.
    pub fn include_loader(mut self, loader: impl IncludeLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }
}

impl fmt::Debug for SourceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDesc")
            .field("file_name", &self.file_name)
            .field("entry_point", &self.entry_point())
            .field("stage", &self.stage)
            .field("defines", &self.defines)
            .field("source_len", &self.source.len())
            .field("custom_loader", &self.loader.is_some())
            .finish()
    }
}

/// Compile-wide configuration shared by every target of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub pack_matrices_in_row_major: bool,
    /// Requires shader model 6.2 or up
    pub enable_16bit_types: bool,
    pub enable_debug_info: bool,
    pub disable_optimizations: bool,
    pub optimization_level: OptimizationLevel,
    pub shader_model: ShaderModel,
    /// Combined samplers take set/binding from their image, when it has them
    pub inherit_combined_sampler_bindings: bool,
    // Binding shifts for SPIR-V, applied only when positive
    pub shift_all_textures_bindings: i32,
    pub shift_all_samplers_bindings: i32,
    pub shift_all_cbuffers_bindings: i32,
    pub shift_all_ua_buffers_bindings: i32,
    pub need_reflection: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            pack_matrices_in_row_major: true,
            enable_16bit_types: false,
            enable_debug_info: false,
            disable_optimizations: false,
            optimization_level: OptimizationLevel::O3,
            shader_model: ShaderModel::SM6_0,
            inherit_combined_sampler_bindings: false,
            shift_all_textures_bindings: 0,
            shift_all_samplers_bindings: 0,
            shift_all_cbuffers_bindings: 0,
            shift_all_ua_buffers_bindings: 0,
            need_reflection: false,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column_major(mut self) -> Self {
        self.pack_matrices_in_row_major = false;
        self
    }

    pub fn half_types(mut self) -> Self {
        self.enable_16bit_types = true;
        self
    }

    pub fn debug_info(mut self) -> Self {
        self.enable_debug_info = true;
        self
    }

    pub fn skip_optimization(mut self) -> Self {
        self.disable_optimizations = true;
        self
    }

    pub fn optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn shader_model(mut self, model: ShaderModel) -> Self {
        self.shader_model = model;
        self
    }

    pub fn inherit_combined_sampler_bindings(mut self) -> Self {
        self.inherit_combined_sampler_bindings = true;
        self
    }

    /// Sets the texture, sampler, cbuffer and UAV binding shifts, in that order.
    pub fn binding_shifts(mut self, textures: i32, samplers: i32, cbuffers: i32, uavs: i32) -> Self {
        self.shift_all_textures_bindings = textures;
        self.shift_all_samplers_bindings = samplers;
        self.shift_all_cbuffers_bindings = cbuffers;
        self.shift_all_ua_buffers_bindings = uavs;
        self
    }

    pub fn reflection(mut self) -> Self {
        self.need_reflection = true;
        self
    }
}
