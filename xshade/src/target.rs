//! Shader stages, shader models and output languages

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage of the entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Pixel (fragment) shader
    Pixel,
    /// Geometry shader
    Geometry,
    /// Hull (tessellation control) shader
    Hull,
    /// Domain (tessellation evaluation) shader
    Domain,
    /// Compute shader
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Compute,
    ];

    /// Returns the profile prefix (vs, ps, gs, hs, ds, cs)
    pub fn prefix(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Geometry => "gs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
            ShaderStage::Compute => "cs",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for ShaderStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ShaderStage::ALL
            .into_iter()
            .find(|stage| stage.prefix() == s)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown shader stage '{s}'")))
    }
}

/// HLSL shader model used for the stage-1 profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModel {
    major: u8,
    minor: u8,
}

impl ShaderModel {
    pub const SM6_0: ShaderModel = ShaderModel { major: 6, minor: 0 };
    pub const SM6_2: ShaderModel = ShaderModel { major: 6, minor: 2 };

    /// Creates a shader model. The major version is 6 bits and the minor 2.
    pub fn new(major: u8, minor: u8) -> Result<Self> {
        if major > 63 || minor > 3 {
            return Err(Error::InvalidParameter(format!(
                "shader model {major}.{minor} is out of range"
            )));
        }
        Ok(ShaderModel { major, minor })
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// Major and minor packed as `major << 2 | minor`
    pub fn full_version(&self) -> u32 {
        ((self.major as u32) << 2) | self.minor as u32
    }
}

impl Default for ShaderModel {
    fn default() -> Self {
        ShaderModel::SM6_0
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.major, self.minor)
    }
}

/// Output language of a compile target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingLanguage {
    Dxil,
    SpirV,
    Hlsl,
    Glsl,
    Essl,
    MslMacOs,
    MslIos,
}

impl ShadingLanguage {
    pub const ALL: [ShadingLanguage; 7] = [
        ShadingLanguage::Dxil,
        ShadingLanguage::SpirV,
        ShadingLanguage::Hlsl,
        ShadingLanguage::Glsl,
        ShadingLanguage::Essl,
        ShadingLanguage::MslMacOs,
        ShadingLanguage::MslIos,
    ];

    /// Returns the conventional file extension for this output
    pub fn extension(&self) -> &'static str {
        match self {
            ShadingLanguage::Dxil => "dxil",
            ShadingLanguage::SpirV => "spv",
            ShadingLanguage::Hlsl => "hlsl",
            ShadingLanguage::Glsl => "glsl",
            ShadingLanguage::Essl => "essl",
            ShadingLanguage::MslMacOs | ShadingLanguage::MslIos => "msl",
        }
    }

    /// DXIL and SPIR-V come straight out of stage 1; the rest are text.
    pub fn is_binary(&self) -> bool {
        matches!(self, ShadingLanguage::Dxil | ShadingLanguage::SpirV)
    }

    pub fn is_msl(&self) -> bool {
        matches!(self, ShadingLanguage::MslMacOs | ShadingLanguage::MslIos)
    }

    fn name(&self) -> &'static str {
        match self {
            ShadingLanguage::Dxil => "dxil",
            ShadingLanguage::SpirV => "spirv",
            ShadingLanguage::Hlsl => "hlsl",
            ShadingLanguage::Glsl => "glsl",
            ShadingLanguage::Essl => "essl",
            ShadingLanguage::MslMacOs => "msl_macos",
            ShadingLanguage::MslIos => "msl_ios",
        }
    }
}

impl fmt::Display for ShadingLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShadingLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ShadingLanguage::ALL
            .into_iter()
            .find(|lang| lang.name() == s)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown shading language '{s}'")))
    }
}

/// Stage-1 optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum OptimizationLevel {
    O0 = 0,
    O1 = 1,
    O2 = 2,
    #[default]
    O3 = 3,
}

impl TryFrom<u8> for OptimizationLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OptimizationLevel::O0),
            1 => Ok(OptimizationLevel::O1),
            2 => Ok(OptimizationLevel::O2),
            3 => Ok(OptimizationLevel::O3),
            _ => Err(Error::InvalidParameter(format!(
                "optimization level {value} is out of range 0..=3"
            ))),
        }
    }
}

/// One requested output
///
/// # Example
/// ```
/// use xshade::{ShadingLanguage, TargetDesc};
///
/// let glsl = TargetDesc::new(ShadingLanguage::Glsl).version("450");
/// let library = TargetDesc::new(ShadingLanguage::Dxil).as_module();
/// assert_eq!(glsl.version.as_deref(), Some("450"));
/// assert!(library.as_module);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub language: ShadingLanguage,
    /// Target language version, e.g. "30" for HLSL SM3 or "450" for GLSL
    pub version: Option<String>,
    /// Compile as a DXIL library for linking. Only meaningful for DXIL.
    pub as_module: bool,
}

impl TargetDesc {
    pub fn new(language: ShadingLanguage) -> Self {
        TargetDesc {
            language,
            version: None,
            as_module: false,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn as_module(mut self) -> Self {
        self.as_module = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_strings() {
        assert_eq!(ShaderStage::Hull.prefix(), "hs");
        assert_eq!("cs".parse::<ShaderStage>().unwrap(), ShaderStage::Compute);
        assert!("fs".parse::<ShaderStage>().is_err());
    }

    #[test]
    fn test_shader_model_packing() {
        assert_eq!(ShaderModel::default().full_version(), 24);
        assert_eq!(ShaderModel::new(6, 2).unwrap().full_version(), 26);
        assert_eq!(ShaderModel::new(6, 2).unwrap(), ShaderModel::SM6_2);
        assert!(ShaderModel::new(64, 0).is_err());
        assert!(ShaderModel::new(6, 4).is_err());
        assert!(ShaderModel::new(5, 1).unwrap() < ShaderModel::SM6_0);
    }

    #[test]
    fn test_language_properties() {
        assert_eq!(ShadingLanguage::SpirV.extension(), "spv");
        assert_eq!(ShadingLanguage::MslIos.extension(), "msl");
        assert!(ShadingLanguage::Dxil.is_binary());
        assert!(!ShadingLanguage::Essl.is_binary());
        assert_eq!(
            "msl_macos".parse::<ShadingLanguage>().unwrap(),
            ShadingLanguage::MslMacOs
        );
        for lang in ShadingLanguage::ALL {
            assert_eq!(lang.to_string().parse::<ShadingLanguage>().unwrap(), lang);
        }
    }

    #[test]
    fn test_optimization_level() {
        assert_eq!(OptimizationLevel::default(), OptimizationLevel::O3);
        assert_eq!(OptimizationLevel::try_from(1).unwrap(), OptimizationLevel::O1);
        assert!(OptimizationLevel::try_from(4).is_err());
    }
}
