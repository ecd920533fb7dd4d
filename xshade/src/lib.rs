//! HLSL cross-compilation through DXC and SPIRV-Cross
//!
//! Sources are compiled in two stages. DXC turns HLSL into DXIL or SPIR-V;
//! SPIRV-Cross then turns the SPIR-V into HLSL, GLSL, ESSL or MSL. Both
//! libraries are loaded at run time, so a missing one is an ordinary
//! [`Error`] rather than a link failure.
//!
//! # Example
//!
//! ```no_run
//! use xshade::{CompileOptions, Compiler, ShaderStage, ShadingLanguage, SourceDesc, TargetDesc};
//!
//! let source = SourceDesc::new(
//!     r#"
//!     Texture2D albedo : register(t0);
//!     SamplerState linearSampler : register(s0);
//!     float4 main(float2 uv : TEXCOORD0) : SV_Target {
//!         return albedo.Sample(linearSampler, uv);
//!     }
//!     "#,
//!     ShaderStage::Pixel,
//! )
//! .file_name("textured.hlsl");
//!
//! let compiler = Compiler::new()?;
//! let results = compiler.compile(
//!     &source,
//!     &CompileOptions::default(),
//!     &[
//!         TargetDesc::new(ShadingLanguage::Dxil),
//!         TargetDesc::new(ShadingLanguage::Essl).version("300"),
//!     ],
//! )?;
//!
//! let essl = &results[1];
//! if essl.has_error {
//!     eprintln!("{}", essl.diagnostics_text());
//! } else {
//!     println!("{}", essl.target.to_string_lossy());
//! }
//! # Ok::<(), xshade::Error>(())
//! ```

mod blob;
mod com;
mod compiler;
pub mod container;
mod cross;
mod disassemble;
mod error;
mod flags;
mod front;
mod include;
mod link;
mod native;
mod options;
pub mod reflect;
mod result;
mod spvc;
mod target;

pub use blob::Blob;
pub use compiler::Compiler;
pub use container::{Container, FourCC, Part};
pub use disassemble::SPIRV_MAGIC;
pub use error::{Error, HResult, Result};
pub use flags::ComponentMask;
pub use include::{FileSystemInclude, IncludeLoader, MemoryInclude};
pub use link::{DisassembleDesc, LinkDesc, ModuleDesc};
pub use native::{Dxcompiler, SpirvCross};
pub use options::{CompileOptions, MacroDefine, SourceDesc};
pub use reflect::Reflection;
pub use result::ResultDesc;
pub use target::{OptimizationLevel, ShaderModel, ShaderStage, ShadingLanguage, TargetDesc};

pub use xshade_sys::loader::{Loader, SystemLoader};
