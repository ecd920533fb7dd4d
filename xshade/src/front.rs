//! Stage 1: HLSL to DXIL or SPIR-V through DXC

use crate::com::{ComPtr, copy_blob};
use crate::include::{self, FileSystemInclude, IncludeLoader};
use crate::native::Dxcompiler;
use crate::reflect::dxil::DxilReflector;
use crate::{
    CompileOptions, Error, HResult, LinkDesc, Reflection, Result, ResultDesc, ShaderModel,
    ShaderStage, ShadingLanguage, SourceDesc, TargetDesc,
};
use std::ptr;
use tracing::debug;
use xshade_sys::include::IncludeHandlerRef;
use xshade_sys::wide::{WideArena, WideId};
use xshade_sys::{DxcDefine, HRESULT, IDxcBlob, IDxcBlobEncoding, IDxcOperationResult, SUCCEEDED};

/// Binary stage 1 produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BinaryKind {
    Dxil,
    /// DXIL library for linking
    DxilModule,
    SpirV,
}

impl BinaryKind {
    /// The binary a target is converted from.
    ///
    /// # Panics
    /// On a SPIR-V target compiled as a module.
    pub fn for_target(target: &TargetDesc) -> Self {
        match target.language {
            ShadingLanguage::Dxil if target.as_module => BinaryKind::DxilModule,
            ShadingLanguage::Dxil => BinaryKind::Dxil,
            ShadingLanguage::SpirV if target.as_module => {
                panic!("SPIR-V targets cannot be compiled as a module")
            }
            _ => BinaryKind::SpirV,
        }
    }
}

/// DXC target profile, e.g. `ps_6_0` or `lib_6_3`
pub(crate) fn profile(stage: ShaderStage, model: ShaderModel, kind: BinaryKind) -> String {
    match kind {
        BinaryKind::DxilModule => format!("lib_{model}"),
        BinaryKind::Dxil | BinaryKind::SpirV => format!("{}_{model}", stage.prefix()),
    }
}

/// DXC command-line arguments for `options`.
///
/// Pure, so option errors surface before anything native runs.
pub(crate) fn build_arguments(options: &CompileOptions, kind: BinaryKind) -> Result<Vec<String>> {
    let mut args = Vec::new();

    args.push(if options.pack_matrices_in_row_major { "-Zpr" } else { "-Zpc" }.to_string());

    if options.enable_16bit_types {
        if options.shader_model < ShaderModel::SM6_2 {
            return Err(Error::InvalidParameter(
                "16-bit types requires shader model 6.2 or up.".to_string(),
            ));
        }
        args.push("-enable-16bit-types".to_string());
    }

    if options.enable_debug_info {
        args.push("-Zi".to_string());
    }

    if options.disable_optimizations {
        args.push("-Od".to_string());
    } else {
        args.push(format!("-O{}", options.optimization_level as u8));
    }

    for (flag, shift) in [
        ("-fvk-t-shift", options.shift_all_textures_bindings),
        ("-fvk-s-shift", options.shift_all_samplers_bindings),
        ("-fvk-b-shift", options.shift_all_cbuffers_bindings),
        ("-fvk-u-shift", options.shift_all_ua_buffers_bindings),
    ] {
        if shift > 0 {
            args.extend([flag.to_string(), shift.to_string(), "all".to_string()]);
        }
    }

    if kind == BinaryKind::SpirV {
        args.push("-spirv".to_string());
    }

    Ok(args)
}

/// DXC refuses blobs shorter than one word.
pub(crate) fn check_source(source: &SourceDesc) -> Result<()> {
    if source.source.len() < 4 {
        return Err(Error::InvalidParameter(format!(
            "source of {} bytes is too short to compile",
            source.source.len()
        )));
    }
    Ok(())
}

/// An array length as the `UINT32` count DXC takes.
pub(crate) fn count_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::InvalidParameter(format!("{len} {what} is too many for DXC")))
}

/// The HLSL compiler stage 1 runs on
pub(crate) trait FrontEnd {
    fn compile(
        &self,
        source: &SourceDesc,
        options: &CompileOptions,
        kind: BinaryKind,
    ) -> Result<ResultDesc>;

    fn link_support(&self) -> bool;

    /// Links registered libraries into one entry point for `profile`.
    fn link(&self, desc: &LinkDesc<'_>, profile: &str) -> Result<ResultDesc>;

    fn disassemble(&self, dxil: &[u8]) -> Result<ResultDesc>;
}

/// Status, diagnostics and program of a finished DXC operation
fn read_operation_result(operation: &IDxcOperationResult) -> Result<ResultDesc> {
    let mut status: HRESULT = 0;
    HResult::check(
        unsafe { operation.get_status(&mut status) },
        "IDxcOperationResult::GetStatus",
    )?;

    let mut result = ResultDesc {
        has_error: true,
        ..Default::default()
    };

    let mut errors: *mut IDxcBlobEncoding = ptr::null_mut();
    HResult::check(
        unsafe { operation.get_error_buffer(&mut errors) },
        "IDxcOperationResult::GetErrorBuffer",
    )?;
    if let Some(errors) = unsafe { ComPtr::from_raw(errors) } {
        result.diagnostics = copy_blob(&errors).trim_trailing_nul();
    }

    if SUCCEEDED(status) {
        let mut program: *mut IDxcBlob = ptr::null_mut();
        HResult::check(
            unsafe { operation.get_result(&mut program) },
            "IDxcOperationResult::GetResult",
        )?;
        if let Some(program) = unsafe { ComPtr::from_raw(program) } {
            result.target = copy_blob(&program);
            result.has_error = false;
        }
    }

    debug!(
        status = %HResult(status),
        size = result.target.len(),
        diagnostics = result.diagnostics.len(),
        "DXC operation finished"
    );
    Ok(result)
}

impl FrontEnd for Dxcompiler {
    fn compile(
        &self,
        source: &SourceDesc,
        options: &CompileOptions,
        kind: BinaryKind,
    ) -> Result<ResultDesc> {
        let arguments = build_arguments(options, kind)?;
        let profile = profile(source.stage, options.shader_model, kind);
        debug!(
            file = %source.file_name,
            entry = source.entry_point(),
            profile = %profile,
            args = ?arguments,
            "compiling HLSL"
        );

        check_source(source)?;
        let blob = self.create_blob(source.source.as_bytes())?;

        let mut arena = WideArena::new();
        let name = arena.push(&source.file_name);
        let entry = arena.push(source.entry_point());
        let profile = arena.push(&profile);
        let args: Vec<WideId> = arguments.iter().map(|arg| arena.push(arg)).collect();
        let mut defines: Vec<(WideId, Option<WideId>)> = Vec::with_capacity(source.defines.len());
        for define in &source.defines {
            let name = arena.push(&define.name);
            let value = define.value.as_deref().map(|value| arena.push(value));
            defines.push((name, value));
        }

        let fallback = FileSystemInclude::new();
        let loader: &dyn IncludeLoader = match &source.loader {
            Some(loader) => loader.as_ref(),
            None => &fallback,
        };
        let callback = include::callback(loader);
        let handler = unsafe { IncludeHandlerRef::new(self.library().as_ptr(), &callback) };

        let arg_ptrs = arena.ptrs(&args);
        let arg_count = count_u32(arg_ptrs.len(), "arguments")?;
        let dxc_defines: Vec<DxcDefine> = defines
            .iter()
            .map(|&(name, value)| DxcDefine {
                Name: arena.ptr(name),
                Value: value.map_or(ptr::null(), |value| arena.ptr(value)),
            })
            .collect();
        let define_count = count_u32(dxc_defines.len(), "defines")?;

        let operation = unsafe {
            ComPtr::from_out_param("IDxcCompiler::Compile", |out| {
                self.compiler().compile(
                    blob.as_ptr().cast::<IDxcBlob>(),
                    arena.ptr(name),
                    arena.ptr(entry),
                    arena.ptr(profile),
                    arg_ptrs.as_ptr(),
                    arg_count,
                    dxc_defines.as_ptr(),
                    define_count,
                    handler.as_raw(),
                    out,
                )
            })
        }?;

        let mut result = read_operation_result(&operation)?;
        if options.need_reflection && kind == BinaryKind::Dxil && !result.has_error {
            result.reflection = Reflection::build(&DxilReflector {
                dxc: self,
                container: &result.target,
            });
        }
        Ok(result)
    }

    fn link_support(&self) -> bool {
        Dxcompiler::link_support(self)
    }

    fn link(&self, desc: &LinkDesc<'_>, profile: &str) -> Result<ResultDesc> {
        let linker = self.create_linker()?;
        debug!(entry = %desc.entry_point, profile, modules = desc.modules.len(), "linking DXIL");

        let mut arena = WideArena::new();
        let mut names = Vec::with_capacity(desc.modules.len());
        // Registered blobs must outlive the Link call.
        let mut blobs = Vec::with_capacity(desc.modules.len());
        for module in desc.modules {
            let blob = self.create_blob(&module.target)?;
            let name = arena.push(&module.name);
            HResult::check(
                unsafe {
                    linker.register_library(arena.ptr(name), blob.as_ptr().cast::<IDxcBlob>())
                },
                "IDxcLinker::RegisterLibrary",
            )?;
            names.push(name);
            blobs.push(blob);
        }

        let entry = arena.push(&desc.entry_point);
        let profile = arena.push(profile);
        let name_ptrs = arena.ptrs(&names);
        let name_count = count_u32(name_ptrs.len(), "modules")?;
        let operation = unsafe {
            ComPtr::from_out_param("IDxcLinker::Link", |out| {
                linker.link(
                    arena.ptr(entry),
                    arena.ptr(profile),
                    name_ptrs.as_ptr(),
                    name_count,
                    ptr::null(),
                    0,
                    out,
                )
            })
        }?;
        read_operation_result(&operation)
    }

    fn disassemble(&self, dxil: &[u8]) -> Result<ResultDesc> {
        let blob = self.create_blob(dxil)?;
        let mut result = ResultDesc {
            is_text: true,
            has_error: true,
            ..Default::default()
        };

        let mut text: *mut IDxcBlobEncoding = ptr::null_mut();
        let hr = unsafe {
            self.compiler()
                .disassemble(blob.as_ptr().cast::<IDxcBlob>(), &mut text)
        };
        if let Err(e) = HResult::check(hr, "IDxcCompiler::Disassemble") {
            result.append_error(&e.to_string());
            return Ok(result);
        }
        if let Some(text) = unsafe { ComPtr::from_raw(text) } {
            result.target = copy_blob(&text).trim_trailing_nul();
            result.has_error = false;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptimizationLevel;
    use pretty_assertions::assert_eq;

    fn args(options: &CompileOptions, kind: BinaryKind) -> Vec<String> {
        build_arguments(options, kind).unwrap()
    }

    #[test]
    fn test_default_arguments() {
        assert_eq!(args(&CompileOptions::default(), BinaryKind::Dxil), ["-Zpr", "-O3"]);
        assert_eq!(
            args(&CompileOptions::default(), BinaryKind::SpirV),
            ["-Zpr", "-O3", "-spirv"]
        );
    }

    #[test]
    fn test_full_arguments() {
        let options = CompileOptions::default()
            .column_major()
            .shader_model(ShaderModel::SM6_2)
            .half_types()
            .debug_info()
            .skip_optimization()
            .binding_shifts(1, 2, 3, 4);
        assert_eq!(
            args(&options, BinaryKind::SpirV),
            [
                "-Zpc",
                "-enable-16bit-types",
                "-Zi",
                "-Od",
                "-fvk-t-shift", "1", "all",
                "-fvk-s-shift", "2", "all",
                "-fvk-b-shift", "3", "all",
                "-fvk-u-shift", "4", "all",
                "-spirv",
            ]
        );
    }

    #[test]
    fn test_only_positive_shifts_apply() {
        let options = CompileOptions::default()
            .optimization_level(OptimizationLevel::O1)
            .binding_shifts(0, -5, 8, 0);
        assert_eq!(
            args(&options, BinaryKind::Dxil),
            ["-Zpr", "-O1", "-fvk-b-shift", "8", "all"]
        );
    }

    #[test]
    fn test_half_types_need_sm_6_2() {
        let options = CompileOptions::default().half_types();
        let err = build_arguments(&options, BinaryKind::Dxil).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter: 16-bit types requires shader model 6.2 or up."
        );
    }

    #[test]
    fn test_profiles() {
        let sm = ShaderModel::new(6, 3).unwrap();
        assert_eq!(profile(ShaderStage::Pixel, sm, BinaryKind::Dxil), "ps_6_3");
        assert_eq!(profile(ShaderStage::Compute, sm, BinaryKind::SpirV), "cs_6_3");
        assert_eq!(profile(ShaderStage::Vertex, sm, BinaryKind::DxilModule), "lib_6_3");
    }

    #[test]
    fn test_binary_kind() {
        let dxil = TargetDesc::new(ShadingLanguage::Dxil);
        assert_eq!(BinaryKind::for_target(&dxil), BinaryKind::Dxil);
        assert_eq!(BinaryKind::for_target(&dxil.as_module()), BinaryKind::DxilModule);
        assert_eq!(
            BinaryKind::for_target(&TargetDesc::new(ShadingLanguage::MslIos)),
            BinaryKind::SpirV
        );
    }

    #[test]
    #[should_panic(expected = "SPIR-V targets cannot be compiled as a module")]
    fn test_spirv_module_panics() {
        BinaryKind::for_target(&TargetDesc::new(ShadingLanguage::SpirV).as_module());
    }

    #[test]
    fn test_check_source() {
        let short = SourceDesc::new("x", ShaderStage::Vertex);
        assert!(matches!(check_source(&short), Err(Error::InvalidParameter(_))));
        let ok = SourceDesc::new("void main() {}", ShaderStage::Vertex);
        assert!(check_source(&ok).is_ok());
    }

    #[test]
    fn test_count_u32() {
        assert_eq!(count_u32(7, "arguments").unwrap(), 7);
        assert_eq!(count_u32(u32::MAX as usize, "arguments").unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            count_u32(u32::MAX as usize + 1, "modules"),
            Err(Error::InvalidParameter(message)) if message.contains("modules")
        ));
    }
}
