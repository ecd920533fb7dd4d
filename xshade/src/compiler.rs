//! Multi-target compilation, linking and disassembly

use crate::cross::{self, LazySpirvCross, Transpiler, convert_binary};
use crate::disassemble::disassemble_spirv;
use crate::front::{self, BinaryKind, FrontEnd};
use crate::native::{Dxcompiler, SpirvCross};
use crate::{
    CompileOptions, DisassembleDesc, Error, LinkDesc, Result, ResultDesc, ShadingLanguage,
    SourceDesc, TargetDesc,
};
use tracing::{debug, info_span};

static LAZY_SPIRV_CROSS: LazySpirvCross = LazySpirvCross;

/// Compiles HLSL for any number of targets at once
///
/// Each distinct stage-1 binary (DXIL, DXIL library, SPIR-V) is compiled at
/// most once per call and shared by every target that needs it.
///
/// # Example
/// ```no_run
/// use xshade::{CompileOptions, Compiler, ShaderStage, ShadingLanguage, SourceDesc, TargetDesc};
///
/// let source = SourceDesc::new(
///     "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
///     ShaderStage::Vertex,
/// );
/// let targets = [
///     TargetDesc::new(ShadingLanguage::Dxil),
///     TargetDesc::new(ShadingLanguage::Glsl).version("450"),
///     TargetDesc::new(ShadingLanguage::MslMacOs),
/// ];
/// let results = Compiler::new()?.compile(&source, &CompileOptions::default(), &targets)?;
/// for (target, result) in targets.iter().zip(&results) {
///     if result.has_error {
///         eprintln!("{}: {}", target.language, result.diagnostics_text());
///     }
/// }
/// # Ok::<(), xshade::Error>(())
/// ```
pub struct Compiler<'a> {
    front: &'a dyn FrontEnd,
    transpiler: &'a dyn Transpiler,
}

impl Compiler<'static> {
    /// Uses the process-wide dxcompiler. SPIRV-Cross is loaded the first
    /// time a text target is requested.
    pub fn new() -> Result<Self> {
        Ok(Compiler {
            front: Dxcompiler::instance()?,
            transpiler: &LAZY_SPIRV_CROSS,
        })
    }
}

impl<'a> Compiler<'a> {
    /// Uses explicitly loaded libraries.
    pub fn with_libraries(dxc: &'a Dxcompiler, spirv_cross: &'a SpirvCross) -> Self {
        Compiler {
            front: dxc,
            transpiler: spirv_cross,
        }
    }

    pub(crate) fn with_backends(front: &'a dyn FrontEnd, transpiler: &'a dyn Transpiler) -> Self {
        Compiler { front, transpiler }
    }

    /// Compiles `source` once per distinct binary and converts it for each
    /// target, returning one result per target in order.
    ///
    /// Shader errors come back as results with `has_error` set. `Err` means
    /// the request itself is invalid or a library is missing, and is
    /// reported before anything is compiled.
    ///
    /// # Panics
    /// If a SPIR-V target is marked `as_module`.
    pub fn compile(
        &self,
        source: &SourceDesc,
        options: &CompileOptions,
        targets: &[TargetDesc],
    ) -> Result<Vec<ResultDesc>> {
        let _span = info_span!(
            "compile",
            file = %source.file_name,
            stage = %source.stage,
            targets = targets.len()
        )
        .entered();

        front::check_source(source)?;
        let kinds: Vec<BinaryKind> = targets.iter().map(BinaryKind::for_target).collect();
        for target in targets {
            cross::parse_version(target.version.as_deref())?;
        }
        if targets.iter().any(|t| !t.as_module && !t.language.is_binary()) {
            self.transpiler.ready()?;
        }

        let mut binaries: Vec<(BinaryKind, ResultDesc)> = Vec::with_capacity(3);
        for kind in [BinaryKind::Dxil, BinaryKind::DxilModule, BinaryKind::SpirV] {
            if kinds.contains(&kind) {
                // Validates the options before the first native call.
                front::build_arguments(options, kind)?;
            }
        }
        for kind in [BinaryKind::Dxil, BinaryKind::DxilModule, BinaryKind::SpirV] {
            if kinds.contains(&kind) {
                let binary = self.front.compile(source, options, kind)?;
                debug!(?kind, has_error = binary.has_error, "stage 1 finished");
                binaries.push((kind, binary));
            }
        }

        targets
            .iter()
            .zip(&kinds)
            .map(|(target, kind)| {
                let Some((_, binary)) = binaries.iter().find(|(k, _)| k == kind) else {
                    unreachable!("every target's binary was compiled");
                };
                convert_binary(
                    binary,
                    source.stage,
                    source.entry_point(),
                    options,
                    target,
                    self.transpiler,
                )
            })
            .collect()
    }

    /// [`compile`](Self::compile) for a single target
    pub fn compile_one(
        &self,
        source: &SourceDesc,
        options: &CompileOptions,
        target: &TargetDesc,
    ) -> Result<ResultDesc> {
        let mut results = self.compile(source, options, std::slice::from_ref(target))?;
        Ok(results.remove(0))
    }

    /// Whether [`link`](Self::link) can work with the loaded dxcompiler
    pub fn link_support(&self) -> bool {
        self.front.link_support()
    }

    /// Links DXIL libraries into one entry point.
    ///
    /// The profile comes from the stage and `options.shader_model`. Only
    /// DXIL targets are accepted.
    pub fn link(
        &self,
        desc: &LinkDesc<'_>,
        options: &CompileOptions,
        target: &TargetDesc,
    ) -> Result<ResultDesc> {
        let _span = info_span!(
            "link",
            entry = %desc.entry_point,
            stage = %desc.stage,
            modules = desc.modules.len()
        )
        .entered();

        if target.language != ShadingLanguage::Dxil {
            return Err(Error::InvalidParameter(format!(
                "linking produces DXIL, not {}",
                target.language
            )));
        }
        if !self.front.link_support() {
            return Err(Error::LinkUnsupported);
        }
        if let Some(module) = desc.modules.iter().find(|m| m.target.len() < 4) {
            return Err(Error::InvalidParameter(format!(
                "module '{}' is too short to link",
                module.name
            )));
        }

        let profile = front::profile(desc.stage, options.shader_model, BinaryKind::Dxil);
        let binary = self.front.link(desc, &profile)?;
        convert_binary(
            &binary,
            desc.stage,
            &desc.entry_point,
            options,
            target,
            self.transpiler,
        )
    }

    /// Turns a DXIL or SPIR-V binary back into text.
    ///
    /// # Panics
    /// If `desc.language` is a text language.
    pub fn disassemble(&self, desc: &DisassembleDesc<'_>) -> Result<ResultDesc> {
        let _span = info_span!(
            "disassemble",
            language = %desc.language,
            size = desc.binary.len()
        )
        .entered();
        match desc.language {
            ShadingLanguage::Dxil => self.front.disassemble(desc.binary),
            ShadingLanguage::SpirV => Ok(disassemble_spirv(desc.binary)),
            language => panic!("cannot disassemble {language}, it is not a binary language"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross::{CrossOutput, CrossRequest};
    use crate::{Blob, ModuleDesc, Reflection, ShaderModel, ShaderStage};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MockFront {
        fail: bool,
        no_linker: bool,
        compiled: RefCell<Vec<BinaryKind>>,
        linked: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl FrontEnd for MockFront {
        fn compile(
            &self,
            _source: &SourceDesc,
            _options: &CompileOptions,
            kind: BinaryKind,
        ) -> Result<ResultDesc> {
            self.compiled.borrow_mut().push(kind);
            if self.fail {
                return Ok(ResultDesc {
                    has_error: true,
                    diagnostics: Blob::from("error X3004: undeclared identifier 'colour'"),
                    ..Default::default()
                });
            }
            let target = match kind {
                BinaryKind::Dxil => b"DXBC-full".to_vec(),
                BinaryKind::DxilModule => b"DXBC-lib".to_vec(),
                BinaryKind::SpirV => crate::disassemble::SPIRV_MAGIC.to_ne_bytes().to_vec(),
            };
            Ok(ResultDesc {
                target: Blob::from(target),
                ..Default::default()
            })
        }

        fn link_support(&self) -> bool {
            !self.no_linker
        }

        fn link(&self, desc: &LinkDesc<'_>, profile: &str) -> Result<ResultDesc> {
            let names = desc.modules.iter().map(|m| m.name.clone()).collect();
            self.linked.borrow_mut().push((profile.to_string(), names));
            Ok(ResultDesc {
                target: Blob::from("DXBC-linked"),
                ..Default::default()
            })
        }

        fn disassemble(&self, _dxil: &[u8]) -> Result<ResultDesc> {
            Ok(ResultDesc {
                target: Blob::from("; shader hash: 0"),
                is_text: true,
                ..Default::default()
            })
        }
    }

    #[derive(Default)]
    struct MockTranspiler {
        missing: bool,
        calls: Cell<usize>,
    }

    impl Transpiler for MockTranspiler {
        fn ready(&self) -> Result<()> {
            if self.missing {
                Err(Error::Native(xshade_sys::Error::Load {
                    path: "libspirv-cross-c-shared.so".to_string(),
                    reason: "not found".to_string(),
                }))
            } else {
                Ok(())
            }
        }

        fn transpile(&self, request: &CrossRequest<'_>) -> std::result::Result<CrossOutput, String> {
            self.calls.set(self.calls.get() + 1);
            Ok(CrossOutput {
                text: Blob::from(format!("// {:?}", request.plan.backend)),
                reflection: Reflection::default(),
            })
        }
    }

    fn source() -> SourceDesc {
        SourceDesc::new("float4 main() : SV_Target { return 1; }", ShaderStage::Pixel)
    }

    #[test]
    fn test_each_binary_compiled_once() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let targets = [
            TargetDesc::new(ShadingLanguage::Glsl).version("450"),
            TargetDesc::new(ShadingLanguage::Dxil),
            TargetDesc::new(ShadingLanguage::Hlsl),
            TargetDesc::new(ShadingLanguage::SpirV),
            TargetDesc::new(ShadingLanguage::MslIos),
            TargetDesc::new(ShadingLanguage::Dxil),
        ];

        let results = compiler
            .compile(&source(), &CompileOptions::default(), &targets)
            .unwrap();

        assert_eq!(*front.compiled.borrow(), [BinaryKind::Dxil, BinaryKind::SpirV]);
        assert_eq!(transpiler.calls.get(), 3);
        assert_eq!(results.len(), targets.len());
        assert_eq!(results[1].target.as_bytes(), b"DXBC-full");
        assert_eq!(results[1], results[5]);
        assert!(!results[3].is_text);
        assert!(results.iter().all(|r| !r.has_error));
        assert!(results[0].is_text && results[2].is_text && results[4].is_text);
    }

    #[test]
    fn test_module_and_full_dxil_are_distinct() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let targets = [
            TargetDesc::new(ShadingLanguage::Dxil).as_module(),
            TargetDesc::new(ShadingLanguage::Dxil),
        ];
        let results = compiler
            .compile(&source(), &CompileOptions::default(), &targets)
            .unwrap();
        assert_eq!(
            *front.compiled.borrow(),
            [BinaryKind::Dxil, BinaryKind::DxilModule]
        );
        assert_eq!(results[0].target.as_bytes(), b"DXBC-lib");
        assert_eq!(results[1].target.as_bytes(), b"DXBC-full");
    }

    #[test]
    fn test_stage_one_failure_reaches_every_target() {
        let front = MockFront {
            fail: true,
            ..Default::default()
        };
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let results = compiler
            .compile(
                &source(),
                &CompileOptions::default(),
                &[
                    TargetDesc::new(ShadingLanguage::Essl).version("300"),
                    TargetDesc::new(ShadingLanguage::SpirV),
                ],
            )
            .unwrap();
        assert_eq!(front.compiled.borrow().len(), 1);
        assert_eq!(transpiler.calls.get(), 0);
        for result in &results {
            assert!(result.has_error);
            assert_eq!(
                result.diagnostics_text(),
                "error X3004: undeclared identifier 'colour'"
            );
        }
    }

    #[test]
    fn test_configuration_errors_come_first() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let dxil = [TargetDesc::new(ShadingLanguage::Dxil)];

        let half = CompileOptions::default().half_types();
        assert!(matches!(
            compiler.compile(&source(), &half, &dxil),
            Err(Error::InvalidParameter(_))
        ));

        let bad_version = [
            TargetDesc::new(ShadingLanguage::Dxil),
            TargetDesc::new(ShadingLanguage::Glsl).version("4.5"),
        ];
        assert!(matches!(
            compiler.compile(&source(), &CompileOptions::default(), &bad_version),
            Err(Error::InvalidParameter(_))
        ));

        let empty = SourceDesc::new("", ShaderStage::Pixel);
        assert!(compiler.compile(&empty, &CompileOptions::default(), &dxil).is_err());

        assert!(front.compiled.borrow().is_empty());
    }

    #[test]
    fn test_missing_transpiler_only_matters_for_text_targets() {
        let front = MockFront::default();
        let transpiler = MockTranspiler {
            missing: true,
            ..Default::default()
        };
        let compiler = Compiler::with_backends(&front, &transpiler);
        let options = CompileOptions::default();

        let binary_only = [
            TargetDesc::new(ShadingLanguage::Dxil),
            TargetDesc::new(ShadingLanguage::SpirV),
        ];
        assert!(compiler.compile(&source(), &options, &binary_only).is_ok());

        let err = compiler
            .compile_one(&source(), &options, &TargetDesc::new(ShadingLanguage::Hlsl))
            .unwrap_err();
        assert!(matches!(err, Error::Native(xshade_sys::Error::Load { .. })));
        assert_eq!(front.compiled.borrow().len(), 2);
    }

    #[test]
    #[should_panic(expected = "SPIR-V targets cannot be compiled as a module")]
    fn test_spirv_module_target_panics() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let _ = Compiler::with_backends(&front, &transpiler).compile_one(
            &source(),
            &CompileOptions::default(),
            &TargetDesc::new(ShadingLanguage::SpirV).as_module(),
        );
    }

    #[test]
    fn test_link() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let lighting = ModuleDesc::new("lighting", b"DXBC-lib".as_slice());
        let shading = ModuleDesc::new("shading", b"DXBC-lib".as_slice());
        let modules = [&lighting, &shading];
        let desc = LinkDesc::new("PSMain", ShaderStage::Pixel, &modules);
        let options = CompileOptions::default().shader_model(ShaderModel::new(6, 3).unwrap());

        let result = compiler
            .link(&desc, &options, &TargetDesc::new(ShadingLanguage::Dxil))
            .unwrap();
        assert_eq!(result.target.as_bytes(), b"DXBC-linked");
        assert_eq!(
            *front.linked.borrow(),
            [(
                "ps_6_3".to_string(),
                vec!["lighting".to_string(), "shading".to_string()]
            )]
        );
    }

    #[test]
    fn test_link_rejections() {
        let transpiler = MockTranspiler::default();
        let good = ModuleDesc::new("good", b"DXBC-lib".as_slice());
        let short = ModuleDesc::new("short", b"DX".as_slice());
        let options = CompileOptions::default();
        let dxil = TargetDesc::new(ShadingLanguage::Dxil);

        let no_linker = MockFront {
            no_linker: true,
            ..Default::default()
        };
        let modules = [&good];
        let desc = LinkDesc::new("main", ShaderStage::Vertex, &modules);
        let compiler = Compiler::with_backends(&no_linker, &transpiler);
        assert!(!compiler.link_support());
        assert!(matches!(
            compiler.link(&desc, &options, &dxil),
            Err(Error::LinkUnsupported)
        ));

        let front = MockFront::default();
        let compiler = Compiler::with_backends(&front, &transpiler);
        let modules = [&good, &short];
        let desc = LinkDesc::new("main", ShaderStage::Vertex, &modules);
        assert!(matches!(
            compiler.link(&desc, &options, &dxil),
            Err(Error::InvalidParameter(_))
        ));
        let modules = [&good];
        let desc = LinkDesc::new("main", ShaderStage::Vertex, &modules);
        assert!(matches!(
            compiler.link(&desc, &options, &TargetDesc::new(ShadingLanguage::Glsl)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(front.linked.borrow().is_empty());
    }

    #[test]
    fn test_disassemble_dispatch() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let compiler = Compiler::with_backends(&front, &transpiler);

        let dxil = compiler
            .disassemble(&DisassembleDesc::new(ShadingLanguage::Dxil, b"DXBC"))
            .unwrap();
        assert_eq!(dxil.target.as_str().unwrap(), "; shader hash: 0");

        let spirv = compiler
            .disassemble(&DisassembleDesc::new(ShadingLanguage::SpirV, &[1, 2, 3]))
            .unwrap();
        assert!(spirv.has_error);
        assert!(spirv.is_text);
    }

    #[test]
    #[should_panic(expected = "cannot disassemble glsl")]
    fn test_disassemble_text_panics() {
        let front = MockFront::default();
        let transpiler = MockTranspiler::default();
        let _ = Compiler::with_backends(&front, &transpiler)
            .disassemble(&DisassembleDesc::new(ShadingLanguage::Glsl, b"void main() {}"));
    }
}
