//! Stage 2: SPIR-V to HLSL, GLSL, ESSL or MSL
//!
//! [`CrossPlan`] decides everything about a conversion up front, without
//! touching SPIRV-Cross. A [`Transpiler`] then carries the plan out.

use crate::native::SpirvCross;
use crate::{
    Blob, CompileOptions, Error, Reflection, Result, ResultDesc, ShaderStage, ShadingLanguage,
    TargetDesc,
};
use spirv::ExecutionModel;
use tracing::debug;

/// Parses a target version such as `"450"` or `"30"`.
pub(crate) fn parse_version(version: Option<&str>) -> Result<Option<u32>> {
    version
        .map(|v| {
            v.trim().parse::<u32>().map_err(|_| {
                Error::InvalidParameter(format!("target version '{v}' is not a number"))
            })
        })
        .transpose()
}

/// SPIRV-Cross shader model when no HLSL version is requested
const DEFAULT_HLSL_SHADER_MODEL: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MslPlatform {
    Ios,
    MacOs,
}

/// Backend compiler plus its specific settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    Glsl {
        es: bool,
        enable_420pack: bool,
        /// Rename stage varyings so vertex outputs meet pixel inputs
        legacy_varyings: bool,
    },
    Hlsl {
        /// Set only when the target names a version
        shader_model: Option<u32>,
    },
    Msl {
        platform: MslPlatform,
    },
}

/// Everything a conversion does, decided before SPIRV-Cross is involved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CrossPlan {
    pub stage: ShaderStage,
    pub model: ExecutionModel,
    pub backend: Backend,
    pub version: Option<u32>,
    /// Build combined image-samplers along with a dummy sampler
    pub combined_samplers: bool,
}

fn execution_model(stage: ShaderStage) -> ExecutionModel {
    match stage {
        ShaderStage::Vertex => ExecutionModel::Vertex,
        ShaderStage::Hull => ExecutionModel::TessellationControl,
        ShaderStage::Domain => ExecutionModel::TessellationEvaluation,
        ShaderStage::Geometry => ExecutionModel::Geometry,
        ShaderStage::Pixel => ExecutionModel::Fragment,
        ShaderStage::Compute => ExecutionModel::GLCompute,
    }
}

impl CrossPlan {
    /// Plans a conversion, or returns why the combination is unsupported.
    ///
    /// # Panics
    /// If `language` is DXIL or SPIR-V, which are never cross-compiled.
    pub fn new(
        stage: ShaderStage,
        language: ShadingLanguage,
        version: Option<u32>,
    ) -> std::result::Result<CrossPlan, String> {
        let (backend, combined_samplers) = match language {
            ShadingLanguage::Hlsl => {
                if matches!(
                    stage,
                    ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain
                ) {
                    return Err("GS, HS, and DS has not been supported yet.".to_string());
                }
                if stage == ShaderStage::Compute && version.unwrap_or(0) < 50 {
                    return Err("CS in HLSL shader model earlier than 5.0 is not supported.".to_string());
                }
                if version.is_some_and(|v| v < 30) {
                    return Err("HLSL shader model earlier than 3.0 is not supported.".to_string());
                }
                let effective = version.unwrap_or(DEFAULT_HLSL_SHADER_MODEL);
                (
                    Backend::Hlsl {
                        shader_model: version,
                    },
                    effective <= 30,
                )
            }
            ShadingLanguage::Glsl | ShadingLanguage::Essl => {
                let glsl = language == ShadingLanguage::Glsl;
                (
                    Backend::Glsl {
                        es: !glsl,
                        enable_420pack: glsl && version.is_none_or(|v| v >= 420),
                        legacy_varyings: version.is_none_or(|v| v <= 300),
                    },
                    true,
                )
            }
            ShadingLanguage::MslMacOs | ShadingLanguage::MslIos => {
                if stage == ShaderStage::Geometry {
                    return Err("MSL doesn't have GS.".to_string());
                }
                let platform = if language == ShadingLanguage::MslIos {
                    MslPlatform::Ios
                } else {
                    MslPlatform::MacOs
                };
                (Backend::Msl { platform }, false)
            }
            ShadingLanguage::Dxil | ShadingLanguage::SpirV => {
                panic!("{language} is not a cross-compilation target")
            }
        };

        Ok(CrossPlan {
            stage,
            model: execution_model(stage),
            backend,
            version,
            combined_samplers,
        })
    }

    pub fn is_msl(&self) -> bool {
        matches!(self.backend, Backend::Msl { .. })
    }

    pub fn is_hlsl(&self) -> bool {
        matches!(self.backend, Backend::Hlsl { .. })
    }

    /// Legacy varying name for a stage variable, if it needs one.
    ///
    /// `output` tells whether the variable is a stage output.
    pub fn varying_name(&self, name: &str, output: bool) -> Option<String> {
        match self.backend {
            Backend::Glsl {
                legacy_varyings: true,
                ..
            } => legacy_varying_name(self.stage, name, output),
            _ => None,
        }
    }
}

/// Renames DXC's `out_var_`/`in_var_` prefixes to a shared `varying_` so the
/// vertex outputs and pixel inputs of a legacy GLSL program link by name.
pub(crate) fn legacy_varying_name(stage: ShaderStage, name: &str, output: bool) -> Option<String> {
    let replaced = match (stage, output) {
        (ShaderStage::Vertex, true)
            if name.starts_with("out_var_") || name.starts_with("out.var.") =>
        {
            8
        }
        (ShaderStage::Pixel, false) if name.starts_with("in_var_") || name.starts_with("in.var.") => {
            7
        }
        _ => return None,
    };
    Some(format!("varying_{}", &name[replaced..]))
}

pub(crate) fn combined_sampler_name(image: &str, sampler: &str) -> String {
    format!("SPIRV_Cross_Combined{image}{sampler}")
}

/// One stage-2 conversion
pub(crate) struct CrossRequest<'a> {
    pub spirv: &'a [u32],
    pub entry_point: &'a str,
    pub plan: CrossPlan,
    pub inherit_combined_sampler_bindings: bool,
    pub need_reflection: bool,
}

#[derive(Debug, Default)]
pub(crate) struct CrossOutput {
    pub text: Blob,
    pub reflection: Reflection,
}

/// Carries out a [`CrossPlan`]
pub(crate) trait Transpiler {
    /// Fails when the transpiler cannot run at all, e.g. a missing library.
    fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Converts the module, or returns the transpiler's error message.
    fn transpile(&self, request: &CrossRequest<'_>) -> std::result::Result<CrossOutput, String>;
}

/// Loads the default SPIRV-Cross only when a text target asks for it.
pub(crate) struct LazySpirvCross;

impl Transpiler for LazySpirvCross {
    fn ready(&self) -> Result<()> {
        SpirvCross::instance().map(|_| ())
    }

    fn transpile(&self, request: &CrossRequest<'_>) -> std::result::Result<CrossOutput, String> {
        match SpirvCross::instance() {
            Ok(spirv_cross) => spirv_cross.transpile(request),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Turns a stage-1 result into the result for `target`.
///
/// Failed stage-1 results, modules and binary targets pass through as they
/// are. Text targets are cross-compiled from the SPIR-V in `binary`.
pub(crate) fn convert_binary(
    binary: &ResultDesc,
    stage: ShaderStage,
    entry_point: &str,
    options: &CompileOptions,
    target: &TargetDesc,
    transpiler: &dyn Transpiler,
) -> Result<ResultDesc> {
    if binary.has_error || target.as_module || target.language.is_binary() {
        return Ok(binary.clone());
    }
    cross_compile(binary, stage, entry_point, options, target, transpiler)
}

fn cross_compile(
    binary: &ResultDesc,
    stage: ShaderStage,
    entry_point: &str,
    options: &CompileOptions,
    target: &TargetDesc,
    transpiler: &dyn Transpiler,
) -> Result<ResultDesc> {
    assert!(
        binary.target.len() % 4 == 0,
        "SPIR-V payload of {} bytes is not a whole number of words",
        binary.target.len()
    );
    let version = parse_version(target.version.as_deref())?;

    let mut result = ResultDesc {
        diagnostics: binary.diagnostics.clone(),
        is_text: true,
        ..Default::default()
    };

    let plan = match CrossPlan::new(stage, target.language, version) {
        Ok(plan) => plan,
        Err(message) => {
            debug!(language = %target.language, %stage, %message, "unsupported conversion");
            result.append_error(&message);
            return Ok(result);
        }
    };

    let words: Vec<u32> = binary
        .target
        .chunks_exact(4)
        .map(|word| u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
        .collect();

    let request = CrossRequest {
        spirv: &words,
        entry_point,
        plan,
        inherit_combined_sampler_bindings: options.inherit_combined_sampler_bindings,
        need_reflection: options.need_reflection,
    };
    match transpiler.transpile(&request) {
        Ok(output) => {
            result.target = output.text;
            result.reflection = output.reflection;
            result.has_error = false;
        }
        Err(message) => result.append_error(&message),
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn plan(stage: ShaderStage, language: ShadingLanguage, version: Option<u32>) -> CrossPlan {
        CrossPlan::new(stage, language, version).unwrap()
    }

    fn refusal(stage: ShaderStage, language: ShadingLanguage, version: Option<u32>) -> String {
        CrossPlan::new(stage, language, version).unwrap_err()
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version(None).unwrap(), None);
        assert_eq!(parse_version(Some("450")).unwrap(), Some(450));
        assert!(matches!(
            parse_version(Some("es300")),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_hlsl_unsupported_stages() {
        for stage in [ShaderStage::Geometry, ShaderStage::Hull, ShaderStage::Domain] {
            assert_eq!(
                refusal(stage, ShadingLanguage::Hlsl, Some(50)),
                "GS, HS, and DS has not been supported yet."
            );
        }
        assert_eq!(
            refusal(ShaderStage::Compute, ShadingLanguage::Hlsl, Some(40)),
            "CS in HLSL shader model earlier than 5.0 is not supported."
        );
        assert_eq!(
            refusal(ShaderStage::Compute, ShadingLanguage::Hlsl, None),
            "CS in HLSL shader model earlier than 5.0 is not supported."
        );
        assert_eq!(
            refusal(ShaderStage::Pixel, ShadingLanguage::Hlsl, Some(20)),
            "HLSL shader model earlier than 3.0 is not supported."
        );
    }

    #[test]
    fn test_hlsl_combined_samplers_up_to_sm30() {
        let sm30 = plan(ShaderStage::Pixel, ShadingLanguage::Hlsl, None);
        assert!(sm30.combined_samplers);
        assert_eq!(sm30.backend, Backend::Hlsl { shader_model: None });

        let sm50 = plan(ShaderStage::Compute, ShadingLanguage::Hlsl, Some(50));
        assert!(!sm50.combined_samplers);
        assert_eq!(sm50.model, ExecutionModel::GLCompute);
        assert_eq!(sm50.backend, Backend::Hlsl { shader_model: Some(50) });
    }

    #[test]
    fn test_glsl_options() {
        let modern = plan(ShaderStage::Vertex, ShadingLanguage::Glsl, Some(450));
        assert_eq!(
            modern.backend,
            Backend::Glsl {
                es: false,
                enable_420pack: true,
                legacy_varyings: false
            }
        );
        assert!(modern.combined_samplers);

        let old = plan(ShaderStage::Vertex, ShadingLanguage::Glsl, Some(330));
        assert!(matches!(old.backend, Backend::Glsl { enable_420pack: false, .. }));

        let unversioned = plan(ShaderStage::Pixel, ShadingLanguage::Glsl, None);
        assert!(matches!(
            unversioned.backend,
            Backend::Glsl {
                enable_420pack: true,
                legacy_varyings: true,
                ..
            }
        ));

        let essl = plan(ShaderStage::Pixel, ShadingLanguage::Essl, Some(300));
        assert_eq!(
            essl.backend,
            Backend::Glsl {
                es: true,
                enable_420pack: false,
                legacy_varyings: true
            }
        );
        assert_eq!(essl.model, ExecutionModel::Fragment);
    }

    #[test]
    fn test_msl() {
        assert_eq!(
            refusal(ShaderStage::Geometry, ShadingLanguage::MslIos, None),
            "MSL doesn't have GS."
        );
        let ios = plan(ShaderStage::Hull, ShadingLanguage::MslIos, None);
        assert_eq!(ios.backend, Backend::Msl { platform: MslPlatform::Ios });
        assert_eq!(ios.model, ExecutionModel::TessellationControl);
        assert!(!ios.combined_samplers);
        assert!(ios.is_msl());
        let mac = plan(ShaderStage::Domain, ShadingLanguage::MslMacOs, Some(20000));
        assert_eq!(mac.backend, Backend::Msl { platform: MslPlatform::MacOs });
        assert_eq!(mac.version, Some(20000));
    }

    #[test]
    fn test_legacy_varying_names() {
        let vs = ShaderStage::Vertex;
        let ps = ShaderStage::Pixel;
        assert_eq!(legacy_varying_name(vs, "out_var_TEXCOORD0", true).as_deref(), Some("varying_TEXCOORD0"));
        assert_eq!(legacy_varying_name(vs, "out.var.COLOR", true).as_deref(), Some("varying_COLOR"));
        assert_eq!(legacy_varying_name(ps, "in_var_TEXCOORD0", false).as_deref(), Some("varying_TEXCOORD0"));
        assert_eq!(legacy_varying_name(ps, "in.var.COLOR", false).as_deref(), Some("varying_COLOR"));
        // Wrong direction or stage
        assert_eq!(legacy_varying_name(vs, "in_var_POSITION", false), None);
        assert_eq!(legacy_varying_name(ps, "out_var_SV_Target", true), None);
        assert_eq!(legacy_varying_name(ShaderStage::Compute, "out_var_X", true), None);
    }

    #[test]
    fn test_varying_rename_only_for_legacy_glsl() {
        let legacy = plan(ShaderStage::Vertex, ShadingLanguage::Essl, Some(100));
        assert_eq!(legacy.varying_name("out_var_N", true).as_deref(), Some("varying_N"));
        let modern = plan(ShaderStage::Vertex, ShadingLanguage::Glsl, Some(410));
        assert_eq!(modern.varying_name("out_var_N", true), None);
        let hlsl = plan(ShaderStage::Vertex, ShadingLanguage::Hlsl, None);
        assert_eq!(hlsl.varying_name("out_var_N", true), None);
    }

    #[test]
    fn test_combined_sampler_name() {
        assert_eq!(
            combined_sampler_name("albedoTex", "linearSampler"),
            "SPIRV_Cross_CombinedalbedoTexlinearSampler"
        );
    }

    /// Records requests and answers with a fixed outcome.
    struct Scripted {
        outcome: std::result::Result<&'static str, &'static str>,
        seen: RefCell<Vec<(usize, String, CrossPlan)>>,
    }

    impl Scripted {
        fn new(outcome: std::result::Result<&'static str, &'static str>) -> Self {
            Scripted {
                outcome,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transpiler for Scripted {
        fn transpile(&self, request: &CrossRequest<'_>) -> std::result::Result<CrossOutput, String> {
            self.seen.borrow_mut().push((
                request.spirv.len(),
                request.entry_point.to_string(),
                request.plan,
            ));
            match self.outcome {
                Ok(text) => Ok(CrossOutput {
                    text: Blob::from(text),
                    reflection: Reflection::default(),
                }),
                Err(message) => Err(message.to_string()),
            }
        }
    }

    fn spirv_result() -> ResultDesc {
        ResultDesc {
            target: Blob::from(vec![0u8; 16]),
            diagnostics: Blob::from("warning: unused variable"),
            ..Default::default()
        }
    }

    fn convert(binary: &ResultDesc, target: &TargetDesc, transpiler: &dyn Transpiler) -> ResultDesc {
        convert_binary(
            binary,
            ShaderStage::Pixel,
            "PSMain",
            &CompileOptions::default(),
            target,
            transpiler,
        )
        .unwrap()
    }

    #[test]
    fn test_pass_through() {
        let transpiler = Scripted::new(Ok("unused"));
        let binary = spirv_result();
        for target in [
            TargetDesc::new(ShadingLanguage::SpirV),
            TargetDesc::new(ShadingLanguage::Dxil),
            TargetDesc::new(ShadingLanguage::Glsl).as_module(),
        ] {
            assert_eq!(convert(&binary, &target, &transpiler), binary);
        }

        let failed = ResultDesc {
            has_error: true,
            diagnostics: Blob::from("error: undeclared identifier"),
            ..Default::default()
        };
        assert_eq!(
            convert(&failed, &TargetDesc::new(ShadingLanguage::Hlsl), &transpiler),
            failed
        );
        assert!(transpiler.seen.borrow().is_empty());
    }

    #[test]
    fn test_cross_compile_success() {
        let transpiler = Scripted::new(Ok("#version 450\nvoid main() {}\n"));
        let result = convert(
            &spirv_result(),
            &TargetDesc::new(ShadingLanguage::Glsl).version("450"),
            &transpiler,
        );
        assert!(!result.has_error);
        assert!(result.is_text);
        assert_eq!(result.target.as_str().unwrap(), "#version 450\nvoid main() {}\n");
        assert_eq!(result.diagnostics_text(), "warning: unused variable");

        let seen = transpiler.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 4);
        assert_eq!(seen[0].1, "PSMain");
        assert_eq!(seen[0].2.version, Some(450));
    }

    #[test]
    fn test_transpiler_error_is_appended() {
        let transpiler = Scripted::new(Err("Unsupported builtin"));
        let result = convert(&spirv_result(), &TargetDesc::new(ShadingLanguage::MslMacOs), &transpiler);
        assert!(result.has_error);
        assert!(result.target.is_empty());
        assert_eq!(result.diagnostics_text(), "warning: unused variable\nUnsupported builtin");
    }

    #[test]
    fn test_unsupported_combination_skips_transpiler() {
        let transpiler = Scripted::new(Ok("unused"));
        let result = convert_binary(
            &spirv_result(),
            ShaderStage::Geometry,
            "main",
            &CompileOptions::default(),
            &TargetDesc::new(ShadingLanguage::MslIos),
            &transpiler,
        )
        .unwrap();
        assert!(result.has_error);
        assert!(result.is_text);
        assert_eq!(result.diagnostics_text(), "warning: unused variable\nMSL doesn't have GS.");
        assert!(transpiler.seen.borrow().is_empty());
    }

    #[test]
    fn test_bad_version_is_an_error() {
        let transpiler = Scripted::new(Ok("unused"));
        let err = convert_binary(
            &spirv_result(),
            ShaderStage::Pixel,
            "main",
            &CompileOptions::default(),
            &TargetDesc::new(ShadingLanguage::Glsl).version("latest"),
            &transpiler,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    #[should_panic(expected = "not a whole number of words")]
    fn test_misaligned_spirv_panics() {
        let binary = ResultDesc {
            target: Blob::from(vec![0u8; 6]),
            ..Default::default()
        };
        convert(&binary, &TargetDesc::new(ShadingLanguage::Hlsl), &Scripted::new(Ok("")));
    }
}
