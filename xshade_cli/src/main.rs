//! xshade command-line tool

use clap::{ArgAction, Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use xshade::{
    CompileOptions, Compiler, Container, DisassembleDesc, FileSystemInclude, LinkDesc, MacroDefine, ModuleDesc,
    OptimizationLevel, Reflection, ResultDesc, SPIRV_MAGIC, ShaderModel, ShaderStage,
    ShadingLanguage, SourceDesc, TargetDesc,
};
use xshade::reflect::VariableDesc;

#[derive(Parser)]
#[command(name = "xshade")]
#[command(about = "Compile HLSL to DXIL, SPIR-V, HLSL, GLSL, ESSL and MSL", long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an HLSL file for one target
    Compile {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        options: OptionArgs,

        /// Target shading language: dxil, spirv, hlsl, glsl, essl, msl_macos, msl_ios
        #[arg(short = 'T', long, default_value = "dxil")]
        target: ShadingLanguage,

        /// Target language version, e.g. 450 for GLSL or 30 for HLSL
        #[arg(short = 'V', long)]
        version: Option<String>,

        /// Output file (default: <input>.<extension of target>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the reflection after compiling
        #[arg(long)]
        reflect: bool,
    },

    /// Disassemble a DXIL or SPIR-V file
    #[command(alias = "disassemble")]
    Disasm {
        /// Input binary
        input: PathBuf,

        /// dxil or spirv (default: detected from the file's magic)
        #[arg(short, long)]
        language: Option<ShadingLanguage>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile HLSL files as DXIL libraries and link them into one shader
    Link {
        /// Library module as NAME=FILE.hlsl, repeatable
        #[arg(short, long = "module", value_name = "NAME=FILE", required = true)]
        modules: Vec<String>,

        /// Entry point of the linked shader
        #[arg(short = 'E', long, default_value = "main")]
        entry: String,

        /// Shader stage: vs, ps, gs, hs, ds, cs
        #[arg(short = 'S', long)]
        stage: ShaderStage,

        #[command(flatten)]
        options: OptionArgs,

        /// Output file (default: <entry>.dxil)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile an HLSL file and print its reflection
    Reflect {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        options: OptionArgs,

        /// Reflect through this target's path (default: dxil)
        #[arg(short = 'T', long, default_value = "dxil")]
        target: ShadingLanguage,

        #[arg(short = 'V', long)]
        version: Option<String>,
    },

    /// List the parts of a DXIL container
    Parts {
        /// Input DXIL file
        input: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Input HLSL file
    #[arg(value_name = "INPUT")]
    positional: Option<PathBuf>,

    /// Input HLSL file
    #[arg(short = 'I', long = "input", conflicts_with = "positional")]
    input: Option<PathBuf>,

    /// Entry point function name
    #[arg(short = 'E', long, default_value = "main")]
    entry: String,

    /// Shader stage: vs, ps, gs, hs, ds, cs
    #[arg(short = 'S', long)]
    stage: ShaderStage,

    /// Preprocessor defines (NAME=VALUE or NAME)
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Extra directory searched for #include files, repeatable
    #[arg(long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,
}

#[derive(Args)]
struct OptionArgs {
    /// Treat HLSL matrices as row major
    #[arg(long)]
    row_major: bool,

    /// Enable 16-bit types, requires shader model 6.2+
    #[arg(long)]
    half_types: bool,

    /// Embed debug info into the binary
    #[arg(long)]
    debug_info: bool,

    /// Optimization level 0-3
    #[arg(short = 'O', long, default_value = "3", value_parser = clap::value_parser!(u8).range(0..=3))]
    optimization: u8,

    /// Shader model major version
    #[arg(long, default_value = "6")]
    sm_major: u8,

    /// Shader model minor version
    #[arg(long, default_value = "0")]
    sm_minor: u8,

    /// Shift all texture bindings by this value
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    texture_shift: i32,

    /// Shift all sampler bindings by this value
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    sampler_shift: i32,

    /// Shift all cbuffer bindings by this value
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    cbuffer_shift: i32,

    /// Shift all UAV bindings by this value
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    uav_shift: i32,
}

impl OptionArgs {
    fn to_options(&self) -> Result<CompileOptions, String> {
        let level = OptimizationLevel::try_from(self.optimization).map_err(|e| e.to_string())?;
        let model = ShaderModel::new(self.sm_major, self.sm_minor).map_err(|e| e.to_string())?;
        Ok(CompileOptions {
            pack_matrices_in_row_major: self.row_major,
            enable_16bit_types: self.half_types,
            enable_debug_info: self.debug_info,
            optimization_level: level,
            shader_model: model,
            shift_all_textures_bindings: self.texture_shift,
            shift_all_samplers_bindings: self.sampler_shift,
            shift_all_cbuffers_bindings: self.cbuffer_shift,
            shift_all_ua_buffers_bindings: self.uav_shift,
            ..CompileOptions::default()
        })
    }
}

impl SourceArgs {
    fn input(&self) -> Result<&Path, String> {
        self.input
            .as_deref()
            .or(self.positional.as_deref())
            .ok_or_else(|| "COULDN'T find <input> in command line parameters.".to_string())
    }

    fn load(&self) -> Result<SourceDesc, String> {
        let input = self.input()?;
        let source = read_source(input)?;
        let mut desc = SourceDesc::new(source, self.stage)
            .file_name(input.to_string_lossy())
            .with_entry_point(&self.entry);
        for define in &self.defines {
            desc = desc.with_define(parse_define(define));
        }
        if !self.include_dirs.is_empty() {
            let mut include = FileSystemInclude::new();
            for dir in &self.include_dirs {
                include.add_path(dir);
            }
            debug!(paths = ?include.search_paths(), "include search paths");
            desc = desc.include_loader(include);
        }
        Ok(desc)
    }
}

fn parse_define(s: &str) -> MacroDefine {
    match s.split_once('=') {
        Some((name, value)) => MacroDefine::new(name, value),
        None => MacroDefine::flag(s),
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|e| format!("COULDN'T load the input file: {} ({})", path.display(), e))
}

/// `<input>.<ext>`, keeping the input's own extension
fn default_output(input: &Path, language: ShadingLanguage) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".");
    name.push(language.extension());
    PathBuf::from(name)
}

/// Prints diagnostics and writes the payload, if any.
fn write_result(result: &ResultDesc, output: &Path) -> Result<(), String> {
    if !result.diagnostics.is_empty() {
        eprintln!(
            "Error or warning from shader compiler: \n{}",
            result.diagnostics_text()
        );
    }
    if !result.target.is_empty() {
        std::fs::write(output, result.target.as_bytes())
            .map_err(|e| format!("COULDN'T open the output file: {} ({})", output.display(), e))?;
        println!("The compiled file is saved to {}", output.display());
    }
    if result.has_error {
        Err("compilation failed".to_string())
    } else {
        Ok(())
    }
}

fn compile_shader(
    source: SourceArgs,
    options: OptionArgs,
    language: ShadingLanguage,
    version: Option<String>,
    output: Option<PathBuf>,
    reflect: bool,
) -> Result<(), String> {
    let desc = source.load()?;
    let mut options = options.to_options()?;
    options.need_reflection = reflect;
    let mut target = TargetDesc::new(language);
    target.version = version;
    let output = match output {
        Some(output) => output,
        None => default_output(source.input()?, language),
    };

    let compiler = Compiler::new().map_err(|e| e.to_string())?;
    let result = compiler
        .compile_one(&desc, &options, &target)
        .map_err(|e| e.to_string())?;
    if reflect && !result.has_error {
        print_reflection(&result.reflection);
    }
    write_result(&result, &output)
}

fn detect_language(bytes: &[u8]) -> Option<ShadingLanguage> {
    if Container::is_container(bytes) {
        return Some(ShadingLanguage::Dxil);
    }
    let magic = bytes.get(..4)?;
    let magic = [magic[0], magic[1], magic[2], magic[3]];
    (u32::from_le_bytes(magic) == SPIRV_MAGIC || u32::from_be_bytes(magic) == SPIRV_MAGIC)
        .then_some(ShadingLanguage::SpirV)
}

fn disassemble_file(
    input: PathBuf,
    language: Option<ShadingLanguage>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let bytes =
        std::fs::read(&input).map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;

    let language = match language {
        Some(language) if language.is_binary() => language,
        Some(language) => return Err(format!("{language} is not a binary language")),
        None => detect_language(&bytes).ok_or_else(|| {
            format!(
                "{} is neither a DXIL container nor a SPIR-V module",
                input.display()
            )
        })?,
    };
    debug!(%language, size = bytes.len(), "disassembling");

    let compiler = Compiler::new().map_err(|e| e.to_string())?;
    let result = compiler
        .disassemble(&DisassembleDesc::new(language, &bytes))
        .map_err(|e| e.to_string())?;
    if result.has_error {
        return Err(result.diagnostics_text());
    }

    let text = result.target.to_string_lossy();
    if let Some(output) = output {
        std::fs::write(&output, text.as_bytes())
            .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
        eprintln!("Disassembled {} -> {}", input.display(), output.display());
    } else {
        print!("{text}");
    }
    Ok(())
}

fn link_modules(
    modules: Vec<String>,
    entry: String,
    stage: ShaderStage,
    options: OptionArgs,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let options = options.to_options()?;
    let compiler = Compiler::new().map_err(|e| e.to_string())?;
    if !compiler.link_support() {
        return Err("the loaded dxcompiler cannot link".to_string());
    }

    let library = TargetDesc::new(ShadingLanguage::Dxil).as_module();
    let mut compiled = Vec::with_capacity(modules.len());
    for module in &modules {
        let (name, file) = module
            .split_once('=')
            .ok_or_else(|| format!("module '{module}' is not NAME=FILE"))?;
        let path = Path::new(file);
        let source = SourceDesc::new(read_source(path)?, stage).file_name(file);
        let result = compiler
            .compile_one(&source, &options, &library)
            .map_err(|e| e.to_string())?;
        if result.has_error {
            return Err(format!("{file}:\n{}", result.diagnostics_text()));
        }
        info!(module = name, file, size = result.target.len(), "compiled library");
        compiled.push(ModuleDesc::new(name, result.target));
    }

    let refs: Vec<&ModuleDesc> = compiled.iter().collect();
    let desc = LinkDesc::new(entry.as_str(), stage, &refs);
    let result = compiler
        .link(&desc, &options, &TargetDesc::new(ShadingLanguage::Dxil))
        .map_err(|e| e.to_string())?;
    let output = output.unwrap_or_else(|| PathBuf::from(format!("{entry}.dxil")));
    write_result(&result, &output)
}

fn reflect_shader(
    source: SourceArgs,
    options: OptionArgs,
    language: ShadingLanguage,
    version: Option<String>,
) -> Result<(), String> {
    let desc = source.load()?;
    let options = options.to_options()?.reflection();
    let mut target = TargetDesc::new(language);
    target.version = version;

    let compiler = Compiler::new().map_err(|e| e.to_string())?;
    let result = compiler
        .compile_one(&desc, &options, &target)
        .map_err(|e| e.to_string())?;
    if result.has_error {
        return Err(result.diagnostics_text());
    }
    if !result.reflection.is_valid() {
        return Err(format!("no reflection available for {language}"));
    }
    print_reflection(&result.reflection);
    Ok(())
}

fn print_variables(variables: &[VariableDesc], depth: usize) {
    for var in variables {
        let ty = &var.ty;
        let elements = if ty.is_array() {
            format!("[{}]", ty.elements)
        } else {
            String::new()
        };
        println!(
            "{:indent$}+{:3}: {} {}{} ({} bytes)",
            "",
            var.offset,
            ty.name,
            var.name,
            elements,
            var.size,
            indent = depth * 4 + 6
        );
        print_variables(&ty.members, depth + 1);
    }
}

fn print_reflection(reflection: &Reflection) {
    let inputs = reflection.input_parameters();
    if !inputs.is_empty() {
        println!("Input Parameters ({}):", inputs.len());
        for param in inputs {
            println!(
                "  [{:2}] {}: {:?} {}",
                param.location,
                param.full_semantic(),
                param.component_type,
                param.mask
            );
        }
        println!();
    }

    let outputs = reflection.output_parameters();
    if !outputs.is_empty() {
        println!("Output Parameters ({}):", outputs.len());
        for param in outputs {
            println!(
                "  [{:2}] {}: {:?} {}",
                param.location,
                param.full_semantic(),
                param.component_type,
                param.mask
            );
        }
        println!();
    }

    let resources = reflection.resources();
    if !resources.is_empty() {
        println!("Bound Resources ({}):", resources.len());
        for resource in resources {
            println!(
                "  [space{}:{}] {} ({:?} x{})",
                resource.space, resource.bind_point, resource.name, resource.ty, resource.bind_count
            );
        }
        println!();
    }

    let cbs = reflection.constant_buffers();
    if !cbs.is_empty() {
        println!("Constant Buffers ({}):", cbs.len());
        for (i, cb) in cbs.iter().enumerate() {
            println!(
                "  [{}] {} ({} bytes, {} variables)",
                i,
                cb.name,
                cb.size,
                cb.variables.len()
            );
            print_variables(&cb.variables, 0);
        }
        println!();
    }

    let patch = reflection.hs_ds_patch_constant_parameters();
    if !patch.is_empty() {
        println!("Patch Constant Parameters ({}):", patch.len());
        for param in patch {
            println!("  [{:2}] {} {}", param.location, param.full_semantic(), param.mask);
        }
        println!();
    }

    let [x, y, z] = reflection.cs_block_size();
    if x + y + z > 0 {
        println!("Thread group: {x} x {y} x {z}");
    }
    if reflection.hs_ds_control_point_count() > 0 {
        println!(
            "Tessellation: {:?} domain, {:?}, {:?}, {} control points",
            reflection.hs_ds_tessellator_domain(),
            reflection.hs_partitioning(),
            reflection.hs_output_primitive(),
            reflection.hs_ds_control_point_count()
        );
    }
    if reflection.gs_max_output_vertices() > 0 {
        println!(
            "Geometry: {:?} in, {:?} out, {} vertices, {} instances",
            reflection.gs_hs_input_primitive(),
            reflection.gs_output_topology(),
            reflection.gs_max_output_vertices(),
            reflection.gs_instance_count()
        );
    }
}

fn list_parts(input: PathBuf) -> Result<(), String> {
    let bytes =
        std::fs::read(&input).map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;
    let container = Container::parse(&bytes).map_err(|e| e.to_string())?;

    let (major, minor) = container.version();
    println!("Container {} (version {major}.{minor}):", input.display());
    println!("  Size: {} bytes", container.total_size());
    for part in container.parts() {
        println!("  {}: {} bytes", part.kind, part.data.len());
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            source,
            options,
            target,
            version,
            output,
            reflect,
        } => compile_shader(source, options, target, version, output, reflect),
        Commands::Disasm {
            input,
            language,
            output,
        } => disassemble_file(input, language, output),
        Commands::Link {
            modules,
            entry,
            stage,
            options,
            output,
        } => link_modules(modules, entry, stage, options, output),
        Commands::Reflect {
            source,
            options,
            target,
            version,
        } => reflect_shader(source, options, target, version),
        Commands::Parts { input } => list_parts(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_define() {
        assert_eq!(parse_define("DEBUG=1"), MacroDefine::new("DEBUG", "1"));
        assert_eq!(parse_define("EMPTY="), MacroDefine::new("EMPTY", ""));
        assert_eq!(parse_define("FAST"), MacroDefine::flag("FAST"));
    }

    #[test]
    fn test_default_output_appends_extension() {
        assert_eq!(
            default_output(Path::new("shaders/blit.hlsl"), ShadingLanguage::MslIos),
            PathBuf::from("shaders/blit.hlsl.msl")
        );
        assert_eq!(
            default_output(Path::new("blit.hlsl"), ShadingLanguage::SpirV),
            PathBuf::from("blit.hlsl.spv")
        );
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(b"DXBC\0\0\0\0"), Some(ShadingLanguage::Dxil));
        assert_eq!(
            detect_language(&SPIRV_MAGIC.to_le_bytes()),
            Some(ShadingLanguage::SpirV)
        );
        assert_eq!(detect_language(b"#version 450"), None);
        assert_eq!(detect_language(b"DX"), None);
    }

    #[test]
    fn test_cli_parses_compile() {
        let cli = Cli::try_parse_from([
            "xshade", "compile", "-I", "blit.hlsl", "-S", "ps", "-T", "glsl", "-V", "300",
            "-D", "FAST", "--texture-shift", "-2", "-O", "1",
        ])
        .unwrap();
        let Commands::Compile {
            source,
            options,
            target,
            version,
            ..
        } = cli.command
        else {
            panic!("expected compile");
        };
        assert_eq!(source.input().unwrap(), Path::new("blit.hlsl"));
        assert_eq!(source.stage, ShaderStage::Pixel);
        assert_eq!(source.entry, "main");
        assert_eq!(target, ShadingLanguage::Glsl);
        assert_eq!(version.as_deref(), Some("300"));
        let options = options.to_options().unwrap();
        assert!(!options.pack_matrices_in_row_major);
        assert_eq!(options.shift_all_textures_bindings, -2);
        assert_eq!(options.optimization_level, OptimizationLevel::O1);
    }

    #[test]
    fn test_cli_rejects_bad_stage() {
        assert!(Cli::try_parse_from(["xshade", "compile", "a.hlsl", "-S", "fs"]).is_err());
    }
}
