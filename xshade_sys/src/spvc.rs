//! SPIRV-Cross C API (`spirv_cross_c.h`), resolved at run time into [`SpvcApi`]

use crate::loader::Library;
use crate::Result;
use std::ffi::{c_char, c_void};

/// Opaque handle types
pub type spvc_context = *mut c_void;
pub type spvc_parsed_ir = *mut c_void;
pub type spvc_compiler = *mut c_void;
pub type spvc_compiler_options = *mut c_void;
pub type spvc_resources = *mut c_void;
pub type spvc_type = *const c_void;

pub type spvc_result = i32;
pub type spvc_bool = u8;
pub type spvc_variable_id = u32;
pub type spvc_type_id = u32;
pub type spvc_constant_id = u32;
pub type SpvId = u32;

pub const SPVC_SUCCESS: spvc_result = 0;
pub const SPVC_TRUE: spvc_bool = 1;
pub const SPVC_FALSE: spvc_bool = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct spvc_reflected_resource {
    pub id: spvc_variable_id,
    pub base_type_id: spvc_type_id,
    pub type_id: spvc_type_id,
    pub name: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct spvc_reflected_builtin_resource {
    pub builtin: u32,
    pub value_type_id: spvc_type_id,
    pub resource: spvc_reflected_resource,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct spvc_combined_image_sampler {
    pub combined_id: spvc_variable_id,
    pub image_id: spvc_variable_id,
    pub sampler_id: spvc_variable_id,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct spvc_specialization_constant {
    pub id: spvc_constant_id,
    pub constant_id: u32,
}

// spvc_backend
pub const SPVC_BACKEND_GLSL: u32 = 1;
pub const SPVC_BACKEND_HLSL: u32 = 2;
pub const SPVC_BACKEND_MSL: u32 = 3;

// spvc_capture_mode
pub const SPVC_CAPTURE_MODE_COPY: u32 = 0;

// spvc_resource_type
pub const SPVC_RESOURCE_TYPE_UNIFORM_BUFFER: u32 = 1;
pub const SPVC_RESOURCE_TYPE_STORAGE_BUFFER: u32 = 2;
pub const SPVC_RESOURCE_TYPE_STAGE_INPUT: u32 = 3;
pub const SPVC_RESOURCE_TYPE_STAGE_OUTPUT: u32 = 4;
pub const SPVC_RESOURCE_TYPE_STORAGE_IMAGE: u32 = 6;
pub const SPVC_RESOURCE_TYPE_SAMPLED_IMAGE: u32 = 7;
pub const SPVC_RESOURCE_TYPE_SEPARATE_IMAGE: u32 = 10;
pub const SPVC_RESOURCE_TYPE_SEPARATE_SAMPLERS: u32 = 11;

// spvc_builtin_resource_type
pub const SPVC_BUILTIN_RESOURCE_TYPE_STAGE_INPUT: u32 = 1;
pub const SPVC_BUILTIN_RESOURCE_TYPE_STAGE_OUTPUT: u32 = 2;

// spvc_basetype
pub const SPVC_BASETYPE_VOID: u32 = 1;
pub const SPVC_BASETYPE_BOOLEAN: u32 = 2;
pub const SPVC_BASETYPE_INT16: u32 = 5;
pub const SPVC_BASETYPE_UINT16: u32 = 6;
pub const SPVC_BASETYPE_INT32: u32 = 7;
pub const SPVC_BASETYPE_UINT32: u32 = 8;
pub const SPVC_BASETYPE_FP16: u32 = 12;
pub const SPVC_BASETYPE_FP32: u32 = 13;
pub const SPVC_BASETYPE_STRUCT: u32 = 15;

// spvc_msl_platform
pub const SPVC_MSL_PLATFORM_IOS: u32 = 0;
pub const SPVC_MSL_PLATFORM_MACOS: u32 = 1;

const SPVC_COMPILER_OPTION_COMMON_BIT: u32 = 0x1000000;
const SPVC_COMPILER_OPTION_GLSL_BIT: u32 = 0x2000000;
const SPVC_COMPILER_OPTION_HLSL_BIT: u32 = 0x4000000;
const SPVC_COMPILER_OPTION_MSL_BIT: u32 = 0x8000000;

// spvc_compiler_option
pub const SPVC_COMPILER_OPTION_FORCE_TEMPORARY: u32 = 1 | SPVC_COMPILER_OPTION_COMMON_BIT;
pub const SPVC_COMPILER_OPTION_FLATTEN_MULTIDIMENSIONAL_ARRAYS: u32 =
    2 | SPVC_COMPILER_OPTION_COMMON_BIT;
pub const SPVC_COMPILER_OPTION_FIXUP_DEPTH_CONVENTION: u32 = 3 | SPVC_COMPILER_OPTION_COMMON_BIT;
pub const SPVC_COMPILER_OPTION_FLIP_VERTEX_Y: u32 = 4 | SPVC_COMPILER_OPTION_COMMON_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_SUPPORT_NONZERO_BASE_INSTANCE: u32 =
    5 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_SEPARATE_SHADER_OBJECTS: u32 =
    6 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_ENABLE_420PACK_EXTENSION: u32 =
    7 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_VERSION: u32 = 8 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_ES: u32 = 9 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_GLSL_VULKAN_SEMANTICS: u32 = 10 | SPVC_COMPILER_OPTION_GLSL_BIT;
pub const SPVC_COMPILER_OPTION_HLSL_SHADER_MODEL: u32 = 13 | SPVC_COMPILER_OPTION_HLSL_BIT;
pub const SPVC_COMPILER_OPTION_MSL_VERSION: u32 = 17 | SPVC_COMPILER_OPTION_MSL_BIT;
pub const SPVC_COMPILER_OPTION_MSL_SWIZZLE_TEXTURE_SAMPLES: u32 =
    28 | SPVC_COMPILER_OPTION_MSL_BIT;
pub const SPVC_COMPILER_OPTION_MSL_PLATFORM: u32 = 31 | SPVC_COMPILER_OPTION_MSL_BIT;

/// Declares the function table and the code that fills it from a [`Library`].
macro_rules! spvc_api {
    ($(fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;)*) => {
        /// Every SPIRV-Cross entry point this crate calls
        #[derive(Clone, Copy)]
        pub struct SpvcApi {
            $(pub $name: unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?,)*
        }

        impl SpvcApi {
            /// Resolves each symbol, failing on the first one that is missing.
            pub fn load(library: &Library) -> Result<Self> {
                Ok(SpvcApi {
                    $($name: unsafe {
                        std::mem::transmute::<*const c_void, unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                            library.symbol(stringify!($name))?,
                        )
                    },)*
                })
            }

            /// Names of all resolved symbols, in declaration order
            pub const SYMBOLS: &'static [&'static str] = &[$(stringify!($name)),*];
        }
    };
}

spvc_api! {
    fn spvc_context_create(context: *mut spvc_context) -> spvc_result;
    fn spvc_context_destroy(context: spvc_context);
    fn spvc_context_get_last_error_string(context: spvc_context) -> *const c_char;
    fn spvc_context_parse_spirv(
        context: spvc_context,
        spirv: *const SpvId,
        word_count: usize,
        parsed_ir: *mut spvc_parsed_ir,
    ) -> spvc_result;
    fn spvc_context_create_compiler(
        context: spvc_context,
        backend: u32,
        parsed_ir: spvc_parsed_ir,
        mode: u32,
        compiler: *mut spvc_compiler,
    ) -> spvc_result;

    fn spvc_compiler_create_compiler_options(compiler: spvc_compiler, options: *mut spvc_compiler_options) -> spvc_result;
    fn spvc_compiler_options_set_bool(options: spvc_compiler_options, option: u32, value: spvc_bool) -> spvc_result;
    fn spvc_compiler_options_set_uint(options: spvc_compiler_options, option: u32, value: u32) -> spvc_result;
    fn spvc_compiler_install_compiler_options(compiler: spvc_compiler, options: spvc_compiler_options) -> spvc_result;
    fn spvc_compiler_compile(compiler: spvc_compiler, source: *mut *const c_char) -> spvc_result;

    fn spvc_compiler_create_shader_resources(compiler: spvc_compiler, resources: *mut spvc_resources) -> spvc_result;
    fn spvc_resources_get_resource_list_for_type(
        resources: spvc_resources,
        ty: u32,
        list: *mut *const spvc_reflected_resource,
        count: *mut usize,
    ) -> spvc_result;
    fn spvc_resources_get_builtin_resource_list_for_type(
        resources: spvc_resources,
        ty: u32,
        list: *mut *const spvc_reflected_builtin_resource,
        count: *mut usize,
    ) -> spvc_result;

    fn spvc_compiler_set_decoration(compiler: spvc_compiler, id: SpvId, decoration: u32, argument: u32);
    fn spvc_compiler_has_decoration(compiler: spvc_compiler, id: SpvId, decoration: u32) -> spvc_bool;
    fn spvc_compiler_get_decoration(compiler: spvc_compiler, id: SpvId, decoration: u32) -> u32;
    fn spvc_compiler_get_member_decoration(compiler: spvc_compiler, id: spvc_type_id, member_index: u32, decoration: u32) -> u32;
    fn spvc_compiler_has_member_decoration(compiler: spvc_compiler, id: spvc_type_id, member_index: u32, decoration: u32) -> spvc_bool;
    fn spvc_compiler_get_name(compiler: spvc_compiler, id: SpvId) -> *const c_char;
    fn spvc_compiler_set_name(compiler: spvc_compiler, id: SpvId, argument: *const c_char);
    fn spvc_compiler_get_member_name(compiler: spvc_compiler, id: spvc_type_id, member_index: u32) -> *const c_char;
    fn spvc_compiler_get_buffer_block_decorations(
        compiler: spvc_compiler,
        id: spvc_variable_id,
        decorations: *mut *const u32,
        count: *mut usize,
    ) -> spvc_result;

    fn spvc_compiler_get_type_handle(compiler: spvc_compiler, id: spvc_type_id) -> spvc_type;
    fn spvc_type_get_base_type_id(ty: spvc_type) -> spvc_type_id;
    fn spvc_type_get_basetype(ty: spvc_type) -> u32;
    fn spvc_type_get_vector_size(ty: spvc_type) -> u32;
    fn spvc_type_get_columns(ty: spvc_type) -> u32;
    fn spvc_type_get_num_array_dimensions(ty: spvc_type) -> u32;
    fn spvc_type_get_array_dimension(ty: spvc_type, dimension: u32) -> SpvId;
    fn spvc_type_get_num_member_types(ty: spvc_type) -> u32;
    fn spvc_type_get_member_type(ty: spvc_type, index: u32) -> spvc_type_id;
    fn spvc_type_get_storage_class(ty: spvc_type) -> u32;
    fn spvc_compiler_get_declared_struct_size(compiler: spvc_compiler, ty: spvc_type, size: *mut usize) -> spvc_result;
    fn spvc_compiler_get_declared_struct_member_size(compiler: spvc_compiler, ty: spvc_type, index: u32, size: *mut usize) -> spvc_result;
    fn spvc_compiler_type_struct_member_offset(compiler: spvc_compiler, ty: spvc_type, index: u32, offset: *mut u32) -> spvc_result;
    fn spvc_compiler_type_struct_member_array_stride(compiler: spvc_compiler, ty: spvc_type, index: u32, stride: *mut u32) -> spvc_result;

    fn spvc_compiler_set_entry_point(compiler: spvc_compiler, name: *const c_char, model: u32) -> spvc_result;
    fn spvc_compiler_get_execution_model(compiler: spvc_compiler) -> u32;
    fn spvc_compiler_get_execution_modes(compiler: spvc_compiler, modes: *mut *const u32, count: *mut usize) -> spvc_result;
    fn spvc_compiler_get_execution_mode_argument_by_index(compiler: spvc_compiler, mode: u32, index: u32) -> u32;
    fn spvc_compiler_get_work_group_size_specialization_constants(
        compiler: spvc_compiler,
        x: *mut spvc_specialization_constant,
        y: *mut spvc_specialization_constant,
        z: *mut spvc_specialization_constant,
    ) -> spvc_constant_id;

    fn spvc_compiler_build_dummy_sampler_for_combined_images(compiler: spvc_compiler, id: *mut spvc_variable_id) -> spvc_result;
    fn spvc_compiler_build_combined_image_samplers(compiler: spvc_compiler) -> spvc_result;
    fn spvc_compiler_get_combined_image_samplers(
        compiler: spvc_compiler,
        samplers: *mut *const spvc_combined_image_sampler,
        count: *mut usize,
    ) -> spvc_result;
    fn spvc_compiler_hlsl_remap_num_workgroups_builtin(compiler: spvc_compiler) -> spvc_variable_id;
}
