//! SPIRV-Cross through its C API
//!
//! Every call gets its own context; [`Session`] destroys it, and with it
//! every compiler, option set and resource list allocated inside.

use crate::blob::string_from_ptr;
use crate::cross::{Backend, CrossOutput, CrossRequest, MslPlatform, Transpiler, combined_sampler_name};
use crate::native::SpirvCross;
use crate::reflect::spirv::{
    BaseType, ResourceKind, SpecializationConstant, SpirvBuiltin, SpirvQuery, SpirvReflector,
    SpirvResource, SpirvType,
};
use crate::{Blob, Reflection};
use spirv::{Decoration, ExecutionMode, ExecutionModel, StorageClass};
use std::ffi::CString;
use std::{ptr, slice};
use tracing::{debug, trace, warn};
use xshade_sys::spvc::*;

type SpvcResult<T> = std::result::Result<T, String>;

/// Views a list SPIRV-Cross hands back through out-parameters.
unsafe fn list<'a, T>(data: *const T, count: usize) -> &'a [T] {
    if data.is_null() || count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(data, count) }
    }
}

fn c_string(text: &str) -> SpvcResult<CString> {
    CString::new(text).map_err(|_| format!("'{text}' contains a NUL byte"))
}

struct Session<'a> {
    api: &'a SpvcApi,
    context: spvc_context,
}

impl<'a> Session<'a> {
    fn new(api: &'a SpvcApi) -> SpvcResult<Self> {
        let mut context: spvc_context = ptr::null_mut();
        let result = unsafe { (api.spvc_context_create)(&mut context) };
        if result != SPVC_SUCCESS || context.is_null() {
            return Err(format!("spvc_context_create failed ({result})"));
        }
        Ok(Session { api, context })
    }

    fn last_error(&self) -> String {
        unsafe { string_from_ptr((self.api.spvc_context_get_last_error_string)(self.context)) }
    }

    fn check(&self, result: spvc_result) -> SpvcResult<()> {
        if result == SPVC_SUCCESS {
            Ok(())
        } else {
            Err(self.last_error())
        }
    }

    fn create_compiler(&self, spirv: &[u32], backend: u32) -> SpvcResult<CrossCompiler<'_>> {
        let mut ir: spvc_parsed_ir = ptr::null_mut();
        self.check(unsafe {
            (self.api.spvc_context_parse_spirv)(self.context, spirv.as_ptr(), spirv.len(), &mut ir)
        })?;

        let mut compiler: spvc_compiler = ptr::null_mut();
        self.check(unsafe {
            (self.api.spvc_context_create_compiler)(
                self.context,
                backend,
                ir,
                SPVC_CAPTURE_MODE_COPY,
                &mut compiler,
            )
        })?;
        Ok(CrossCompiler {
            session: self,
            compiler,
        })
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.spvc_context_destroy)(self.context) };
    }
}

/// A backend compiler living in a [`Session`]
struct CrossCompiler<'s> {
    session: &'s Session<'s>,
    compiler: spvc_compiler,
}

impl CrossCompiler<'_> {
    fn api(&self) -> &SpvcApi {
        self.session.api
    }

    fn check(&self, result: spvc_result) -> SpvcResult<()> {
        self.session.check(result)
    }

    fn set_entry_point(&self, name: &str, model: ExecutionModel) -> SpvcResult<()> {
        let name = c_string(name)?;
        self.check(unsafe {
            (self.api().spvc_compiler_set_entry_point)(self.compiler, name.as_ptr(), model as u32)
        })
    }

    fn set_name(&self, id: u32, name: &str) -> SpvcResult<()> {
        let name = c_string(name)?;
        unsafe { (self.api().spvc_compiler_set_name)(self.compiler, id, name.as_ptr()) };
        Ok(())
    }

    fn set_decoration(&self, id: u32, decoration: Decoration, value: u32) {
        unsafe {
            (self.api().spvc_compiler_set_decoration)(self.compiler, id, decoration as u32, value)
        };
    }

    /// Places `id` at descriptor set 0, binding 0.
    fn bind_first_slot(&self, id: u32) {
        self.set_decoration(id, Decoration::DescriptorSet, 0);
        self.set_decoration(id, Decoration::Binding, 0);
    }

    fn install_options(&self, request: &CrossRequest<'_>) -> SpvcResult<()> {
        let api = self.api();
        let plan = &request.plan;
        let mut options: spvc_compiler_options = ptr::null_mut();
        self.check(unsafe { (api.spvc_compiler_create_compiler_options)(self.compiler, &mut options) })?;

        let set_bool = |option: u32, value: bool| {
            self.check(unsafe {
                (api.spvc_compiler_options_set_bool)(
                    options,
                    option,
                    if value { SPVC_TRUE } else { SPVC_FALSE },
                )
            })
        };
        let set_uint = |option: u32, value: u32| {
            self.check(unsafe { (api.spvc_compiler_options_set_uint)(options, option, value) })
        };

        set_bool(SPVC_COMPILER_OPTION_FORCE_TEMPORARY, false)?;
        set_bool(SPVC_COMPILER_OPTION_FLATTEN_MULTIDIMENSIONAL_ARRAYS, false)?;
        set_bool(SPVC_COMPILER_OPTION_FIXUP_DEPTH_CONVENTION, false)?;
        set_bool(SPVC_COMPILER_OPTION_FLIP_VERTEX_Y, false)?;

        // GLSL options are refused by the HLSL and MSL compilers.
        match plan.backend {
            Backend::Glsl {
                es, enable_420pack, ..
            } => {
                if let Some(version) = plan.version {
                    set_uint(SPVC_COMPILER_OPTION_GLSL_VERSION, version)?;
                }
                set_bool(SPVC_COMPILER_OPTION_GLSL_ES, es)?;
                set_bool(SPVC_COMPILER_OPTION_GLSL_SEPARATE_SHADER_OBJECTS, true)?;
                set_bool(SPVC_COMPILER_OPTION_GLSL_ENABLE_420PACK_EXTENSION, enable_420pack)?;
                set_bool(SPVC_COMPILER_OPTION_GLSL_VULKAN_SEMANTICS, false)?;
                set_bool(SPVC_COMPILER_OPTION_GLSL_SUPPORT_NONZERO_BASE_INSTANCE, true)?;
            }
            Backend::Hlsl { shader_model } => {
                if let Some(shader_model) = shader_model {
                    set_uint(SPVC_COMPILER_OPTION_HLSL_SHADER_MODEL, shader_model)?;
                }
            }
            Backend::Msl { platform } => {
                if let Some(version) = plan.version {
                    set_uint(SPVC_COMPILER_OPTION_MSL_VERSION, version)?;
                }
                set_bool(SPVC_COMPILER_OPTION_MSL_SWIZZLE_TEXTURE_SAMPLES, false)?;
                set_uint(
                    SPVC_COMPILER_OPTION_MSL_PLATFORM,
                    match platform {
                        MslPlatform::Ios => SPVC_MSL_PLATFORM_IOS,
                        MslPlatform::MacOs => SPVC_MSL_PLATFORM_MACOS,
                    },
                )?;
            }
        }

        self.check(unsafe { (api.spvc_compiler_install_compiler_options)(self.compiler, options) })
    }

    fn resource_list(&self, kind: ResourceKind) -> SpvcResult<Vec<SpirvResource>> {
        let ty = match kind {
            ResourceKind::UniformBuffer => SPVC_RESOURCE_TYPE_UNIFORM_BUFFER,
            ResourceKind::StorageBuffer => SPVC_RESOURCE_TYPE_STORAGE_BUFFER,
            ResourceKind::StageInput => SPVC_RESOURCE_TYPE_STAGE_INPUT,
            ResourceKind::StageOutput => SPVC_RESOURCE_TYPE_STAGE_OUTPUT,
            ResourceKind::StorageImage => SPVC_RESOURCE_TYPE_STORAGE_IMAGE,
            ResourceKind::SampledImage => SPVC_RESOURCE_TYPE_SAMPLED_IMAGE,
            ResourceKind::SeparateImage => SPVC_RESOURCE_TYPE_SEPARATE_IMAGE,
            ResourceKind::SeparateSampler => SPVC_RESOURCE_TYPE_SEPARATE_SAMPLERS,
        };
        let resources = self.shader_resources()?;
        let mut data: *const spvc_reflected_resource = ptr::null();
        let mut count = 0;
        self.check(unsafe {
            (self.api().spvc_resources_get_resource_list_for_type)(resources, ty, &mut data, &mut count)
        })?;
        Ok(unsafe { list(data, count) }
            .iter()
            .map(reflected_resource)
            .collect())
    }

    fn builtin_list(&self, output: bool) -> SpvcResult<Vec<SpirvBuiltin>> {
        let ty = if output {
            SPVC_BUILTIN_RESOURCE_TYPE_STAGE_OUTPUT
        } else {
            SPVC_BUILTIN_RESOURCE_TYPE_STAGE_INPUT
        };
        let resources = self.shader_resources()?;
        let mut data: *const spvc_reflected_builtin_resource = ptr::null();
        let mut count = 0;
        self.check(unsafe {
            (self.api().spvc_resources_get_builtin_resource_list_for_type)(
                resources, ty, &mut data, &mut count,
            )
        })?;
        Ok(unsafe { list(data, count) }
            .iter()
            .map(|b| SpirvBuiltin {
                builtin: b.builtin,
                resource: reflected_resource(&b.resource),
            })
            .collect())
    }

    // Recreated on each query: the lists change as samplers are combined.
    fn shader_resources(&self) -> SpvcResult<spvc_resources> {
        let mut resources: spvc_resources = ptr::null_mut();
        self.check(unsafe {
            (self.api().spvc_compiler_create_shader_resources)(self.compiler, &mut resources)
        })?;
        Ok(resources)
    }

    fn build_dummy_sampler(&self) -> SpvcResult<u32> {
        let mut id = 0;
        self.check(unsafe {
            (self.api().spvc_compiler_build_dummy_sampler_for_combined_images)(self.compiler, &mut id)
        })?;
        Ok(id)
    }

    fn build_combined_image_samplers(&self) -> SpvcResult<Vec<spvc_combined_image_sampler>> {
        let api = self.api();
        self.check(unsafe { (api.spvc_compiler_build_combined_image_samplers)(self.compiler) })?;
        let mut data: *const spvc_combined_image_sampler = ptr::null();
        let mut count = 0;
        self.check(unsafe {
            (api.spvc_compiler_get_combined_image_samplers)(self.compiler, &mut data, &mut count)
        })?;
        Ok(unsafe { list(data, count) }.to_vec())
    }

    fn remap_num_workgroups(&self) -> u32 {
        unsafe { (self.api().spvc_compiler_hlsl_remap_num_workgroups_builtin)(self.compiler) }
    }

    fn compile(&self) -> SpvcResult<String> {
        let mut source: *const std::ffi::c_char = ptr::null();
        self.check(unsafe { (self.api().spvc_compiler_compile)(self.compiler, &mut source) })?;
        Ok(unsafe { string_from_ptr(source) })
    }

    fn type_handle(&self, type_id: u32) -> Option<spvc_type> {
        let handle = unsafe { (self.api().spvc_compiler_get_type_handle)(self.compiler, type_id) };
        (!handle.is_null()).then_some(handle)
    }

    /// Runs a member layout query, 0 when it fails.
    fn member_layout(
        &self,
        type_id: u32,
        query: impl FnOnce(spvc_type, *mut u32) -> spvc_result,
    ) -> u32 {
        let Some(handle) = self.type_handle(type_id) else {
            return 0;
        };
        let mut value = 0;
        if query(handle, &mut value) == SPVC_SUCCESS {
            value
        } else {
            0
        }
    }
}

/// Set and binding decorations of a compiled module
trait BindingDecorations {
    /// The decoration's argument, `None` when `id` lacks it
    fn binding_decoration(&self, id: u32, decoration: Decoration) -> Option<u32>;
    fn decorate(&self, id: u32, decoration: Decoration, value: u32);
}

impl BindingDecorations for CrossCompiler<'_> {
    fn binding_decoration(&self, id: u32, decoration: Decoration) -> Option<u32> {
        SpirvQuery::has_decoration(self, id, decoration)
            .then(|| SpirvQuery::decoration(self, id, decoration))
    }

    fn decorate(&self, id: u32, decoration: Decoration, value: u32) {
        self.set_decoration(id, decoration, value);
    }
}

/// Copies the image's set and binding onto its combined sampler.
///
/// Only the image is consulted; a combined sampler whose image is
/// undecorated stays undecorated.
fn inherit_bindings(module: &dyn BindingDecorations, combined: &spvc_combined_image_sampler) {
    for decoration in [Decoration::DescriptorSet, Decoration::Binding] {
        if let Some(value) = module.binding_decoration(combined.image_id, decoration) {
            module.decorate(combined.combined_id, decoration, value);
        }
    }
}

fn reflected_resource(resource: &spvc_reflected_resource) -> SpirvResource {
    SpirvResource {
        id: resource.id,
        type_id: resource.type_id,
        name: unsafe { string_from_ptr(resource.name) },
    }
}

fn base_type(basetype: u32) -> BaseType {
    match basetype {
        SPVC_BASETYPE_VOID => BaseType::Void,
        SPVC_BASETYPE_BOOLEAN => BaseType::Boolean,
        SPVC_BASETYPE_INT16 => BaseType::Int16,
        SPVC_BASETYPE_UINT16 => BaseType::UInt16,
        SPVC_BASETYPE_INT32 => BaseType::Int,
        SPVC_BASETYPE_UINT32 => BaseType::UInt,
        SPVC_BASETYPE_FP16 => BaseType::Half,
        SPVC_BASETYPE_FP32 => BaseType::Float,
        SPVC_BASETYPE_STRUCT => BaseType::Struct,
        _ => BaseType::Unknown,
    }
}

impl SpirvQuery for CrossCompiler<'_> {
    fn resources(&self, kind: ResourceKind) -> Vec<SpirvResource> {
        self.resource_list(kind).unwrap_or_else(|e| {
            warn!(?kind, error = %e, "resource query failed");
            Vec::new()
        })
    }

    fn builtins(&self, output: bool) -> Vec<SpirvBuiltin> {
        self.builtin_list(output).unwrap_or_else(|e| {
            warn!(output, error = %e, "built-in query failed");
            Vec::new()
        })
    }

    fn name(&self, id: u32) -> String {
        unsafe { string_from_ptr((self.api().spvc_compiler_get_name)(self.compiler, id)) }
    }

    fn member_name(&self, type_id: u32, index: u32) -> String {
        unsafe {
            string_from_ptr((self.api().spvc_compiler_get_member_name)(self.compiler, type_id, index))
        }
    }

    fn decoration(&self, id: u32, decoration: Decoration) -> u32 {
        unsafe { (self.api().spvc_compiler_get_decoration)(self.compiler, id, decoration as u32) }
    }

    fn has_decoration(&self, id: u32, decoration: Decoration) -> bool {
        unsafe { (self.api().spvc_compiler_has_decoration)(self.compiler, id, decoration as u32) != SPVC_FALSE }
    }

    fn has_member_decoration(&self, type_id: u32, index: u32, decoration: Decoration) -> bool {
        unsafe {
            (self.api().spvc_compiler_has_member_decoration)(
                self.compiler,
                type_id,
                index,
                decoration as u32,
            ) != SPVC_FALSE
        }
    }

    fn buffer_block_decorations(&self, id: u32) -> Vec<Decoration> {
        let mut data: *const u32 = ptr::null();
        let mut count = 0;
        let result = unsafe {
            (self.api().spvc_compiler_get_buffer_block_decorations)(self.compiler, id, &mut data, &mut count)
        };
        if result != SPVC_SUCCESS {
            return Vec::new();
        }
        unsafe { list(data, count) }
            .iter()
            .filter_map(|&d| Decoration::from_u32(d))
            .collect()
    }

    fn type_of(&self, type_id: u32) -> SpirvType {
        let Some(handle) = self.type_handle(type_id) else {
            return SpirvType {
                id: type_id,
                ..Default::default()
            };
        };
        let api = self.api();
        unsafe {
            SpirvType {
                id: type_id,
                self_id: (api.spvc_type_get_base_type_id)(handle),
                basetype: base_type((api.spvc_type_get_basetype)(handle)),
                vecsize: (api.spvc_type_get_vector_size)(handle),
                columns: (api.spvc_type_get_columns)(handle),
                array: (0..(api.spvc_type_get_num_array_dimensions)(handle))
                    .map(|dim| (api.spvc_type_get_array_dimension)(handle, dim))
                    .collect(),
                member_types: (0..(api.spvc_type_get_num_member_types)(handle))
                    .map(|index| (api.spvc_type_get_member_type)(handle, index))
                    .collect(),
                storage: StorageClass::from_u32((api.spvc_type_get_storage_class)(handle)),
            }
        }
    }

    fn declared_struct_size(&self, type_id: u32) -> u32 {
        let Some(handle) = self.type_handle(type_id) else {
            return 0;
        };
        let mut size = 0usize;
        let result = unsafe {
            (self.api().spvc_compiler_get_declared_struct_size)(self.compiler, handle, &mut size)
        };
        if result == SPVC_SUCCESS { size as u32 } else { 0 }
    }

    fn declared_member_size(&self, type_id: u32, index: u32) -> u32 {
        let Some(handle) = self.type_handle(type_id) else {
            return 0;
        };
        let mut size = 0usize;
        let result = unsafe {
            (self.api().spvc_compiler_get_declared_struct_member_size)(
                self.compiler,
                handle,
                index,
                &mut size,
            )
        };
        if result == SPVC_SUCCESS { size as u32 } else { 0 }
    }

    fn member_offset(&self, type_id: u32, index: u32) -> u32 {
        self.member_layout(type_id, |handle, offset| unsafe {
            (self.api().spvc_compiler_type_struct_member_offset)(self.compiler, handle, index, offset)
        })
    }

    fn member_array_stride(&self, type_id: u32, index: u32) -> u32 {
        self.member_layout(type_id, |handle, stride| unsafe {
            (self.api().spvc_compiler_type_struct_member_array_stride)(self.compiler, handle, index, stride)
        })
    }

    fn execution_model(&self) -> Option<ExecutionModel> {
        ExecutionModel::from_u32(unsafe { (self.api().spvc_compiler_get_execution_model)(self.compiler) })
    }

    fn execution_modes(&self) -> Vec<ExecutionMode> {
        let mut data: *const u32 = ptr::null();
        let mut count = 0;
        let result = unsafe {
            (self.api().spvc_compiler_get_execution_modes)(self.compiler, &mut data, &mut count)
        };
        if result != SPVC_SUCCESS {
            return Vec::new();
        }
        unsafe { list(data, count) }
            .iter()
            .filter_map(|&mode| ExecutionMode::from_u32(mode))
            .collect()
    }

    fn execution_mode_argument(&self, mode: ExecutionMode, index: u32) -> u32 {
        unsafe {
            (self.api().spvc_compiler_get_execution_mode_argument_by_index)(
                self.compiler,
                mode as u32,
                index,
            )
        }
    }

    fn work_group_size_constants(&self) -> [SpecializationConstant; 3] {
        let mut x = spvc_specialization_constant::default();
        let mut y = spvc_specialization_constant::default();
        let mut z = spvc_specialization_constant::default();
        unsafe {
            (self.api().spvc_compiler_get_work_group_size_specialization_constants)(
                self.compiler,
                &mut x,
                &mut y,
                &mut z,
            )
        };
        [x, y, z].map(|c| SpecializationConstant {
            id: c.id,
            constant_id: c.constant_id,
        })
    }
}

impl Transpiler for SpirvCross {
    fn transpile(&self, request: &CrossRequest<'_>) -> SpvcResult<CrossOutput> {
        let plan = &request.plan;
        let backend = match plan.backend {
            Backend::Glsl { .. } => SPVC_BACKEND_GLSL,
            Backend::Hlsl { .. } => SPVC_BACKEND_HLSL,
            Backend::Msl { .. } => SPVC_BACKEND_MSL,
        };
        debug!(
            backend,
            version = ?plan.version,
            entry = request.entry_point,
            words = request.spirv.len(),
            "cross-compiling SPIR-V"
        );

        let session = Session::new(self.api())?;
        let compiler = session.create_compiler(request.spirv, backend)?;
        compiler.set_entry_point(request.entry_point, plan.model)?;

        for (kind, output) in [(ResourceKind::StageOutput, true), (ResourceKind::StageInput, false)] {
            for var in compiler.resource_list(kind)? {
                if let Some(name) = plan.varying_name(&compiler.name(var.id), output) {
                    trace!(id = var.id, %name, "renaming varying");
                    compiler.set_name(var.id, &name)?;
                }
            }
        }

        compiler.install_options(request)?;

        if plan.is_msl() {
            for kind in [ResourceKind::SeparateImage, ResourceKind::SeparateSampler] {
                for (binding, resource) in compiler.resource_list(kind)?.iter().enumerate() {
                    compiler.set_decoration(resource.id, Decoration::Binding, binding as u32);
                }
            }
        }

        if plan.combined_samplers {
            let dummy = compiler.build_dummy_sampler()?;
            if dummy != 0 {
                compiler.bind_first_slot(dummy);
            }

            let combined = compiler.build_combined_image_samplers()?;
            if request.inherit_combined_sampler_bindings {
                for sampler in &combined {
                    inherit_bindings(&compiler, sampler);
                }
            }
            for sampler in &combined {
                let name = combined_sampler_name(
                    &compiler.name(sampler.image_id),
                    &compiler.name(sampler.sampler_id),
                );
                compiler.set_name(sampler.combined_id, &name)?;
            }
        }

        if plan.is_hlsl() {
            let num_workgroups = compiler.remap_num_workgroups();
            if num_workgroups != 0 {
                compiler.bind_first_slot(num_workgroups);
            }
        }

        let text = compiler.compile()?;
        let reflection = if request.need_reflection {
            Reflection::build(&SpirvReflector { query: &compiler })
        } else {
            Reflection::default()
        };
        debug!(size = text.len(), "cross-compiled");

        Ok(CrossOutput {
            text: Blob::from(text),
            reflection,
        })
    }
}
