//! Reflection from a SPIR-V module through SPIRV-Cross introspection
//!
//! The reflector only talks to [`SpirvQuery`], so the mapping rules can be
//! exercised without a native SPIRV-Cross.

use super::{
    ConstantBuffer, DataType, PrimitiveTopology, ReflectionBuilder, ReflectionData, ResourceDesc,
    ShaderResourceType, SignatureParameterDesc, TessellatorDomain, TessellatorOutputPrimitive,
    TessellatorPartitioning, VariableDesc, VariableType, split_semantic,
};
use crate::ComponentMask;
use spirv::{BuiltIn, Decoration, ExecutionMode, ExecutionModel, StorageClass};

/// Resource lists SPIRV-Cross sorts a module's variables into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ResourceKind {
    UniformBuffer,
    StorageBuffer,
    StageInput,
    StageOutput,
    StorageImage,
    SampledImage,
    SeparateImage,
    SeparateSampler,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SpirvResource {
    pub id: u32,
    pub type_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpirvBuiltin {
    pub builtin: u32,
    pub resource: SpirvResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BaseType {
    #[default]
    Unknown,
    Void,
    Boolean,
    Int16,
    UInt16,
    Int,
    UInt,
    Half,
    Float,
    Struct,
}

/// The parts of a SPIRV-Cross `SPIRType` reflection looks at
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SpirvType {
    /// Id the type was looked up by
    pub id: u32,
    /// Id of the underlying type with array and pointer wrappers removed
    pub self_id: u32,
    pub basetype: BaseType,
    pub vecsize: u32,
    pub columns: u32,
    /// Array dimensions, outermost last
    pub array: Vec<u32>,
    pub member_types: Vec<u32>,
    pub storage: Option<StorageClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SpecializationConstant {
    pub id: u32,
    pub constant_id: u32,
}

/// Read access to a parsed module, as SPIRV-Cross exposes it
pub(crate) trait SpirvQuery {
    fn resources(&self, kind: ResourceKind) -> Vec<SpirvResource>;
    /// Built-in stage inputs, or outputs when `output` is set
    fn builtins(&self, output: bool) -> Vec<SpirvBuiltin>;
    fn name(&self, id: u32) -> String;
    fn member_name(&self, type_id: u32, index: u32) -> String;
    /// Decoration argument, 0 when absent
    fn decoration(&self, id: u32, decoration: Decoration) -> u32;
    fn has_decoration(&self, id: u32, decoration: Decoration) -> bool;
    fn has_member_decoration(&self, type_id: u32, index: u32, decoration: Decoration) -> bool;
    fn buffer_block_decorations(&self, id: u32) -> Vec<Decoration>;
    fn type_of(&self, type_id: u32) -> SpirvType;
    fn declared_struct_size(&self, type_id: u32) -> u32;
    fn declared_member_size(&self, type_id: u32, index: u32) -> u32;
    fn member_offset(&self, type_id: u32, index: u32) -> u32;
    fn member_array_stride(&self, type_id: u32, index: u32) -> u32;
    fn execution_model(&self) -> Option<ExecutionModel>;
    fn execution_modes(&self) -> Vec<ExecutionMode>;
    fn execution_mode_argument(&self, mode: ExecutionMode, index: u32) -> u32;
    fn work_group_size_constants(&self) -> [SpecializationConstant; 3];
}

pub(crate) struct SpirvReflector<'a> {
    pub query: &'a dyn SpirvQuery,
}

impl ReflectionBuilder for SpirvReflector<'_> {
    fn build(&self, data: &mut ReflectionData) -> bool {
        self.read_resources(data);
        self.read_signatures(data);
        self.read_stage(data);
        true
    }
}

impl SpirvReflector<'_> {
    fn binding(&self, resource: &SpirvResource, ty: ShaderResourceType) -> ResourceDesc {
        let q = self.query;
        ResourceDesc {
            name: q.name(resource.id),
            ty,
            space: q.decoration(resource.id, Decoration::DescriptorSet),
            bind_point: q.decoration(resource.id, Decoration::Binding),
            bind_count: 1,
        }
    }

    fn read_resources(&self, data: &mut ReflectionData) {
        let q = self.query;

        for resource in q.resources(ResourceKind::UniformBuffer) {
            data.resources
                .push(self.binding(&resource, ShaderResourceType::ConstantBuffer));
            data.constant_buffers.push(self.constant_buffer(&resource));
        }

        for resource in q.resources(ResourceKind::StorageBuffer) {
            let ty = q.type_of(resource.type_id);
            let ssbo = ty.storage == Some(StorageClass::StorageBuffer)
                || (ty.storage == Some(StorageClass::Uniform)
                    && q.has_decoration(ty.self_id, Decoration::BufferBlock));
            let kind = if ssbo
                && !q
                    .buffer_block_decorations(resource.id)
                    .contains(&Decoration::NonWritable)
            {
                ShaderResourceType::UnorderedAccessView
            } else {
                ShaderResourceType::ShaderResourceView
            };
            data.resources.push(self.binding(&resource, kind));
        }

        for (kind, ty) in [
            (ResourceKind::StorageImage, ShaderResourceType::UnorderedAccessView),
            (ResourceKind::SeparateImage, ShaderResourceType::Texture),
            (ResourceKind::SeparateSampler, ShaderResourceType::Sampler),
        ] {
            for resource in q.resources(kind) {
                data.resources.push(self.binding(&resource, ty));
            }
        }

        // Combined image-samplers have no binding of their own.
        for (index, resource) in q.resources(ResourceKind::SampledImage).iter().enumerate() {
            let mut desc = self.binding(resource, ShaderResourceType::Texture);
            desc.bind_point = index as u32;
            data.resources.push(desc);
        }
    }

    fn constant_buffer(&self, resource: &SpirvResource) -> ConstantBuffer {
        let q = self.query;
        let ty = q.type_of(resource.type_id);
        ConstantBuffer {
            name: q.name(resource.id),
            size: q.declared_struct_size(resource.type_id),
            variables: self.struct_members(&ty),
        }
    }

    fn struct_members(&self, parent: &SpirvType) -> Vec<VariableDesc> {
        let q = self.query;
        parent
            .member_types
            .iter()
            .enumerate()
            .map(|(index, &member_type)| {
                let index = index as u32;
                VariableDesc {
                    name: q.member_name(parent.self_id, index),
                    ty: self.variable_type(parent, index, &q.type_of(member_type)),
                    offset: q.member_offset(parent.id, index),
                    size: q.declared_member_size(parent.id, index),
                }
            })
            .collect()
    }

    fn variable_type(&self, parent: &SpirvType, index: u32, ty: &SpirvType) -> VariableType {
        let q = self.query;
        let (data_type, mut name) = match ty.basetype {
            BaseType::Boolean => (DataType::Bool, "bool".to_string()),
            BaseType::Int => (DataType::Int, "int".to_string()),
            BaseType::UInt => (DataType::Uint, "uint".to_string()),
            BaseType::Float => (DataType::Float, "float".to_string()),
            BaseType::Half => (DataType::Half, "half".to_string()),
            BaseType::Int16 => (DataType::Int16, "int16_t".to_string()),
            BaseType::UInt16 => (DataType::Uint16, "uint16_t".to_string()),
            BaseType::Void => (DataType::Void, "void".to_string()),
            BaseType::Struct => (DataType::Struct, q.name(ty.self_id)),
            BaseType::Unknown => panic!("unsupported SPIR-V variable type {}", ty.id),
        };

        if ty.columns == 1 {
            if ty.vecsize > 1 {
                name.push_str(&ty.vecsize.to_string());
            }
        } else {
            name.push_str(&format!("{}x{}", ty.columns, ty.vecsize));
        }

        let (mut rows, mut columns) = (ty.columns, ty.vecsize);
        if q.has_member_decoration(parent.self_id, index, Decoration::ColMajor) {
            std::mem::swap(&mut rows, &mut columns);
        }

        let (elements, element_stride) = match ty.array.first() {
            Some(&len) => (len, q.member_array_stride(parent.id, index)),
            None => (0, 0),
        };

        let members = if data_type == DataType::Struct {
            self.struct_members(ty)
        } else {
            Vec::new()
        };

        VariableType {
            name,
            data_type,
            rows,
            columns,
            elements,
            element_stride,
            members,
        }
    }

    fn parameter(&self, resource: &SpirvResource, semantic: &str) -> SignatureParameterDesc {
        let q = self.query;
        let (name, semantic_index) = split_semantic(semantic);
        let ty = q.type_of(resource.type_id);
        let component_type = match ty.basetype {
            BaseType::UInt => DataType::Uint,
            BaseType::Int => DataType::Int,
            BaseType::Float => DataType::Float,
            other => panic!("unsupported parameter component type {other:?}"),
        };
        SignatureParameterDesc {
            semantic: name.to_string(),
            semantic_index,
            location: q.decoration(resource.id, Decoration::Location),
            component_type,
            mask: ComponentMask::from_vector_size(ty.vecsize),
        }
    }

    fn read_signatures(&self, data: &mut ReflectionData) {
        let q = self.query;

        for output in [false, true] {
            for builtin in q.builtins(output) {
                let Some(semantic) = builtin_semantic(builtin.builtin) else {
                    continue;
                };
                let param = self.parameter(&builtin.resource, semantic);
                let tess_level = match BuiltIn::from_u32(builtin.builtin) {
                    Some(BuiltIn::TessLevelOuter) => Some(ComponentMask::W),
                    Some(BuiltIn::TessLevelInner) => Some(ComponentMask::X),
                    _ => None,
                };

                match tess_level {
                    Some(mask) => {
                        // One patch constant per array element
                        let ty = q.type_of(builtin.resource.type_id);
                        let count = ty.array.first().copied().unwrap_or(0);
                        for i in 0..count {
                            let semantic_index =
                                if output || mask == ComponentMask::W { i } else { 0 };
                            data.patch_constant_parameters.push(SignatureParameterDesc {
                                semantic_index,
                                mask,
                                ..param.clone()
                            });
                        }
                    }
                    None if output => data.output_parameters.push(param),
                    None => data.input_parameters.push(param),
                }
            }

            if output {
                for resource in q.resources(ResourceKind::StageOutput) {
                    let param = self.parameter(&resource, &q.name(resource.id));
                    data.output_parameters.push(param);
                }
            } else {
                for resource in q.resources(ResourceKind::StageInput) {
                    let param = self.parameter(&resource, &q.name(resource.id));
                    if q.has_decoration(resource.id, Decoration::Patch) {
                        data.patch_constant_parameters.push(param);
                    } else {
                        data.input_parameters.push(param);
                    }
                }
            }
        }
    }

    fn read_stage(&self, data: &mut ReflectionData) {
        let q = self.query;
        let modes = q.execution_modes();
        let has = |mode: ExecutionMode| modes.contains(&mode);

        match q.execution_model() {
            Some(ExecutionModel::TessellationControl) => {
                if has(ExecutionMode::OutputVertices) {
                    let points = q.execution_mode_argument(ExecutionMode::OutputVertices, 0);
                    data.hs_ds_control_point_count = points;
                    data.hs_ds_tessellator_domain = match points {
                        2 => TessellatorDomain::Line,
                        3 => TessellatorDomain::Triangle,
                        4 => TessellatorDomain::Quad,
                        _ => TessellatorDomain::Undefined,
                    };
                }

                data.gs_hs_input_primitive = if has(ExecutionMode::InputPoints) {
                    PrimitiveTopology::Patches(1)
                } else if has(ExecutionMode::InputLines) {
                    PrimitiveTopology::Patches(2)
                } else if has(ExecutionMode::Triangles) {
                    PrimitiveTopology::Patches(3)
                } else {
                    PrimitiveTopology::Undefined
                };

                data.hs_output_primitive = if has(ExecutionMode::VertexOrderCw) {
                    TessellatorOutputPrimitive::TriangleCW
                } else if has(ExecutionMode::VertexOrderCcw) {
                    TessellatorOutputPrimitive::TriangleCCW
                } else {
                    TessellatorOutputPrimitive::Undefined
                };

                data.hs_partitioning = if has(ExecutionMode::SpacingEqual) {
                    TessellatorPartitioning::Integer
                } else if has(ExecutionMode::SpacingFractionalOdd) {
                    TessellatorPartitioning::FractionalOdd
                } else if has(ExecutionMode::SpacingFractionalEven) {
                    TessellatorPartitioning::FractionalEven
                } else {
                    TessellatorPartitioning::Undefined
                };
            }

            Some(ExecutionModel::TessellationEvaluation) => {
                let (domain, points) = if has(ExecutionMode::Isolines) {
                    (TessellatorDomain::Line, 2)
                } else if has(ExecutionMode::Triangles) {
                    (TessellatorDomain::Triangle, 3)
                } else if has(ExecutionMode::Quads) {
                    (TessellatorDomain::Quad, 4)
                } else {
                    (TessellatorDomain::Undefined, 0)
                };
                data.hs_ds_tessellator_domain = domain;
                data.hs_ds_control_point_count = points;
            }

            Some(ExecutionModel::Geometry) => {
                if has(ExecutionMode::OutputVertices) {
                    data.gs_max_output_vertices =
                        q.execution_mode_argument(ExecutionMode::OutputVertices, 0);
                }
                if has(ExecutionMode::Invocations) {
                    data.gs_instance_count = q.execution_mode_argument(ExecutionMode::Invocations, 0);
                }

                data.gs_hs_input_primitive = if has(ExecutionMode::InputPoints) {
                    PrimitiveTopology::Points
                } else if has(ExecutionMode::InputLines) {
                    PrimitiveTopology::Lines
                } else if has(ExecutionMode::Triangles) {
                    PrimitiveTopology::Triangles
                } else if has(ExecutionMode::InputLinesAdjacency) {
                    PrimitiveTopology::LinesAdj
                } else if has(ExecutionMode::InputTrianglesAdjacency) {
                    PrimitiveTopology::TrianglesAdj
                } else {
                    PrimitiveTopology::Undefined
                };

                data.gs_output_topology = if has(ExecutionMode::OutputPoints) {
                    PrimitiveTopology::Points
                } else if has(ExecutionMode::OutputLineStrip) {
                    PrimitiveTopology::LineStrip
                } else if has(ExecutionMode::OutputTriangleStrip) {
                    PrimitiveTopology::TriangleStrip
                } else {
                    PrimitiveTopology::Undefined
                };
            }

            Some(ExecutionModel::GLCompute) => {
                let constants = q.work_group_size_constants();
                for (axis, constant) in constants.iter().enumerate() {
                    data.cs_block_size[axis] = if constant.id != 0 {
                        constant.constant_id
                    } else {
                        q.execution_mode_argument(ExecutionMode::LocalSize, axis as u32)
                    };
                }
            }

            _ => {}
        }
    }
}

/// HLSL system-value semantic of a built-in, `None` for built-ins that have
/// no signature entry.
///
/// # Panics
/// On any other built-in.
fn builtin_semantic(builtin: u32) -> Option<&'static str> {
    match BuiltIn::from_u32(builtin) {
        Some(BuiltIn::Position | BuiltIn::FragCoord) => Some("SV_Position"),
        Some(BuiltIn::FragDepth) => Some("SV_Depth"),
        Some(BuiltIn::VertexId | BuiltIn::VertexIndex) => Some("SV_VertexID"),
        Some(BuiltIn::InstanceId | BuiltIn::InstanceIndex) => Some("SV_InstanceID"),
        Some(BuiltIn::SampleId) => Some("SV_SampleIndex"),
        Some(BuiltIn::SampleMask) => Some("SV_Coverage"),
        Some(BuiltIn::TessLevelInner) => Some("SV_InsideTessFactor"),
        Some(BuiltIn::TessLevelOuter) => Some("SV_TessFactor"),
        Some(
            BuiltIn::GlobalInvocationId
            | BuiltIn::LocalInvocationId
            | BuiltIn::LocalInvocationIndex
            | BuiltIn::WorkgroupId
            | BuiltIn::FrontFacing
            | BuiltIn::InvocationId
            | BuiltIn::PrimitiveId
            | BuiltIn::TessCoord,
        ) => None,
        _ => panic!("unsupported SPIR-V built-in {builtin}"),
    }
}
