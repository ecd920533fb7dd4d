//! Reflection from the DXIL part of a container through D3D12 reflection

use super::signature::component_type_from_d3d;
use super::variable::packed_member_size;
use super::{
    ConstantBuffer, DataType, PrimitiveTopology, ReflectionBuilder, ReflectionData, ResourceDesc,
    ShaderResourceType, SignatureParameterDesc, TessellatorDomain, TessellatorOutputPrimitive,
    TessellatorPartitioning, VariableDesc, VariableType,
};
use crate::blob::string_from_ptr;
use crate::container::{Container, FourCC};
use crate::native::Dxcompiler;
use crate::ComponentMask;
use tracing::warn;
use xshade_sys::{
    ID3D12ShaderReflection, ID3D12ShaderReflectionConstantBuffer, ID3D12ShaderReflectionType,
    D3D12_SHADER_BUFFER_DESC, D3D12_SHADER_DESC, D3D12_SHADER_INPUT_BIND_DESC,
    D3D12_SHADER_TYPE_DESC, D3D12_SHADER_VARIABLE_DESC, D3D12_SIGNATURE_PARAMETER_DESC, FAILED,
    HRESULT, UINT,
};

/// Reflects a DXIL container compiled for a full entry point.
pub(crate) struct DxilReflector<'a> {
    pub dxc: &'a Dxcompiler,
    pub container: &'a [u8],
}

impl ReflectionBuilder for DxilReflector<'_> {
    fn build(&self, data: &mut ReflectionData) -> bool {
        match Container::parse(self.container) {
            Ok(container) if container.find(FourCC::DXIL).is_some() => {}
            Ok(_) => {
                warn!("container has no DXIL part, reflection unavailable");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "reflection unavailable");
                return false;
            }
        }

        let reflection = match self.dxc.shader_reflection(self.container) {
            Ok(reflection) => reflection,
            Err(e) => {
                warn!(error = %e, "D3D12 shader reflection unavailable");
                return false;
            }
        };

        unsafe { read_shader(&reflection, data) }
    }
}

unsafe fn read_shader(reflection: &ID3D12ShaderReflection, data: &mut ReflectionData) -> bool {
    let mut desc = D3D12_SHADER_DESC::default();
    if FAILED(unsafe { reflection.get_desc(&mut desc) }) {
        warn!("ID3D12ShaderReflection::GetDesc failed");
        return false;
    }

    for index in 0..desc.BoundResources {
        let mut bind = D3D12_SHADER_INPUT_BIND_DESC::default();
        if FAILED(unsafe { reflection.get_resource_binding_desc(index, &mut bind) }) {
            continue;
        }

        let ty = ShaderResourceType::from_d3d(bind.Type);
        if ty == ShaderResourceType::ConstantBuffer {
            let buffer = unsafe { reflection.get_constant_buffer_by_name(bind.Name) };
            if let Some(cb) = unsafe { buffer.as_ref() }.and_then(|b| unsafe { read_constant_buffer(b) }) {
                data.constant_buffers.push(cb);
            }
        }

        data.resources.push(ResourceDesc {
            name: unsafe { string_from_ptr(bind.Name) },
            ty,
            space: bind.Space,
            bind_point: bind.BindPoint,
            bind_count: bind.BindCount,
        });
    }

    data.input_parameters = unsafe {
        read_signature(desc.InputParameters, |i, p| reflection.get_input_parameter_desc(i, p))
    };
    data.output_parameters = unsafe {
        read_signature(desc.OutputParameters, |i, p| {
            reflection.get_output_parameter_desc(i, p)
        })
    };
    data.patch_constant_parameters = unsafe {
        read_signature(desc.PatchConstantParameters, |i, p| {
            reflection.get_patch_constant_parameter_desc(i, p)
        })
    };

    data.gs_hs_input_primitive = PrimitiveTopology::from_d3d_primitive(desc.InputPrimitive);
    data.gs_output_topology = PrimitiveTopology::from_d3d_topology(desc.GSOutputTopology);
    data.gs_max_output_vertices = desc.GSMaxOutputVertexCount;
    data.gs_instance_count = desc.cGSInstanceCount;

    data.hs_output_primitive = TessellatorOutputPrimitive::from_d3d(desc.HSOutputPrimitive);
    data.hs_partitioning = TessellatorPartitioning::from_d3d(desc.HSPartitioning);
    data.hs_ds_tessellator_domain = TessellatorDomain::from_d3d(desc.TessellatorDomain);
    data.hs_ds_control_point_count = desc.cControlPoints;

    let [x, y, z] = &mut data.cs_block_size;
    unsafe { reflection.get_thread_group_size(x, y, z) };

    true
}

unsafe fn read_signature(
    count: u32,
    get: impl Fn(UINT, *mut D3D12_SIGNATURE_PARAMETER_DESC) -> HRESULT,
) -> Vec<SignatureParameterDesc> {
    let mut params = Vec::with_capacity(count as usize);
    for index in 0..count {
        let mut desc = D3D12_SIGNATURE_PARAMETER_DESC::default();
        if FAILED(get(index, &mut desc)) {
            continue;
        }
        params.push(SignatureParameterDesc {
            semantic: unsafe { string_from_ptr(desc.SemanticName) },
            semantic_index: desc.SemanticIndex,
            location: desc.Register,
            component_type: component_type_from_d3d(desc.ComponentType),
            mask: ComponentMask::from_bits_truncate(desc.Mask),
        });
    }
    params
}

unsafe fn read_constant_buffer(buffer: &ID3D12ShaderReflectionConstantBuffer) -> Option<ConstantBuffer> {
    let mut desc = D3D12_SHADER_BUFFER_DESC::default();
    if FAILED(unsafe { buffer.get_desc(&mut desc) }) {
        return None;
    }

    let mut variables = Vec::with_capacity(desc.Variables as usize);
    for index in 0..desc.Variables {
        let Some(variable) = (unsafe { buffer.get_variable_by_index(index).as_ref() }) else {
            continue;
        };
        let mut var_desc = D3D12_SHADER_VARIABLE_DESC::default();
        if FAILED(unsafe { variable.get_desc(&mut var_desc) }) {
            continue;
        }
        let ty = unsafe { variable.get_type().as_ref() }
            .map(|ty| unsafe { read_type(ty) })
            .unwrap_or_default();
        variables.push(VariableDesc {
            name: unsafe { string_from_ptr(var_desc.Name) },
            ty,
            offset: var_desc.StartOffset,
            size: var_desc.Size,
        });
    }

    Some(ConstantBuffer {
        name: unsafe { string_from_ptr(desc.Name) },
        size: desc.Size,
        variables,
    })
}

unsafe fn read_type(ty: &ID3D12ShaderReflectionType) -> VariableType {
    let mut desc = D3D12_SHADER_TYPE_DESC::default();
    if FAILED(unsafe { ty.get_desc(&mut desc) }) {
        return VariableType::default();
    }

    let data_type = DataType::from_d3d(desc.Type, desc.Class);
    let element_stride = if desc.Elements > 0 { desc.Rows * 16 } else { 0 };

    let mut members = Vec::with_capacity(desc.Members as usize);
    if data_type == DataType::Struct {
        for index in 0..desc.Members {
            let Some(member) = (unsafe { ty.get_member_type_by_index(index).as_ref() }) else {
                continue;
            };
            let mut member_desc = D3D12_SHADER_TYPE_DESC::default();
            if FAILED(unsafe { member.get_desc(&mut member_desc) }) {
                continue;
            }
            let member_type = unsafe { read_type(member) };
            let size = packed_member_size(
                member_type.rows,
                member_type.columns,
                member_type.elements,
                member_type.element_stride,
            );
            members.push(VariableDesc {
                name: unsafe { string_from_ptr(ty.get_member_type_name(index)) },
                ty: member_type,
                offset: member_desc.Offset,
                size,
            });
        }
    }

    VariableType {
        name: unsafe { string_from_ptr(desc.Name) },
        data_type,
        rows: desc.Rows,
        columns: desc.Columns,
        elements: desc.Elements,
        element_stride,
        members,
    }
}
