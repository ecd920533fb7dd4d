//! Shader reflection
//!
//! A [`Reflection`] is a read-only snapshot of a compiled shader's bindings,
//! constant buffers, signatures and stage metadata. It comes from one of two
//! places, both normalized to the same shape:
//!
//! - D3D12 shader reflection over the DXIL part of a container, for DXIL
//!   targets compiled as a full entry point;
//! - SPIRV-Cross resource introspection, for targets cross-compiled from
//!   SPIR-V.
//!
//! Reflection can be unavailable, e.g. when the loaded dxcompiler has no
//! container reflection. Check [`Reflection::is_valid`]; an invalid
//! reflection answers every query with an empty list, zero or `Undefined`.
//!
//! # Example
//! ```no_run
//! use xshade::{CompileOptions, Compiler, ShaderStage, ShadingLanguage, SourceDesc, TargetDesc};
//!
//! let source = SourceDesc::new(
//!     r#"
//!     cbuffer Constants : register(b0) {
//!         float4x4 worldViewProj;
//!     };
//!     float4 main(float4 pos : POSITION) : SV_Position {
//!         return mul(pos, worldViewProj);
//!     }
//!     "#,
//!     ShaderStage::Vertex,
//! );
//! let options = CompileOptions::default().reflection();
//! let result = Compiler::new()?
//!     .compile_one(&source, &options, &TargetDesc::new(ShadingLanguage::Dxil))?;
//!
//! let reflection = &result.reflection;
//! for cb in reflection.constant_buffers() {
//!     println!("cbuffer {} ({} bytes)", cb.name, cb.size);
//! }
//! # Ok::<(), xshade::Error>(())
//! ```

mod bindings;
mod constant_buffer;
pub(crate) mod dxil;
mod signature;
pub(crate) mod spirv;
mod stage;
mod types;
mod variable;

pub use bindings::{ResourceDesc, ShaderResourceType};
pub use constant_buffer::ConstantBuffer;
pub use signature::{split_semantic, SignatureParameterDesc};
pub use stage::{
    PrimitiveTopology, TessellatorDomain, TessellatorOutputPrimitive, TessellatorPartitioning,
};
pub use types::{DataType, VariableType};
pub use variable::VariableDesc;

use std::sync::Arc;

/// Everything a reflector extracts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ReflectionData {
    pub resources: Vec<ResourceDesc>,
    pub constant_buffers: Vec<ConstantBuffer>,
    pub input_parameters: Vec<SignatureParameterDesc>,
    pub output_parameters: Vec<SignatureParameterDesc>,
    pub patch_constant_parameters: Vec<SignatureParameterDesc>,
    pub gs_hs_input_primitive: PrimitiveTopology,
    pub gs_output_topology: PrimitiveTopology,
    pub gs_max_output_vertices: u32,
    pub gs_instance_count: u32,
    pub hs_output_primitive: TessellatorOutputPrimitive,
    pub hs_partitioning: TessellatorPartitioning,
    pub hs_ds_tessellator_domain: TessellatorDomain,
    pub hs_ds_control_point_count: u32,
    pub cs_block_size: [u32; 3],
}

/// A source of reflection data
pub(crate) trait ReflectionBuilder {
    /// Fills `data`, or returns false when this source has nothing to offer.
    fn build(&self, data: &mut ReflectionData) -> bool;
}

/// Read-only reflection snapshot, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reflection {
    data: Option<Arc<ReflectionData>>,
}

impl Reflection {
    pub(crate) fn build(builder: &dyn ReflectionBuilder) -> Self {
        let mut data = ReflectionData::default();
        if builder.build(&mut data) {
            Reflection {
                data: Some(Arc::new(data)),
            }
        } else {
            Reflection::default()
        }
    }

    /// False when reflection was not requested or not available
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    fn data(&self) -> Option<&ReflectionData> {
        self.data.as_deref()
    }

    pub fn resources(&self) -> &[ResourceDesc] {
        self.data().map(|d| d.resources.as_slice()).unwrap_or_default()
    }

    pub fn resource(&self, index: usize) -> Option<&ResourceDesc> {
        self.resources().get(index)
    }

    pub fn resource_by_name(&self, name: &str) -> Option<&ResourceDesc> {
        self.resources().iter().find(|r| r.name == name)
    }

    pub fn constant_buffers(&self) -> &[ConstantBuffer] {
        self.data()
            .map(|d| d.constant_buffers.as_slice())
            .unwrap_or_default()
    }

    pub fn constant_buffer(&self, index: usize) -> Option<&ConstantBuffer> {
        self.constant_buffers().get(index)
    }

    pub fn constant_buffer_by_name(&self, name: &str) -> Option<&ConstantBuffer> {
        self.constant_buffers().iter().find(|cb| cb.name == name)
    }

    pub fn input_parameters(&self) -> &[SignatureParameterDesc] {
        self.data()
            .map(|d| d.input_parameters.as_slice())
            .unwrap_or_default()
    }

    pub fn input_parameter(&self, index: usize) -> Option<&SignatureParameterDesc> {
        self.input_parameters().get(index)
    }

    pub fn output_parameters(&self) -> &[SignatureParameterDesc] {
        self.data()
            .map(|d| d.output_parameters.as_slice())
            .unwrap_or_default()
    }

    pub fn output_parameter(&self, index: usize) -> Option<&SignatureParameterDesc> {
        self.output_parameters().get(index)
    }

    /// Input primitive of a geometry shader, or the patch of a hull shader
    pub fn gs_hs_input_primitive(&self) -> PrimitiveTopology {
        self.data().map(|d| d.gs_hs_input_primitive).unwrap_or_default()
    }

    pub fn gs_output_topology(&self) -> PrimitiveTopology {
        self.data().map(|d| d.gs_output_topology).unwrap_or_default()
    }

    pub fn gs_max_output_vertices(&self) -> u32 {
        self.data().map_or(0, |d| d.gs_max_output_vertices)
    }

    pub fn gs_instance_count(&self) -> u32 {
        self.data().map_or(0, |d| d.gs_instance_count)
    }

    pub fn hs_output_primitive(&self) -> TessellatorOutputPrimitive {
        self.data().map(|d| d.hs_output_primitive).unwrap_or_default()
    }

    pub fn hs_partitioning(&self) -> TessellatorPartitioning {
        self.data().map(|d| d.hs_partitioning).unwrap_or_default()
    }

    pub fn hs_ds_tessellator_domain(&self) -> TessellatorDomain {
        self.data()
            .map(|d| d.hs_ds_tessellator_domain)
            .unwrap_or_default()
    }

    pub fn hs_ds_patch_constant_parameters(&self) -> &[SignatureParameterDesc] {
        self.data()
            .map(|d| d.patch_constant_parameters.as_slice())
            .unwrap_or_default()
    }

    pub fn hs_ds_control_point_count(&self) -> u32 {
        self.data().map_or(0, |d| d.hs_ds_control_point_count)
    }

    /// Compute thread group size (X, Y, Z)
    pub fn cs_block_size(&self) -> [u32; 3] {
        self.data().map_or([0; 3], |d| d.cs_block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentMask;
    use pretty_assertions::assert_eq;

    struct Fixed(Option<ReflectionData>);

    impl ReflectionBuilder for Fixed {
        fn build(&self, data: &mut ReflectionData) -> bool {
            match &self.0 {
                Some(fixed) => {
                    *data = fixed.clone();
                    true
                }
                None => false,
            }
        }
    }

    fn sample() -> ReflectionData {
        ReflectionData {
            resources: vec![
                ResourceDesc {
                    name: "cbMain".to_string(),
                    ty: ShaderResourceType::ConstantBuffer,
                    space: 0,
                    bind_point: 0,
                    bind_count: 1,
                },
                ResourceDesc {
                    name: "albedo".to_string(),
                    ty: ShaderResourceType::Texture,
                    space: 0,
                    bind_point: 3,
                    bind_count: 1,
                },
            ],
            constant_buffers: vec![ConstantBuffer {
                name: "cbMain".to_string(),
                size: 16,
                variables: Vec::new(),
            }],
            input_parameters: vec![SignatureParameterDesc {
                semantic: "POSITION".to_string(),
                semantic_index: 0,
                location: 0,
                component_type: DataType::Float,
                mask: ComponentMask::all(),
            }],
            cs_block_size: [8, 8, 1],
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_reflection_is_empty() {
        let reflection = Reflection::default();
        assert!(!reflection.is_valid());
        assert!(reflection.resources().is_empty());
        assert!(reflection.resource(0).is_none());
        assert!(reflection.constant_buffer(0).is_none());
        assert!(reflection.constant_buffer_by_name("cbMain").is_none());
        assert!(reflection.input_parameters().is_empty());
        assert!(reflection.output_parameter(0).is_none());
        assert!(reflection.hs_ds_patch_constant_parameters().is_empty());
        assert_eq!(reflection.gs_hs_input_primitive(), PrimitiveTopology::Undefined);
        assert_eq!(reflection.hs_partitioning(), TessellatorPartitioning::Undefined);
        assert_eq!(reflection.gs_max_output_vertices(), 0);
        assert_eq!(reflection.cs_block_size(), [0, 0, 0]);
    }

    #[test]
    fn test_unavailable_builder_gives_invalid() {
        let reflection = Reflection::build(&Fixed(None));
        assert!(!reflection.is_valid());
        assert_eq!(reflection, Reflection::default());
    }

    #[test]
    fn test_lookups() {
        let reflection = Reflection::build(&Fixed(Some(sample())));
        assert!(reflection.is_valid());
        assert_eq!(reflection.resource_by_name("albedo").unwrap().bind_point, 3);
        assert_eq!(reflection.constant_buffer_by_name("cbMain").unwrap().size, 16);
        assert_eq!(reflection.input_parameter(0).unwrap().semantic, "POSITION");
        assert_eq!(reflection.cs_block_size(), [8, 8, 1]);
    }

    #[test]
    fn test_constant_buffer_index_checks_buffer_list() {
        // Two resources but one constant buffer: index 1 is out of range.
        let reflection = Reflection::build(&Fixed(Some(sample())));
        assert_eq!(reflection.resources().len(), 2);
        assert!(reflection.constant_buffer(0).is_some());
        assert!(reflection.constant_buffer(1).is_none());
    }

    #[test]
    fn test_clone_shares_data() {
        let reflection = Reflection::build(&Fixed(Some(sample())));
        let copy = reflection.clone();
        assert_eq!(copy, reflection);
        assert!(std::ptr::eq(copy.resources(), reflection.resources()));
    }
}
