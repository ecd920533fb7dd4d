//! Resource binding reflection

use std::fmt;
use xshade_sys::{
    D3D_SIT_BYTEADDRESS, D3D_SIT_CBUFFER, D3D_SIT_SAMPLER, D3D_SIT_STRUCTURED, D3D_SIT_TBUFFER,
    D3D_SIT_TEXTURE, D3D_SIT_UAV_APPEND_STRUCTURED, D3D_SIT_UAV_CONSUME_STRUCTURED,
    D3D_SIT_UAV_RWBYTEADDRESS, D3D_SIT_UAV_RWSTRUCTURED, D3D_SIT_UAV_RWSTRUCTURED_WITH_COUNTER,
    D3D_SIT_UAV_RWTYPED,
};

/// Kind of a bound resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderResourceType {
    ConstantBuffer,
    Texture,
    Sampler,
    /// Read-only buffer
    ShaderResourceView,
    /// Read-write buffer or image
    UnorderedAccessView,
}

impl ShaderResourceType {
    /// Maps a `D3D_SHADER_INPUT_TYPE`.
    ///
    /// # Panics
    /// On an input type this crate does not know.
    pub(crate) fn from_d3d(ty: u32) -> Self {
        match ty {
            D3D_SIT_CBUFFER | D3D_SIT_TBUFFER => ShaderResourceType::ConstantBuffer,
            D3D_SIT_TEXTURE => ShaderResourceType::Texture,
            D3D_SIT_SAMPLER => ShaderResourceType::Sampler,
            D3D_SIT_STRUCTURED | D3D_SIT_BYTEADDRESS => ShaderResourceType::ShaderResourceView,
            D3D_SIT_UAV_RWTYPED
            | D3D_SIT_UAV_RWSTRUCTURED
            | D3D_SIT_UAV_RWBYTEADDRESS
            | D3D_SIT_UAV_APPEND_STRUCTURED
            | D3D_SIT_UAV_CONSUME_STRUCTURED
            | D3D_SIT_UAV_RWSTRUCTURED_WITH_COUNTER => ShaderResourceType::UnorderedAccessView,
            _ => panic!("unsupported D3D shader input type {ty}"),
        }
    }
}

impl fmt::Display for ShaderResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderResourceType::ConstantBuffer => "cbuffer",
            ShaderResourceType::Texture => "texture",
            ShaderResourceType::Sampler => "sampler",
            ShaderResourceType::ShaderResourceView => "srv",
            ShaderResourceType::UnorderedAccessView => "uav",
        };
        f.write_str(name)
    }
}

/// A bound resource: where it lives and what it is
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub name: String,
    pub ty: ShaderResourceType,
    /// Register space, or descriptor set for SPIR-V
    pub space: u32,
    /// First register, or binding for SPIR-V
    pub bind_point: u32,
    pub bind_count: u32,
}
