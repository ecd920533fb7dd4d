//! D3D12 shader reflection interfaces as handed out by `IDxcContainerReflection`

use crate::{BOOL, HRESULT, IUnknown, IUnknownVtbl, LPCSTR, UINT};
use std::ffi::c_void;
use xshade_proc::com_interface;

/// All-zero `Default` for descriptor structs that carry raw pointers
macro_rules! zeroed_default {
    ($($name:ident),* $(,)?) => {
        $(
            impl Default for $name {
                fn default() -> Self {
                    // Plain C data: integers and nullable pointers.
                    unsafe { std::mem::zeroed() }
                }
            }
        )*
    };
}

#[repr(C)]
pub struct D3D12_SHADER_DESC {
    pub Version: u32,
    pub Creator: LPCSTR,
    pub Flags: u32,
    pub ConstantBuffers: u32,
    pub BoundResources: u32,
    pub InputParameters: u32,
    pub OutputParameters: u32,
    pub InstructionCount: u32,
    pub TempRegisterCount: u32,
    pub TempArrayCount: u32,
    pub DefCount: u32,
    pub DclCount: u32,
    pub TextureNormalInstructions: u32,
    pub TextureLoadInstructions: u32,
    pub TextureCompInstructions: u32,
    pub TextureBiasInstructions: u32,
    pub TextureGradientInstructions: u32,
    pub FloatInstructionCount: u32,
    pub IntInstructionCount: u32,
    pub UintInstructionCount: u32,
    pub StaticFlowControlCount: u32,
    pub DynamicFlowControlCount: u32,
    pub MacroInstructionCount: u32,
    pub ArrayInstructionCount: u32,
    pub CutInstructionCount: u32,
    pub EmitInstructionCount: u32,
    pub GSOutputTopology: u32,
    pub GSMaxOutputVertexCount: u32,
    pub InputPrimitive: u32,
    pub PatchConstantParameters: u32,
    pub cGSInstanceCount: u32,
    pub cControlPoints: u32,
    pub HSOutputPrimitive: u32,
    pub HSPartitioning: u32,
    pub TessellatorDomain: u32,
    pub cBarrierInstructions: u32,
    pub cInterlockedInstructions: u32,
    pub cTextureStoreInstructions: u32,
}

#[repr(C)]
pub struct D3D12_SHADER_BUFFER_DESC {
    pub Name: LPCSTR,
    pub Type: u32,
    pub Variables: u32,
    pub Size: u32,
    pub uFlags: u32,
}

#[repr(C)]
pub struct D3D12_SHADER_INPUT_BIND_DESC {
    pub Name: LPCSTR,
    pub Type: u32,
    pub BindPoint: u32,
    pub BindCount: u32,
    pub uFlags: u32,
    pub ReturnType: u32,
    pub Dimension: u32,
    pub NumSamples: u32,
    pub Space: u32,
    pub uID: u32,
}

#[repr(C)]
pub struct D3D12_SIGNATURE_PARAMETER_DESC {
    pub SemanticName: LPCSTR,
    pub SemanticIndex: u32,
    pub Register: u32,
    pub SystemValueType: u32,
    pub ComponentType: u32,
    pub Mask: u8,
    pub ReadWriteMask: u8,
    pub Stream: u32,
    pub MinPrecision: u32,
}

#[repr(C)]
pub struct D3D12_SHADER_VARIABLE_DESC {
    pub Name: LPCSTR,
    pub StartOffset: u32,
    pub Size: u32,
    pub uFlags: u32,
    pub DefaultValue: *const c_void,
    pub StartTexture: u32,
    pub TextureSize: u32,
    pub StartSampler: u32,
    pub SamplerSize: u32,
}

#[repr(C)]
pub struct D3D12_SHADER_TYPE_DESC {
    pub Class: u32,
    pub Type: u32,
    pub Rows: u32,
    pub Columns: u32,
    pub Elements: u32,
    pub Members: u32,
    pub Offset: u32,
    pub Name: LPCSTR,
}

zeroed_default!(
    D3D12_SHADER_DESC,
    D3D12_SHADER_BUFFER_DESC,
    D3D12_SHADER_INPUT_BIND_DESC,
    D3D12_SIGNATURE_PARAMETER_DESC,
    D3D12_SHADER_VARIABLE_DESC,
    D3D12_SHADER_TYPE_DESC,
);

// D3D_SHADER_INPUT_TYPE
pub const D3D_SIT_CBUFFER: u32 = 0;
pub const D3D_SIT_TBUFFER: u32 = 1;
pub const D3D_SIT_TEXTURE: u32 = 2;
pub const D3D_SIT_SAMPLER: u32 = 3;
pub const D3D_SIT_UAV_RWTYPED: u32 = 4;
pub const D3D_SIT_STRUCTURED: u32 = 5;
pub const D3D_SIT_UAV_RWSTRUCTURED: u32 = 6;
pub const D3D_SIT_BYTEADDRESS: u32 = 7;
pub const D3D_SIT_UAV_RWBYTEADDRESS: u32 = 8;
pub const D3D_SIT_UAV_APPEND_STRUCTURED: u32 = 9;
pub const D3D_SIT_UAV_CONSUME_STRUCTURED: u32 = 10;
pub const D3D_SIT_UAV_RWSTRUCTURED_WITH_COUNTER: u32 = 11;

// D3D_REGISTER_COMPONENT_TYPE
pub const D3D_REGISTER_COMPONENT_UNKNOWN: u32 = 0;
pub const D3D_REGISTER_COMPONENT_UINT32: u32 = 1;
pub const D3D_REGISTER_COMPONENT_SINT32: u32 = 2;
pub const D3D_REGISTER_COMPONENT_FLOAT32: u32 = 3;
pub const D3D_REGISTER_COMPONENT_UINT16: u32 = 4;
pub const D3D_REGISTER_COMPONENT_SINT16: u32 = 5;
pub const D3D_REGISTER_COMPONENT_FLOAT16: u32 = 6;

// D3D_SHADER_VARIABLE_CLASS
pub const D3D_SVC_STRUCT: u32 = 5;

// D3D_SHADER_VARIABLE_TYPE
pub const D3D_SVT_VOID: u32 = 0;
pub const D3D_SVT_BOOL: u32 = 1;
pub const D3D_SVT_INT: u32 = 2;
pub const D3D_SVT_FLOAT: u32 = 3;
pub const D3D_SVT_UINT: u32 = 19;
pub const D3D_SVT_MIN16FLOAT: u32 = 52;
pub const D3D_SVT_MIN16INT: u32 = 54;
pub const D3D_SVT_MIN16UINT: u32 = 55;
pub const D3D_SVT_INT16: u32 = 58;
pub const D3D_SVT_UINT16: u32 = 59;
pub const D3D_SVT_FLOAT16: u32 = 60;

com_interface! {
    /// Root of a compiled shader's reflection data
    interface ID3D12ShaderReflection: IUnknown {
        iid: "5a58797d-a72c-478d-8ba2-efc6b0efe88e",
        fn GetDesc(desc: *mut D3D12_SHADER_DESC) -> HRESULT;
        fn GetConstantBufferByIndex(index: UINT) -> *mut ID3D12ShaderReflectionConstantBuffer;
        fn GetConstantBufferByName(name: LPCSTR) -> *mut ID3D12ShaderReflectionConstantBuffer;
        fn GetResourceBindingDesc(index: UINT, desc: *mut D3D12_SHADER_INPUT_BIND_DESC) -> HRESULT;
        fn GetInputParameterDesc(index: UINT, desc: *mut D3D12_SIGNATURE_PARAMETER_DESC) -> HRESULT;
        fn GetOutputParameterDesc(index: UINT, desc: *mut D3D12_SIGNATURE_PARAMETER_DESC) -> HRESULT;
        fn GetPatchConstantParameterDesc(index: UINT, desc: *mut D3D12_SIGNATURE_PARAMETER_DESC) -> HRESULT;
        fn GetVariableByName(name: LPCSTR) -> *mut ID3D12ShaderReflectionVariable;
        fn GetResourceBindingDescByName(name: LPCSTR, desc: *mut D3D12_SHADER_INPUT_BIND_DESC) -> HRESULT;
        fn GetMovInstructionCount() -> UINT;
        fn GetMovcInstructionCount() -> UINT;
        fn GetConversionInstructionCount() -> UINT;
        fn GetBitwiseInstructionCount() -> UINT;
        fn GetGSInputPrimitive() -> UINT;
        fn IsSampleFrequencyShader() -> BOOL;
        fn GetNumInterfaceSlots() -> UINT;
        fn GetMinFeatureLevel(level: *mut UINT) -> HRESULT;
        fn GetThreadGroupSize(x: *mut UINT, y: *mut UINT, z: *mut UINT) -> UINT;
        fn GetRequiresFlags() -> u64;
    }

    // The three interfaces below are owned by the reflection object and have
    // no IUnknown slots.

    interface ID3D12ShaderReflectionConstantBuffer {
        fn GetDesc(desc: *mut D3D12_SHADER_BUFFER_DESC) -> HRESULT;
        fn GetVariableByIndex(index: UINT) -> *mut ID3D12ShaderReflectionVariable;
        fn GetVariableByName(name: LPCSTR) -> *mut ID3D12ShaderReflectionVariable;
    }

    interface ID3D12ShaderReflectionVariable {
        fn GetDesc(desc: *mut D3D12_SHADER_VARIABLE_DESC) -> HRESULT;
        fn GetType() -> *mut ID3D12ShaderReflectionType;
        fn GetBuffer() -> *mut ID3D12ShaderReflectionConstantBuffer;
        fn GetInterfaceSlot(index: UINT) -> UINT;
    }

    interface ID3D12ShaderReflectionType {
        fn GetDesc(desc: *mut D3D12_SHADER_TYPE_DESC) -> HRESULT;
        fn GetMemberTypeByIndex(index: UINT) -> *mut ID3D12ShaderReflectionType;
        fn GetMemberTypeByName(name: LPCSTR) -> *mut ID3D12ShaderReflectionType;
        fn GetMemberTypeName(index: UINT) -> LPCSTR;
        fn IsEqual(other: *mut ID3D12ShaderReflectionType) -> HRESULT;
        fn GetSubType() -> *mut ID3D12ShaderReflectionType;
        fn GetBaseClass() -> *mut ID3D12ShaderReflectionType;
        fn GetNumInterfaces() -> UINT;
        fn GetInterfaceByIndex(index: UINT) -> *mut ID3D12ShaderReflectionType;
        fn IsOfType(other: *mut ID3D12ShaderReflectionType) -> HRESULT;
        fn ImplementsInterface(other: *mut ID3D12ShaderReflectionType) -> HRESULT;
    }
}
