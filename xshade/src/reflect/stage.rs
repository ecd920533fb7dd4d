//! Geometry and tessellation stage metadata

use std::fmt;

/// Primitive topology of geometry-shader input/output or hull-shader input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    Undefined,
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    LinesAdj,
    LineStripAdj,
    TrianglesAdj,
    TriangleStripAdj,
    /// Patch list with 1 to 32 control points
    Patches(u8),
}

impl PrimitiveTopology {
    /// Maps a `D3D_PRIMITIVE` (geometry/hull shader input).
    ///
    /// # Panics
    /// On a value outside the D3D enumeration.
    pub(crate) fn from_d3d_primitive(value: u32) -> Self {
        match value {
            0 => PrimitiveTopology::Undefined,
            1 => PrimitiveTopology::Points,
            2 => PrimitiveTopology::Lines,
            3 => PrimitiveTopology::Triangles,
            6 => PrimitiveTopology::LinesAdj,
            7 => PrimitiveTopology::TrianglesAdj,
            8..=39 => PrimitiveTopology::Patches((value - 7) as u8),
            _ => panic!("unsupported D3D primitive {value}"),
        }
    }

    /// Maps a `D3D_PRIMITIVE_TOPOLOGY` (geometry shader output).
    ///
    /// # Panics
    /// On a value outside the D3D enumeration.
    pub(crate) fn from_d3d_topology(value: u32) -> Self {
        match value {
            0 => PrimitiveTopology::Undefined,
            1 => PrimitiveTopology::Points,
            2 => PrimitiveTopology::Lines,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::Triangles,
            5 => PrimitiveTopology::TriangleStrip,
            10 => PrimitiveTopology::LinesAdj,
            11 => PrimitiveTopology::LineStripAdj,
            12 => PrimitiveTopology::TrianglesAdj,
            13 => PrimitiveTopology::TriangleStripAdj,
            33..=64 => PrimitiveTopology::Patches((value - 32) as u8),
            _ => panic!("unsupported D3D primitive topology {value}"),
        }
    }
}

impl fmt::Display for PrimitiveTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveTopology::Patches(n) => write!(f, "patches({n})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Winding of the primitives a hull shader emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TessellatorOutputPrimitive {
    #[default]
    Undefined,
    Point,
    Line,
    TriangleCW,
    TriangleCCW,
}

impl TessellatorOutputPrimitive {
    pub(crate) fn from_d3d(value: u32) -> Self {
        match value {
            0 => TessellatorOutputPrimitive::Undefined,
            1 => TessellatorOutputPrimitive::Point,
            2 => TessellatorOutputPrimitive::Line,
            3 => TessellatorOutputPrimitive::TriangleCW,
            4 => TessellatorOutputPrimitive::TriangleCCW,
            _ => panic!("unsupported D3D tessellator output primitive {value}"),
        }
    }
}

/// Hull shader partitioning scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TessellatorPartitioning {
    #[default]
    Undefined,
    Integer,
    Pow2,
    FractionalOdd,
    FractionalEven,
}

impl TessellatorPartitioning {
    pub(crate) fn from_d3d(value: u32) -> Self {
        match value {
            0 => TessellatorPartitioning::Undefined,
            1 => TessellatorPartitioning::Integer,
            2 => TessellatorPartitioning::Pow2,
            3 => TessellatorPartitioning::FractionalOdd,
            4 => TessellatorPartitioning::FractionalEven,
            _ => panic!("unsupported D3D tessellator partitioning {value}"),
        }
    }
}

/// Patch domain shared by hull and domain shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TessellatorDomain {
    #[default]
    Undefined,
    Line,
    Triangle,
    Quad,
}

impl TessellatorDomain {
    pub(crate) fn from_d3d(value: u32) -> Self {
        match value {
            0 => TessellatorDomain::Undefined,
            1 => TessellatorDomain::Line,
            2 => TessellatorDomain::Triangle,
            3 => TessellatorDomain::Quad,
            _ => panic!("unsupported D3D tessellator domain {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(PrimitiveTopology::from_d3d_primitive(3), PrimitiveTopology::Triangles);
        assert_eq!(PrimitiveTopology::from_d3d_primitive(8), PrimitiveTopology::Patches(1));
        assert_eq!(PrimitiveTopology::from_d3d_primitive(10), PrimitiveTopology::Patches(3));
        assert_eq!(PrimitiveTopology::from_d3d_primitive(39), PrimitiveTopology::Patches(32));
    }

    #[test]
    fn test_topology_mapping() {
        assert_eq!(PrimitiveTopology::from_d3d_topology(5), PrimitiveTopology::TriangleStrip);
        assert_eq!(PrimitiveTopology::from_d3d_topology(13), PrimitiveTopology::TriangleStripAdj);
        assert_eq!(PrimitiveTopology::from_d3d_topology(36), PrimitiveTopology::Patches(4));
        assert_eq!(PrimitiveTopology::Patches(4).to_string(), "patches(4)");
        assert_eq!(PrimitiveTopology::LineStrip.to_string(), "LineStrip");
    }

    #[test]
    #[should_panic(expected = "unsupported D3D primitive 4")]
    fn test_unknown_primitive_panics() {
        PrimitiveTopology::from_d3d_primitive(4);
    }

    #[test]
    fn test_tessellator_mapping() {
        assert_eq!(
            TessellatorOutputPrimitive::from_d3d(3),
            TessellatorOutputPrimitive::TriangleCW
        );
        assert_eq!(
            TessellatorPartitioning::from_d3d(3),
            TessellatorPartitioning::FractionalOdd
        );
        assert_eq!(TessellatorDomain::from_d3d(1), TessellatorDomain::Line);
        assert_eq!(TessellatorDomain::default(), TessellatorDomain::Undefined);
    }
}
