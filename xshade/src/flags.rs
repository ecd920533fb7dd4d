//! Signature component masks

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Components of a signature parameter that are in use
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const W = 1 << 3;
    }
}

impl ComponentMask {
    /// The first `count` components, e.g. `XYZ` for a `float3`
    pub fn from_vector_size(count: u32) -> Self {
        match count {
            0 => ComponentMask::empty(),
            1 => ComponentMask::X,
            2 => ComponentMask::X | ComponentMask::Y,
            3 => ComponentMask::X | ComponentMask::Y | ComponentMask::Z,
            _ => ComponentMask::all(),
        }
    }
}

impl fmt::Display for ComponentMask {
    /// Swizzle notation, e.g. `xyz`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, c) in [
            (ComponentMask::X, 'x'),
            (ComponentMask::Y, 'y'),
            (ComponentMask::Z, 'z'),
            (ComponentMask::W, 'w'),
        ] {
            if self.contains(flag) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vector_size() {
        assert_eq!(ComponentMask::from_vector_size(1), ComponentMask::X);
        assert_eq!(ComponentMask::from_vector_size(3).bits(), 0b0111);
        assert_eq!(ComponentMask::from_vector_size(4), ComponentMask::all());
    }

    #[test]
    fn test_display() {
        assert_eq!((ComponentMask::X | ComponentMask::W).to_string(), "xw");
        assert_eq!(ComponentMask::all().to_string(), "xyzw");
        assert_eq!(ComponentMask::empty().to_string(), "");
    }
}
