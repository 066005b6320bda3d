//! Dense scalar indices used throughout the engine.
//!
//! These mirror the original `inter/idx` numeration types: small `u32`/`u64`
//! newtypes with big-endian byte conversions, used for anything that is
//! looked up, compared or sorted rather than hashed. Packed vector-clock rows
//! (`atropos-consensus::vecidx`) use little-endian encodings instead — the
//! two are deliberately distinct, see SPEC_FULL.md §6.

use std::fmt;

macro_rules! scalar_idx {
    ($name:ident, $inner:ty) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub $inner);

        impl $name {
            pub const fn new(v: $inner) -> Self {
                Self(v)
            }

            pub const fn value(self) -> $inner {
                self.0
            }

            pub fn to_be_bytes(self) -> [u8; std::mem::size_of::<$inner>()] {
                self.0.to_be_bytes()
            }

            pub fn from_be_bytes(bytes: [u8; std::mem::size_of::<$inner>()]) -> Self {
                Self(<$inner>::from_be_bytes(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl From<$name> for $inner {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

scalar_idx!(EpochId, u32);
scalar_idx!(Lamport, u32);
scalar_idx!(FrameId, u32);
scalar_idx!(ValidatorId, u32);
scalar_idx!(ValidatorIdx, u32);
scalar_idx!(Weight, u32);
scalar_idx!(BlockId, u64);
/// Per-validator sequence number: the 1-based position of an event within
/// its creator's chain of self-parents.
scalar_idx!(Seq, u32);

impl FrameId {
    /// The first frame a root can ever belong to.
    pub const ROOT_FRAME: FrameId = FrameId(1);
}

impl Weight {
    pub fn checked_add(self, other: Weight) -> Option<Weight> {
        self.0.checked_add(other.0).map(Weight)
    }
}

impl std::ops::Add for Weight {
    type Output = Weight;
    fn add(self, rhs: Weight) -> Weight {
        Weight(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Weight {
    fn add_assign(&mut self, rhs: Weight) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_roundtrip() {
        let v = ValidatorIdx::new(7);
        assert_eq!(ValidatorIdx::from_be_bytes(v.to_be_bytes()), v);
    }

    #[test]
    fn weight_checked_add_overflows() {
        let max = Weight::new(u32::MAX);
        assert_eq!(max.checked_add(Weight::new(1)), None);
    }
}
