use crate::error::TypesError;
use crate::idx::{EpochId, Lamport};
use std::fmt;
use std::str::FromStr;

/// Unique identifier of an event: a 32-byte digest whose first 4 bytes carry
/// the event's epoch and next 4 bytes its Lamport timestamp (big-endian),
/// mirroring `hash.EventHash`'s `Epoch()`/`Lamport()` accessors. The
/// remaining 24 bytes are an opaque content hash supplied by the event's
/// creator/signer, which lives outside this crate's scope.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId([u8; 32]);

impl EventId {
    pub const LEN: usize = 32;

    /// The zero hash, used as the implicit parent of every validator's first event.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 32 {
            return Err(TypesError::InvalidEventIdLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Build an id from an epoch/lamport prefix and a content digest, the
    /// way an emitter would stamp an event hash before gossiping it.
    pub fn build(epoch: EpochId, lamport: Lamport, content: &[u8]) -> Self {
        let digest = blake3::hash(content);
        let mut bytes = [0u8; 32];
        bytes[0..4].copy_from_slice(&epoch.to_be_bytes());
        bytes[4..8].copy_from_slice(&lamport.to_be_bytes());
        bytes[8..32].copy_from_slice(&digest.as_bytes()[0..24]);
        Self(bytes)
    }

    pub fn epoch(&self) -> EpochId {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.0[0..4]);
        EpochId::from_be_bytes(b)
    }

    pub fn lamport(&self) -> Lamport {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.0[4..8]);
        Lamport::from_be_bytes(b)
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.epoch(),
            self.lamport(),
            hex::encode(&self.0[8..11])
        )
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self)
    }
}

impl FromStr for EventId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert!(EventId::ZERO.is_zero());
    }

    #[test]
    fn build_extracts_epoch_and_lamport() {
        let id = EventId::build(EpochId::new(7), Lamport::new(42), b"payload");
        assert_eq!(id.epoch(), EpochId::new(7));
        assert_eq!(id.lamport(), Lamport::new(42));
        assert!(!id.is_zero());
    }

    #[test]
    fn hex_roundtrip() {
        let id = EventId::build(EpochId::new(1), Lamport::new(1), b"x");
        let parsed: EventId = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
