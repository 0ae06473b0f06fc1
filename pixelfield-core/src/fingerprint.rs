//! Compact agent attribution digests.
//!
//! The attribution plane stores one fixed-width value per cell regardless
//! of agent identifier length: the first 8 bytes of SHA-256(agent id),
//! read big-endian. Zero means "never written", so the all-zero digest is
//! reserved and never produced for a real identifier in practice.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed-width one-way digest of an agent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentFingerprint(pub u64);

impl AgentFingerprint {
    /// The "never written" sentinel.
    pub const UNWRITTEN: AgentFingerprint = AgentFingerprint(0);

    /// Derive the fingerprint for an agent identifier.
    pub fn digest(agent_id: &str) -> Self {
        let hash = Sha256::digest(agent_id.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash[..8]);
        Self(u64::from_be_bytes(word))
    }

    /// 16-character lowercase hex encoding, zero-padded.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// Parse the 16-character hex encoding.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Whether this is the "never written" sentinel.
    pub fn is_unwritten(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let a = AgentFingerprint::digest("bot-a");
        let b = AgentFingerprint::digest("bot-a");
        assert_eq!(a, b);
        assert!(!a.is_unwritten());
    }

    #[test]
    fn test_digest_distinguishes_ids() {
        assert_ne!(
            AgentFingerprint::digest("bot-a"),
            AgentFingerprint::digest("bot-b")
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let fp = AgentFingerprint::digest("painter.01");
        let hex = fp.to_hex();
        assert_eq!(hex.len(), 16);
        assert_eq!(AgentFingerprint::from_hex(&hex), Some(fp));
    }

    #[test]
    fn test_hex_zero_padded() {
        let fp = AgentFingerprint(0xff);
        assert_eq!(fp.to_hex(), "00000000000000ff");
        assert_eq!(AgentFingerprint::from_hex("00000000000000ff"), Some(fp));
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert!(AgentFingerprint::from_hex("ff").is_none());
        assert!(AgentFingerprint::from_hex("zzzzzzzzzzzzzzzz").is_none());
        assert!(AgentFingerprint::from_hex("").is_none());
    }

    #[test]
    fn test_unwritten_sentinel() {
        assert!(AgentFingerprint::UNWRITTEN.is_unwritten());
        assert_eq!(AgentFingerprint::UNWRITTEN.to_hex(), "0000000000000000");
    }
}
