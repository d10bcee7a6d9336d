//! External Actions
//!
//! A note adapter never calls a lending platform itself. It builds an
//! `ExternalAction` (target + opaque payload) and the vault executes it
//! through the host's single generic invoke primitive.
//!
//! Payload layout: 4-byte selector (first bytes of SHA-256 over the entry
//! point signature) followed by the borsh encoding of the arguments.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{TrancheError, TrancheResult};
use crate::types::{Address, ZERO_ADDRESS};

/// Length of an entry point selector
pub const SELECTOR_LEN: usize = 4;

/// Entry point selector
pub type Selector = [u8; SELECTOR_LEN];

/// Derive the selector of an entry point signature, e.g. `"claim(u64)"`
pub fn selector(signature: &str) -> Selector {
    let digest = Sha256::digest(signature.as_bytes());
    let mut out = [0u8; SELECTOR_LEN];
    out.copy_from_slice(&digest[..SELECTOR_LEN]);
    out
}

/// A call to be made on an external contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExternalAction {
    /// Contract to call
    pub target: Address,
    /// Selector followed by borsh-encoded arguments
    pub payload: Vec<u8>,
}

impl ExternalAction {
    /// Encode a call to `signature` with `args`
    pub fn encode<A: BorshSerialize>(target: Address, signature: &str, args: &A) -> TrancheResult<Self> {
        let mut payload = selector(signature).to_vec();
        args.serialize(&mut payload)
            .map_err(|_| TrancheError::InvalidInput {
                param: "args",
                reason: "failed to encode call arguments",
            })?;
        Ok(Self { target, payload })
    }

    /// The no-op pair returned when nothing needs to be called
    pub fn none() -> Self {
        Self {
            target: ZERO_ADDRESS,
            payload: Vec::new(),
        }
    }

    /// True for the no-op pair
    pub fn is_none(&self) -> bool {
        self.target == ZERO_ADDRESS && self.payload.is_empty()
    }

    /// Selector of the payload, if present
    pub fn selector(&self) -> Option<Selector> {
        if self.payload.len() < SELECTOR_LEN {
            return None;
        }
        let mut out = [0u8; SELECTOR_LEN];
        out.copy_from_slice(&self.payload[..SELECTOR_LEN]);
        Some(out)
    }

    /// Check the selector and decode the arguments
    pub fn decode_args<A: BorshDeserialize>(&self, signature: &str) -> TrancheResult<A> {
        if self.selector() != Some(selector(signature)) {
            return Err(TrancheError::ExternalCallFailed {
                target: self.target,
                reason: "unknown selector",
            });
        }
        borsh::from_slice(&self.payload[SELECTOR_LEN..]).map_err(|_| TrancheError::ExternalCallFailed {
            target: self.target,
            reason: "malformed call arguments",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_stable_and_distinct() {
        assert_eq!(selector("claim(u64)"), selector("claim(u64)"));
        assert_ne!(selector("claim(u64)"), selector("repay(u64)"));
    }

    #[test]
    fn test_encode_decode() {
        let action = ExternalAction::encode([7u8; 32], "liquidate(u64)", &42u64).unwrap();

        assert_eq!(action.target, [7u8; 32]);
        assert_eq!(action.payload.len(), SELECTOR_LEN + 8);
        assert_eq!(action.decode_args::<u64>("liquidate(u64)").unwrap(), 42);
    }

    #[test]
    fn test_wrong_selector_rejected() {
        let action = ExternalAction::encode([7u8; 32], "liquidate(u64)", &42u64).unwrap();
        let result = action.decode_args::<u64>("claim(u64)");
        assert!(matches!(result, Err(TrancheError::ExternalCallFailed { .. })));
    }

    #[test]
    fn test_none() {
        assert!(ExternalAction::none().is_none());
        assert_eq!(ExternalAction::none().selector(), None);
        let action = ExternalAction::encode([7u8; 32], "unwrap(u64)", &1u64).unwrap();
        assert!(!action.is_none());
    }
}
