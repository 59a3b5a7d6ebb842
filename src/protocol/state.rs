//! Per-direction encryption state.
//!
//! ```text
//! Unencrypted --(key exchange)--> EncryptedUnderstood --(unknown id)--> EncryptedUnknown
//! ```
//!
//! Transitions only move one step forward. `EncryptedUnknown` is terminal.

use std::fmt;

use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EncryptionState {
    /// Bytes are read as-is and decoded
    #[default]
    Unencrypted,
    /// Bytes are decrypted and still decoded
    EncryptedUnderstood,
    /// Bytes are decrypted and relayed without interpretation
    EncryptedUnknown,
}

impl EncryptionState {
    /// Whether bytes on this direction pass through a cipher
    pub fn is_encrypted(self) -> bool {
        self != EncryptionState::Unencrypted
    }

    /// Whether bytes on this direction go through packet dispatch
    pub fn is_decoded(self) -> bool {
        self != EncryptionState::EncryptedUnknown
    }

    /// The only state reachable from this one
    pub fn successor(self) -> Option<Self> {
        match self {
            EncryptionState::Unencrypted => Some(EncryptionState::EncryptedUnderstood),
            EncryptionState::EncryptedUnderstood => Some(EncryptionState::EncryptedUnknown),
            EncryptionState::EncryptedUnknown => None,
        }
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns `ProxyError::InvalidTransition` unless `next` is the successor
    /// of the current state. The state is left unchanged on error.
    pub fn advance_to(&mut self, next: EncryptionState) -> Result<()> {
        if self.successor() != Some(next) {
            return Err(ProxyError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for EncryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncryptionState::Unencrypted => "unencrypted",
            EncryptionState::EncryptedUnderstood => "encrypted",
            EncryptionState::EncryptedUnknown => "encrypted (blind)",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_steps() {
        let mut state = EncryptionState::default();
        assert!(!state.is_encrypted());
        state.advance_to(EncryptionState::EncryptedUnderstood).unwrap();
        assert!(state.is_encrypted() && state.is_decoded());
        state.advance_to(EncryptionState::EncryptedUnknown).unwrap();
        assert!(!state.is_decoded());
    }

    #[test]
    fn test_no_skipping_or_revisiting() {
        let mut state = EncryptionState::Unencrypted;
        assert!(state.advance_to(EncryptionState::EncryptedUnknown).is_err());
        assert!(state.advance_to(EncryptionState::Unencrypted).is_err());
        assert_eq!(state, EncryptionState::Unencrypted);

        let mut state = EncryptionState::EncryptedUnknown;
        for next in [
            EncryptionState::Unencrypted,
            EncryptionState::EncryptedUnderstood,
            EncryptionState::EncryptedUnknown,
        ] {
            assert!(matches!(
                state.advance_to(next),
                Err(ProxyError::InvalidTransition { .. })
            ));
        }
        assert_eq!(state, EncryptionState::EncryptedUnknown);
    }
}
