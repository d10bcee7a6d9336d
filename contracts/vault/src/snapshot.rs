//! Versioned State Snapshots
//!
//! Accounting state leaves a vault as a borsh `VaultSnapshot` and is loaded
//! into a freshly built vault of a newer build. The version is written
//! first so an unknown layout is rejected before any decoding.

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::debug;

use tranche_common::{
    access_control::Role,
    constants::vault::SNAPSHOT_VERSION,
    errors::{TrancheError, TrancheResult},
    events::VaultEvent,
    types::{CallContext, TrancheId},
};

use crate::state::VaultState;
use crate::vault::Vault;

/// Exported accounting state of a vault
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VaultSnapshot {
    pub version: u16,
    pub state: VaultState,
}

impl VaultSnapshot {
    pub fn to_bytes(&self) -> TrancheResult<Vec<u8>> {
        borsh::to_vec(self).map_err(|_| TrancheError::InvalidSnapshot)
    }

    /// Decode a snapshot, checking the version before the body
    pub fn from_bytes(bytes: &[u8]) -> TrancheResult<Self> {
        let mut reader = bytes;
        let version = u16::deserialize(&mut reader).map_err(|_| TrancheError::InvalidSnapshot)?;
        if version != SNAPSHOT_VERSION {
            return Err(TrancheError::UnsupportedSnapshotVersion { version });
        }
        let state = borsh::from_slice::<VaultState>(reader).map_err(|_| TrancheError::InvalidSnapshot)?;
        Ok(Self { version, state })
    }
}

impl Vault {
    /// Export the accounting state
    pub fn export_snapshot(&self) -> TrancheResult<Vec<u8>> {
        VaultSnapshot {
            version: SNAPSHOT_VERSION,
            state: self.state().clone(),
        }
        .to_bytes()
    }

    /// Load exported state into this vault
    ///
    /// Only an admin of this vault may restore, only before it has taken
    /// deposits or bought notes, and every note token the snapshot holds
    /// must have an adapter registered here. The snapshot's roles replace
    /// this vault's, so the caller must also be an admin in the snapshot.
    pub fn restore_snapshot(&mut self, ctx: &CallContext, bytes: &[u8]) -> TrancheResult<()> {
        self.state().access.require_role(Role::Admin, &ctx.caller)?;

        let current = self.state();
        let in_use = !current.loans.is_empty()
            || TrancheId::ALL
                .iter()
                .any(|t| current.lp_token(*t).total_supply() > 0 || current.tranche(*t).deposit_value > 0);
        if in_use {
            return Err(TrancheError::InvalidInput {
                param: "snapshot",
                reason: "vault already holds deposits or notes",
            });
        }

        let snapshot = VaultSnapshot::from_bytes(bytes)?;
        // The restored roles replace this vault's; the caller must stay admin
        if !snapshot.state.access.has_role(Role::Admin, &ctx.caller) {
            return Err(TrancheError::Unauthorized {
                account: ctx.caller,
                role: Role::Admin,
            });
        }
        for (note_token, _) in snapshot.state.loans.keys() {
            if !self.note_tokens().any(|t| t == note_token) {
                return Err(TrancheError::UnsupportedNoteToken {
                    note_token: *note_token,
                });
            }
        }

        let loans = snapshot.state.loans.len() as u32;
        debug!(loans, version = snapshot.version, "snapshot restored");
        self.replace_state(snapshot.state);
        self.emit(VaultEvent::SnapshotRestored {
            by: ctx.caller,
            version: snapshot.version,
            loans,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }
}
