//! Vault Events
//!
//! Events are emitted on every successful state change and can be indexed
//! off-chain. An operation that fails discards the events it emitted.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::access_control::Role;
use crate::types::{Address, TrancheId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Depositor Events (0x01 - 0x1F)
    Deposited = 0x01,
    Redeemed = 0x02,
    Withdrawn = 0x03,

    // Loan Events (0x20 - 0x3F)
    NotePurchased = 0x20,
    LoanRepaid = 0x21,
    LoanLiquidated = 0x22,
    CollateralWithdrawn = 0x23,
    CollateralLiquidated = 0x24,

    // Vault Admin Events (0x40 - 0x5F)
    SeniorTrancheRateUpdated = 0x40,
    ReserveRatioUpdated = 0x41,
    AdminFeeRateUpdated = 0x42,
    NoteAdapterUpdated = 0x43,
    LoanPriceOracleUpdated = 0x44,
    AdminFeesWithdrawn = 0x45,
    SnapshotRestored = 0x46,

    // Oracle Events (0x60 - 0x7F)
    MinimumDiscountRateUpdated = 0x60,
    MinimumLoanDurationUpdated = 0x61,
    CollateralParametersUpdated = 0x62,

    // Protocol Events (0x80 - 0x9F)
    Paused = 0x80,
    Unpaused = 0x81,
    RoleGranted = 0x82,
    RoleRevoked = 0x83,
}

/// Main event enum containing all vault and oracle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum VaultEvent {
    // ============ Depositor Events ============

    /// Currency deposited into a tranche
    Deposited {
        account: Address,
        tranche: TrancheId,
        amount: u128,
        shares: u128,
        timestamp: u64,
    },

    /// Shares burned and queued for redemption
    Redeemed {
        account: Address,
        tranche: TrancheId,
        shares: u128,
        amount: u128,
        timestamp: u64,
    },

    /// Processed redemption paid out
    Withdrawn {
        account: Address,
        tranche: TrancheId,
        amount: u128,
        timestamp: u64,
    },

    // ============ Loan Events ============

    /// Note bought from a lender
    NotePurchased {
        account: Address,
        note_token: Address,
        note_token_id: u64,
        loan_id: u64,
        purchase_price: u128,
        timestamp: u64,
    },

    /// Loan repaid and proceeds booked
    LoanRepaid {
        note_token: Address,
        loan_id: u64,
        senior_return: u128,
        junior_return: u128,
        timestamp: u64,
    },

    /// Loan defaulted and purchase price written off
    LoanLiquidated {
        note_token: Address,
        loan_id: u64,
        senior_loss: u128,
        junior_loss: u128,
        timestamp: u64,
    },

    /// Collateral of a liquidated loan moved to the liquidator
    CollateralWithdrawn {
        note_token: Address,
        loan_id: u64,
        liquidator: Address,
        asset_count: u32,
        timestamp: u64,
    },

    /// Sale proceeds of withdrawn collateral booked
    CollateralLiquidated {
        note_token: Address,
        loan_id: u64,
        proceeds: u128,
        senior_recovery: u128,
        junior_recovery: u128,
        timestamp: u64,
    },

    // ============ Vault Admin Events ============

    SeniorTrancheRateUpdated {
        rate: u128,
        timestamp: u64,
    },

    ReserveRatioUpdated {
        ratio: u128,
        timestamp: u64,
    },

    AdminFeeRateUpdated {
        rate: u128,
        timestamp: u64,
    },

    /// Adapter registered (or replaced) for a note token
    NoteAdapterUpdated {
        note_token: Address,
        adapter_name: String,
        timestamp: u64,
    },

    LoanPriceOracleUpdated {
        timestamp: u64,
    },

    AdminFeesWithdrawn {
        recipient: Address,
        amount: u128,
        timestamp: u64,
    },

    /// Accounting state loaded from an exported snapshot
    SnapshotRestored {
        by: Address,
        version: u16,
        loans: u32,
        timestamp: u64,
    },

    // ============ Oracle Events ============

    MinimumDiscountRateUpdated {
        rate: u128,
        timestamp: u64,
    },

    MinimumLoanDurationUpdated {
        duration: u64,
        timestamp: u64,
    },

    CollateralParametersUpdated {
        collateral_token: Address,
        timestamp: u64,
    },

    // ============ Protocol Events ============

    Paused {
        by: Address,
        timestamp: u64,
    },

    Unpaused {
        by: Address,
        timestamp: u64,
    },

    RoleGranted {
        role: Role,
        account: Address,
        by: Address,
        timestamp: u64,
    },

    RoleRevoked {
        role: Role,
        account: Address,
        by: Address,
        timestamp: u64,
    },
}

impl VaultEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Deposited { .. } => EventType::Deposited,
            Self::Redeemed { .. } => EventType::Redeemed,
            Self::Withdrawn { .. } => EventType::Withdrawn,
            Self::NotePurchased { .. } => EventType::NotePurchased,
            Self::LoanRepaid { .. } => EventType::LoanRepaid,
            Self::LoanLiquidated { .. } => EventType::LoanLiquidated,
            Self::CollateralWithdrawn { .. } => EventType::CollateralWithdrawn,
            Self::CollateralLiquidated { .. } => EventType::CollateralLiquidated,
            Self::SeniorTrancheRateUpdated { .. } => EventType::SeniorTrancheRateUpdated,
            Self::ReserveRatioUpdated { .. } => EventType::ReserveRatioUpdated,
            Self::AdminFeeRateUpdated { .. } => EventType::AdminFeeRateUpdated,
            Self::NoteAdapterUpdated { .. } => EventType::NoteAdapterUpdated,
            Self::LoanPriceOracleUpdated { .. } => EventType::LoanPriceOracleUpdated,
            Self::AdminFeesWithdrawn { .. } => EventType::AdminFeesWithdrawn,
            Self::SnapshotRestored { .. } => EventType::SnapshotRestored,
            Self::MinimumDiscountRateUpdated { .. } => EventType::MinimumDiscountRateUpdated,
            Self::MinimumLoanDurationUpdated { .. } => EventType::MinimumLoanDurationUpdated,
            Self::CollateralParametersUpdated { .. } => EventType::CollateralParametersUpdated,
            Self::Paused { .. } => EventType::Paused,
            Self::Unpaused { .. } => EventType::Unpaused,
            Self::RoleGranted { .. } => EventType::RoleGranted,
            Self::RoleRevoked { .. } => EventType::RoleRevoked,
        }
    }

    /// Get the timestamp when this event occurred
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Deposited { timestamp, .. }
            | Self::Redeemed { timestamp, .. }
            | Self::Withdrawn { timestamp, .. }
            | Self::NotePurchased { timestamp, .. }
            | Self::LoanRepaid { timestamp, .. }
            | Self::LoanLiquidated { timestamp, .. }
            | Self::CollateralWithdrawn { timestamp, .. }
            | Self::CollateralLiquidated { timestamp, .. }
            | Self::SeniorTrancheRateUpdated { timestamp, .. }
            | Self::ReserveRatioUpdated { timestamp, .. }
            | Self::AdminFeeRateUpdated { timestamp, .. }
            | Self::NoteAdapterUpdated { timestamp, .. }
            | Self::LoanPriceOracleUpdated { timestamp }
            | Self::AdminFeesWithdrawn { timestamp, .. }
            | Self::SnapshotRestored { timestamp, .. }
            | Self::MinimumDiscountRateUpdated { timestamp, .. }
            | Self::MinimumLoanDurationUpdated { timestamp, .. }
            | Self::CollateralParametersUpdated { timestamp, .. }
            | Self::Paused { timestamp, .. }
            | Self::Unpaused { timestamp, .. }
            | Self::RoleGranted { timestamp, .. }
            | Self::RoleRevoked { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes (for indexers)
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<VaultEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: VaultEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&VaultEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&VaultEvent> {
        self.events.last()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Drop events emitted after `len` (rollback of a failed operation)
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposited() -> VaultEvent {
        VaultEvent::Deposited {
            account: [2u8; 32],
            tranche: TrancheId::Junior,
            amount: 1_000,
            shares: 1_000,
            timestamp: 100,
        }
    }

    #[test]
    fn test_event_type() {
        assert_eq!(deposited().event_type(), EventType::Deposited);
        assert_eq!(deposited().timestamp(), 100);
    }

    #[test]
    fn test_event_serialization() {
        let event = deposited();
        let bytes = event.to_bytes();
        assert_eq!(VaultEvent::from_bytes(&bytes), Some(event));
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        log.emit(deposited());
        log.emit(VaultEvent::Paused { by: [1u8; 32], timestamp: 101 });
        log.emit(deposited());

        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_by_type(EventType::Deposited).len(), 2);

        log.truncate(1);
        assert_eq!(log.len(), 1);
        assert!(log.filter_by_type(EventType::Paused).is_empty());

        log.clear();
        assert!(!log.has_events());
    }
}
