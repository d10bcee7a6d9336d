//! Vault Configuration
//!
//! Construction is two-phase: describe the deployment in a `VaultConfig`,
//! then hand it to a `VaultBuilder` together with the oracle and note
//! adapters. `build()` validates everything and returns a ready vault.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tranche_common::{
    access_control::AccessControl,
    constants::vault::{MAX_ADMIN_FEE_RATE, MAX_RESERVE_RATIO, MAX_SENIOR_TRANCHE_RATE},
    errors::{TrancheError, TrancheResult},
    events::EventLog,
    types::{Address, ZERO_ADDRESS},
};
use tranche_note_adapters::NoteAdapter;
use tranche_price_oracle::LoanPricing;
use tranche_share_token::LpToken;

use crate::state::{Tranche, VaultState};
use crate::vault::Vault;

/// Deployment description of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultConfig {
    /// Display name, also prefixes the share token names
    pub name: String,
    /// Currency deposited, lent and repaid
    pub currency_token: Address,
    /// Account holding the vault's currency and notes
    pub vault_address: Address,
    /// Initial holder of every role
    pub admin: Address,
    /// Senior return per second (WAD)
    pub senior_tranche_rate: u128,
    /// Fraction of tranche value kept as cash (WAD)
    pub reserve_ratio: u128,
    /// Fraction of each spread taken as admin fee (WAD)
    pub admin_fee_rate: u128,
}

impl VaultConfig {
    pub fn new(name: impl Into<String>, currency_token: Address, vault_address: Address, admin: Address) -> Self {
        Self {
            name: name.into(),
            currency_token,
            vault_address,
            admin,
            senior_tranche_rate: 0,
            reserve_ratio: 0,
            admin_fee_rate: 0,
        }
    }

    pub fn validate(&self) -> TrancheResult<()> {
        if self.name.is_empty() {
            return Err(TrancheError::InvalidInput {
                param: "name",
                reason: "cannot be empty",
            });
        }
        if self.currency_token == ZERO_ADDRESS {
            return Err(TrancheError::InvalidAddress {
                reason: "currency token cannot be zero address",
            });
        }
        if self.vault_address == ZERO_ADDRESS {
            return Err(TrancheError::InvalidAddress {
                reason: "vault address cannot be zero address",
            });
        }
        check_bound("senior_tranche_rate", self.senior_tranche_rate, MAX_SENIOR_TRANCHE_RATE)?;
        check_bound("reserve_ratio", self.reserve_ratio, MAX_RESERVE_RATIO)?;
        check_bound("admin_fee_rate", self.admin_fee_rate, MAX_ADMIN_FEE_RATE)?;
        Ok(())
    }
}

/// Fail with `ParameterOutOfBounds` if `value` exceeds `maximum`
pub(crate) fn check_bound(param: &'static str, value: u128, maximum: u128) -> TrancheResult<()> {
    if value > maximum {
        return Err(TrancheError::ParameterOutOfBounds {
            param,
            value,
            minimum: 0,
            maximum,
        });
    }
    Ok(())
}

/// Collects configuration, oracle and adapters for a new vault
pub struct VaultBuilder {
    config: VaultConfig,
    oracle: Option<Box<dyn LoanPricing>>,
    adapters: Vec<Box<dyn NoteAdapter>>,
}

impl VaultBuilder {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            oracle: None,
            adapters: Vec::new(),
        }
    }

    pub fn senior_tranche_rate(mut self, rate: u128) -> Self {
        self.config.senior_tranche_rate = rate;
        self
    }

    pub fn reserve_ratio(mut self, ratio: u128) -> Self {
        self.config.reserve_ratio = ratio;
        self
    }

    pub fn admin_fee_rate(mut self, rate: u128) -> Self {
        self.config.admin_fee_rate = rate;
        self
    }

    pub fn loan_price_oracle(mut self, oracle: Box<dyn LoanPricing>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Register an adapter under its own note token
    pub fn note_adapter(mut self, adapter: Box<dyn NoteAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Validate and produce a ready vault
    pub fn build(self) -> TrancheResult<Vault> {
        self.config.validate()?;

        let oracle = self.oracle.ok_or(TrancheError::InvalidInput {
            param: "loan_price_oracle",
            reason: "no oracle configured",
        })?;

        let mut adapters: BTreeMap<Address, Box<dyn NoteAdapter>> = BTreeMap::new();
        for adapter in self.adapters {
            let note_token = adapter.note_token();
            if adapters.contains_key(&note_token) {
                return Err(TrancheError::InvalidInput {
                    param: "note_adapter",
                    reason: "duplicate note token",
                });
            }
            adapters.insert(note_token, adapter);
        }

        let config = self.config;
        let state = VaultState {
            tranches: [Tranche::default(), Tranche::default()],
            lp_tokens: [
                LpToken::new(format!("{} Senior LP Token", config.name), "sLP"),
                LpToken::new(format!("{} Junior LP Token", config.name), "jLP"),
            ],
            loans: BTreeMap::new(),
            cash_balance: 0,
            loan_balance: 0,
            withdrawal_balance: 0,
            admin_fee_balance: 0,
            senior_tranche_rate: config.senior_tranche_rate,
            reserve_ratio: config.reserve_ratio,
            admin_fee_rate: config.admin_fee_rate,
            paused: false,
            access: AccessControl::with_admin(config.admin)?,
        };

        debug!(name = %config.name, adapters = adapters.len(), "vault built");

        Ok(Vault::from_parts(
            config.name,
            config.currency_token,
            config.vault_address,
            state,
            adapters,
            oracle,
            EventLog::new(),
        ))
    }
}
