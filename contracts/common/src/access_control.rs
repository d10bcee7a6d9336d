//! Access Control Module
//!
//! Role-based capabilities for the vault and the price oracle.
//!
//! - **Admin**: parameters, adapter registry, oracle, roles, admin fees
//! - **CollateralLiquidator**: liquidation calls and collateral custody
//! - **EmergencyAdmin**: pause and unpause

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{TrancheError, TrancheResult};
use crate::types::{Address, ZERO_ADDRESS};

// ============================================================================
// Types
// ============================================================================

/// Protocol roles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum Role {
    /// Protocol admin - parameters, registries and roles
    Admin = 0,
    /// Collateral liquidator - liquidation and collateral withdrawal
    CollateralLiquidator = 1,
    /// Emergency operator - can pause/unpause
    EmergencyAdmin = 2,
}

impl Role {
    /// Role name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CollateralLiquidator => "collateral_liquidator",
            Role::EmergencyAdmin => "emergency_admin",
        }
    }
}

/// Role assignments
#[derive(
    Debug, Clone, PartialEq, Eq, Default,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// Create with a single admin holding every role
    pub fn with_admin(admin: Address) -> TrancheResult<Self> {
        if admin == ZERO_ADDRESS {
            return Err(TrancheError::InvalidAddress {
                reason: "admin cannot be zero address",
            });
        }

        let mut access = Self::default();
        for role in [Role::Admin, Role::CollateralLiquidator, Role::EmergencyAdmin] {
            access.members.entry(role).or_default().insert(admin);
        }
        Ok(access)
    }

    /// Check whether an account holds a role
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Fail with `Unauthorized` unless the account holds the role
    pub fn require_role(&self, role: Role, account: &Address) -> TrancheResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(TrancheError::Unauthorized { account: *account, role })
        }
    }

    /// Grant a role (admin only). Returns false if already held.
    pub fn grant_role(&mut self, caller: &Address, role: Role, account: Address) -> TrancheResult<bool> {
        self.require_role(Role::Admin, caller)?;
        if account == ZERO_ADDRESS {
            return Err(TrancheError::InvalidAddress {
                reason: "cannot grant role to zero address",
            });
        }
        Ok(self.members.entry(role).or_default().insert(account))
    }

    /// Revoke a role (admin only). Returns false if not held.
    ///
    /// The last admin cannot be removed.
    pub fn revoke_role(&mut self, caller: &Address, role: Role, account: &Address) -> TrancheResult<bool> {
        self.require_role(Role::Admin, caller)?;

        let members = match self.members.get_mut(&role) {
            Some(members) => members,
            None => return Ok(false),
        };

        if role == Role::Admin && members.len() == 1 && members.contains(account) {
            return Err(TrancheError::InvalidInput {
                param: "account",
                reason: "cannot revoke the last admin",
            });
        }

        Ok(members.remove(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        [1u8; 32]
    }

    fn liquidator() -> Address {
        [2u8; 32]
    }

    #[test]
    fn test_admin_holds_all_roles() {
        let access = AccessControl::with_admin(admin()).unwrap();
        assert!(access.has_role(Role::Admin, &admin()));
        assert!(access.has_role(Role::CollateralLiquidator, &admin()));
        assert!(access.has_role(Role::EmergencyAdmin, &admin()));
    }

    #[test]
    fn test_zero_admin_rejected() {
        assert!(matches!(
            AccessControl::with_admin(ZERO_ADDRESS),
            Err(TrancheError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut access = AccessControl::with_admin(admin()).unwrap();

        assert!(access.grant_role(&admin(), Role::CollateralLiquidator, liquidator()).unwrap());
        assert!(!access.grant_role(&admin(), Role::CollateralLiquidator, liquidator()).unwrap());
        assert!(access.has_role(Role::CollateralLiquidator, &liquidator()));

        assert!(access.revoke_role(&admin(), Role::CollateralLiquidator, &liquidator()).unwrap());
        assert!(!access.has_role(Role::CollateralLiquidator, &liquidator()));
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let mut access = AccessControl::with_admin(admin()).unwrap();
        let result = access.grant_role(&liquidator(), Role::Admin, liquidator());
        assert_eq!(
            result,
            Err(TrancheError::Unauthorized { account: liquidator(), role: Role::Admin })
        );
    }

    #[test]
    fn test_last_admin_kept() {
        let mut access = AccessControl::with_admin(admin()).unwrap();
        let result = access.revoke_role(&admin(), Role::Admin, &admin());
        assert!(matches!(result, Err(TrancheError::InvalidInput { .. })));
    }
}
