//! Application services: the transactional entry points of the commerce core.
pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod orders;

use serde::{Deserialize, Serialize};

pub use cart::CartService;
pub use checkout::{CheckoutCoordinator, CheckoutRequest, CheckoutSettings, CheckoutState};
pub use inventory::{ExpirySweepReport, InventoryService, StockAction, StockAdjustment, StockSnapshot};
pub use orders::{OrderAction, OrderService, OrderTransition};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { Customer, Staff, Admin }

/// Authenticated caller, as asserted by the identity collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn is_staff(&self) -> bool { matches!(self.role, Role::Staff | Role::Admin) }

    /// Customers act only for themselves; staff may act for anyone.
    pub fn can_act_for(&self, user_id: &str) -> bool { self.is_staff() || self.user_id == user_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_rules() {
        let customer = Principal::new("u1", Role::Customer);
        assert!(customer.can_act_for("u1"));
        assert!(!customer.can_act_for("u2"));
        assert!(Principal::new("ops", Role::Staff).can_act_for("u2"));
    }
}
