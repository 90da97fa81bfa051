//! Ability shop pricing and purchase rules.

use thiserror::Error;

use crate::catalog::{AbilityDef, Catalog};
use crate::session::{AbilityLevel, AbilityProgress};

/// Why a purchase was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    /// Ability id is not in the catalog.
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    /// Ability is already at its maximum level.
    #[error("Ability '{id}' is already at max level {max_level}")]
    MaxLevel {
        /// Ability id.
        id: String,
        /// Catalog cap.
        max_level: u32,
    },

    /// Balance does not cover the price.
    #[error("Need {need} coins, have {have}")]
    InsufficientFunds {
        /// Price of the next level.
        need: u64,
        /// Current balance.
        have: u64,
    },
}

/// Price of the level after `owned_level`: the base price times the
/// level being bought.
#[must_use]
pub fn next_price(def: &AbilityDef, owned_level: u32) -> u64 {
    def.price.saturating_mul(u64::from(owned_level) + 1)
}

/// A completed purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    /// Coins spent.
    pub price: u64,
    /// Level owned afterwards.
    pub new_level: u32,
}

/// Buy one level of `id`, updating `balance` and `progress` in place.
///
/// Nothing is modified when the purchase is refused.
///
/// # Errors
///
/// `UnknownAbility`, `MaxLevel` or `InsufficientFunds`.
pub fn purchase(
    catalog: &Catalog,
    balance: &mut u64,
    progress: &mut AbilityProgress,
    id: &str,
) -> Result<Purchase, PurchaseError> {
    let def = catalog
        .ability(id)
        .ok_or_else(|| PurchaseError::UnknownAbility(id.to_string()))?;
    let owned = progress.get(id).map_or(0, |p| p.level);
    if owned >= def.max_level {
        return Err(PurchaseError::MaxLevel {
            id: id.to_string(),
            max_level: def.max_level,
        });
    }

    let price = next_price(def, owned);
    if *balance < price {
        return Err(PurchaseError::InsufficientFunds {
            need: price,
            have: *balance,
        });
    }

    *balance -= price;
    let new_level = owned + 1;
    progress.insert(id.to_string(), AbilityLevel { level: new_level });
    tracing::info!(ability = %id, level = new_level, price, "Ability purchased");

    Ok(Purchase { price, new_level })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_scales_with_level() {
        let catalog = Catalog::standard();
        let def = catalog.ability("damage_boost").unwrap();
        assert_eq!(next_price(def, 0), 200);
        assert_eq!(next_price(def, 1), 400);
        assert_eq!(next_price(def, 9), 2000);
    }

    #[test]
    fn test_purchase_deducts_and_levels() {
        let catalog = Catalog::standard();
        let mut balance = 700;
        let mut progress = AbilityProgress::new();

        let first = purchase(&catalog, &mut balance, &mut progress, "damage_boost").unwrap();
        assert_eq!(first, Purchase { price: 200, new_level: 1 });
        let second = purchase(&catalog, &mut balance, &mut progress, "damage_boost").unwrap();
        assert_eq!(second.price, 400);
        assert_eq!(balance, 100);
        assert_eq!(progress["damage_boost"].level, 2);
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let catalog = Catalog::standard();
        let mut balance = 1000;
        let mut progress = AbilityProgress::new();

        let err = purchase(&catalog, &mut balance, &mut progress, "double_strike").unwrap_err();
        assert_eq!(err, PurchaseError::InsufficientFunds { need: 1200, have: 1000 });
        assert_eq!(balance, 1000);
        assert!(progress.is_empty());
    }

    #[test]
    fn test_max_level_and_unknown() {
        let catalog = Catalog::standard();
        let mut balance = 1_000_000;
        let mut progress = AbilityProgress::new();
        progress.insert("healing_aura".to_string(), AbilityLevel { level: 1 });

        assert!(matches!(
            purchase(&catalog, &mut balance, &mut progress, "healing_aura"),
            Err(PurchaseError::MaxLevel { max_level: 1, .. })
        ));
        assert!(matches!(
            purchase(&catalog, &mut balance, &mut progress, "fireball"),
            Err(PurchaseError::UnknownAbility(_))
        ));
        assert_eq!(balance, 1_000_000);
    }
}
