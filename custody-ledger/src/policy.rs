//! Deposit-size policy
//!
//! Checked by the request router before a deposit reaches the ledger. The
//! ledger engine itself never enforces it.

use crate::error::{Error, Result};
use crate::external::{ParameterStore, PriceOracle};
use crate::types::Coin;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Accept `coin` only if its denom is whitelisted and its value
/// (`amount * price`) reaches the configured minimum.
pub fn check_deposit(
    params: &dyn ParameterStore,
    oracle: &dyn PriceOracle,
    coin: &Coin,
) -> Result<()> {
    if !params.whitelisted_denoms().contains(&coin.denom) {
        return Err(Error::validation(format!(
            "denom {} is not accepted for deposit",
            coin.denom
        )));
    }

    let amount = Decimal::from_u128(coin.amount)
        .ok_or_else(|| Error::validation(format!("amount {} out of range", coin.amount)))?;
    let price = oracle.price(&coin.denom)?;
    let value = amount
        .checked_mul(price)
        .ok_or_else(|| Error::validation(format!("value of {} overflows", coin)))?;

    let minimum = params.min_deposit_value(&coin.denom);
    if value < minimum {
        return Err(Error::validation(format!(
            "deposit of {} is worth {}, below the minimum {}",
            coin, value, minimum
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepositParams;
    use crate::external::{FixedPriceOracle, StaticParams};
    use crate::types::Denom;

    fn setup() -> (StaticParams, FixedPriceOracle) {
        let params = StaticParams::from_config(&DepositParams {
            whitelisted_denoms: vec!["uatom".to_string(), "uosmo".to_string()],
            min_deposit_value: Decimal::new(100, 0),
        })
        .unwrap();
        let oracle = FixedPriceOracle::new()
            .with_price(Denom::new("uatom").unwrap(), Decimal::new(25, 1))
            .with_price(Denom::new("uqsr").unwrap(), Decimal::ONE);
        (params, oracle)
    }

    #[test]
    fn test_accepts_deposit_at_minimum() {
        let (params, oracle) = setup();
        // 40 * 2.5 = 100
        assert!(check_deposit(&params, &oracle, &Coin::parse("uatom", 40).unwrap()).is_ok());
    }

    #[test]
    fn test_rejects_small_deposit() {
        let (params, oracle) = setup();
        let err = check_deposit(&params, &oracle, &Coin::parse("uatom", 39).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_rejects_unlisted_denom() {
        let (params, oracle) = setup();
        assert!(check_deposit(&params, &oracle, &Coin::parse("uqsr", 1000).unwrap()).is_err());
    }

    #[test]
    fn test_missing_price_rejected() {
        let (params, oracle) = setup();
        assert!(check_deposit(&params, &oracle, &Coin::parse("uosmo", 1000).unwrap()).is_err());
    }
}
