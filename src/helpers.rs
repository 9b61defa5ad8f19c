//! Decimal ↔ f64 conversion at the datastore/HTTP boundary.
//!
//! City coordinates are stored as `NUMERIC` (Decimal) but Open-Meteo query
//! parameters are plain floats.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be
/// represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("26.9124").unwrap();
        assert!((dec_to_f64(d) - 26.9124).abs() < 1e-10);
    }

    #[test]
    fn test_dec_to_f64_zero() {
        assert_eq!(dec_to_f64(Decimal::ZERO), 0.0);
    }
}
