//! Presentation-currency conversion.
//!
//! Applied only at the display boundary: a market price is scaled into
//! the premium currency and snapped to the nearest `step`.

use rust_decimal::Decimal;

use super::{round_currency, ValuationError};

/// `round(price × rate / step) × step`, halves away from zero.
pub fn to_presentation_units(
    market_price: Decimal,
    rate: Decimal,
    step: Decimal,
) -> Result<Decimal, ValuationError> {
    let scaled = market_price
        .checked_mul(rate)
        .ok_or(ValuationError::Overflow)?;
    if step.is_zero() {
        return Ok(round_currency(scaled));
    }
    scaled
        .checked_div(step)
        .map(round_currency)
        .and_then(|units| units.checked_mul(step))
        .ok_or(ValuationError::Overflow)
}
