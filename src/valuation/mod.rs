//! Trait value composition.
//!
//! Final value = round(base × max(floor, 1 + Σ(multiplier − 1))).
//! Trait bonuses stack additively: two +50% traits give +100%, not
//! +125%. Duplicated trait names each contribute.
//!
//! All arithmetic is checked; results past `Decimal::MAX` come back as
//! `ValuationError::Overflow`.

pub mod currency;

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{MutationCatalog, TraitValueTable};
use crate::config::ValuationConfig;

/// Why a value could not be computed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValuationError {
    #[error("unknown mutation: {0}")]
    UnknownMutation(String),
    #[error("value exceeds the representable range")]
    Overflow,
}

/// Round to whole currency units, halves away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Combined multiplier for a trait list, before the floor.
pub fn stacked_multiplier<S: AsRef<str>>(
    table: &TraitValueTable,
    traits: &[S],
) -> Result<Decimal, ValuationError> {
    traits.iter().try_fold(Decimal::ONE, |acc, t| {
        acc.checked_add(table.lookup(t.as_ref()) - Decimal::ONE)
            .ok_or(ValuationError::Overflow)
    })
}

/// Compose a final value from a non-negative base and a trait list.
pub fn compose_value<S: AsRef<str>>(
    table: &TraitValueTable,
    base_value: Decimal,
    traits: &[S],
    multiplier_floor: Decimal,
) -> Result<Decimal, ValuationError> {
    let combined = stacked_multiplier(table, traits)?.max(multiplier_floor);
    base_value
        .checked_mul(combined)
        .map(round_currency)
        .ok_or(ValuationError::Overflow)
}

/// Composes display values from prices, mutations and traits.
pub struct ValueComposer {
    traits: Arc<TraitValueTable>,
    mutations: Arc<MutationCatalog>,
    config: ValuationConfig,
}

impl ValueComposer {
    pub fn new(
        traits: Arc<TraitValueTable>,
        mutations: Arc<MutationCatalog>,
        config: ValuationConfig,
    ) -> Self {
        Self { traits, mutations, config }
    }

    pub fn traits(&self) -> &TraitValueTable {
        &self.traits
    }

    /// Final value for a base value (already mutation-adjusted) and traits.
    pub fn compose_value<S: AsRef<str>>(
        &self,
        base_value: Decimal,
        traits: &[S],
    ) -> Result<Decimal, ValuationError> {
        let value = compose_value(&self.traits, base_value, traits, self.config.multiplier_floor)?;
        debug!(base = %base_value, traits = traits.len(), value = %value, "Composed value");
        Ok(value)
    }

    /// Apply a mutation's income multiplier to a base price.
    pub fn apply_mutation(&self, base_value: Decimal, mutation_key: &str) -> Result<Decimal, ValuationError> {
        let mutation = self
            .mutations
            .resolve(mutation_key)
            .ok_or_else(|| ValuationError::UnknownMutation(mutation_key.to_lowercase()))?;
        base_value
            .checked_mul(mutation.income_multiplier)
            .ok_or(ValuationError::Overflow)
    }

    /// Market price → rounded presentation-currency price.
    pub fn convert_to_presentation_units(&self, market_price: Decimal) -> Result<Decimal, ValuationError> {
        currency::to_presentation_units(
            market_price,
            self.config.presentation_rate,
            self.config.presentation_step,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
