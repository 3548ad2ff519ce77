//! The engine's outward surface.
//!
//! `Appraiser` wires the catalogs, fetcher, sweep orchestrator and value
//! composer together from one `AppConfig` and exposes the four
//! operations collaborators call.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Instant;

use crate::catalog::{MutationCatalog, NameAliases, TraitValueTable};
use crate::config::AppConfig;
use crate::engine::fetcher::OfferFetcher;
use crate::engine::sweep::SweepOrchestrator;
use crate::engine::PriceError;
use crate::market::ListingSource;
use crate::types::{ItemQuery, PriceResult, Rarity, SweepReport};
use crate::valuation::{ValuationError, ValueComposer};

pub struct Appraiser {
    mutations: Arc<MutationCatalog>,
    orchestrator: SweepOrchestrator,
    composer: ValueComposer,
}

impl Appraiser {
    /// Build from config with the built-in catalogs plus config overrides.
    pub fn from_config(config: &AppConfig, source: Arc<dyn ListingSource>) -> Self {
        let mutations = Arc::new(MutationCatalog::standard());
        let traits = Arc::new(
            TraitValueTable::standard()
                .with_overrides(config.traits.iter().map(|(k, v)| (k.as_str(), *v))),
        );
        let aliases = Arc::new(NameAliases::new(config.aliases.iter().map(|(k, v)| (k, v.clone()))));
        Self::new(config, source, mutations, traits, aliases)
    }

    pub fn new(
        config: &AppConfig,
        source: Arc<dyn ListingSource>,
        mutations: Arc<MutationCatalog>,
        traits: Arc<TraitValueTable>,
        aliases: Arc<NameAliases>,
    ) -> Self {
        let fetcher = Arc::new(OfferFetcher::new(source, mutations.clone(), aliases, config));
        Self {
            orchestrator: SweepOrchestrator::new(fetcher, config.sweep.clone()),
            composer: ValueComposer::new(traits, mutations.clone(), config.valuation.clone()),
            mutations,
        }
    }

    pub fn mutations(&self) -> &MutationCatalog {
        &self.mutations
    }

    pub fn traits(&self) -> &TraitValueTable {
        self.composer.traits()
    }

    pub fn orchestrator(&self) -> &SweepOrchestrator {
        &self.orchestrator
    }

    pub fn composer(&self) -> &ValueComposer {
        &self.composer
    }

    /// On-demand price of one (item, rarity, mutation) variant.
    pub async fn fetch_single_price(
        &self,
        item: &str,
        rarity: Rarity,
        mutation_key: &str,
        deadline: Option<Instant>,
    ) -> Result<PriceResult, PriceError> {
        self.orchestrator
            .fetcher()
            .fetch_price(&ItemQuery::new(item, rarity, mutation_key), deadline)
            .await
    }

    /// Price one item across every catalog mutation.
    pub async fn sweep_item(
        &self,
        item: &str,
        rarity: Rarity,
        deadline: Option<Instant>,
    ) -> Result<SweepReport, PriceError> {
        self.orchestrator.sweep_item(item, rarity, deadline).await
    }

    /// Final display value from a mutation-adjusted base and traits.
    pub fn compose_value<S: AsRef<str>>(
        &self,
        base_value: Decimal,
        traits: &[S],
    ) -> Result<Decimal, ValuationError> {
        self.composer.compose_value(base_value, traits)
    }

    /// Market price → presentation-currency price.
    pub fn convert_to_presentation_units(&self, market_price: Decimal) -> Result<Decimal, ValuationError> {
        self.composer.convert_to_presentation_units(market_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MockListingSource, SearchReply};
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_traits_and_aliases_applied() {
        let mut cfg = AppConfig::default();
        cfg.traits.insert("Disco".into(), dec!(1.3));
        let appraiser = Appraiser::from_config(&cfg, Arc::new(MockListingSource::new()));
        assert_eq!(appraiser.traits().lookup("disco"), dec!(1.3));
        assert_eq!(appraiser.traits().lookup("strawberry"), dec!(1.5));
        assert_eq!(appraiser.compose_value(dec!(1000), &["disco"]), Ok(dec!(1300)));
        assert_eq!(appraiser.convert_to_presentation_units(dec!(137)), Ok(dec!(13700)));
    }

    #[tokio::test]
    async fn test_fetch_single_price_uses_alias() {
        let mut cfg = AppConfig::default();
        cfg.aliases.insert("Foo".into(), "Fooo".into());
        let mut mock = MockListingSource::new();
        mock.expect_search()
            .withf(|req| req.name == "Fooo")
            .times(1)
            .returning(|_| Ok(SearchReply::Listings(vec![])));
        let appraiser = Appraiser::from_config(&cfg, Arc::new(mock));

        let result = appraiser.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap();
        assert_eq!(result.listing_count(), 0);
    }
}
