//! Static lookup catalogs.
//!
//! The mutation catalog and trait table are built once at start-up and
//! shared read-only (behind `Arc`) between the fetcher, the sweep
//! orchestrator and the value composer. Name aliases translate the
//! canonical item name into the external service's spelling at query
//! construction time only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Built-in mutations: (key, external attribute id, income multiplier).
/// Ordered by id.
const MUTATIONS: &[(&str, u32, Decimal)] = &[
    ("default", 0, dec!(1)),
    ("gold", 1, dec!(1.25)),
    ("diamond", 2, dec!(1.5)),
    ("bloodrot", 3, dec!(2)),
    ("candy", 4, dec!(4)),
    ("lava", 5, dec!(6)),
    ("galaxy", 6, dec!(7)),
    ("yinyang", 7, dec!(7.5)),
    ("radioactive", 8, dec!(8.5)),
    ("rainbow", 9, dec!(10)),
];

/// Key of the baseline mutation every other mutation is compared to.
pub const DEFAULT_MUTATION: &str = "default";

/// One mutation variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub key: String,
    /// Attribute id understood by the external listings API.
    pub id: u32,
    pub income_multiplier: Decimal,
}

/// Fixed mapping from lowercase mutation key to external attribute id.
#[derive(Debug, Clone)]
pub struct MutationCatalog {
    /// Sorted by ascending id.
    entries: Vec<Mutation>,
}

impl MutationCatalog {
    /// Build a catalog from arbitrary entries. Keys are lowercased and
    /// entries sorted by id.
    pub fn new(mut entries: Vec<Mutation>) -> Self {
        for e in &mut entries {
            e.key = e.key.to_lowercase();
        }
        entries.sort_by_key(|e| e.id);
        Self { entries }
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        Self::new(
            MUTATIONS
                .iter()
                .map(|(key, id, mult)| Mutation {
                    key: (*key).to_string(),
                    id: *id,
                    income_multiplier: *mult,
                })
                .collect(),
        )
    }

    /// Resolve a mutation key (case-insensitive).
    pub fn resolve(&self, key: &str) -> Option<&Mutation> {
        let key = key.trim().to_lowercase();
        self.entries.iter().find(|m| m.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// All mutations in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|m| m.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MutationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Built-in trait multipliers. Admins extend this via `[traits]` in config.
const TRAITS: &[(&str, Decimal)] = &[
    ("strawberry", dec!(1.5)),
    ("sombrero", dec!(0.9)),
    ("taco", dec!(1.25)),
    ("fire", dec!(1.5)),
    ("nyan", dec!(2)),
    ("zombie", dec!(1.2)),
    ("galactic", dec!(1.4)),
    ("rain", dec!(1.1)),
    ("snowy", dec!(1.1)),
    ("sleepy", dec!(0.5)),
    ("glitched", dec!(0.8)),
];

/// Neutral multiplier for traits the table does not know.
pub const NEUTRAL_MULTIPLIER: Decimal = dec!(1);

/// Lowercase trait name → value multiplier (≥ 0).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraitValueTable {
    multipliers: HashMap<String, Decimal>,
}

impl TraitValueTable {
    /// The built-in table.
    pub fn standard() -> Self {
        Self {
            multipliers: TRAITS
                .iter()
                .map(|(name, mult)| ((*name).to_string(), *mult))
                .collect(),
        }
    }

    /// Layer overrides on top of the table. Negative multipliers are
    /// ignored with a warning.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        for (name, mult) in overrides {
            let name = name.as_ref().trim().to_lowercase();
            if mult.is_sign_negative() {
                warn!(trait_name = %name, multiplier = %mult, "Ignoring negative trait multiplier");
                continue;
            }
            self.multipliers.insert(name, mult);
        }
        self
    }

    /// Multiplier for a trait; unknown traits are neutral.
    pub fn lookup(&self, name: &str) -> Decimal {
        self.multipliers
            .get(&name.trim().to_lowercase())
            .copied()
            .unwrap_or(NEUTRAL_MULTIPLIER)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.multipliers.contains_key(&name.trim().to_lowercase())
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> Vec<(&str, Decimal)> {
        let mut v: Vec<_> = self.multipliers.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        v.sort_by(|a, b| a.0.cmp(b.0));
        v
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Name aliases
// ---------------------------------------------------------------------------

/// Canonical item name → external spelling. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct NameAliases {
    aliases: HashMap<String, String>,
}

impl NameAliases {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            aliases: pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// The name to send to the external service.
    pub fn external_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.aliases
            .get(&canonical.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
