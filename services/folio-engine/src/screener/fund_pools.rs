//! Fund pool classifier.
//!
//! Funds are tagged by case-insensitive keyword matching on their display
//! name. A fund may land in several categories, except where a category
//! lists others in `exclude_matches_of` (thematic funds that also read as
//! high-dividend stay out of the thematic pool). Every pool is ordered by
//! ascending volatility; profile-specific reordering belongs to the builder.

use aho_corasick::AhoCorasick;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::config::FundScreeningConfig;
use super::pool::{AssetPool, FundCategory, PoolKind};
use super::rules::{compare_values, SortDirection};
use crate::asset::AssetRecord;
use crate::error::Result;

/// Category pools keyed by fund category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FundPools {
    pools: BTreeMap<FundCategory, AssetPool>,
}

impl FundPools {
    pub fn from_pools(pools: impl IntoIterator<Item = (FundCategory, AssetPool)>) -> Self {
        Self {
            pools: pools.into_iter().collect(),
        }
    }

    pub fn get(&self, category: FundCategory) -> Option<&AssetPool> {
        self.pools.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FundCategory, &AssetPool)> {
        self.pools.iter().map(|(k, v)| (*k, v))
    }
}

struct CategoryMatcher {
    category: FundCategory,
    keywords: AhoCorasick,
    excludes: Vec<FundCategory>,
}

pub struct FundPoolClassifier {
    matchers: Vec<CategoryMatcher>,
}

impl FundPoolClassifier {
    /// Build one keyword automaton per category.
    pub fn new(config: &FundScreeningConfig) -> Result<Self> {
        let mut matchers = Vec::with_capacity(config.categories.len());
        for rule in &config.categories {
            let keywords: Vec<String> = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            matchers.push(CategoryMatcher {
                category: rule.category,
                keywords: AhoCorasick::new(&keywords)?,
                excludes: rule.exclude_matches_of.clone(),
            });
        }
        Ok(Self { matchers })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(&FundScreeningConfig::default())
    }

    /// Categories whose keyword list matches `name`, before exclusions.
    pub fn keyword_matches(&self, name: &str) -> BTreeSet<FundCategory> {
        let name = name.to_lowercase();
        self.matchers
            .iter()
            .filter(|m| m.keywords.is_match(&name))
            .map(|m| m.category)
            .collect()
    }

    /// Categories `name` belongs to after exclusions.
    pub fn categorize(&self, name: &str) -> BTreeSet<FundCategory> {
        let raw = self.keyword_matches(name);
        self.matchers
            .iter()
            .filter(|m| raw.contains(&m.category))
            .filter(|m| !m.excludes.iter().any(|e| raw.contains(e)))
            .map(|m| m.category)
            .collect()
    }

    /// Classify `assets` into category pools. Equities are ignored.
    pub fn classify(&self, assets: &[Arc<AssetRecord>]) -> FundPools {
        let mut members: BTreeMap<FundCategory, Vec<Arc<AssetRecord>>> = self
            .matchers
            .iter()
            .map(|m| (m.category, Vec::new()))
            .collect();

        for asset in assets.iter().filter(|a| a.is_fund()) {
            for category in self.categorize(&asset.name) {
                if let Some(list) = members.get_mut(&category) {
                    list.push(Arc::clone(asset));
                }
            }
        }

        FundPools::from_pools(members.into_iter().map(|(category, mut funds)| {
            funds.sort_by(|a, b| {
                compare_values(a.volatility_1y, b.volatility_1y, SortDirection::Asc)
            });
            tracing::info!(category = %category, count = funds.len(), "Fund category classified");
            (category, AssetPool::strict(PoolKind::Fund(category), 1, funds))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetClass;
    use crate::screener::rules::Metric;

    fn fund(id: &str, name: &str, vol: Option<f64>) -> Arc<AssetRecord> {
        let mut record = AssetRecord::new(id, name, AssetClass::Fund);
        record.volatility_1y = vol;
        Arc::new(record)
    }

    #[test]
    fn test_categorize_case_insensitive() {
        let classifier = FundPoolClassifier::with_defaults().unwrap();
        assert!(classifier
            .categorize("Vanguard s&p 500 ETF")
            .contains(&FundCategory::MarketCap));
        assert!(classifier
            .categorize("元大美債20年")
            .contains(&FundCategory::GovernmentBond));
        assert!(classifier.categorize("Gold Miners").is_empty());
    }

    #[test]
    fn test_ordinary_words_not_thematic() {
        let classifier = FundPoolClassifier::with_defaults().unwrap();
        for name in ["iShares MSCI Taiwan ETF", "SPDR Retail ETF", "Vanguard Total Market ETF"] {
            assert!(
                !classifier.categorize(name).contains(&FundCategory::Thematic),
                "{} classified as thematic",
                name
            );
        }
        assert!(classifier
            .categorize("Global X Artificial Intelligence ETF")
            .contains(&FundCategory::Thematic));
        assert!(classifier
            .categorize("元大全球人工智慧")
            .contains(&FundCategory::Thematic));
    }

    #[test]
    fn test_thematic_excludes_high_dividend() {
        let classifier = FundPoolClassifier::with_defaults().unwrap();
        let name = "國泰台灣科技高股息";
        let raw = classifier.keyword_matches(name);
        assert!(raw.contains(&FundCategory::Thematic));
        assert!(raw.contains(&FundCategory::HighDividend));

        let effective = classifier.categorize(name);
        assert!(!effective.contains(&FundCategory::Thematic));
        assert!(effective.contains(&FundCategory::HighDividend));
    }

    #[test]
    fn test_pools_sorted_by_volatility() {
        let classifier = FundPoolClassifier::with_defaults().unwrap();
        let funds = vec![
            fund("a", "元大美債20年", Some(15.0)),
            fund("b", "富邦美債1-3", None),
            fund("c", "中信美國公債20年", Some(12.0)),
            Arc::new(
                AssetRecord::new("2330", "台積電 美債", AssetClass::Equity)
                    .with_metric(Metric::Volatility, 1.0),
            ),
        ];

        let pools = classifier.classify(&funds);
        let bonds = pools.get(FundCategory::GovernmentBond).unwrap();
        assert_eq!(bonds.ids(), vec!["c", "a", "b"]);
        assert!(!bonds.is_relaxed());
        assert_eq!(pools.iter().count(), 5);
        assert!(pools.get(FundCategory::Thematic).unwrap().is_empty());
    }
}
