//! Aggregate filtering — telling real countries apart from statistical
//! rollups.
//!
//! The source dataset mixes countries with World Bank aggregate "entities"
//! ("World", "OECD members", "Low income", region rollups) in the same
//! table. Percentage and ranking statistics are meaningless when both are
//! mixed, so every analytical query applies this filter to country-name
//! fields before aggregating or ranking.
//!
//! The keyword list is a documented heuristic: substring matching will
//! over- or under-exclude some legitimately named entities, and that is
//! accepted behaviour rather than something to silently "fix" with a
//! different list. Deployments can append keywords but the defaults stay
//! fixed.

use serde::{Deserialize, Serialize};

/// Default keyword set, lower-case, matched as substrings.
const DEFAULT_KEYWORDS: &[&str] = &[
  // geographic aggregates
  "world", "region", "regions", "asia", "africa", "europe", "america",
  "caribbean", "pacific",
  // income / classification aggregates
  "income", "ida", "ibrd", "oecd", "blend", "hipc", "fragile",
  "demographic", "high income", "low income", "middle income",
  "small states", "least", "developed", "developing",
  // generic rollup markers
  "total", "only",
];

/// Classifies a country-like name as a real country or an aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePolicy {
  keywords: Vec<String>,
}

impl Default for AggregatePolicy {
  fn default() -> Self {
    Self {
      keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
    }
  }
}

impl AggregatePolicy {
  /// Default keywords plus deployment-specific extras (lower-cased).
  pub fn with_extra(extra: impl IntoIterator<Item = String>) -> Self {
    let mut policy = Self::default();
    policy
      .keywords
      .extend(extra.into_iter().map(|k| k.to_lowercase()));
    policy
  }

  /// `true` when `name` should be excluded from per-country statistics.
  ///
  /// A null or empty name is always an aggregate (conservative: better to
  /// drop an unnamed row than to corrupt a ranking with it).
  pub fn is_aggregate(&self, name: Option<&str>) -> bool {
    let Some(name) = name else { return true };
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
      return true;
    }
    self.keywords.iter().any(|k| lowered.contains(k.as_str()))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_aggregates_are_excluded() {
    let policy = AggregatePolicy::default();
    for name in [
      "World",
      "OECD members",
      "Low income",
      "Sub-Saharan Africa",
      "East Asia & Pacific",
      "IDA blend",
      "Least developed countries: UN classification",
    ] {
      assert!(policy.is_aggregate(Some(name)), "{name} should be aggregate");
    }
  }

  #[test]
  fn real_countries_pass() {
    let policy = AggregatePolicy::default();
    for name in ["Kenya", "India", "Peru", "Bangladesh"] {
      assert!(!policy.is_aggregate(Some(name)), "{name} should be a country");
    }
  }

  #[test]
  fn null_and_empty_names_are_aggregates() {
    let policy = AggregatePolicy::default();
    assert!(policy.is_aggregate(None));
    assert!(policy.is_aggregate(Some("")));
    assert!(policy.is_aggregate(Some("   ")));
  }

  #[test]
  fn matching_is_case_insensitive_substring() {
    let policy = AggregatePolicy::default();
    assert!(policy.is_aggregate(Some("  WORLD  ")));
    // substring heuristic: matches inside longer names too
    assert!(policy.is_aggregate(Some("Arab World")));
  }

  #[test]
  fn extra_keywords_extend_the_policy() {
    let policy = AggregatePolicy::with_extra(vec!["Union".to_string()]);
    assert!(policy.is_aggregate(Some("European Union")));
    assert!(!AggregatePolicy::default().is_aggregate(Some("Union City")));
  }
}
