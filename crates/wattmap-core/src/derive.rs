//! Derivation engine — filling in missing figures and computing access
//! percentages with consistent clamping and rounding.
//!
//! The rules, applied in order:
//!
//! 1. a directly stored people-with value is trusted;
//! 2. otherwise `with = max(population - without, 0)` when population is
//!    known;
//! 3. otherwise people-with stays unknown — callers must never read it as 0;
//! 4. `without` clamps to `[0, population]` when population is known,
//!    before any derived computation;
//! 5. access % exists only when population > 0;
//! 6. group percentages use the same formula over *summed* population and
//!    *summed* without (population-weighted, never an average of per-row
//!    percentages).

/// Round to two decimal places, half away from zero.
pub fn round2(x: f64) -> f64 {
  (x * 100.0).round() / 100.0
}

/// Clamp a people-without figure into `[0, population]`. Without a known
/// population only the lower bound applies.
pub fn clamp_without(without: i64, population: Option<i64>) -> i64 {
  let floored = without.max(0);
  match population {
    Some(pop) => floored.min(pop.max(0)),
    None => floored,
  }
}

/// Derive the people-with figure per rules 1–3.
pub fn derive_with(
  population: Option<i64>,
  without: i64,
  with: Option<i64>,
) -> Option<i64> {
  if with.is_some() {
    return with;
  }
  population.map(|pop| (pop - clamp_without(without, Some(pop))).max(0))
}

/// Access percentage for one (population, without) pair. `None` when the
/// population is unknown or non-positive — such rows are excluded, not
/// reported as 0%.
pub fn access_percent(population: i64, without: i64) -> Option<f64> {
  if population <= 0 {
    return None;
  }
  let w = clamp_without(without, Some(population));
  let pct = (population - w) as f64 / population as f64 * 100.0;
  Some(round2(pct).clamp(0.0, 100.0))
}

/// Population-weighted percentage over group totals (rule 6). Identical
/// formula and clamps as [`access_percent`], applied to the sums.
pub fn weighted_percent(total_population: i64, total_without: i64) -> Option<f64> {
  access_percent(total_population, total_without)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
