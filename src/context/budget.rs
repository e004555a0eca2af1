//! Token budget calculation.
//!
//! An intent maps to a complexity tier; the tier's multiplier scales the base
//! budget, capped at `max_budget`. An explicit token count replaces the
//! intent-derived total. A reserve is held back for the surrounding prompt,
//! and the rest is split across entry types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::types::EntryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

/// Static intent → tier table. Unknown intents are treated as moderate.
pub fn complexity_for_intent(intent: &str) -> Complexity {
    match intent.trim().to_ascii_lowercase().as_str() {
        "lookup" | "recall" | "status" | "quick" => Complexity::Simple,
        "debug" | "refactor" | "architecture" | "plan" | "investigate" | "migrate" => {
            Complexity::Complex
        }
        _ => Complexity::Moderate,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplexityMultipliers {
    pub simple: f64,
    pub moderate: f64,
    pub complex: f64,
}

impl Default for ComplexityMultipliers {
    fn default() -> Self {
        Self {
            simple: 1.0,
            moderate: 2.0,
            complex: 4.0,
        }
    }
}

impl ComplexityMultipliers {
    pub fn for_tier(&self, complexity: Complexity) -> f64 {
        match complexity {
            Complexity::Simple => self.simple,
            Complexity::Moderate => self.moderate,
            Complexity::Complex => self.complex,
        }
    }
}

/// Relative share of the effective budget per entry type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TypeShares {
    pub guideline: f64,
    pub knowledge: f64,
    pub tool: f64,
    pub experience: f64,
}

impl Default for TypeShares {
    fn default() -> Self {
        Self {
            guideline: 0.35,
            knowledge: 0.30,
            tool: 0.20,
            experience: 0.15,
        }
    }
}

impl TypeShares {
    fn share(&self, entry_type: EntryType) -> f64 {
        let raw = match entry_type {
            EntryType::Guideline => self.guideline,
            EntryType::Knowledge => self.knowledge,
            EntryType::Tool => self.tool,
            EntryType::Experience => self.experience,
        };
        raw.max(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub enabled: bool,
    pub base_budget: usize,
    pub max_budget: usize,
    pub multipliers: ComplexityMultipliers,
    /// Fraction of the total held back from entries.
    pub reserve_ratio: f64,
    pub shares: TypeShares,
    /// Assumed size of one entry when turning a token allocation into a count.
    pub avg_entry_tokens: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_budget: 2000,
            max_budget: 8000,
            multipliers: ComplexityMultipliers::default(),
            reserve_ratio: 0.1,
            shares: TypeShares::default(),
            avg_entry_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub total_budget: usize,
    pub effective_budget: usize,
    pub complexity: Complexity,
    pub allocation: BTreeMap<EntryType, usize>,
    pub max_entries: BTreeMap<EntryType, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetCalculator {
    config: BudgetConfig,
}

impl BudgetCalculator {
    pub fn new(config: BudgetConfig) -> Self {
        Self { config }
    }

    fn complexity(&self, intent: Option<&str>) -> Complexity {
        if self.config.enabled {
            intent.map_or(Complexity::Simple, complexity_for_intent)
        } else {
            Complexity::Simple
        }
    }

    /// `base` scaled by the intent's tier multiplier. Unscaled when disabled.
    pub fn scale(&self, intent: Option<&str>, base: usize) -> usize {
        if !self.config.enabled {
            return base;
        }
        let multiplier = self.config.multipliers.for_tier(self.complexity(intent));
        (base as f64 * multiplier.max(0.0)) as usize
    }

    pub fn calculate(&self, intent: Option<&str>, max_tokens: Option<usize>) -> Budget {
        let cfg = &self.config;
        let max_budget = cfg.max_budget;
        let complexity = self.complexity(intent);

        let total_budget = match max_tokens {
            Some(tokens) => tokens,
            None => self.scale(intent, cfg.base_budget),
        }
        .min(max_budget);

        let reserve = cfg.reserve_ratio.clamp(0.0, 1.0);
        let effective_budget = ((total_budget as f64) * (1.0 - reserve)).floor() as usize;
        let effective_budget = effective_budget.min(total_budget);

        let share_total: f64 = EntryType::ALL.iter().map(|t| cfg.shares.share(*t)).sum();
        let per_entry = cfg.avg_entry_tokens.max(1);
        let mut allocation = BTreeMap::new();
        let mut max_entries = BTreeMap::new();
        for entry_type in EntryType::ALL {
            let fraction = if share_total > 0.0 {
                cfg.shares.share(entry_type) / share_total
            } else {
                0.25
            };
            let tokens = (effective_budget as f64 * fraction).floor() as usize;
            allocation.insert(entry_type, tokens);
            max_entries.insert(entry_type, (tokens / per_entry).max(1));
        }

        debug!(
            ?complexity,
            total_budget, effective_budget, "budget calculated"
        );
        Budget {
            total_budget,
            effective_budget,
            complexity,
            allocation,
            max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn debug_intent_is_capped_at_max() {
        let calc = BudgetCalculator::new(BudgetConfig {
            base_budget: 1000,
            max_budget: 3000,
            ..BudgetConfig::default()
        });
        let budget = calc.calculate(Some("debug"), None);
        assert_eq!(budget.complexity, Complexity::Complex);
        assert_eq!(budget.total_budget, 3000);
        assert!(budget.effective_budget <= budget.total_budget);
    }

    #[test]
    fn intent_tiers_scale_budget() {
        let calc = BudgetCalculator::default();
        assert_eq!(calc.calculate(Some("lookup"), None).total_budget, 2000);
        assert_eq!(calc.calculate(Some("review"), None).total_budget, 4000);
        assert_eq!(calc.calculate(None, None).complexity, Complexity::Simple);
    }

    #[test]
    fn explicit_tokens_override_intent() {
        let calc = BudgetCalculator::default();
        let budget = calc.calculate(Some("debug"), Some(700));
        assert_eq!(budget.total_budget, 700);
        assert_eq!(budget.effective_budget, 630);
    }

    #[test]
    fn disabled_ignores_intent() {
        let calc = BudgetCalculator::new(BudgetConfig {
            enabled: false,
            ..BudgetConfig::default()
        });
        let budget = calc.calculate(Some("debug"), None);
        assert_eq!(budget.complexity, Complexity::Simple);
        assert_eq!(budget.total_budget, 2000);
    }

    #[test]
    fn scale_applies_tier_multiplier_to_any_base() {
        let calc = BudgetCalculator::default();
        assert_eq!(calc.scale(Some("lookup"), 4000), 4000);
        assert_eq!(calc.scale(Some("debug"), 4000), 16_000);
        let off = BudgetCalculator::new(BudgetConfig {
            enabled: false,
            ..BudgetConfig::default()
        });
        assert_eq!(off.scale(Some("debug"), 4000), 4000);
    }

    #[test]
    fn allocation_covers_every_type() {
        let budget = BudgetCalculator::default().calculate(None, None);
        assert_eq!(budget.allocation.len(), 4);
        let allocated: usize = budget.allocation.values().sum();
        assert!(allocated <= budget.effective_budget);
        assert_eq!(budget.max_entries[&EntryType::Guideline], 12);
        assert!(budget.max_entries.values().all(|n| *n >= 1));
    }

    proptest! {
        #[test]
        fn effective_le_total_le_max(
            base in 0usize..20_000,
            max in 0usize..20_000,
            reserve in -1.0f64..2.0,
            override_tokens in proptest::option::of(0usize..50_000),
            intent in proptest::sample::select(vec!["lookup", "debug", "review", "other"]),
        ) {
            let calc = BudgetCalculator::new(BudgetConfig {
                base_budget: base,
                max_budget: max,
                reserve_ratio: reserve,
                ..BudgetConfig::default()
            });
            let budget = calc.calculate(Some(intent), override_tokens);
            prop_assert!(budget.effective_budget <= budget.total_budget);
            prop_assert!(budget.total_budget <= max);
        }
    }
}
