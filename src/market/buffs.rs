use serde::{Deserialize, Serialize};

use super::config::MarketConfig;

/// Bidder's standing within one country, from the territory registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountryHoldings {
    /// Territories in the country owned by this bidder.
    pub owned: u32,
    /// All territories in the country.
    pub total: u32,
}

impl CountryHoldings {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.owned as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedBuff {
    Adjacency { owned_neighbors: u32, pct: f64 },
    CountryControl { pct: f64 },
    Seasonal { pct: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuffedAmount {
    /// Display/audit amount, never used for ranking.
    pub effective: i64,
    pub applied: Vec<AppliedBuff>,
}

/// Compute the buff-adjusted display amount for a raw bid.
///
/// The three bonuses apply multiplicatively in fixed order, each compounding
/// on the previous result. Within the adjacency rule the per-neighbor
/// percentages are additive: two owned neighbors at 5% give a single ×1.10
/// step, not two ×1.05 steps.
pub fn compute_effective_amount(
    raw: i64,
    owned_neighbors: u32,
    holdings: CountryHoldings,
    config: &MarketConfig,
) -> BuffedAmount {
    let mut amount = raw as f64;
    let mut applied = Vec::new();

    if owned_neighbors > 0 && config.adjacency_bonus_pct > 0.0 {
        let pct = config.adjacency_bonus_pct * owned_neighbors as f64;
        amount *= 1.0 + pct / 100.0;
        applied.push(AppliedBuff::Adjacency {
            owned_neighbors,
            pct,
        });
    }

    if holdings.fraction() >= config.country_control_threshold
        && config.country_control_bonus_pct > 0.0
        && holdings.owned > 0
    {
        amount *= 1.0 + config.country_control_bonus_pct / 100.0;
        applied.push(AppliedBuff::CountryControl {
            pct: config.country_control_bonus_pct,
        });
    }

    if config.seasonal_bonus_pct > 0.0 {
        amount *= 1.0 + config.seasonal_bonus_pct / 100.0;
        applied.push(AppliedBuff::Seasonal {
            pct: config.seasonal_bonus_pct,
        });
    }

    BuffedAmount {
        effective: amount.round() as i64,
        applied,
    }
}
