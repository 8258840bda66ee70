//! crates/script_engine_core/src/cost.rs
//!
//! Estimated external-service cost of the work recorded in [`UsageStats`].

use serde::{Deserialize, Serialize};

use crate::domain::UsageStats;

const ONE_MILLION: f64 = 1_000_000.0;

/// Per-unit prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub input_per_million_tokens: f64,
    pub output_per_million_tokens: f64,
    pub per_image: f64,
    pub per_video: f64,
    pub audio_per_million_chars: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            input_per_million_tokens: 0.075,
            output_per_million_tokens: 0.30,
            per_image: 0.03,
            per_video: 0.50,
            audio_per_million_chars: 2.0,
        }
    }
}

/// Estimated cost of `usage` at `rates`. Display only.
pub fn estimate_cost(usage: &UsageStats, rates: &RateTable) -> f64 {
    let input = usage.input_tokens as f64 / ONE_MILLION * rates.input_per_million_tokens;
    let output = usage.output_tokens as f64 / ONE_MILLION * rates.output_per_million_tokens;
    let images = usage.images_generated as f64 * rates.per_image;
    let videos = usage.videos_generated as f64 * rates.per_video;
    let audio = usage.audio_chars_generated as f64 / ONE_MILLION * rates.audio_per_million_chars;
    input + output + images + videos + audio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_usage_costs_nothing() {
        assert_eq!(estimate_cost(&UsageStats::default(), &RateTable::default()), 0.0);
    }

    #[test]
    fn combines_every_counter() {
        let usage = UsageStats {
            input_tokens: 2_000_000,
            output_tokens: 1_000_000,
            images_generated: 2,
            audio_chars_generated: 500_000,
            videos_generated: 1,
        };
        // 0.15 + 0.30 + 0.06 + 0.50 + 1.0
        let cost = estimate_cost(&usage, &RateTable::default());
        assert!((cost - 2.01).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn raising_any_single_counter_never_lowers_the_cost() {
        let rates = RateTable::default();
        let base = UsageStats {
            input_tokens: 10,
            output_tokens: 20,
            images_generated: 3,
            audio_chars_generated: 40,
            videos_generated: 5,
        };
        let bumps: [fn(&mut UsageStats); 5] = [
            |u| u.input_tokens += 1_000,
            |u| u.output_tokens += 1_000,
            |u| u.images_generated += 1,
            |u| u.audio_chars_generated += 1_000,
            |u| u.videos_generated += 1,
        ];
        let before = estimate_cost(&base, &rates);
        for bump in bumps {
            let mut usage = base;
            bump(&mut usage);
            assert!(estimate_cost(&usage, &rates) >= before);
        }
    }
}
