//! Per-model token pricing
//!
//! Pure lookup from a model identifier to per-million-token rates. Used to
//! derive a record's cost when the log line does not carry one.
//!
//! - **Input tokens**: Regular input tokens (not cached)
//! - **Output tokens**: Generated tokens
//! - **Cache write tokens**: 125% of input price
//! - **Cache read tokens**: 10% of input price
//!
//! # Examples
//!
//! ```
//! use ccmeter_core::pricing::calculate_cost;
//! use ccmeter_types::TokenCounts;
//!
//! // Sonnet: 1M input + 1M output
//! let tokens = TokenCounts::new(1_000_000, 1_000_000, 0, 0);
//! let cost = calculate_cost("claude-sonnet-4-5-20250929", &tokens);
//! assert_eq!(cost, 18.0);
//! ```

use ccmeter_types::TokenCounts;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Pricing structure for a model
///
/// All prices are per million tokens (M). Cache multipliers are applied to input price.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    /// Price per million input tokens ($/M)
    pub input_price_per_million: f64,
    /// Price per million output tokens ($/M)
    pub output_price_per_million: f64,
    /// Cache read multiplier (0.1 = 10% of input price)
    pub cache_read_multiplier: f64,
    /// Cache write multiplier (1.25 = 125% of input price)
    pub cache_write_multiplier: f64,
}

impl ModelPricing {
    const fn standard(input: f64, output: f64) -> Self {
        Self {
            input_price_per_million: input,
            output_price_per_million: output,
            cache_read_multiplier: 0.1,
            cache_write_multiplier: 1.25,
        }
    }

    /// Weighted average for unrecognized models
    ///
    /// - Input: (0.7 × $3) + (0.2 × $5) + (0.1 × $1) = $3.2
    /// - Output: (0.7 × $15) + (0.2 × $25) + (0.1 × $5) = $16.0
    pub const fn default_average() -> Self {
        Self::standard(3.2, 16.0)
    }

    /// Synthetic entries written by the assistant itself cost nothing
    pub const fn free() -> Self {
        Self::standard(0.0, 0.0)
    }

    pub fn cache_write_price_per_million(&self) -> f64 {
        self.input_price_per_million * self.cache_write_multiplier
    }

    pub fn cache_read_price_per_million(&self) -> f64 {
        self.input_price_per_million * self.cache_read_multiplier
    }
}

const OPUS_CURRENT: ModelPricing = ModelPricing::standard(5.0, 25.0);
const OPUS_LEGACY: ModelPricing = ModelPricing::standard(15.0, 75.0);
const SONNET: ModelPricing = ModelPricing::standard(3.0, 15.0);
const HAIKU_CURRENT: ModelPricing = ModelPricing::standard(1.0, 5.0);
const HAIKU_LEGACY: ModelPricing = ModelPricing::standard(0.8, 4.0);

/// Exact model ids and common aliases
static PRICING_TABLE: Lazy<HashMap<&'static str, ModelPricing>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("claude-opus-4-5-20251101", OPUS_CURRENT);
    m.insert("claude-opus-4-6-20250212", OPUS_CURRENT);
    m.insert("opus-4", OPUS_CURRENT);
    m.insert("claude-opus-4", OPUS_CURRENT);

    m.insert("claude-opus-4-0-20250514", OPUS_LEGACY);
    m.insert("claude-opus-4-1-20250805", OPUS_LEGACY);
    m.insert("claude-3-opus-20240229", OPUS_LEGACY);

    m.insert("claude-sonnet-4-5-20250929", SONNET);
    m.insert("claude-sonnet-4-20250514", SONNET);
    m.insert("claude-3-7-sonnet-20250219", SONNET);
    m.insert("claude-3-5-sonnet-20241022", SONNET);
    m.insert("sonnet-4", SONNET);
    m.insert("claude-sonnet-4", SONNET);

    m.insert("claude-haiku-4-5-20251001", HAIKU_CURRENT);
    m.insert("haiku-4", HAIKU_CURRENT);
    m.insert("claude-haiku-4", HAIKU_CURRENT);
    m.insert("claude-3-5-haiku-20241022", HAIKU_LEGACY);

    m.insert("<synthetic>", ModelPricing::free());

    m
});

/// Get pricing for a model
///
/// Resolution order: exact id, then model family, then the weighted default.
///
/// ```
/// use ccmeter_core::pricing::get_model_pricing;
///
/// assert_eq!(get_model_pricing("opus-4").input_price_per_million, 5.0);
/// assert_eq!(get_model_pricing("claude-sonnet-9-99990101").input_price_per_million, 3.0);
/// assert_eq!(get_model_pricing("unknown-model").input_price_per_million, 3.2);
/// ```
pub fn get_model_pricing(model: &str) -> ModelPricing {
    if let Some(pricing) = PRICING_TABLE.get(model) {
        return pricing.clone();
    }
    family_pricing(&model.to_lowercase()).unwrap_or_else(ModelPricing::default_average)
}

fn family_pricing(model: &str) -> Option<ModelPricing> {
    if model.contains("opus") {
        if model.contains("opus-4-5") || model.contains("opus-4-6") {
            Some(OPUS_CURRENT)
        } else {
            Some(OPUS_LEGACY)
        }
    } else if model.contains("sonnet") {
        Some(SONNET)
    } else if model.contains("haiku") {
        if model.contains("3-5-haiku") || model.contains("3-haiku") {
            Some(HAIKU_LEGACY)
        } else {
            Some(HAIKU_CURRENT)
        }
    } else {
        None
    }
}

/// Calculate the USD cost of `tokens` on `model`
///
/// ```text
/// Input cost = (input / 1M) × input_price
/// Output cost = (output / 1M) × output_price
/// Cache write cost = (cache_write / 1M) × input_price × 1.25
/// Cache read cost = (cache_read / 1M) × input_price × 0.1
/// ```
pub fn calculate_cost(model: &str, tokens: &TokenCounts) -> f64 {
    let pricing = get_model_pricing(model);

    let per_million = |count: u64, price: f64| (count as f64 / 1_000_000.0) * price;

    per_million(tokens.input, pricing.input_price_per_million)
        + per_million(tokens.output, pricing.output_price_per_million)
        + per_million(tokens.cache_write, pricing.cache_write_price_per_million())
        + per_million(tokens.cache_read, pricing.cache_read_price_per_million())
}
