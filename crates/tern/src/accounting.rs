//! Usage normalization and request cost estimation. Every completion
//! attempt gets an entry, including retries that never produce a usable
//! message.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::providers::base::{ModelTier, ProviderKind, Usage};

/// Cache writes bill at a premium over plain input tokens
pub const CACHE_CREATE_MULTIPLIER: f64 = 1.25;
/// Cache reads bill at a fraction of plain input tokens
pub const CACHE_READ_MULTIPLIER: f64 = 0.2;
/// Input-side discount applied on the cheap tier
pub const CHEAP_TIER_DISCOUNT: f64 = 0.1;

/// Dollar rates per token for one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub input: f64,
    pub output: f64,
}

impl Rates {
    pub fn for_provider(kind: ProviderKind) -> Rates {
        match kind {
            ProviderKind::OpenAi => Rates {
                input: 2e-6,
                output: 8e-6,
            },
            ProviderKind::OpenAiResponses => Rates {
                input: 1.25e-6,
                output: 10e-6,
            },
            ProviderKind::Anthropic => Rates {
                input: 3e-6,
                output: 15e-6,
            },
            ProviderKind::Google => Rates {
                input: 1.25e-6,
                output: 10e-6,
            },
            ProviderKind::Databricks => Rates {
                input: 3e-6,
                output: 15e-6,
            },
        }
    }
}

/// Rate table with per-provider overrides on top of the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Pricing {
    overrides: HashMap<ProviderKind, Rates>,
}

impl Pricing {
    pub fn with_rates(mut self, kind: ProviderKind, rates: Rates) -> Self {
        self.overrides.insert(kind, rates);
        self
    }

    pub fn rates(&self, kind: ProviderKind) -> Rates {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Rates::for_provider(kind))
    }
}

/// Bring a provider's usage report to the common shape where
/// `input_tokens` excludes cache reads. One backend already reports the
/// two separately; the rest fold cache reads into the input count.
pub fn normalize_usage(kind: ProviderKind, usage: &Usage) -> Usage {
    if kind == ProviderKind::Anthropic {
        return usage.clone();
    }
    let mut normalized = usage.clone();
    if let (Some(input), Some(cached)) = (usage.input_tokens, usage.cache_read_tokens) {
        normalized.input_tokens = Some((input - cached).max(0));
    }
    normalized
}

/// Estimated dollar cost of one completion from normalized usage.
pub fn estimate_cost(usage: &Usage, rates: &Rates, cheap_tier: bool) -> f64 {
    let input = usage.input_tokens.unwrap_or(0).max(0) as f64;
    let cache_create = usage.cache_creation_tokens.unwrap_or(0).max(0) as f64;
    let cache_read = usage.cache_read_tokens.unwrap_or(0).max(0) as f64;
    let output = usage.output_tokens.unwrap_or(0).max(0) as f64;

    let discount = if cheap_tier { CHEAP_TIER_DISCOUNT } else { 1.0 };
    let input_cost = (input * rates.input
        + cache_create * rates.input * CACHE_CREATE_MULTIPLIER
        + cache_read * rates.input * CACHE_READ_MULTIPLIER)
        * discount;

    input_cost + output * rates.output
}

/// One recorded completion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CostEntry {
    pub provider: ProviderKind,
    pub tier: ModelTier,
    pub usage: Usage,
    pub cost: f64,
}

/// Receives one entry per completion attempt.
pub trait CostSink: Send + Sync {
    fn record(&self, entry: &CostEntry);
}

/// A sink for callers that do not track spend.
#[derive(Debug, Default)]
pub struct NoopSink;

impl CostSink for NoopSink {
    fn record(&self, _entry: &CostEntry) {}
}

/// Running totals across recorded attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub requests: u64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
    pub cost: f64,
}

/// In-memory sink summing usage and cost across attempts.
#[derive(Debug, Default)]
pub struct CostLedger {
    totals: Mutex<CostTotals>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> CostTotals {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CostSink for CostLedger {
    fn record(&self, entry: &CostEntry) {
        let mut totals = self
            .totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        totals.requests += 1;
        totals.input_tokens += i64::from(entry.usage.input_tokens.unwrap_or(0));
        totals.output_tokens += i64::from(entry.usage.output_tokens.unwrap_or(0));
        totals.cache_creation_tokens += i64::from(entry.usage.cache_creation_tokens.unwrap_or(0));
        totals.cache_read_tokens += i64::from(entry.usage.cache_read_tokens.unwrap_or(0));
        totals.cost += entry.cost;
    }
}
