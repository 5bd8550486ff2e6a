//! Token and cost accounting for embedding calls.

use std::collections::BTreeMap;

use goalmap_core::price_per_million;
use parking_lot::Mutex;
use serde::Serialize;

/// Tokens and dollars for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Usage {
    pub tokens: usize,
    pub cost_usd: f64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.tokens += other.tokens;
        self.cost_usd += other.cost_usd;
    }
}

/// Prices calls for one model and keeps a running total for the run.
pub struct UsageMeter {
    model: String,
    usd_per_million: f64,
    total: Mutex<Usage>,
}

impl UsageMeter {
    pub fn new(model: &str, pricing: &BTreeMap<String, f64>) -> Self {
        Self {
            model: model.to_string(),
            usd_per_million: price_per_million(pricing, model),
            total: Mutex::new(Usage::default()),
        }
    }

    /// A meter that charges nothing (lexical strategy, fakes).
    pub fn free() -> Self {
        Self {
            model: String::new(),
            usd_per_million: 0.0,
            total: Mutex::new(Usage::default()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Price `tokens` without recording them.
    pub fn price(&self, tokens: usize) -> f64 {
        tokens as f64 / 1_000_000.0 * self.usd_per_million
    }

    /// Price `tokens`, add them to the running total, and return the call's usage.
    pub fn record(&self, tokens: usize) -> Usage {
        let usage = Usage {
            tokens,
            cost_usd: self.price(tokens),
        };
        self.total.lock().add(usage);
        usage
    }

    pub fn total(&self) -> Usage {
        *self.total.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> BTreeMap<String, f64> {
        let mut p = BTreeMap::new();
        p.insert("text-embedding-3-large".to_string(), 0.13);
        p
    }

    #[test]
    fn test_record_accumulates() {
        let meter = UsageMeter::new("text-embedding-3-large", &pricing());
        let a = meter.record(1_000_000);
        assert!((a.cost_usd - 0.13).abs() < 1e-12);
        meter.record(500_000);
        let total = meter.total();
        assert_eq!(total.tokens, 1_500_000);
        assert!((total.cost_usd - 0.195).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_priced_by_class() {
        let meter = UsageMeter::new("text-embedding-3-small", &BTreeMap::new());
        assert!((meter.price(1_000_000) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_free_meter() {
        let meter = UsageMeter::free();
        assert_eq!(meter.record(10_000).cost_usd, 0.0);
        assert_eq!(meter.total().tokens, 10_000);
    }
}
