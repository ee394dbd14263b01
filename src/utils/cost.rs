//! Cost tracking for model usage.
//!
//! A [CostTracker] is shared by reference between generators and is safe to update from the parallel executor's
//! worker threads.

use std::collections::BTreeSet;
use chrono::{DateTime, Local};
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;

/// Price in USD per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

pub const DEFAULT_PRICED_MODEL: &str = "gpt-4o-mini";

/// Known pricing, looked up by exact model name.
pub const MODEL_PRICING: [(&str, ModelPricing); 3] = [
    ("gpt-4o-mini", ModelPricing { input: 0.15, output: 0.60 }),
    ("gpt-3.5-turbo", ModelPricing { input: 0.5, output: 1.5 }),
    ("gpt-4", ModelPricing { input: 30.0, output: 60.0 }),
];

pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    MODEL_PRICING.iter()
        .find(|(name, _)| *name == model)
        .map(|(_, pricing)| *pricing)
}

/// One priced request.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Local>,
    pub technique: String,
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub total_requests: usize,
    pub total_cost: f64,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_tokens: usize,
    pub techniques_used: Vec<String>,
}

#[derive(Debug)]
pub struct CostTracker {
    session_name: String,
    records: Mutex<Vec<UsageRecord>>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(format!("session_{}", Local::now().timestamp()))
    }
}

impl CostTracker {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Price a request and record it. Returns the cost of this request.
    ///
    /// Unknown models are priced as [DEFAULT_PRICED_MODEL].
    pub fn track_usage(&self, technique: &str, model: &str, input_tokens: usize, output_tokens: usize) -> f64 {
        let (model, pricing) = match pricing_for(model) {
            Some(pricing) => (model, pricing),
            None => {
                warn!("Unknown model {}, using {} pricing", model, DEFAULT_PRICED_MODEL);
                (DEFAULT_PRICED_MODEL, MODEL_PRICING[0].1)
            }
        };
        let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input;
        let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output;
        let total_cost = input_cost + output_cost;

        let mut records = self.records.lock();
        records.push(UsageRecord {
            timestamp: Local::now(),
            technique: technique.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            input_cost,
            output_cost,
            total_cost,
        });
        let session_cost: f64 = records.iter().map(|r| r.total_cost).sum();
        info!("{}: {} in + {} out tokens, ${:.4} (${:.4} total)", technique, input_tokens, output_tokens, total_cost, session_cost);
        total_cost
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.records.lock().iter().map(|r| r.total_cost).sum()
    }

    pub fn summary(&self) -> SessionSummary {
        let records = self.records.lock();
        let total_input_tokens: usize = records.iter().map(|r| r.input_tokens).sum();
        let total_output_tokens: usize = records.iter().map(|r| r.output_tokens).sum();
        let techniques_used: BTreeSet<&str> = records.iter().map(|r| r.technique.as_str()).collect();
        SessionSummary {
            session: self.session_name.clone(),
            total_requests: records.len(),
            total_cost: records.iter().map(|r| r.total_cost).sum(),
            total_input_tokens,
            total_output_tokens,
            total_tokens: total_input_tokens + total_output_tokens,
            techniques_used: techniques_used.into_iter().map(str::to_string).collect(),
        }
    }

    /// Usage records as a pretty-printed JSON array.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.records.lock())
    }
}

#[cfg(test)]
mod test_cost {
    use super::{CostTracker, DEFAULT_PRICED_MODEL};

    #[test]
    fn test_track_known_model() {
        let tracker = CostTracker::new("test");
        let cost = tracker.track_usage("zero_shot", "gpt-4", 1_000_000, 500_000);
        assert!((cost - 60.0).abs() < 1e-9);
        assert!((tracker.total_cost() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_default_pricing() {
        let tracker = CostTracker::new("test");
        let cost = tracker.track_usage("few_shot", "mystery-model", 1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
        assert_eq!(tracker.records()[0].model, DEFAULT_PRICED_MODEL);
    }

    #[test]
    fn test_summary() {
        let tracker = CostTracker::new("batch");
        let empty = tracker.summary();
        assert_eq!(empty.total_requests, 0);
        assert_eq!(empty.total_tokens, 0);

        tracker.track_usage("b", "gpt-4o-mini", 10, 20);
        tracker.track_usage("a", "gpt-4o-mini", 5, 5);
        tracker.track_usage("b", "gpt-4o-mini", 1, 1);
        let summary = tracker.summary();
        assert_eq!(summary.session, "batch");
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.total_input_tokens, 16);
        assert_eq!(summary.total_output_tokens, 26);
        assert_eq!(summary.total_tokens, 42);
        assert_eq!(summary.techniques_used, vec!["a".to_string(), "b".to_string()]);

        let json = tracker.export_json().unwrap();
        assert!(json.contains("\"technique\": \"a\""));
    }
}
