use std::time::{Duration, Instant};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepTiming {
    pub step: usize,
    pub duration: Duration,
}

/// Timing of a single run. Created fresh for every run and frozen into a [MetricsSummary] at the end.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    start: Option<Instant>,
    end: Option<Instant>,
    step_timings: Vec<StepTiming>,
}

impl PerformanceMetrics {
    pub fn start_execution(&mut self) {
        self.start = Some(Instant::now());
    }

    pub fn end_execution(&mut self) {
        self.end = Some(Instant::now());
    }

    pub fn record_step_timing(&mut self, step: usize, duration: Duration) {
        self.step_timings.push(StepTiming { step, duration });
    }

    pub fn total_time(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    pub fn average_step_time(&self) -> Duration {
        if self.step_timings.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.step_timings.iter().map(|t| t.duration).sum();
        total / self.step_timings.len() as u32
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_execution_time: self.total_time(),
            average_step_time: self.average_step_time(),
            total_steps: self.step_timings.len(),
            step_timings: self.step_timings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MetricsSummary {
    pub total_execution_time: Duration,
    pub average_step_time: Duration,
    pub total_steps: usize,
    pub step_timings: Vec<StepTiming>,
}
