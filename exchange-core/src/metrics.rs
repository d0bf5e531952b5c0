//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the exchange.
//!
//! # Metrics
//!
//! - `exchange_commits_total` - Batches committed by the writer
//! - `exchange_commit_conflicts_total` - Batches rejected on a version conflict
//! - `exchange_commit_duration_seconds` - Histogram of apply latencies
//! - `exchange_enrollments_total` - Successful enrollments
//! - `exchange_completions_total` - Successful completions
//! - `exchange_mentor_rewards_credits_total` - Credits paid to mentors
//! - `exchange_admin_overrides_total` - Admin overrides by action
//! - `exchange_registrations_total` - Accounts created

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Batches committed
    pub commits_total: IntCounter,

    /// Batches rejected on version conflict
    pub conflicts_total: IntCounter,

    /// Apply latency histogram
    pub commit_duration: Histogram,

    /// Enrollments
    pub enrollments_total: IntCounter,

    /// Completions
    pub completions_total: IntCounter,

    /// Credits paid to mentors
    pub mentor_rewards_total: IntCounter,

    /// Admin overrides, labelled by audit action
    pub overrides_total: IntCounterVec,

    /// Accounts created
    pub registrations_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let commits_total =
            IntCounter::new("exchange_commits_total", "Batches committed by the writer")?;
        registry.register(Box::new(commits_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "exchange_commit_conflicts_total",
            "Batches rejected on a version conflict",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new("exchange_commit_duration_seconds", "Histogram of apply latencies")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let enrollments_total =
            IntCounter::new("exchange_enrollments_total", "Successful enrollments")?;
        registry.register(Box::new(enrollments_total.clone()))?;

        let completions_total =
            IntCounter::new("exchange_completions_total", "Successful completions")?;
        registry.register(Box::new(completions_total.clone()))?;

        let mentor_rewards_total = IntCounter::new(
            "exchange_mentor_rewards_credits_total",
            "Credits paid to mentors",
        )?;
        registry.register(Box::new(mentor_rewards_total.clone()))?;

        let overrides_total = IntCounterVec::new(
            Opts::new("exchange_admin_overrides_total", "Admin overrides by action"),
            &["action"],
        )?;
        registry.register(Box::new(overrides_total.clone()))?;

        let registrations_total =
            IntCounter::new("exchange_registrations_total", "Accounts created")?;
        registry.register(Box::new(registrations_total.clone()))?;

        Ok(Self {
            commits_total,
            conflicts_total,
            commit_duration,
            enrollments_total,
            completions_total,
            mentor_rewards_total,
            overrides_total,
            registrations_total,
            registry,
        })
    }

    /// Record an enrollment
    pub fn record_enrollment(&self) {
        self.enrollments_total.inc();
    }

    /// Record a completion and the mentor reward it paid
    pub fn record_completion(&self, reward: i64) {
        self.completions_total.inc();
        self.mentor_rewards_total.inc_by(reward.max(0) as u64);
    }

    /// Record an admin override
    pub fn record_override(&self, action: &str) {
        self.overrides_total.with_label_values(&[action]).inc();
    }

    /// Record a new account
    pub fn record_registration(&self) {
        self.registrations_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
