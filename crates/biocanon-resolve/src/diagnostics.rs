//! Per-record outcomes and run accounting.
//!
//! The core never prints. Every record's outcome goes to a
//! [`DiagnosticsSink`]; [`TracingDiagnostics`] (the default) turns them into
//! `tracing` events. Counts are accumulated lock-free in [`OutcomeCounters`]
//! and frozen into a serializable [`RunReport`] at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RecordError, SkipReason};
use crate::model::SourceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    PartialPropertyLoss,
    Skipped(SkipReason),
}

impl Outcome {
    pub fn name(self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::PartialPropertyLoss => "partial-property-loss",
            Outcome::Skipped(reason) => reason.outcome_name(),
        }
    }

    pub fn is_emitted(self) -> bool {
        !matches!(self, Outcome::Skipped(_))
    }
}

/// One record's outcome as handed to diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RecordOutcome<'a> {
    /// Position in the input stream.
    pub index: usize,
    pub record: &'a SourceRecord,
    pub outcome: Outcome,
    pub type_name: Option<&'a str>,
    pub error: Option<&'a RecordError>,
    /// Properties dropped by failed coercion.
    pub dropped_properties: &'a [String],
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, event: &RecordOutcome<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, event: &RecordOutcome<'_>) {
        let label = event.record.label.as_str();
        let source = event.record.source.as_deref().unwrap_or("-");
        match (event.outcome, event.error) {
            (Outcome::Accepted, _) => debug!(
                index = event.index,
                label,
                source,
                type_name = event.type_name.unwrap_or("-"),
                "record accepted"
            ),
            (Outcome::PartialPropertyLoss, _) => warn!(
                index = event.index,
                label,
                source,
                type_name = event.type_name.unwrap_or("-"),
                dropped = ?event.dropped_properties,
                "record accepted with dropped properties"
            ),
            // Unmapped labels are expected from broad adapters.
            (Outcome::Skipped(SkipReason::Unmapped), _) => debug!(
                index = event.index,
                label,
                source,
                outcome = event.outcome.name(),
                "record dropped"
            ),
            (Outcome::Skipped(_), error) => warn!(
                index = event.index,
                label,
                source,
                outcome = event.outcome.name(),
                error = %error.map(ToString::to_string).unwrap_or_default(),
                "record rejected"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
    fn report(&self, _event: &RecordOutcome<'_>) {}
}

/// Keeps `(index, outcome)` pairs; handy for tests and report tooling.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<(usize, Outcome)>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes in input order (parallel runs report out of order).
    pub fn outcomes(&self) -> Vec<(usize, Outcome)> {
        let mut events = self.events.lock().clone();
        events.sort_by_key(|(index, _)| *index);
        events
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report(&self, event: &RecordOutcome<'_>) {
        self.events.lock().push((event.index, event.outcome));
    }
}

// ============================================================================
// Counters and report
// ============================================================================

#[derive(Debug, Default)]
pub struct OutcomeCounters {
    records: AtomicU64,
    accepted: AtomicU64,
    partial_property_loss: AtomicU64,
    skipped: [AtomicU64; 5],
    nodes_emitted: AtomicU64,
    edges_emitted: AtomicU64,
    duplicates_suppressed: AtomicU64,
    unknown_fields_dropped: AtomicU64,
    properties_dropped: AtomicU64,
}

fn skip_slot(reason: SkipReason) -> usize {
    match reason {
        SkipReason::Unmapped => 0,
        SkipReason::Unidentifiable => 1,
        SkipReason::EndpointMismatch => 2,
        SkipReason::MissingEndpoints => 3,
        SkipReason::MissingRequiredProperty => 4,
    }
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        self.records.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Accepted => self.accepted.fetch_add(1, Ordering::Relaxed),
            Outcome::PartialPropertyLoss => self.partial_property_loss.fetch_add(1, Ordering::Relaxed),
            Outcome::Skipped(reason) => self.skipped[skip_slot(reason)].fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn add_node(&self) {
        self.nodes_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_edge(&self) {
        self.edges_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_unknown_fields(&self, n: usize) {
        self.unknown_fields_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_dropped_properties(&self, n: usize) {
        self.properties_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunReport {
        let skipped = |reason| self.skipped[skip_slot(reason)].load(Ordering::Relaxed);
        RunReport {
            records: self.records.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            partial_property_loss: self.partial_property_loss.load(Ordering::Relaxed),
            dropped_unmapped: skipped(SkipReason::Unmapped),
            rejected_unidentifiable: skipped(SkipReason::Unidentifiable),
            rejected_endpoint_mismatch: skipped(SkipReason::EndpointMismatch),
            rejected_missing_endpoints: skipped(SkipReason::MissingEndpoints),
            rejected_missing_required_property: skipped(SkipReason::MissingRequiredProperty),
            nodes_emitted: self.nodes_emitted.load(Ordering::Relaxed),
            edges_emitted: self.edges_emitted.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            unknown_fields_dropped: self.unknown_fields_dropped.load(Ordering::Relaxed),
            properties_dropped: self.properties_dropped.load(Ordering::Relaxed),
            malformed_input: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub records: u64,
    pub accepted: u64,
    pub partial_property_loss: u64,
    pub dropped_unmapped: u64,
    pub rejected_unidentifiable: u64,
    pub rejected_endpoint_mismatch: u64,
    pub rejected_missing_endpoints: u64,
    pub rejected_missing_required_property: u64,
    pub nodes_emitted: u64,
    pub edges_emitted: u64,
    pub duplicates_suppressed: u64,
    pub unknown_fields_dropped: u64,
    pub properties_dropped: u64,
    /// Input lines that did not parse as records (set by the caller).
    #[serde(default)]
    pub malformed_input: u64,
}

impl RunReport {
    pub fn skipped(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::Unmapped => self.dropped_unmapped,
            SkipReason::Unidentifiable => self.rejected_unidentifiable,
            SkipReason::EndpointMismatch => self.rejected_endpoint_mismatch,
            SkipReason::MissingEndpoints => self.rejected_missing_endpoints,
            SkipReason::MissingRequiredProperty => self.rejected_missing_required_property,
        }
    }

    pub fn total_skipped(&self) -> u64 {
        SkipReason::ALL.iter().map(|&r| self.skipped(r)).sum()
    }

    pub fn emitted_records(&self) -> u64 {
        self.accepted + self.partial_property_loss
    }
}
