//! Per-resource failure isolation and run summaries.
//!
//! Every unit of remote work runs through [`isolate`], which turns an error
//! into a recorded [`Outcome::Failed`] so the surrounding loop keeps going.
//! Nothing is rolled back.

use std::collections::BTreeMap;
use std::future::Future;
use tracing::warn;

use crate::error::Result;
use crate::model::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Step of a resource's export or import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Read,
    Definition,
    Policy,
    Entity,
    Link,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Read => write!(f, "read"),
            Phase::Definition => write!(f, "definition"),
            Phase::Policy => write!(f, "policy"),
            Phase::Entity => write!(f, "entity"),
            Phase::Link => write!(f, "link"),
        }
    }
}

/// Run one unit of work; a failure is logged with its context and downgraded.
pub async fn isolate<Fut>(subject: &str, id: &str, phase: Phase, work: Fut) -> Outcome
where
    Fut: Future<Output = Result<Outcome>>,
{
    match work.await {
        Ok(outcome) => {
            if let Outcome::Skipped(reason) = &outcome {
                tracing::debug!(kind = subject, id, %phase, reason = %reason, "Skipped");
            }
            outcome
        }
        Err(e) => {
            warn!(kind = subject, id, %phase, error = %e, "Operation failed, continuing");
            Outcome::Failed(e.to_string())
        }
    }
}

/// Outcomes of every phase run for one resource.
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub key: SummaryKey,
    pub id: String,
    pub phases: Vec<(Phase, Outcome)>,
}

impl ResourceReport {
    pub fn new(key: SummaryKey, id: impl Into<String>) -> Self {
        Self {
            key,
            id: id.into(),
            phases: Vec::new(),
        }
    }

    pub fn push(&mut self, phase: Phase, outcome: Outcome) {
        self.phases.push((phase, outcome));
    }

    pub fn outcome_of(&self, phase: Phase) -> Option<&Outcome> {
        self.phases.iter().find(|(p, _)| *p == phase).map(|(_, o)| o)
    }

    /// Failed if any phase failed, applied if any phase applied, else skipped.
    pub fn overall(&self) -> Outcome {
        if let Some((phase, Outcome::Failed(reason))) =
            self.phases.iter().find(|(_, o)| o.is_failed())
        {
            return Outcome::Failed(format!("{}: {}", phase, reason));
        }
        if self.phases.iter().any(|(_, o)| *o == Outcome::Applied) {
            return Outcome::Applied;
        }
        match self.phases.first() {
            Some((_, Outcome::Skipped(reason))) => Outcome::Skipped(reason.clone()),
            _ => Outcome::skipped("nothing to do"),
        }
    }
}

/// Row of the run summary: a resource kind, or the link pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SummaryKey {
    Kind(ResourceKind),
    Links,
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryKey::Kind(kind) => write!(f, "{}", kind),
            SummaryKey::Links => write!(f, "link"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub attempted: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub key: SummaryKey,
    pub id: String,
    pub phase: Phase,
    pub reason: String,
}

/// Counts per kind plus every individual failure.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    counts: BTreeMap<SummaryKey, Counts>,
    failures: Vec<FailureRecord>,
    warnings: Vec<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &ResourceReport) {
        let counts = self.counts.entry(report.key).or_default();
        counts.attempted += 1;
        match report.overall() {
            Outcome::Applied => counts.applied += 1,
            Outcome::Skipped(_) => counts.skipped += 1,
            Outcome::Failed(_) => counts.failed += 1,
        }
        for (phase, outcome) in &report.phases {
            if let Outcome::Failed(reason) = outcome {
                self.failures.push(FailureRecord {
                    key: report.key,
                    id: report.id.clone(),
                    phase: *phase,
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Record a problem that is not tied to a single resource (e.g. a list
    /// that stopped early or a malformed mapping row).
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn counts(&self, key: SummaryKey) -> Counts {
        self.counts.get(&key).copied().unwrap_or_default()
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn total(&self) -> Counts {
        self.counts.values().fold(Counts::default(), |acc, c| Counts {
            attempted: acc.attempted + c.attempted,
            applied: acc.applied + c.applied,
            skipped: acc.skipped + c.skipped,
            failed: acc.failed + c.failed,
        })
    }

    /// Completed, but not cleanly.
    pub fn has_warnings(&self) -> bool {
        !self.failures.is_empty() || !self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: RunSummary) {
        for (key, c) in other.counts {
            let counts = self.counts.entry(key).or_default();
            counts.attempted += c.attempted;
            counts.applied += c.applied;
            counts.skipped += c.skipped;
            counts.failed += c.failed;
        }
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<14} {:>9} {:>8} {:>8} {:>7}",
            "kind", "attempted", "applied", "skipped", "failed"
        )?;
        for (key, c) in &self.counts {
            writeln!(
                f,
                "{:<14} {:>9} {:>8} {:>8} {:>7}",
                key.to_string(),
                c.attempted,
                c.applied,
                c.skipped,
                c.failed
            )?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  failed {} '{}' ({}): {}",
                failure.key, failure.id, failure.phase, failure.reason
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        Ok(())
    }
}
