//! Per-identifier submission state machine.
//!
//! The interaction with the live form is stateful and racy: after clicking
//! submit, the previous identifier's table is still in the DOM until the page
//! re-renders. `SubmitWatch` resolves a submission against a `TableProbe`
//! without knowing anything about browsers, so the race-avoidance logic is
//! testable with a scripted fake probe.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::core::config::WaitBounds;
use crate::core::types::RawTable;

use super::spec::WaitStrategy;

/// Capability surface the machine polls: the current table snapshot and the
/// visibility of the "nothing found" notice. Production impl reads the live
/// DOM over CDP; tests inject scripted sequences.
#[async_trait]
pub trait TableProbe: Send + Sync {
    async fn snapshot(&self) -> Result<Option<RawTable>>;
    async fn notice_visible(&self) -> Result<bool>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitted,
    AwaitingChange,
    ResolvedSuccess,
    ResolvedEmpty,
    TimedOut,
}

/// Terminal result of one submission wait.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The page produced a table that is not the pre-submit one.
    Changed(RawTable),
    /// The "nothing found" notice became visible.
    Empty,
    /// Neither condition held within the bound. Definitive negative for this
    /// identifier; never retried.
    TimedOut,
}

/// One page's wait parameters: the spec's strategy plus the run's bounds.
#[derive(Clone, Copy, Debug)]
pub struct WaitPlan {
    pub strategy: WaitStrategy,
    pub submit_timeout: Duration,
    pub table_timeout: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl WaitPlan {
    pub fn new(strategy: WaitStrategy, bounds: &WaitBounds) -> Self {
        Self {
            strategy,
            submit_timeout: bounds.submit_timeout,
            table_timeout: bounds.table_timeout,
            poll_interval: bounds.poll_interval,
            settle_delay: bounds.settle_delay,
        }
    }
}

pub struct SubmitWatch {
    baseline: u64,
    plan: WaitPlan,
    state: SubmitState,
}

impl SubmitWatch {
    /// `baseline` is the content hash captured before the submission was
    /// dispatched.
    pub fn new(baseline: u64, plan: WaitPlan) -> Self {
        Self {
            baseline,
            plan,
            state: SubmitState::Idle,
        }
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Record that the submit control was clicked.
    pub fn submitted(&mut self) {
        self.state = SubmitState::Submitted;
    }

    /// Resolve the submission per the page's wait strategy.
    pub async fn resolve<P: TableProbe + ?Sized>(&mut self, probe: &P) -> Result<WaitOutcome> {
        self.state = SubmitState::AwaitingChange;
        match self.plan.strategy {
            WaitStrategy::HashCompare => self.resolve_hash_compare(probe).await,
            WaitStrategy::FixedDelay => self.resolve_fixed_delay(probe).await,
        }
    }

    async fn resolve_hash_compare<P: TableProbe + ?Sized>(
        &mut self,
        probe: &P,
    ) -> Result<WaitOutcome> {
        let deadline = Instant::now() + self.plan.submit_timeout;
        loop {
            if let Some(table) = probe.snapshot().await? {
                if table.content_hash() != self.baseline {
                    debug!("submit resolved: table content changed");
                    self.state = SubmitState::ResolvedSuccess;
                    return Ok(WaitOutcome::Changed(table));
                }
            }
            if probe.notice_visible().await? {
                debug!("submit resolved: not-found notice visible");
                self.state = SubmitState::ResolvedEmpty;
                return Ok(WaitOutcome::Empty);
            }
            if Instant::now() >= deadline {
                self.state = SubmitState::TimedOut;
                return Ok(WaitOutcome::TimedOut);
            }
            sleep(self.plan.poll_interval).await;
        }
    }

    async fn resolve_fixed_delay<P: TableProbe + ?Sized>(
        &mut self,
        probe: &P,
    ) -> Result<WaitOutcome> {
        sleep(self.plan.settle_delay).await;
        if probe.notice_visible().await? {
            self.state = SubmitState::ResolvedEmpty;
            return Ok(WaitOutcome::Empty);
        }
        // No hash comparison on this strategy; the row wait that follows is
        // the only gate.
        self.state = SubmitState::ResolvedSuccess;
        Ok(WaitOutcome::Changed(
            probe.snapshot().await?.unwrap_or_default(),
        ))
    }
}

/// Bounded wait for the table to exist and contain at least one row.
///
/// `None` after the bound means "no data" for the identifier, not an error;
/// the identifier contributes nothing to the output.
pub async fn await_rows<P: TableProbe + ?Sized>(
    plan: &WaitPlan,
    probe: &P,
) -> Result<Option<RawTable>> {
    let deadline = Instant::now() + plan.table_timeout;
    loop {
        if let Some(table) = probe.snapshot().await? {
            if table.row_count() > 0 {
                return Ok(Some(table));
            }
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(plan.poll_interval).await;
    }
}
