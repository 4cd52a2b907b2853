//! State-machine tests for the submission protocol, driven by scripted fake
//! probes. No browser involved: the point is that the race-avoidance logic
//! (old-hash vs new-hash comparison) is independently testable.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use adilet_lookup::registry::spec::WaitStrategy;
use adilet_lookup::registry::submit::{
    await_rows, SubmitState, SubmitWatch, TableProbe, WaitOutcome, WaitPlan,
};
use adilet_lookup::types::RawTable;

/// Scripted sequence; the final value repeats once the script runs out.
struct Seq<T: Clone> {
    items: Vec<T>,
    cursor: Mutex<usize>,
}

impl<T: Clone> Seq<T> {
    fn new(items: Vec<T>) -> Self {
        assert!(!items.is_empty());
        Self {
            items,
            cursor: Mutex::new(0),
        }
    }

    fn next(&self) -> T {
        let mut cursor = self.cursor.lock().unwrap();
        let item = self.items[(*cursor).min(self.items.len() - 1)].clone();
        *cursor += 1;
        item
    }

    fn polls(&self) -> usize {
        *self.cursor.lock().unwrap()
    }
}

struct FakeProbe {
    snapshots: Seq<Option<RawTable>>,
    notices: Seq<bool>,
}

#[async_trait]
impl TableProbe for FakeProbe {
    async fn snapshot(&self) -> Result<Option<RawTable>> {
        Ok(self.snapshots.next())
    }

    async fn notice_visible(&self) -> Result<bool> {
        Ok(self.notices.next())
    }
}

fn plan(strategy: WaitStrategy) -> WaitPlan {
    WaitPlan {
        strategy,
        submit_timeout: Duration::from_millis(100),
        table_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(2),
        settle_delay: Duration::from_millis(5),
    }
}

fn table(rows: &[&[&str]]) -> RawTable {
    RawTable {
        headers: vec!["Категория".to_string(), "Орган".to_string()],
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

#[tokio::test]
async fn stale_table_is_never_read_as_the_new_result() {
    let stale = table(&[&["Штраф", "Суд №1"]]);
    let fresh = table(&[&["Алименты", "Суд №2"]]);
    let probe = FakeProbe {
        snapshots: Seq::new(vec![
            Some(stale.clone()),
            Some(stale.clone()),
            Some(fresh.clone()),
        ]),
        notices: Seq::new(vec![false]),
    };

    let mut watch = SubmitWatch::new(stale.content_hash(), plan(WaitStrategy::HashCompare));
    assert_eq!(watch.state(), SubmitState::Idle);
    watch.submitted();
    assert_eq!(watch.state(), SubmitState::Submitted);

    let outcome = watch.resolve(&probe).await.unwrap();
    match outcome {
        WaitOutcome::Changed(got) => assert_eq!(got, fresh),
        other => panic!("expected Changed, got {other:?}"),
    }
    assert_eq!(watch.state(), SubmitState::ResolvedSuccess);
    // The two stale snapshots were polled past, not returned.
    assert!(probe.snapshots.polls() >= 3);
}

#[tokio::test]
async fn not_found_notice_resolves_empty() {
    let stale = table(&[&["Штраф", "Суд №1"]]);
    let probe = FakeProbe {
        snapshots: Seq::new(vec![Some(stale.clone())]),
        notices: Seq::new(vec![false, false, true]),
    };

    let mut watch = SubmitWatch::new(stale.content_hash(), plan(WaitStrategy::HashCompare));
    watch.submitted();
    let outcome = watch.resolve(&probe).await.unwrap();
    assert!(matches!(outcome, WaitOutcome::Empty));
    assert_eq!(watch.state(), SubmitState::ResolvedEmpty);
}

#[tokio::test]
async fn unchanged_table_times_out() {
    let stale = table(&[&["Штраф", "Суд №1"]]);
    let probe = FakeProbe {
        snapshots: Seq::new(vec![Some(stale.clone())]),
        notices: Seq::new(vec![false]),
    };

    let mut watch = SubmitWatch::new(stale.content_hash(), plan(WaitStrategy::HashCompare));
    watch.submitted();
    let outcome = watch.resolve(&probe).await.unwrap();
    assert!(matches!(outcome, WaitOutcome::TimedOut));
    assert_eq!(watch.state(), SubmitState::TimedOut);
}

#[tokio::test]
async fn absent_table_with_notice_resolves_empty() {
    let probe = FakeProbe {
        snapshots: Seq::new(vec![None]),
        notices: Seq::new(vec![true]),
    };

    let mut watch = SubmitWatch::new(
        adilet_lookup::types::snapshot_hash(None),
        plan(WaitStrategy::HashCompare),
    );
    watch.submitted();
    let outcome = watch.resolve(&probe).await.unwrap();
    assert!(matches!(outcome, WaitOutcome::Empty));
}

#[tokio::test]
async fn fixed_delay_skips_hash_comparison() {
    // Snapshot identical to the baseline: HashCompare would wait it out, but
    // the fixed-delay page is exempt and takes the table as-is.
    let stale = table(&[&["Арест на транспорт", "Нет"]]);
    let probe = FakeProbe {
        snapshots: Seq::new(vec![Some(stale.clone())]),
        notices: Seq::new(vec![false]),
    };

    let mut watch = SubmitWatch::new(stale.content_hash(), plan(WaitStrategy::FixedDelay));
    watch.submitted();
    let outcome = watch.resolve(&probe).await.unwrap();
    match outcome {
        WaitOutcome::Changed(got) => assert_eq!(got, stale),
        other => panic!("expected Changed, got {other:?}"),
    }
    assert_eq!(watch.state(), SubmitState::ResolvedSuccess);
}

#[tokio::test]
async fn fixed_delay_still_sees_the_notice() {
    let probe = FakeProbe {
        snapshots: Seq::new(vec![None]),
        notices: Seq::new(vec![true]),
    };

    let mut watch = SubmitWatch::new(0, plan(WaitStrategy::FixedDelay));
    watch.submitted();
    let outcome = watch.resolve(&probe).await.unwrap();
    assert!(matches!(outcome, WaitOutcome::Empty));
    assert_eq!(watch.state(), SubmitState::ResolvedEmpty);
}

#[tokio::test]
async fn await_rows_holds_until_the_first_row_renders() {
    let empty = RawTable {
        headers: vec!["Категория".to_string(), "Орган".to_string()],
        rows: vec![],
    };
    let filled = table(&[&["Алименты", "Суд №2"]]);
    let probe = FakeProbe {
        snapshots: Seq::new(vec![None, Some(empty), Some(filled.clone())]),
        notices: Seq::new(vec![false]),
    };

    let got = await_rows(&plan(WaitStrategy::HashCompare), &probe)
        .await
        .unwrap();
    assert_eq!(got, Some(filled));
}

#[tokio::test]
async fn await_rows_reports_no_data_after_the_bound() {
    let empty = RawTable {
        headers: vec!["Категория".to_string()],
        rows: vec![],
    };
    let probe = FakeProbe {
        snapshots: Seq::new(vec![Some(empty)]),
        notices: Seq::new(vec![false]),
    };

    let got = await_rows(&plan(WaitStrategy::HashCompare), &probe)
        .await
        .unwrap();
    assert_eq!(got, None);
}
