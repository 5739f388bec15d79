//! Sequencer / Result Aggregator.
//!
//! Records are processed strictly one at a time, in catalog order. After every
//! record, whatever its outcome, the sequencer asks its [`Pacer`] for a fixed
//! pause; that pause is the whole rate-limit contract with the metadata API.
//! A stop flag is checked between records only, so a record that has started
//! always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lineup_core::Catalog;

use crate::engine::Reconcile;
use crate::report::{GroupReport, RecordReport, RunReport};

/// Pause between records.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Pacing policy applied after each record.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

pub struct Sequencer<P: Pacer> {
    pacer: P,
    delay: Duration,
    stop: Option<Arc<AtomicBool>>,
}

impl<P: Pacer> Sequencer<P> {
    pub fn new(pacer: P, delay: Duration) -> Self {
        Self {
            pacer,
            delay,
            stop: None,
        }
    }

    /// Stop before the next record once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Drive every record of `catalog` through `engine` and fold the results.
    ///
    /// Never aborts early on a failed record.
    pub fn run<R: Reconcile + ?Sized>(&mut self, catalog: &Catalog, engine: &R) -> RunReport {
        let mut report = RunReport::default();

        for group in &catalog.groups {
            let mut group_report = GroupReport::new(&group.category, &group.group);
            tracing::info!(group = %group.label(), records = group.records.len(), "syncing group");

            for record in &group.records {
                if self.stop_requested() {
                    tracing::warn!(group = %group.label(), "stop requested, ending run between records");
                    report.interrupted = true;
                    report.push(group_report);
                    return report;
                }

                let outcome = engine.reconcile(record);
                tracing::debug!(
                    record = %record.display_name,
                    outcome = outcome.label(),
                    "record finished"
                );
                group_report.push(RecordReport {
                    display_name: record.display_name.clone(),
                    external_id: record.external_id.clone(),
                    outcome,
                });
                self.pacer.pause(self.delay);
            }

            let s = group_report.summary;
            tracing::info!(
                group = %group.label(),
                created = s.created,
                updated = s.updated,
                unchanged = s.unchanged,
                skipped = s.skipped,
                failed = s.failed,
                "group finished"
            );
            report.push(group_report);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use lineup_core::{CanonicalRecord, CatalogGroup, EntityId};

    use super::*;
    use crate::engine::RecordOutcome;
    use crate::error::{ResolveError, SyncError};
    use crate::memory::RecordingPacer;

    /// Creates every record except those named in `failing`; logs call order.
    struct Scripted {
        failing: Vec<&'static str>,
        seen: RefCell<Vec<String>>,
    }

    impl Reconcile for Scripted {
        fn reconcile(&self, record: &CanonicalRecord) -> RecordOutcome {
            self.seen.borrow_mut().push(record.display_name.clone());
            if self.failing.contains(&record.display_name.as_str()) {
                RecordOutcome::Failed(SyncError::Resolution(ResolveError::RateLimited))
            } else {
                RecordOutcome::Created {
                    entity: EntityId::from(record.display_name.as_str()),
                }
            }
        }
    }

    fn catalog(groups: &[(&str, &[&str])]) -> Catalog {
        Catalog {
            groups: groups
                .iter()
                .map(|(group, names)| CatalogGroup {
                    category: "Creators".into(),
                    group: group.to_string(),
                    source: format!("Creators/{group}.json").into(),
                    records: names
                        .iter()
                        .map(|n| CanonicalRecord {
                            category: "Creators".into(),
                            group: group.to_string(),
                            display_name: n.to_string(),
                            external_id: format!("@{n}"),
                            option_tags: Default::default(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn pauses_after_every_record() {
        let engine = Scripted {
            failing: vec!["b"],
            seen: RefCell::new(vec![]),
        };
        let mut seq = Sequencer::new(RecordingPacer::default(), Duration::from_millis(100));
        seq.run(&catalog(&[("Alpha", &["a", "b"]), ("Beta", &["c"])]), &engine);

        assert_eq!(seq.pacer().pauses, vec![Duration::from_millis(100); 3]);
    }

    #[test]
    fn failures_do_not_stop_later_groups() {
        let engine = Scripted {
            failing: vec!["a"],
            seen: RefCell::new(vec![]),
        };
        let mut seq = Sequencer::new(RecordingPacer::default(), Duration::ZERO);
        let report = seq.run(&catalog(&[("Alpha", &["a"]), ("Beta", &["b", "c"])]), &engine);

        assert_eq!(*engine.seen.borrow(), vec!["a", "b", "c"]);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].summary.failed, 1);
        assert_eq!(report.groups[1].summary.created, 2);
        assert_eq!(report.total.failed, 1);
        assert!(!report.is_success());
    }

    #[test]
    fn stop_flag_ends_run_between_records() {
        let engine = Scripted {
            failing: vec![],
            seen: RefCell::new(vec![]),
        };
        let flag = Arc::new(AtomicBool::new(true));
        let mut seq =
            Sequencer::new(RecordingPacer::default(), Duration::ZERO).with_stop_flag(flag);
        let report = seq.run(&catalog(&[("Alpha", &["a", "b"])]), &engine);

        assert!(report.interrupted);
        assert!(engine.seen.borrow().is_empty());
        assert_eq!(report.total.total, 0);
        assert_ne!(report.exit_code(), 0);
    }

    /// Raises the stop flag while reconciling its first record.
    struct StopsAfterFirst {
        flag: Arc<AtomicBool>,
        inner: Scripted,
    }

    impl Reconcile for StopsAfterFirst {
        fn reconcile(&self, record: &CanonicalRecord) -> RecordOutcome {
            self.flag.store(true, Ordering::SeqCst);
            self.inner.reconcile(record)
        }
    }

    #[test]
    fn stop_raised_mid_run_finishes_current_record_only() {
        let flag = Arc::new(AtomicBool::new(false));
        let engine = StopsAfterFirst {
            flag: Arc::clone(&flag),
            inner: Scripted {
                failing: vec![],
                seen: RefCell::new(vec![]),
            },
        };
        let mut seq =
            Sequencer::new(RecordingPacer::default(), Duration::ZERO).with_stop_flag(flag);
        let report = seq.run(&catalog(&[("Alpha", &["a", "b", "c"])]), &engine);

        assert_eq!(*engine.inner.seen.borrow(), vec!["a"]);
        assert!(report.interrupted);
        assert_eq!(report.total.created, 1);
        assert_eq!(report.exit_code(), crate::report::EXIT_INTERRUPTED);
    }
}
