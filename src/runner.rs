//! Scenario runner
//!
//! The top-level entry point for hosts: builds the step tree from a record
//! sequence, drives the [`Engine`] over it, and folds the results into a
//! [`ScenarioReport`] with per-step outcomes and a one-line summary.

use std::time::Instant;

use tracing::debug;

use crate::engine::{Engine, ScenarioState, StepInvoker, StepOutcome};
use crate::error::StepError;
use crate::tree::{StepRecord, StepTree};

/// Runner configuration
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Suppress per-step entries in the scenario log
    pub quiet: bool,
}

/// Builder for a [`ScenarioRunner`]
#[derive(Debug, Default)]
pub struct ScenarioRunnerBuilder {
    config: RunConfig,
}

impl ScenarioRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    pub fn build<I: StepInvoker>(self, invoker: I) -> ScenarioRunner<I> {
        ScenarioRunner {
            config: self.config,
            invoker,
        }
    }
}

/// Runs scenarios against a host-supplied step invoker.
pub struct ScenarioRunner<I: StepInvoker> {
    config: RunConfig,
    invoker: I,
}

impl<I: StepInvoker> ScenarioRunner<I> {
    pub fn new(invoker: I) -> Self {
        ScenarioRunnerBuilder::new().build(invoker)
    }

    /// Run one scenario. Tree construction is fail-fast: a record whose text
    /// is an unresolved directive aborts before anything executes.
    pub fn run(&mut self, records: &[StepRecord]) -> Result<ScenarioReport, StepError> {
        let started = Instant::now();

        let mut tree = StepTree::build(records)?;
        debug!(steps = tree.len(), "step tree built");

        let engine = Engine {
            quiet: self.config.quiet,
        };
        let state = engine.run_tree(&mut tree, &mut self.invoker);

        let steps = tree
            .ids()
            .map(|id| {
                let node = tree.node(id);
                StepReport {
                    text: node.text().to_string(),
                    level: node.level,
                    outcome: node
                        .outcome
                        .clone()
                        .unwrap_or_else(|| StepOutcome::Skipped("not reached".to_string())),
                }
            })
            .collect();

        Ok(ScenarioReport {
            steps,
            state,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}

/// One step's result, in record order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub text: String,
    pub level: usize,
    pub outcome: StepOutcome,
}

/// The full result of one scenario run
#[derive(Debug)]
pub struct ScenarioReport {
    /// Per-step results in record (document) order
    pub steps: Vec<StepReport>,
    /// Final scenario state, including the execution log
    pub state: ScenarioState,
    pub elapsed_ms: u128,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        !self.state.failed()
    }

    fn counts(&self) -> (usize, usize, usize) {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for step in &self.steps {
            match step.outcome {
                StepOutcome::Passed | StepOutcome::Ignored(_) => passed += 1,
                StepOutcome::HardFailed(_) | StepOutcome::SoftFailed(_) => failed += 1,
                StepOutcome::Skipped(_) => skipped += 1,
            }
        }
        (passed, failed, skipped)
    }

    /// One-line result summary.
    pub fn summary(&self) -> String {
        let (passed, failed, skipped) = self.counts();
        format!(
            "{} passed, {} failed, {} skipped ({}ms)",
            passed, failed, skipped, self.elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepFailure;

    fn fail_on(target: &'static str) -> impl FnMut(&StepRecord) -> Result<(), StepFailure> {
        move |record: &StepRecord| {
            if record.text == target {
                Err(StepFailure::hard("target step failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_run_all_passing() {
        let records = vec![
            StepRecord::new("open the page", 0),
            StepRecord::new("fill the form", 1),
        ];
        let mut runner = ScenarioRunner::new(fail_on("nothing"));
        let report = runner.run(&records).unwrap();
        assert!(report.passed());
        assert_eq!(report.steps.len(), 2);
        assert!(report.summary().starts_with("2 passed, 0 failed, 0 skipped"));
    }

    #[test]
    fn test_run_reports_failure_and_skips() {
        let records = vec![
            StepRecord::new("open the page", 0),
            StepRecord::new("fill the form", 0),
            StepRecord::new("submit", 0),
        ];
        let mut runner = ScenarioRunner::new(fail_on("fill the form"));
        let report = runner.run(&records).unwrap();
        assert!(!report.passed());
        assert!(report.summary().starts_with("1 passed, 1 failed, 1 skipped"));
        assert!(matches!(
            report.steps[1].outcome,
            StepOutcome::HardFailed(_)
        ));
        assert!(matches!(report.steps[2].outcome, StepOutcome::Skipped(_)));
    }

    #[test]
    fn test_run_fails_fast_on_bad_directive() {
        let records = vec![
            StepRecord::new("open the page", 0),
            StepRecord::new("ALWAYS RUN AND PANIC", 0).with_line(7),
        ];
        let mut invoked = 0usize;
        let mut runner = ScenarioRunner::new(|_: &StepRecord| -> Result<(), StepFailure> {
            invoked += 1;
            Ok(())
        });
        let err = runner.run(&records).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.line, Some(7));
        drop(runner);
        assert_eq!(invoked, 0);
    }

    #[test]
    fn test_quiet_suppresses_step_log() {
        let records = vec![StepRecord::new("open the page", 0)];
        let mut runner = ScenarioRunnerBuilder::new()
            .quiet(true)
            .build(fail_on("nothing"));
        let report = runner.run(&records).unwrap();
        assert!(report.state.log.is_empty());
    }

    #[test]
    fn test_report_preserves_record_order() {
        let records = vec![
            StepRecord::new("a", 0),
            StepRecord::new("a.1", 1),
            StepRecord::new("b", 0),
        ];
        let mut runner = ScenarioRunner::new(fail_on("nothing"));
        let report = runner.run(&records).unwrap();
        let texts: Vec<&str> = report.steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "a.1", "b"]);
        assert_eq!(report.steps[1].level, 1);
    }
}
