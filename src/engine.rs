//! Execution engine
//!
//! Walks a [`StepTree`] depth-first in document order, consults each node's
//! directive against live scenario state to decide whether it runs, invokes
//! the host's step body, and scores failures as hard or soft per the
//! declared [`FailureKind`].
//!
//! Failure propagation is scenario-scoped, not subtree-scoped: a hard
//! failure anywhere curtails every later non-exempt step for the remainder
//! of the whole tree. The engine itself never fails — `run_tree` always
//! returns the final [`ScenarioState`], with an outcome recorded on every
//! reachable node.

use tracing::{debug, trace};

use crate::directive::{Directive, DirectiveFlag};
use crate::error::StepFailure;
use crate::tree::{NodeId, StepRecord, StepTree, ROOT};

/// Terminal result of one step node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    /// Failed and halted ordinary execution for the scenario
    HardFailed(String),
    /// Failed; execution continued
    SoftFailed(String),
    /// Failed, but an ignore-failures directive downgraded it
    Ignored(String),
    /// Not run, with the gating reason
    Skipped(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::HardFailed(_) | StepOutcome::SoftFailed(_))
    }
}

/// Per-run scenario state. The three flags are monotonic: once set they stay
/// set for the rest of the run, and a hard failure also completes the
/// scenario.
#[derive(Debug, Default)]
pub struct ScenarioState {
    pub hard_failed: bool,
    pub soft_failed: bool,
    pub complete: bool,
    /// Execution log, one entry per line
    pub log: String,
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_hard_failed(&mut self) {
        self.hard_failed = true;
        self.complete = true;
    }

    pub fn mark_soft_failed(&mut self) {
        self.soft_failed = true;
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn failed(&self) -> bool {
        self.hard_failed || self.soft_failed
    }

    /// Append a log entry
    pub fn logf(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
    }
}

/// The host's step-matching/invocation capability: given a step record,
/// run the matched body and report the outcome. Failures carry a declared
/// hard/soft kind — the engine never infers kind from error types.
pub trait StepInvoker {
    fn invoke(&mut self, record: &StepRecord) -> Result<(), StepFailure>;
}

impl<F> StepInvoker for F
where
    F: FnMut(&StepRecord) -> Result<(), StepFailure>,
{
    fn invoke(&mut self, record: &StepRecord) -> Result<(), StepFailure> {
        self(record)
    }
}

/// The tree walker. Stateless config — one engine can run many scenarios.
pub struct Engine {
    /// Suppress per-step log entries
    pub quiet: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// Execute the whole tree and return the final scenario state, with an
    /// outcome attached to every reachable node.
    ///
    /// Finish-gated nodes (`RUN IF SCENARIO FINISHED`, and `RUN IF SCENARIO
    /// PASSING AND SCENARIO FINISHED`) are deferred: the main walk skips
    /// over them, the scenario is marked complete, and they then run in
    /// document order under their remaining gates.
    pub fn run_tree(&self, tree: &mut StepTree, invoker: &mut dyn StepInvoker) -> ScenarioState {
        let mut state = ScenarioState::new();
        let mut deferred: Vec<NodeId> = Vec::new();

        let top: Vec<NodeId> = tree.node(ROOT).children.clone();
        for id in top {
            self.walk(tree, id, &mut state, invoker, Some(&mut deferred), false);
        }

        state.mark_complete();

        for id in deferred {
            debug!(step = tree.node(id).text(), "running finish-gated step");
            self.walk(tree, id, &mut state, invoker, None, false);
        }

        state
    }

    /// Run one node and then its subtree. During the main walk finish-gated
    /// subtrees are pushed onto `deferred` instead of running. `exempt` marks
    /// nodes inside a running subtree whose head is exempt from the
    /// hard-failure cut-off, so a cleanup block's substeps run with it.
    fn walk(
        &self,
        tree: &mut StepTree,
        id: NodeId,
        state: &mut ScenarioState,
        invoker: &mut dyn StepInvoker,
        mut deferred: Option<&mut Vec<NodeId>>,
        exempt: bool,
    ) {
        let directive = tree.node(id).directive;

        if directive.finish_gated() {
            if let Some(deferred) = deferred.as_deref_mut() {
                deferred.push(id);
                return;
            }
        }

        let ran = self.run_node(tree, id, state, invoker, exempt);
        let child_exempt = exempt || hard_fail_exempt(directive, state);

        let children: Vec<NodeId> = tree.node(id).children.clone();
        for child in children {
            if ran {
                self.walk(tree, child, state, invoker, deferred.as_deref_mut(), child_exempt);
            } else {
                // A skipped step's substeps are skipped with it
                self.record_skip_subtree(tree, child, state);
            }
        }
    }

    /// Gate, invoke, and score one node. Returns whether the step ran.
    fn run_node(
        &self,
        tree: &mut StepTree,
        id: NodeId,
        state: &mut ScenarioState,
        invoker: &mut dyn StepInvoker,
        exempt: bool,
    ) -> bool {
        let directive = tree.node(id).directive;

        if let Some(reason) = gate(directive, state, exempt) {
            self.record_skip(tree, id, state, reason);
            return false;
        }

        let record = match tree.node(id).record.clone() {
            Some(record) => record,
            None => return true, // synthetic node, nothing to invoke
        };

        if !self.quiet {
            state.logf(&format!("> {}", record.text.trim()));
        }
        trace!(step = record.text.as_str(), level = record.level, "invoking step");

        let outcome = match invoker.invoke(&record) {
            Ok(()) => StepOutcome::Passed,
            Err(failure) => self.score_failure(directive, failure, state),
        };

        set_outcome(tree, id, outcome);
        true
    }

    /// Convert a step-body failure into an outcome, updating scenario flags.
    fn score_failure(
        &self,
        directive: Directive,
        failure: StepFailure,
        state: &mut ScenarioState,
    ) -> StepOutcome {
        let message = failure.to_string();

        if directive.downgrades_failure() {
            state.logf(&format!("[failure ignored: {}]", message));
            debug!(%message, "failure downgraded by ignore-failures directive");
            return StepOutcome::Ignored(message);
        }

        if directive.flag == DirectiveFlag::LogButContinue {
            state.mark_soft_failed();
            state.logf(&format!("[logged: {}]", message));
            return StepOutcome::SoftFailed(message);
        }

        if failure.is_hard() {
            state.mark_hard_failed();
            state.logf(&format!("[hard failure: {}]", message));
            debug!(%message, "scenario hard-failed");
            StepOutcome::HardFailed(message)
        } else {
            state.mark_soft_failed();
            state.logf(&format!("[soft failure: {}]", message));
            StepOutcome::SoftFailed(message)
        }
    }

    fn record_skip(&self, tree: &mut StepTree, id: NodeId, state: &mut ScenarioState, reason: &str) {
        if !self.quiet {
            state.logf(&format!("[skipped: {}] {}", reason, tree.node(id).text()));
        }
        set_outcome(tree, id, StepOutcome::Skipped(reason.to_string()));
    }

    fn record_skip_subtree(&self, tree: &mut StepTree, id: NodeId, state: &mut ScenarioState) {
        self.record_skip(tree, id, state, "parent step skipped");
        let children: Vec<NodeId> = tree.node(id).children.clone();
        for child in children {
            self.record_skip_subtree(tree, child, state);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide whether a node runs, given its directive and the scenario state.
/// `None` means run; `Some(reason)` means skip.
fn gate(directive: Directive, state: &ScenarioState, inherited_exempt: bool) -> Option<&'static str> {
    if state.hard_failed && !inherited_exempt && !hard_fail_exempt(directive, state) {
        return Some("scenario hard-failed");
    }

    match directive.flag {
        DirectiveFlag::AlwaysRun
        | DirectiveFlag::IgnoreFailures
        | DirectiveFlag::LogButContinue
        | DirectiveFlag::None => None,
        DirectiveFlag::RunIfPassing => {
            if state.failed() {
                Some("scenario not passing")
            } else if directive.scenario_finished && !state.complete {
                Some("scenario not finished")
            } else {
                None
            }
        }
        DirectiveFlag::RunIfFailed => {
            if state.failed() {
                None
            } else {
                Some("scenario has not failed")
            }
        }
        DirectiveFlag::RunIfSoftFailed => {
            if state.soft_failed {
                None
            } else {
                Some("scenario has not soft-failed")
            }
        }
        DirectiveFlag::RunIfHardFailed => {
            if state.hard_failed {
                None
            } else {
                Some("scenario has not hard-failed")
            }
        }
        DirectiveFlag::RunIfFinished => {
            if state.complete {
                None
            } else {
                Some("scenario not finished")
            }
        }
    }
}

/// Exempt from the hard-failure cut-off: ALWAYS RUN, and the failure-gated
/// directives whose condition holds.
fn hard_fail_exempt(directive: Directive, state: &ScenarioState) -> bool {
    match directive.flag {
        DirectiveFlag::AlwaysRun
        | DirectiveFlag::RunIfFailed
        | DirectiveFlag::RunIfHardFailed => true,
        DirectiveFlag::RunIfSoftFailed => state.soft_failed,
        _ => false,
    }
}

fn set_outcome(tree: &mut StepTree, id: NodeId, outcome: StepOutcome) {
    let node = tree.node_mut(id);
    if node.outcome.is_none() {
        node.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invoker that records invoked step texts and fails scripted steps.
    struct Scripted {
        invoked: Vec<String>,
        hard_fail_on: Vec<&'static str>,
        soft_fail_on: Vec<&'static str>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                invoked: Vec::new(),
                hard_fail_on: Vec::new(),
                soft_fail_on: Vec::new(),
            }
        }
    }

    impl StepInvoker for Scripted {
        fn invoke(&mut self, record: &StepRecord) -> Result<(), StepFailure> {
            self.invoked.push(record.text.clone());
            if self.hard_fail_on.contains(&record.text.as_str()) {
                return Err(StepFailure::hard("scripted hard failure"));
            }
            if self.soft_fail_on.contains(&record.text.as_str()) {
                return Err(StepFailure::soft("scripted soft failure"));
            }
            Ok(())
        }
    }

    fn run(records: &[StepRecord], invoker: &mut Scripted) -> (StepTree, ScenarioState) {
        let mut tree = StepTree::build(records).unwrap();
        let state = Engine::new().run_tree(&mut tree, invoker);
        (tree, state)
    }

    fn flat(texts: &[&str]) -> Vec<StepRecord> {
        texts.iter().map(|t| StepRecord::new(*t, 0)).collect()
    }

    #[test]
    fn test_all_passing() {
        let mut invoker = Scripted::new();
        let (tree, state) = run(&flat(&["a", "b", "c"]), &mut invoker);
        assert!(!state.failed());
        assert!(state.complete);
        assert_eq!(invoker.invoked, vec!["a", "b", "c"]);
        for id in tree.ids() {
            assert_eq!(tree.node(id).outcome, Some(StepOutcome::Passed));
        }
    }

    #[test]
    fn test_hard_failure_halts_all_but_always_run() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("boom");
        let (tree, state) = run(
            &flat(&["boom", "a", "b", "c", "ALWAYS RUN"]),
            &mut invoker,
        );
        assert!(state.hard_failed && state.complete);
        assert_eq!(invoker.invoked, vec!["boom", "ALWAYS RUN"]);
        let skipped = tree
            .ids()
            .filter(|&id| matches!(tree.node(id).outcome, Some(StepOutcome::Skipped(_))))
            .count();
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_soft_failure_continues() {
        let mut invoker = Scripted::new();
        invoker.soft_fail_on.push("wobble");
        let (tree, state) = run(&flat(&["wobble", "a", "b"]), &mut invoker);
        assert!(state.soft_failed && !state.hard_failed);
        assert_eq!(invoker.invoked, vec!["wobble", "a", "b"]);
        assert_eq!(
            tree.node(tree.node(crate::tree::ROOT).children[0]).outcome,
            Some(StepOutcome::SoftFailed("scripted soft failure".into()))
        );
    }

    #[test]
    fn test_run_if_passing_skipped_after_soft_failure() {
        let mut invoker = Scripted::new();
        invoker.soft_fail_on.push("wobble");
        let (_, state) = run(
            &flat(&["wobble", "RUN IF SCENARIO PASSING", "RUN IF SCENARIO FAILED"]),
            &mut invoker,
        );
        assert!(state.soft_failed);
        assert_eq!(invoker.invoked, vec!["wobble", "RUN IF SCENARIO FAILED"]);
    }

    #[test]
    fn test_run_if_failed_skipped_when_passing() {
        let mut invoker = Scripted::new();
        let (_, _) = run(&flat(&["a", "RUN IF SCENARIO FAILED"]), &mut invoker);
        assert_eq!(invoker.invoked, vec!["a"]);
    }

    #[test]
    fn test_failure_gated_directives_run_after_hard_failure() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("boom");
        let (_, _) = run(
            &flat(&[
                "boom",
                "RUN IF SCENARIO FAILED",
                "RUN IF SCENARIO HARD FAILED",
                "RUN IF SCENARIO SOFT FAILED",
                "ordinary",
            ]),
            &mut invoker,
        );
        assert_eq!(
            invoker.invoked,
            vec!["boom", "RUN IF SCENARIO FAILED", "RUN IF SCENARIO HARD FAILED"]
        );
    }

    #[test]
    fn test_ignore_failures_leaves_scenario_untouched() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("ALWAYS RUN AND IGNORE FAILURES");
        let (tree, state) = run(
            &flat(&["ALWAYS RUN AND IGNORE FAILURES", "after"]),
            &mut invoker,
        );
        assert!(!state.failed());
        assert_eq!(invoker.invoked.len(), 2);
        let first = tree.node(crate::tree::ROOT).children[0];
        assert!(matches!(
            tree.node(first).outcome,
            Some(StepOutcome::Ignored(_))
        ));
    }

    #[test]
    fn test_log_but_continue_soft_fails_scenario() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("LOG BUT CONTINUE");
        let (_, state) = run(&flat(&["LOG BUT CONTINUE", "after"]), &mut invoker);
        assert!(state.soft_failed && !state.hard_failed);
        assert_eq!(invoker.invoked, vec!["LOG BUT CONTINUE", "after"]);
    }

    #[test]
    fn test_finish_gated_runs_last() {
        let mut invoker = Scripted::new();
        let (_, state) = run(
            &flat(&["RUN IF SCENARIO FINISHED", "a", "b"]),
            &mut invoker,
        );
        assert!(state.complete);
        assert_eq!(invoker.invoked, vec!["a", "b", "RUN IF SCENARIO FINISHED"]);
    }

    #[test]
    fn test_finish_gated_skipped_after_hard_failure() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("boom");
        let (_, _) = run(
            &flat(&["RUN IF SCENARIO FINISHED", "boom"]),
            &mut invoker,
        );
        assert_eq!(invoker.invoked, vec!["boom"]);
    }

    #[test]
    fn test_skipped_parent_skips_subtree() {
        let mut invoker = Scripted::new();
        let records = vec![
            StepRecord::new("RUN IF SCENARIO FAILED", 0),
            StepRecord::new("cleanup db", 1),
            StepRecord::new("cleanup files", 2),
            StepRecord::new("ordinary", 0),
        ];
        let (tree, _) = run(&records, &mut invoker);
        assert_eq!(invoker.invoked, vec!["ordinary"]);
        for id in tree.ids().take(3) {
            assert!(matches!(
                tree.node(id).outcome,
                Some(StepOutcome::Skipped(_))
            ));
        }
    }

    #[test]
    fn test_nested_walk_is_pre_order() {
        let mut invoker = Scripted::new();
        let records = vec![
            StepRecord::new("a", 0),
            StepRecord::new("a.1", 1),
            StepRecord::new("a.2", 1),
            StepRecord::new("b", 0),
        ];
        let (_, _) = run(&records, &mut invoker);
        assert_eq!(invoker.invoked, vec!["a", "a.1", "a.2", "b"]);
    }

    #[test]
    fn test_hard_failure_is_scenario_scoped_not_subtree_scoped() {
        let mut invoker = Scripted::new();
        invoker.hard_fail_on.push("a.1");
        let records = vec![
            StepRecord::new("a", 0),
            StepRecord::new("a.1", 1),
            StepRecord::new("a.2", 1),
            StepRecord::new("b", 0),
        ];
        let (_, state) = run(&records, &mut invoker);
        assert!(state.hard_failed);
        // The failure inside a's subtree also halts the sibling branch b
        assert_eq!(invoker.invoked, vec!["a", "a.1"]);
    }

    #[test]
    fn test_run_tree_sets_passed_outcome_log() {
        let mut invoker = Scripted::new();
        let (_, state) = run(&flat(&["a"]), &mut invoker);
        assert!(state.log.contains("> a"));
    }
}
