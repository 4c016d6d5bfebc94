//! steptree: A step-tree execution engine for nested test scenarios
//!
//! Takes the flat, nesting-level-annotated step sequence a scenario runner
//! produces, rebuilds the step hierarchy, and executes it with
//! scenario-scoped failure semantics: hard failures halt everything that is
//! not explicitly exempted, soft failures mark the scenario failed but let
//! execution continue.
//!
//! # Step Directives
//!
//! A step whose text is one of the fixed directive phrases is gated against
//! live scenario state instead of running unconditionally:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `ALWAYS RUN` | Runs even after a hard failure |
//! | `RUN IF SCENARIO PASSING` | Runs only while nothing has failed |
//! | `RUN IF SCENARIO FAILED` | Runs only after some failure |
//! | `RUN IF SCENARIO HARD FAILED` | Runs only after a hard failure |
//! | `RUN IF SCENARIO SOFT FAILED` | Runs only after a soft failure |
//! | `RUN IF SCENARIO FINISHED` | Deferred until the scenario completes |
//! | `IGNORE FAILURES` | Own failure is recorded but changes nothing |
//! | `LOG BUT CONTINUE` | Own failure is logged and scored soft |
//!
//! `ALWAYS RUN` also accepts `AND IGNORE FAILURES`; `RUN IF SCENARIO
//! PASSING` accepts `AND SCENARIO FINISHED` and `AND IGNORE FAILURES` in
//! either order.
//!
//! # Text Utilities
//!
//! The crate also ships the text layer such runners need around step
//! arguments: delimiter splitting that respects quotes and brackets
//! ([`split`]), `IF:`/`THEN:`/`ELSE:` rewriting into ternary expressions
//! ([`rewrite_conditionals`]), evaluation of those expressions
//! ([`evaluate_conditionals`]), and string truthiness ([`is_truthy`]).

mod conditional;
mod directive;
mod engine;
mod error;
mod mask;
mod runner;
mod split;
mod tree;
mod truthy;

pub use conditional::{evaluate as evaluate_conditionals, rewrite as rewrite_conditionals};
pub use directive::{classify, Directive, DirectiveFlag};
pub use engine::{Engine, ScenarioState, StepInvoker, StepOutcome};
pub use error::{ErrorKind, FailureKind, StepError, StepFailure};
pub use mask::{has_placeholder, mask, restore, Masked, PlaceholderMap};
pub use runner::{RunConfig, ScenarioReport, ScenarioRunner, ScenarioRunnerBuilder, StepReport};
pub use split::{split, split_with, Phrase, DEFAULT_DELIMITERS};
pub use tree::{NestingIndex, NodeId, StepNode, StepRecord, StepTree, ROOT};
pub use truthy::{is_truthy, is_truthy_str, Value};
