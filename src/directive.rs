//! Control-flow flag classifier
//!
//! Recognizes the fixed, case-sensitive directive phrases that gate step
//! execution against live scenario state:
//!
//! | Phrase | Modifiers |
//! |--------|-----------|
//! | `ALWAYS RUN` | `AND IGNORE FAILURES` |
//! | `RUN IF SCENARIO PASSING` | `AND SCENARIO FINISHED`, `AND IGNORE FAILURES` |
//! | `RUN IF SCENARIO FAILED` | — |
//! | `RUN IF SCENARIO HARD FAILED` | — |
//! | `RUN IF SCENARIO SOFT FAILED` | — |
//! | `RUN IF SCENARIO FINISHED` | — |
//! | `IGNORE FAILURES` | — |
//! | `LOG BUT CONTINUE` | — |
//!
//! Anything else is an ordinary executable step (`DirectiveFlag::None`).
//! Text that matches a directive stem but carries an invalid or duplicated
//! modifier clause is an unresolved directive — a configuration error, never
//! silently downgraded to an ordinary step.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::StepError;

/// Control-flow classification of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectiveFlag {
    AlwaysRun,
    RunIfPassing,
    RunIfFailed,
    RunIfHardFailed,
    RunIfSoftFailed,
    IgnoreFailures,
    LogButContinue,
    RunIfFinished,
    /// Ordinary executable step
    #[default]
    None,
}

/// A classified directive: the flag plus its optional suffix modifiers.
/// Parsed once per step at tree-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Directive {
    pub flag: DirectiveFlag,
    /// `AND SCENARIO FINISHED` — additionally require scenario completion
    pub scenario_finished: bool,
    /// `AND IGNORE FAILURES` — downgrade this step's own failure
    pub ignore_failures: bool,
}

impl Directive {
    pub fn none() -> Self {
        Self::default()
    }

    fn plain(flag: DirectiveFlag) -> Self {
        Self {
            flag,
            ..Self::default()
        }
    }

    /// True for directives evaluated only once the scenario is finished.
    pub fn finish_gated(&self) -> bool {
        self.flag == DirectiveFlag::RunIfFinished
            || (self.flag == DirectiveFlag::RunIfPassing && self.scenario_finished)
    }

    /// True if this step's own failure is downgraded rather than propagated.
    pub fn downgrades_failure(&self) -> bool {
        self.ignore_failures || self.flag == DirectiveFlag::IgnoreFailures
    }
}

fn always_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ALWAYS RUN((?: AND IGNORE FAILURES)?)$").expect("static regex"))
}

fn run_if_passing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^RUN IF SCENARIO PASSING((?: AND (?:SCENARIO FINISHED|IGNORE FAILURES))*)$")
            .expect("static regex")
    })
}

/// Directive phrases that take no modifier clause
const PLAIN_DIRECTIVES: [(&str, DirectiveFlag); 6] = [
    ("RUN IF SCENARIO HARD FAILED", DirectiveFlag::RunIfHardFailed),
    ("RUN IF SCENARIO SOFT FAILED", DirectiveFlag::RunIfSoftFailed),
    ("RUN IF SCENARIO FAILED", DirectiveFlag::RunIfFailed),
    ("RUN IF SCENARIO FINISHED", DirectiveFlag::RunIfFinished),
    ("IGNORE FAILURES", DirectiveFlag::IgnoreFailures),
    ("LOG BUT CONTINUE", DirectiveFlag::LogButContinue),
];

/// Classify step text against the directive grammar.
pub fn classify(text: &str) -> Result<Directive, StepError> {
    let t = text.trim();

    if let Some(caps) = always_run_re().captures(t) {
        let mut directive = Directive::plain(DirectiveFlag::AlwaysRun);
        if !caps[1].is_empty() {
            directive.ignore_failures = true;
        }
        return Ok(directive);
    }
    if t.starts_with("ALWAYS RUN ") {
        return Err(unresolved(t));
    }

    if let Some(caps) = run_if_passing_re().captures(t) {
        let mut directive = Directive::plain(DirectiveFlag::RunIfPassing);
        for clause in caps[1].split(" AND ").filter(|c| !c.is_empty()) {
            let seen = match clause {
                "SCENARIO FINISHED" => &mut directive.scenario_finished,
                "IGNORE FAILURES" => &mut directive.ignore_failures,
                _ => unreachable!("regex admits only known clauses"),
            };
            if *seen {
                return Err(unresolved(t));
            }
            *seen = true;
        }
        return Ok(directive);
    }
    if t.starts_with("RUN IF SCENARIO PASSING ") {
        return Err(unresolved(t));
    }

    for (phrase, flag) in PLAIN_DIRECTIVES {
        if t == phrase {
            return Ok(Directive::plain(flag));
        }
        if t.starts_with(phrase) && t.as_bytes().get(phrase.len()) == Some(&b' ') {
            return Err(unresolved(t));
        }
    }

    Ok(Directive::none())
}

fn unresolved(text: &str) -> StepError {
    StepError::unresolved_directive("directive has an invalid modifier clause").with_step(text)
}
