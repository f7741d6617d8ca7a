// src/bashvar/mod.rs

//! Evaluation of assignment-only bash fragments
//!
//! `spec` and `defines` files are read through [`eval_bashvar`]: the
//! restricted grammar in [`parser`] and [`expand`] handles the common case
//! without spawning a process, and anything it rejects is re-run through
//! [`shell::ShellEvaluator`]. For every fragment the grammar accepts both
//! paths produce the same variables.

pub mod expand;
pub mod parser;
pub mod shell;

pub use expand::LiteralEvaluation;
pub use parser::Unsupported;
pub use shell::ShellEvaluator;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

/// Variables in assignment order
pub type Variables = IndexMap<String, String>;

/// A reference to (or append onto) a variable that was never assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedVariable {
    pub name: String,
    pub line: usize,
}

/// Outcome of evaluating one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub variables: Variables,
    pub undefined: Vec<UndefinedVariable>,
    /// Shell fallback failures, empty when the grammar handled the file
    pub errors: Vec<String>,
    /// Why the grammar rejected the file, if it did
    pub fallback: Option<Unsupported>,
}

impl Evaluation {
    /// Text stored alongside the file's catalog row
    pub fn diagnostic(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }
}

/// Evaluate with the restricted grammar only
pub fn eval_literal(source: &str) -> Result<LiteralEvaluation, Unsupported> {
    let assignments = parser::parse(source)?;
    expand::evaluate(&assignments)
}

/// Evaluate a file's contents, falling back to bash when needed.
///
/// `filename` is only used to label log lines.
pub fn eval_bashvar(source: &str, filename: &str, shell: &ShellEvaluator) -> Evaluation {
    match eval_literal(source) {
        Ok(literal) => {
            for undefined in &literal.undefined {
                warn!(
                    "{}:{}: undefined variable '{}'",
                    filename, undefined.line, undefined.name
                );
            }
            Evaluation {
                variables: literal.variables,
                undefined: literal.undefined,
                ..Default::default()
            }
        }
        Err(unsupported) => {
            debug!("{}: using bash ({})", filename, unsupported);
            let mut evaluation = Evaluation {
                fallback: Some(unsupported),
                ..Default::default()
            };
            match shell.evaluate(source) {
                Ok(outcome) => {
                    evaluation.variables = outcome.variables;
                    evaluation.errors = outcome.errors;
                }
                Err(e) => evaluation.errors.push(e.to_string()),
            }
            for message in &evaluation.errors {
                error!("{}: {}", filename, message);
            }
            evaluation
        }
    }
}
