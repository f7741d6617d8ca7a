// src/bashvar/shell.rs

//! Shell fallback for fragments outside the restricted grammar
//!
//! The fragment runs under `bash -r` with an empty environment inside a
//! throwaway directory. A trailer prints, for every discovered name, a
//! NUL-terminated "is set" flag and value, which are read back positionally.
//! Names that look like assignments but were never set (text inside a
//! quoted value, say) are dropped.

use super::Variables;
use crate::error::{Error, Result};
use regex::Regex;
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tempfile::TempDir;
use tracing::debug;
use wait_timeout::ChildExt;

/// Default time a fallback evaluation may take
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([a-zA-Z_][a-zA-Z0-9_]*)\+?=").expect("Invalid assignment regex")
});

/// Values recovered from a bash run, plus anything bash complained about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellOutcome {
    pub variables: Variables,
    pub errors: Vec<String>,
}

/// Runs fragments through a real bash
#[derive(Debug, Clone)]
pub struct ShellEvaluator {
    bash: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ShellEvaluator {
    fn default() -> Self {
        Self {
            bash: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ShellEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit interpreter instead of searching `PATH`
    pub fn with_bash(mut self, bash: impl Into<PathBuf>) -> Self {
        self.bash = Some(bash.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn interpreter(&self) -> Result<PathBuf> {
        let path = match &self.bash {
            Some(path) => path.clone(),
            None => which::which("bash")
                .map_err(|e| Error::ShellError(format!("bash not found: {}", e)))?,
        };
        if !path.exists() {
            return Err(Error::ShellError(format!(
                "Interpreter not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Evaluate `source` and capture every variable it assigns.
    ///
    /// `Err` means bash could not be run at all; problems reported by bash
    /// itself end up in [`ShellOutcome::errors`].
    pub fn evaluate(&self, source: &str) -> Result<ShellOutcome> {
        let interpreter = self.interpreter()?;
        let names = discover_variables(source);

        let temp_dir = TempDir::new()?;
        let script_path = temp_dir.path().join("fragment.sh");
        let stdout_path = temp_dir.path().join("stdout");
        let stderr_path = temp_dir.path().join("stderr");
        fs::write(&script_path, build_script(source, &names))?;

        debug!(
            "Evaluating {} variables with {}",
            names.len(),
            interpreter.display()
        );

        let mut child = Command::new(&interpreter)
            .arg("-r")
            .env_clear()
            .current_dir(temp_dir.path())
            .stdin(Stdio::from(File::open(&script_path)?))
            .stdout(Stdio::from(File::create(&stdout_path)?))
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()
            .map_err(|e| Error::ShellError(format!("Failed to spawn bash: {}", e)))?;

        if child.wait_timeout(self.timeout)?.is_none() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::ShellError(format!(
                "bash timed out after {} seconds",
                self.timeout.as_secs()
            )));
        }

        let stdout = fs::read(&stdout_path)?;
        let stderr = fs::read(&stderr_path)?;

        let mut outcome = ShellOutcome::default();
        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            outcome.errors.push(stderr.trim_end().to_string());
        }

        match split_records(&stdout, names.len() * 2) {
            Some(records) => {
                outcome.variables = names
                    .into_iter()
                    .zip(records.chunks(2))
                    .filter(|(_, pair)| pair[0] == "1")
                    .map(|(name, pair)| (name, pair[1].clone()))
                    .collect();
            }
            None => outcome.errors.push("bash output not expected".to_string()),
        }

        Ok(outcome)
    }
}

/// Names assigned anywhere in `source`, in first-seen order
pub fn discover_variables(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in ASSIGNMENT_RE.captures_iter(source) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn build_script(source: &str, names: &[String]) -> String {
    let mut script = String::with_capacity(source.len() + names.len() * 40);
    script.push_str(source);
    script.push('\n');
    for name in names {
        script.push_str(&format!(
            "printf '%s\\0%s\\0' \"${{{name}+1}}\" \"${{{name}}}\"\n"
        ));
    }
    script
}

/// Split NUL-terminated records; `None` unless exactly `expected` arrive
fn split_records(stdout: &[u8], expected: usize) -> Option<Vec<String>> {
    if expected == 0 {
        return stdout.is_empty().then(Vec::new);
    }
    let body = stdout.strip_suffix(&[0])?;
    let records: Vec<String> = body
        .split(|b| *b == 0)
        .map(|record| String::from_utf8_lossy(record).into_owned())
        .collect();
    (records.len() == expected).then_some(records)
}
