// src/bashvar/expand.rs

//! Evaluation of parsed assignments
//!
//! Reproduces bash semantics for the expansion forms the grammar accepts.
//! Cases where bash would print an error, count bytes in the C locale, or
//! expand `&` in a replacement are handed back as [`Unsupported`] so the
//! shell fallback decides them. So are references to and assignments of
//! variables the shell owns, since bash gives them values of its own.

use super::parser::{Assignment, Expansion, ExpansionOp, Segment, Unsupported};
use super::{UndefinedVariable, Variables};
use regex::{NoExpand, Regex};

/// Variables bash defines at startup or marks readonly under `bash -r`
const SHELL_VARIABLES: &[&str] = &[
    "BASH", "BASHOPTS", "BASHPID", "COLUMNS", "DIRSTACK", "ENV", "EPOCHREALTIME", "EPOCHSECONDS",
    "EUID", "FUNCNAME", "GROUPS", "HOME", "HOSTNAME", "HOSTTYPE", "IFS", "LANG", "LINENO", "LINES",
    "MACHTYPE", "MAILCHECK", "OLDPWD", "OPTARG", "OPTERR", "OPTIND", "OSTYPE", "PATH",
    "PIPESTATUS", "PPID", "PS1", "PS2", "PS3", "PS4", "PWD", "RANDOM", "SECONDS", "SHELL",
    "SHELLOPTS", "SHLVL", "SRANDOM", "TERM", "TMOUT", "UID", "_",
];

const SHELL_PREFIXES: &[&str] = &["BASH_", "COMP_", "HIST", "LC_", "READLINE_"];

/// Whether bash gives `name` a meaning of its own
pub fn is_shell_variable(name: &str) -> bool {
    SHELL_VARIABLES.contains(&name) || SHELL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Result of the grammar evaluator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiteralEvaluation {
    pub variables: Variables,
    pub undefined: Vec<UndefinedVariable>,
}

/// Evaluate assignments top to bottom
pub fn evaluate(assignments: &[Assignment]) -> Result<LiteralEvaluation, Unsupported> {
    let mut result = LiteralEvaluation::default();

    for assignment in assignments {
        if is_shell_variable(&assignment.name) {
            return Err(Unsupported {
                line: assignment.line,
                reason: format!("assignment to shell variable '{}'", assignment.name),
            });
        }

        let mut value = String::new();
        for segment in &assignment.value {
            match segment {
                Segment::Literal(text) => value.push_str(text),
                Segment::Expansion(expansion) => {
                    let expanded = expand(expansion, assignment.line, &mut result)?;
                    value.push_str(&expanded);
                }
            }
        }

        match result.variables.get_mut(&assignment.name) {
            Some(existing) if assignment.append => existing.push_str(&value),
            _ => {
                if assignment.append {
                    result.undefined.push(UndefinedVariable {
                        name: assignment.name.clone(),
                        line: assignment.line,
                    });
                }
                result.variables.insert(assignment.name.clone(), value);
            }
        }
    }

    Ok(result)
}

fn expand(
    expansion: &Expansion,
    line: usize,
    result: &mut LiteralEvaluation,
) -> Result<String, Unsupported> {
    if is_shell_variable(&expansion.name) {
        return Err(Unsupported {
            line,
            reason: format!("reference to shell variable '{}'", expansion.name),
        });
    }

    let Some(value) = result.variables.get(&expansion.name) else {
        result.undefined.push(UndefinedVariable {
            name: expansion.name.clone(),
            line,
        });
        return Ok(String::new());
    };

    let Some(op) = &expansion.op else {
        return Ok(value.clone());
    };

    let unsupported = |reason: &str| Unsupported {
        line,
        reason: format!("{} in '${{{}}}'", reason, expansion.name),
    };

    if !value.is_ascii() {
        return Err(unsupported("non-ASCII operand"));
    }

    match op {
        ExpansionOp::Substring { offset, length } => {
            substring(value, *offset, *length).ok_or_else(|| unsupported("substring expression < 0"))
        }
        ExpansionOp::TrimPrefix { pattern, longest } => {
            trim_prefix(value, pattern, *longest).map_err(|e| unsupported(&e.to_string()))
        }
        ExpansionOp::TrimSuffix { pattern, longest } => {
            trim_suffix(value, pattern, *longest).map_err(|e| unsupported(&e.to_string()))
        }
        ExpansionOp::Replace {
            pattern,
            replacement,
            all,
        } => {
            if pattern.is_empty() {
                return Ok(value.clone());
            }
            if pattern.chars().all(|c| c == '*') {
                return Err(unsupported("pattern matching the empty string"));
            }
            replace(value, pattern, replacement, *all).map_err(|e| unsupported(&e.to_string()))
        }
    }
}

/// `${value:offset:length}` on an ASCII value.
///
/// Returns `None` where bash reports "substring expression < 0".
pub fn substring(value: &str, offset: i64, length: Option<i64>) -> Option<String> {
    let len = value.len() as i64;
    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start > len {
        return Some(String::new());
    }

    let end = match length {
        None => len,
        Some(l) if l >= 0 => (start + l).min(len),
        Some(l) => {
            let end = len + l;
            if end < start {
                return None;
            }
            end
        }
    };

    Some(value[start as usize..end as usize].to_string())
}

/// Translate a glob into a regex fragment
fn glob_to_regex(pattern: &str, greedy: bool) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' if greedy => regex.push_str(".*"),
            '*' => regex.push_str(".*?"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    regex
}

fn compile(regex: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?s){}", regex))
}

/// `${value#pattern}` (shortest) and `${value##pattern}` (longest)
pub fn trim_prefix(value: &str, pattern: &str, longest: bool) -> Result<String, regex::Error> {
    let re = compile(&format!("^{}", glob_to_regex(pattern, longest)))?;
    Ok(match re.find(value) {
        Some(m) => value[m.end()..].to_string(),
        None => value.to_string(),
    })
}

/// `${value%pattern}` (shortest) and `${value%%pattern}` (longest)
pub fn trim_suffix(value: &str, pattern: &str, longest: bool) -> Result<String, regex::Error> {
    // A lazy prefix pushes the suffix start left (longest suffix), a greedy
    // prefix pushes it right (shortest suffix).
    let prefix = if longest { ".*?" } else { ".*" };
    let re = compile(&format!("^{}({})$", prefix, glob_to_regex(pattern, true)))?;
    Ok(match re.captures(value).and_then(|caps| caps.get(1)) {
        Some(m) => value[..m.start()].to_string(),
        None => value.to_string(),
    })
}

/// `${value/pattern/replacement}` and `${value//pattern/replacement}`
pub fn replace(
    value: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
) -> Result<String, regex::Error> {
    let re = compile(&glob_to_regex(pattern, true))?;
    let replaced = if all {
        re.replace_all(value, NoExpand(replacement))
    } else {
        re.replacen(value, 1, NoExpand(replacement))
    };
    Ok(replaced.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRING: &str = "01234567890abcdefgh";

    fn assignments(source: &str) -> Vec<Assignment> {
        crate::bashvar::parser::parse(source).unwrap()
    }

    #[test]
    fn test_shell_variables() {
        for name in ["HOSTTYPE", "SHLVL", "OPTIND", "PATH", "BASH_VERSION", "LC_ALL", "_"] {
            assert!(is_shell_variable(name), "{name}");
        }
        for name in ["PKGNAME", "VER", "PATHS", "a", "_x"] {
            assert!(!is_shell_variable(name), "{name}");
        }
    }

    #[test]
    fn test_shell_variables_are_left_to_bash() {
        for source in ["a=$HOSTTYPE", "a=${SHLVL}", "a=${OPTIND}", "a=${PWD%%x}", "PATH=/x", "SHELL=sh"] {
            let err = evaluate(&assignments(source)).unwrap_err();
            assert!(err.reason.contains("shell variable"), "{source:?}: {}", err.reason);
        }
        assert!(evaluate(&assignments("PATHS=/x\nb=$PATHS")).is_ok());
    }

    #[test]
    fn test_substring_positive_offsets() {
        assert_eq!(substring(STRING, 7, None).unwrap(), "7890abcdefgh");
        assert_eq!(substring(STRING, 7, Some(0)).unwrap(), "");
        assert_eq!(substring(STRING, 7, Some(2)).unwrap(), "78");
        assert_eq!(substring(STRING, 7, Some(-2)).unwrap(), "7890abcdef");
        assert_eq!(substring(STRING, 0, Some(1)).unwrap(), "0");
        assert_eq!(substring(STRING, 7, Some(100)).unwrap(), "7890abcdefgh");
    }

    #[test]
    fn test_substring_negative_offsets() {
        assert_eq!(substring(STRING, -7, None).unwrap(), "bcdefgh");
        assert_eq!(substring(STRING, -7, Some(0)).unwrap(), "");
        assert_eq!(substring(STRING, -7, Some(2)).unwrap(), "bc");
        assert_eq!(substring(STRING, -7, Some(-2)).unwrap(), "bcdef");
        assert_eq!(substring(STRING, -2, Some(5)).unwrap(), "gh");
    }

    #[test]
    fn test_substring_out_of_range() {
        assert_eq!(substring("abc", 5, None).unwrap(), "");
        assert_eq!(substring("abc", -7, None).unwrap(), "");
        assert_eq!(substring("abc", 3, None).unwrap(), "");
        assert_eq!(substring("abc", 5, Some(-10)).unwrap(), "");
        assert_eq!(substring("abc", 1, Some(-1)).unwrap(), "b");
        assert_eq!(substring("abc", 1, Some(-2)).unwrap(), "");
        assert_eq!(substring("abc", 1, Some(-3)), None);
    }

    #[test]
    fn test_trim_prefix() {
        assert_eq!(trim_prefix("foo.tar.gz", "*.", false).unwrap(), "tar.gz");
        assert_eq!(trim_prefix("foo.tar.gz", "*.", true).unwrap(), "gz");
        assert_eq!(trim_prefix("foo.tar.gz", "bar", true).unwrap(), "foo.tar.gz");
        assert_eq!(trim_prefix("foo.tar.gz", "f?o", false).unwrap(), ".tar.gz");
        assert_eq!(trim_prefix("abc", "", false).unwrap(), "abc");
    }

    #[test]
    fn test_trim_suffix() {
        assert_eq!(trim_suffix("foo.tar.gz", ".*", false).unwrap(), "foo.tar");
        assert_eq!(trim_suffix("foo.tar.gz", ".*", true).unwrap(), "foo");
        assert_eq!(trim_suffix(STRING, "fgh", true).unwrap(), "01234567890abcde");
        assert_eq!(trim_suffix("1.2.3", "x*", true).unwrap(), "1.2.3");
    }

    #[test]
    fn test_trim_with_newlines() {
        assert_eq!(trim_prefix("a\nb\nc", "*\n", true).unwrap(), "c");
        assert_eq!(trim_suffix("a\nb\nc", "\n*", true).unwrap(), "a");
    }

    #[test]
    fn test_replace_first_and_all() {
        assert_eq!(replace("a-b-c", "-", "_", false).unwrap(), "a_b-c");
        assert_eq!(replace("a-b-c", "-", "_", true).unwrap(), "a_b_c");
        assert_eq!(replace("a-b-c", "-", "", true).unwrap(), "abc");
        assert_eq!(replace("xaybzc", "a*b", "-", false).unwrap(), "x-zc");
        assert_eq!(replace("1.2.3", "?", "x", true).unwrap(), "xxxxx");
    }

    #[test]
    fn test_replace_is_literal() {
        assert_eq!(replace("a.b", ".", "$0", true).unwrap(), "a$0b");
        assert_eq!(replace("a+b", "+", "\\", false).unwrap(), "a\\b");
    }
}
