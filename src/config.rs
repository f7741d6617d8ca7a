// src/config.rs

//! Catalog configuration
//!
//! A TOML file naming the catalog database, the layout conventions shared by
//! all trees, shell fallback settings and one `[[tree]]` table per source
//! tree:
//!
//! ```toml
//! [database]
//! path = "abbs.db"
//!
//! [[tree]]
//! name = "aosc-os-abbs"
//! path = "/srv/abbs/aosc-os-abbs"
//! category = "base"
//! priority = 10
//! mainbranch = "stable"
//! branches = ["stable", "testing"]
//! ```

use crate::bashvar::ShellEvaluator;
use crate::error::{Error, Result};
use crate::scanner::Layout;
use crate::scanner::layout::DEFAULT_IGNORE;
use crate::spec::DEFAULT_CATEGORIES;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default, rename = "tree")]
    pub trees: Vec<TreeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("abbs.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Section prefixes that carry a category, e.g. `base-`
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Top-level directories that never hold groups
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub require_category: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            ignore: default_ignore(),
            require_category: false,
        }
    }
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
}

impl LayoutConfig {
    pub fn to_layout(&self) -> Layout {
        Layout {
            categories: self.categories.clone(),
            ignore: self.ignore.clone(),
            require_category: self.require_category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Interpreter for the fallback evaluator; looked up on `PATH` if unset
    #[serde(default)]
    pub bash: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            bash: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    crate::bashvar::shell::DEFAULT_TIMEOUT.as_secs()
}

impl ShellConfig {
    pub fn to_evaluator(&self) -> ShellEvaluator {
        let evaluator = ShellEvaluator::new().with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.bash {
            Some(bash) => evaluator.with_bash(bash),
            None => evaluator,
        }
    }
}

/// One abbs source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub name: String,

    /// Checkout used by local scans
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_tree_category")]
    pub category: String,

    #[serde(default)]
    pub url: Option<String>,

    /// Higher priority wins when trees define the same package
    #[serde(default)]
    pub priority: i64,

    pub mainbranch: String,

    /// Branches to reconcile; empty means every branch
    #[serde(default)]
    pub branches: Vec<String>,
}

fn default_tree_category() -> String {
    "base".to_string()
}

impl TreeConfig {
    pub fn new(name: &str, mainbranch: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            category: default_tree_category(),
            url: None,
            priority: 0,
            mainbranch: mainbranch.to_string(),
            branches: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_branches(mut self, branches: &[&str]) -> Self {
        self.branches = branches.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::ConfigError("tree name must not be empty".to_string()));
        }
        if self.name.contains('/') {
            return Err(Error::ConfigError(format!(
                "'/' not allowed in tree name: {}",
                self.name
            )));
        }
        if self.mainbranch.is_empty() {
            return Err(Error::ConfigError(format!(
                "tree {} has no main branch",
                self.name
            )));
        }
        if !self.branches.is_empty() && !self.branches.contains(&self.mainbranch) {
            return Err(Error::ConfigError(format!(
                "tree {}: main branch {} not in branches",
                self.name, self.mainbranch
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for tree in &self.trees {
            tree.validate()?;
            if !names.insert(tree.name.as_str()) {
                return Err(Error::ConfigError(format!("duplicate tree: {}", tree.name)));
            }
        }
        if self.shell.timeout_secs == 0 {
            return Err(Error::ConfigError("shell.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn tree(&self, name: &str) -> Option<&TreeConfig> {
        self.trees.iter().find(|t| t.name == name)
    }
}
