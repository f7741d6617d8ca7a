// src/lib.rs

//! abbs-meta
//!
//! Package metadata catalog for abbs source trees. Group `spec` files and
//! package `defines` files are evaluated as restricted bash assignments and
//! reconciled, revision by revision, into a SQLite catalog.
//!
//! # Architecture
//!
//! - `bashvar`: assignment evaluator with a `bash -r` fallback
//! - `spec`: package groups, packages, versions and dependencies
//! - `scanner`: revision and snapshot change listing
//! - `reconcile`: applies changes to the catalog, one transaction per revision
//! - `db`: catalog schema and row models

pub mod bashvar;
pub mod config;
pub mod db;
mod error;
pub mod reconcile;
pub mod scanner;
pub mod spec;

pub use config::{Config, TreeConfig};
pub use error::{Error, Result};
pub use reconcile::{Reconciler, UpdateStats};
pub use scanner::{LocalTree, ManifestCache, MemoryHistory, RevisionSource};
pub use spec::{Dependency, GroupLocation, Package, PackageGroup, Relationship, Version};
