// src/db/models/mod.rs

//! Row models for the catalog tables
//!
//! Each model maps one table and carries its own queries as associated
//! functions. Callers pass a `&Connection`, which may be a transaction.

mod change;
mod dependency;
mod duplicate;
mod group;
mod mark;
mod package;
mod spec_entry;
mod tree;
mod version;

pub use change::PackageChange;
pub use dependency::DependencyEntry;
pub use duplicate::Duplicate;
pub use group::GroupEntry;
pub use mark::TreeMark;
pub use package::PackageEntry;
pub use spec_entry::SpecEntry;
pub use tree::Tree;
pub use version::PackageVersion;
