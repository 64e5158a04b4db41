//! Core library for relcut.
//!
//! Cuts a release in five ordered stages: load the stored version, compute
//! the next one, tag and publish, persist the new version, commit and push.
//! Every side effect sits behind a trait so the sequencer can be driven by
//! real git and HTTP or by in-memory fakes.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//! - [`git`] - Version control operations
//! - [`manifest`] - Persisted version record
//! - [`publish`] - Remote release publication
//! - [`release`] - The release sequencer
//! - [`version`] - Version parsing and increment policy
//!
//! # Quick Start
//!
//! ```no_run
//! use relcut_core::manifest::MemoryStore;
//! use relcut_core::git::SystemGit;
//! use relcut_core::publish::NoopPublisher;
//! use relcut_core::release::{ReleaseSettings, Releaser};
//! use relcut_core::version::ReleaseType;
//!
//! let mut store = MemoryStore::new("1.2.3");
//! let git = SystemGit::new(".");
//! let mut releaser = Releaser::new(&mut store, &git, &NoopPublisher, ReleaseSettings::default());
//! let outcome = releaser.release(ReleaseType::Minor, |_| {}).unwrap();
//! assert_eq!(outcome.version.to_string(), "1.3.0");
//! ```
#![deny(unsafe_code)]

pub mod config;

pub mod error;

pub mod git;

pub mod manifest;

pub mod publish;

pub mod release;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use release::{ReleaseError, ReleaseOutcome, Releaser, Stage};

pub use version::ReleaseType;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
