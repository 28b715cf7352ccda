//! Presto template registry builder.
//!
//! This crate discovers Presto templates, verifies their released binaries
//! against published checksums, harvests each template's manifest, example
//! and rendered document inside a network-isolated sandbox, builds verified
//! templates from pinned source in offline containers, and merges the
//! results into the `registry.json` index served by the template site.
//!
//! # Modules
//!
//! - [`asset_name`] - Release asset naming and parsing
//! - [`build`] - Verified source builds in containers and their publication
//! - [`candidate`] - Candidates produced by discovery and their persisted list
//! - [`checksum`] - SHA-256 digests and `SHA256SUMS` verification
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - Timeout-bounded execution of trusted host tools
//! - [`config`] - Run configuration from file, environment, and flags
//! - [`deploy`] - Mirror of template records for the site deploy
//! - [`discovery`] - Official, community, and verified candidate discovery
//! - [`error`] - Per-template and run-level error types
//! - [`extract`] - Untrusted binary verification and harvesting
//! - [`hero`] - Progressive hero frames cut from a template example
//! - [`manifest`] - Template-declared manifest schema
//! - [`metadata`] - Per-template records and their on-disk layout
//! - [`pipeline`] - Stage orchestration for a registry run
//! - [`platform`] - Operating system and architecture vocabulary
//! - [`preview`] - SVG preview compilation with Typst
//! - [`registry`] - The registry index and its incremental merge
//! - [`sandbox`] - Network-isolated execution of template binaries
//! - [`source`] - Release host client
//! - [`summary`] - Per-run tally of processed and skipped templates
//! - [`template_name`] - Validated template identifiers

pub mod asset_name;
pub mod build;
pub mod candidate;
pub mod checksum;
pub mod cli;
pub mod command;
pub mod config;
pub mod deploy;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod hero;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod platform;
pub mod preview;
pub mod registry;
pub mod sandbox;
pub mod source;
pub mod summary;
pub mod template_name;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
