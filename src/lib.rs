//! # hdt-forge
//!
//! hdt-forge turns a stream of RDF triples into a compact, self-describing
//! Header-Dictionary-Triples (HDT) store.
//!
//! Terms are deduplicated into a partitioned dictionary (shared subject-objects,
//! subjects, predicates, objects), triples are rewritten as integer ID triples and
//! both are sorted into canonical order, so the finished file supports fast
//! pattern lookups without re-parsing any text.
//!
//! ## Features
//!
//! - Single-pass streaming ingestion over one or more RDF dumps
//! - Four-section dictionary with stable, sorted final IDs
//! - Canonical (subject, predicate, object) triple order with range lookups
//! - Checksummed, memory-mapped store container
//!
//! ## Example
//!
//! ```rust
//! use hdt_forge::config::BuildConfig;
//! use hdt_forge::core::TripleString;
//! use hdt_forge::parsing::rdf_parser::VecSource;
//! use hdt_forge::storage::builder::{HdtBuilder, NoProgress};
//!
//! fn example() -> hdt_forge::Result<()> {
//!     let mut builder = HdtBuilder::new(BuildConfig::default())?;
//!     let mut source = VecSource::new(vec![TripleString::new("a", "p", "b")]);
//!     builder.ingest(&mut source, &mut NoProgress)?;
//!     let hdt = builder.finish(&mut NoProgress)?;
//!     assert_eq!(hdt.header().triples, 1);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::new_without_default)]

/// Core data structures and types
pub mod core;

/// Build configuration
pub mod config;

/// Adapters that feed parsed RDF triples into the pipeline
pub mod parsing;

pub mod storage;

pub mod error {
    //! Error types and result definitions

    /// Result type alias for hdt-forge operations
    pub type Result<T> = std::result::Result<T, Error>;

    /// Main error type for hdt-forge
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// The RDF source could not supply a triple
        #[error("Source error: {0}")]
        Source(String),
        /// An internal invariant was broken while reorganizing
        #[error("Invariant violation: {0}")]
        Invariant(String),
        /// The dataset does not fit the configured or addressable limits
        #[error("Resource exhausted: {0}")]
        ResourceExhausted(String),
        /// The build was cancelled before completion
        #[error("Build cancelled after {0} triples")]
        Cancelled(u64),
        /// A store file is malformed or corrupted
        #[error("Format error: {0}")]
        Format(String),
        /// Configuration error
        #[error("Configuration error: {0}")]
        Config(String),
        /// Header encoding or decoding failed
        #[error("Serialization error: {0}")]
        Serialization(String),
        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl Clone for Error {
        fn clone(&self) -> Self {
            match self {
                Error::Source(msg) => Error::Source(msg.clone()),
                Error::Invariant(msg) => Error::Invariant(msg.clone()),
                Error::ResourceExhausted(msg) => Error::ResourceExhausted(msg.clone()),
                Error::Cancelled(read) => Error::Cancelled(*read),
                Error::Format(msg) => Error::Format(msg.clone()),
                Error::Config(msg) => Error::Config(msg.clone()),
                Error::Serialization(msg) => Error::Serialization(msg.clone()),
                Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            }
        }
    }
}

// Re-export commonly used types
pub use error::{Error, Result};
