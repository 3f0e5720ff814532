//! Build pipeline: streaming ingestion followed by dictionary and triple
//! reorganization.
//!
//! ```text
//! source --> TempDictionary + TempTriples --> reorganize_dictionary --> reorganize triples --> Header --> Hdt
//! ```
//!
//! State is owned by a single [`HdtBuilder`]. A failed or cancelled `ingest`
//! discards everything ingested so far, and every later `ingest` or `finish`
//! on that builder returns the same error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::core::{Role, TripleId, TripleString};
use crate::error::{Error, Result};
use crate::parsing::rdf_parser::TripleSource;
use crate::storage::hdt_file::Hdt;
use crate::storage::header::Header;
use crate::storage::indexing::dictionary::TempDictionary;
use crate::storage::indexing::sections::reorganize_dictionary;
use crate::storage::triples::TempTriples;

/// Receives progress notifications as `(percent, message)`.
pub trait ProgressListener {
    fn notify(&mut self, level: f32, message: &str);
}

impl<F: FnMut(f32, &str)> ProgressListener for F {
    fn notify(&mut self, level: f32, message: &str) {
        self(level, message);
    }
}

/// Listener that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn notify(&mut self, _level: f32, _message: &str) {}
}

pub struct HdtBuilder {
    config: BuildConfig,
    dictionary: TempDictionary,
    triples: TempTriples,
    cancel: Option<Arc<AtomicBool>>,
    sources: usize,
    failed: Option<Error>,
}

impl HdtBuilder {
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        let triples = TempTriples::with_limit(config.max_triples);
        Ok(Self {
            config,
            dictionary: TempDictionary::new(),
            triples,
            cancel: None,
            sources: 0,
            failed: None,
        })
    }

    /// Abort ingestion with [`Error::Cancelled`] as soon as `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Number of triples accumulated so far.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Whether an earlier `ingest` failed and the builder can no longer finish.
    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    fn insert(&mut self, triple: &TripleString) -> Result<()> {
        // no dictionary growth for a triple the buffer would refuse
        self.triples.ensure_room()?;
        let ids = TripleId::new(
            self.dictionary.insert(&triple.subject, Role::Subject)?,
            self.dictionary.insert(&triple.predicate, Role::Predicate)?,
            self.dictionary.insert(&triple.object, Role::Object)?,
        );
        self.triples.append(ids, triple.serialized_len())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Drain `source` into the dictionary and triple buffer. May be called once
    /// per dump; returns the number of triples read from this source.
    ///
    /// On error all accumulated state is dropped and the builder stays failed.
    pub fn ingest<S, L>(&mut self, source: &mut S, listener: &mut L) -> Result<u64>
    where
        S: TripleSource + ?Sized,
        L: ProgressListener + ?Sized,
    {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        self.drain(source, listener).map_err(|err| {
            warn!(error = %err, triples = self.triples.len(), "ingestion aborted, discarding state");
            self.dictionary = TempDictionary::new();
            self.triples = TempTriples::with_limit(self.config.max_triples);
            self.failed = Some(err.clone());
            err
        })
    }

    fn drain<S, L>(&mut self, source: &mut S, listener: &mut L) -> Result<u64>
    where
        S: TripleSource + ?Sized,
        L: ProgressListener + ?Sized,
    {
        let started = Instant::now();
        let mut read = 0u64;
        loop {
            if self.is_cancelled() {
                return Err(Error::Cancelled(self.triples.len() as u64));
            }
            let Some(triple) = source.next_triple()? else {
                break;
            };
            self.insert(&triple)?;
            read += 1;

            let interval = self.config.progress_interval;
            if interval > 0 && (self.triples.len() as u64) % interval == 0 {
                listener.notify(0.0, &format!("Loaded {} triples", self.triples.len()));
            }
        }

        self.sources += 1;
        if read == 0 {
            warn!(source = self.sources, "source produced no triples");
        }
        debug!(source = self.sources, triples = read, elapsed = ?started.elapsed(), "source ingested");
        Ok(read)
    }

    /// Reorganize everything ingested so far into a finished store.
    pub fn finish<L>(self, listener: &mut L) -> Result<Hdt>
    where
        L: ProgressListener + ?Sized,
    {
        let Self { config, dictionary, triples, sources, failed, .. } = self;
        if let Some(err) = failed {
            return Err(err);
        }
        info!(
            sources,
            triples = triples.len(),
            subjects = dictionary.len(Role::Subject),
            predicates = dictionary.len(Role::Predicate),
            objects = dictionary.len(Role::Object),
            "ingestion finished"
        );

        listener.notify(33.0, "Reorganizing dictionary");
        let started = Instant::now();
        let (sections, remap) = reorganize_dictionary(&dictionary)?;
        drop(dictionary);
        debug!(elapsed = ?started.elapsed(), "dictionary reorganized");

        listener.notify(66.0, "Reorganizing triples");
        let started = Instant::now();
        let original_size = triples.original_size();
        let canonical = triples.reorganize(&remap)?;
        drop(remap);
        debug!(elapsed = ?started.elapsed(), "triples sorted");

        let header =
            Header::build(&config.base_uri, &sections, canonical.len() as u64, original_size);
        info!(
            shared = header.shared,
            subjects = header.subjects,
            predicates = header.predicates,
            objects = header.objects,
            triples = header.triples,
            original_size = header.original_size,
            "store assembled"
        );
        listener.notify(100.0, "Done");

        Ok(Hdt::new(header, sections, canonical, config.block_size))
    }

    /// Build a store from a sequence of sources, one after another.
    pub fn build<I, S, L>(config: BuildConfig, sources: I, listener: &mut L) -> Result<Hdt>
    where
        I: IntoIterator<Item = S>,
        S: TripleSource,
        L: ProgressListener + ?Sized,
    {
        let mut builder = HdtBuilder::new(config)?;
        for mut source in sources {
            builder.ingest(&mut source, listener)?;
        }
        builder.finish(listener)
    }
}
