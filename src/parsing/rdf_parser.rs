//! Triple sources feeding the build pipeline.
//!
//! Terms are handed over in HDT text form: IRIs without angle brackets,
//! literals and blank nodes in N-Triples syntax.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Quad, Term};

use crate::core::TripleString;
use crate::error::{Error, Result};

/// Pull-based supplier of parsed triples.
///
/// `Ok(None)` signals end of input; an `Err` aborts the build.
pub trait TripleSource {
    fn next_triple(&mut self) -> Result<Option<TripleString>>;
}

impl<T: TripleSource + ?Sized> TripleSource for &mut T {
    fn next_triple(&mut self) -> Result<Option<TripleString>> {
        (**self).next_triple()
    }
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct VecSource {
    triples: std::vec::IntoIter<TripleString>,
}

impl VecSource {
    pub fn new(triples: Vec<TripleString>) -> Self {
        Self { triples: triples.into_iter() }
    }
}

impl TripleSource for VecSource {
    fn next_triple(&mut self) -> Result<Option<TripleString>> {
        Ok(self.triples.next())
    }
}

/// RDF dump on disk, parsed with oxigraph. The named graph of quads is dropped.
pub struct RdfFileSource {
    quads: Box<dyn Iterator<Item = Result<Quad>>>,
}

impl RdfFileSource {
    /// Open `path`, picking the syntax from its extension (`nt`, `nq`, `ttl`, `trig`).
    pub fn open(path: &Path, base_uri: &str) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .ok_or_else(|| {
                Error::Source(format!("cannot infer RDF syntax of {}", path.display()))
            })?;
        Self::with_format(path, format, base_uri)
    }

    pub fn with_format(path: &Path, format: RdfFormat, base_uri: &str) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Source(format!("cannot open {}: {}", path.display(), e)))?;
        let parser = RdfParser::from_format(format)
            .with_base_iri(base_uri)
            .map_err(|e| Error::Config(format!("invalid base IRI {}: {}", base_uri, e)))?;

        let origin = path.display().to_string();
        let quads = parser
            .for_reader(BufReader::new(file))
            .map(move |quad| quad.map_err(|e| Error::Source(format!("{}: {}", origin, e))));
        Ok(Self { quads: Box::new(quads) })
    }
}

impl TripleSource for RdfFileSource {
    fn next_triple(&mut self) -> Result<Option<TripleString>> {
        let Some(quad) = self.quads.next().transpose()? else {
            return Ok(None);
        };
        Ok(Some(TripleString {
            subject: term_to_text(Term::from(quad.subject)),
            predicate: quad.predicate.into_string(),
            object: term_to_text(quad.object),
        }))
    }
}

fn term_to_text(term: Term) -> String {
    match term {
        Term::NamedNode(node) => node.into_string(),
        other => other.to_string(),
    }
}

/// Read a dump list: one path per line, blank lines and `#` comments skipped.
/// Relative entries resolve against the list file's directory.
pub fn read_dump_list(path: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(path)
        .map_err(|e| Error::Source(format!("cannot open dump list {}: {}", path.display(), e)))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut dumps = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        dumps.push(base.join(entry));
    }
    Ok(dumps)
}
