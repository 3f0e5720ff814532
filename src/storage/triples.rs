//! Triple accumulation during ingestion and canonical reordering afterwards.

use crate::core::{Role, TripleId};
use crate::error::{Error, Result};
use crate::storage::indexing::sections::IdRemap;

/// Append-only sequence of provisional ID triples in arrival order.
#[derive(Debug, Default)]
pub struct TempTriples {
    triples: Vec<TripleId>,
    original_size: u64,
    max_triples: Option<u64>,
}

impl TempTriples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator that refuses to grow beyond `max_triples`.
    pub fn with_limit(max_triples: Option<u64>) -> Self {
        Self { max_triples, ..Self::default() }
    }

    /// Make room for one more triple, failing if the ceiling is reached or the
    /// buffer cannot grow.
    pub fn ensure_room(&mut self) -> Result<()> {
        if let Some(limit) = self.max_triples {
            if self.triples.len() as u64 >= limit {
                return Err(Error::ResourceExhausted(format!(
                    "triple limit of {} reached",
                    limit
                )));
            }
        }
        if self.triples.len() == self.triples.capacity() {
            self.triples.try_reserve(self.triples.len().max(1024)).map_err(|e| {
                Error::ResourceExhausted(format!(
                    "cannot grow triple buffer past {} entries: {}",
                    self.triples.len(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Append a triple; `text_len` is its contribution to the original-size figure.
    pub fn append(&mut self, triple: TripleId, text_len: u64) -> Result<()> {
        self.ensure_room()?;
        self.triples.push(triple);
        self.original_size += text_len;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn as_slice(&self) -> &[TripleId] {
        &self.triples
    }

    /// Sum of `len(s) + len(p) + len(o) + 4` over every appended triple.
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Rewrite every triple through `remap` and sort into canonical order.
    ///
    /// Duplicate statements are kept as distinct entries.
    pub fn reorganize(self, remap: &IdRemap) -> Result<Vec<TripleId>> {
        let mut triples = self.triples;
        for triple in &mut triples {
            *triple = TripleId {
                subject: remap.role_id(Role::Subject, triple.subject)?,
                predicate: remap.role_id(Role::Predicate, triple.predicate)?,
                object: remap.role_id(Role::Object, triple.object)?,
            };
        }
        triples.sort_unstable();
        Ok(triples)
    }
}
