//! Store header: descriptive metadata frozen after reorganization.

use serde::{Deserialize, Serialize};

use crate::core::Section;
use crate::error::{Error, Result};
use crate::storage::indexing::sections::FourSectionDictionary;

/// Format tag written into every header.
pub const FORMAT: &str = "hdt-forge/four-section";
/// Version of the header and container layout.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub base_uri: String,
    pub format: String,
    pub format_version: u16,
    pub shared: u64,
    pub subjects: u64,
    pub predicates: u64,
    pub objects: u64,
    pub triples: u64,
    /// Bytes of the source text: `len(s) + len(p) + len(o) + 4` per triple
    pub original_size: u64,
    /// UTF-8 bytes of all dictionary terms
    pub dictionary_bytes: u64,
}

impl Header {
    /// Capture the final statistics of a reorganized dataset.
    ///
    /// `original_size` is taken as accumulated during ingestion, not recomputed.
    pub fn build(
        base_uri: &str,
        dictionary: &FourSectionDictionary,
        triples: u64,
        original_size: u64,
    ) -> Self {
        let count = |section| dictionary.section(section).len() as u64;
        Self {
            base_uri: base_uri.to_string(),
            format: FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            shared: count(Section::Shared),
            subjects: count(Section::Subject),
            predicates: count(Section::Predicate),
            objects: count(Section::Object),
            triples,
            original_size,
            dictionary_bytes: dictionary.string_bytes(),
        }
    }

    pub fn section_len(&self, section: Section) -> u64 {
        match section {
            Section::Shared => self.shared,
            Section::Subject => self.subjects,
            Section::Predicate => self.predicates,
            Section::Object => self.objects,
        }
    }

    pub fn distinct_terms(&self) -> u64 {
        self.shared + self.subjects + self.predicates + self.objects
    }

    /// Header as ordered `(key, value)` pairs.
    pub fn properties(&self) -> Vec<(String, String)> {
        vec![
            ("_:dataset baseUri".to_string(), self.base_uri.clone()),
            ("_:dataset format".to_string(), self.format.clone()),
            ("_:dataset formatVersion".to_string(), self.format_version.to_string()),
            ("_:statistics triples".to_string(), self.triples.to_string()),
            ("_:statistics originalSize".to_string(), self.original_size.to_string()),
            ("_:dictionary sharedTerms".to_string(), self.shared.to_string()),
            ("_:dictionary subjects".to_string(), self.subjects.to_string()),
            ("_:dictionary predicates".to_string(), self.predicates.to_string()),
            ("_:dictionary objects".to_string(), self.objects.to_string()),
            ("_:dictionary sizeStrings".to_string(), self.dictionary_bytes.to_string()),
        ]
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header: Header =
            bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        if header.format_version != FORMAT_VERSION {
            return Err(Error::Format(format!(
                "unsupported header version {}",
                header.format_version
            )));
        }
        Ok(header)
    }
}
