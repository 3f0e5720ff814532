//! Store container: serializer and memory-mapped loader.
//!
//! ## Format
//!
//! All integers are little-endian.
//!
//! ```text
//! magic: "HDTF" (4B) | container version: u16
//! header:     len: u32 | bincode(Header) | crc32: u32
//! dictionary: per section (shared, subjects, predicates, objects):
//!               count: u64 | block_size: u32 | byte_len: u64 | front-coded bytes
//!             crc32 of the whole dictionary block: u32
//! triples:    count: u64 | count x 12-byte records | crc32: u32
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use memmap2::Mmap;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::encoding::{decode_record, RECORD_SIZE};
use crate::core::{Role, Section, SectionId, TripleId, TripleString};
use crate::error::{Error, Result};
use crate::storage::header::Header;
use crate::storage::indexing::sections::{DictionarySection, FourSectionDictionary};

/// Magic bytes opening every store file.
pub const MAGIC: [u8; 4] = *b"HDTF";
/// Container layout version.
pub const CONTAINER_VERSION: u16 = 1;

/// A finished, in-memory store as produced by the build pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hdt {
    header: Header,
    dictionary: FourSectionDictionary,
    triples: Vec<TripleId>,
    block_size: u32,
}

impl Hdt {
    pub(crate) fn new(
        header: Header,
        dictionary: FourSectionDictionary,
        triples: Vec<TripleId>,
        block_size: u32,
    ) -> Self {
        Self { header, dictionary, triples, block_size }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn dictionary(&self) -> &FourSectionDictionary {
        &self.dictionary
    }

    /// Canonical triples in (subject, predicate, object) order.
    pub fn triples(&self) -> &[TripleId] {
        &self.triples
    }

    /// Write the complete container to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&CONTAINER_VERSION.to_le_bytes())?;

        let header = self.header.to_bytes()?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| Error::Serialization("header larger than 4 GiB".to_string()))?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(&header)?;
        writer.write_all(&crc32fast::hash(&header).to_le_bytes())?;

        let mut hasher = crc32fast::Hasher::new();
        for section in Section::ALL {
            let terms = self.dictionary.section(section);
            let data = terms.encode(self.block_size);
            let mut prefix = [0u8; 20];
            prefix[0..8].copy_from_slice(&(terms.len() as u64).to_le_bytes());
            prefix[8..12].copy_from_slice(&self.block_size.to_le_bytes());
            prefix[12..20].copy_from_slice(&(data.len() as u64).to_le_bytes());
            hasher.update(&prefix);
            hasher.update(&data);
            writer.write_all(&prefix)?;
            writer.write_all(&data)?;
        }
        writer.write_all(&hasher.finalize().to_le_bytes())?;

        let mut hasher = crc32fast::Hasher::new();
        let count = (self.triples.len() as u64).to_le_bytes();
        hasher.update(&count);
        writer.write_all(&count)?;
        for triple in &self.triples {
            let record = triple.to_bytes();
            hasher.update(&record);
            writer.write_all(&record)?;
        }
        writer.write_all(&hasher.finalize().to_le_bytes())?;
        Ok(())
    }

    /// Write the store to `path`.
    ///
    /// The bytes go to a temporary file next to `path` that is renamed into
    /// place only once complete, so a failure never leaves a truncated store.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        info!(path = %path.display(), triples = self.triples.len(), "store written");
        Ok(())
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::Format(format!("truncated {}", what)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn len(&mut self, what: &str) -> Result<usize> {
        let value = self.u64(what)?;
        usize::try_from(value).map_err(|_| Error::Format(format!("{} {} too large", what, value)))
    }
}

fn check_crc(bytes: &[u8], stored: u32, what: &str) -> Result<()> {
    if crc32fast::hash(bytes) != stored {
        return Err(Error::Format(format!("{} checksum mismatch", what)));
    }
    Ok(())
}

fn check_preamble(magic: &[u8], version: u16) -> Result<()> {
    if magic != MAGIC {
        return Err(Error::Format("invalid magic, not a store file".to_string()));
    }
    if version != CONTAINER_VERSION {
        return Err(Error::Format(format!("unsupported container version {}", version)));
    }
    Ok(())
}

/// A loaded store. Header and dictionary are decoded into memory; triples are
/// served straight from the memory-mapped file.
#[derive(Debug)]
pub struct HdtStore {
    mmap: Mmap,
    header: Header,
    dictionary: FourSectionDictionary,
    triples_offset: usize,
    triple_count: usize,
    by_predicate: OnceLock<PredicateIndex>,
}

/// Triple positions grouped by predicate, each group in canonical order.
#[derive(Debug)]
struct PredicateIndex {
    offsets: Vec<usize>,
    positions: Vec<usize>,
}

impl HdtStore {
    /// Open and validate a store file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: stores are immutable once written; the map is only read.
        let mmap = unsafe { Mmap::map(&file)? };

        let mut cursor = Cursor::new(&mmap);
        let magic = cursor.take(4, "magic")?;
        let version = cursor.u16("container version")?;
        check_preamble(magic, version)?;

        let header_len = cursor.u32("header length")? as usize;
        let header_bytes = cursor.take(header_len, "header")?;
        check_crc(header_bytes, cursor.u32("header checksum")?, "header")?;
        let header = Header::from_bytes(header_bytes)?;

        let dictionary_start = cursor.pos;
        let mut sections = Vec::with_capacity(4);
        for section in Section::ALL {
            let count = cursor.u64("section count")?;
            let block_size = cursor.u32("section block size")?;
            let byte_len = cursor.len("section length")?;
            let data = cursor.take(byte_len, "section data")?;
            if count != header.section_len(section) {
                return Err(Error::Format(format!(
                    "{} section holds {} terms, header says {}",
                    section,
                    count,
                    header.section_len(section)
                )));
            }
            sections.push((count, block_size, data));
        }
        let dictionary_bytes = &mmap[dictionary_start..cursor.pos];
        check_crc(dictionary_bytes, cursor.u32("dictionary checksum")?, "dictionary")?;

        let dictionary = {
            let mut decoded = sections.into_iter().map(|(count, block_size, data)| {
                DictionarySection::decode(data, count, block_size)
            });
            let mut next = || {
                decoded
                    .next()
                    .unwrap_or_else(|| Err(Error::Format("missing dictionary section".to_string())))
            };
            FourSectionDictionary::from_sections(next()?, next()?, next()?, next()?)
        };

        let triples_start = cursor.pos;
        let triple_count = cursor.len("triple count")?;
        let records_len = triple_count
            .checked_mul(RECORD_SIZE)
            .ok_or_else(|| Error::Format(format!("triple count {} too large", triple_count)))?;
        cursor.take(records_len, "triples")?;
        let triples_bytes = &mmap[triples_start..cursor.pos];
        check_crc(triples_bytes, cursor.u32("triples checksum")?, "triples")?;
        if cursor.pos != mmap.len() {
            return Err(Error::Format(format!(
                "{} trailing bytes after triples",
                mmap.len() - cursor.pos
            )));
        }
        if triple_count as u64 != header.triples {
            return Err(Error::Format(format!(
                "file holds {} triples, header says {}",
                triple_count, header.triples
            )));
        }

        let store = Self {
            header,
            dictionary,
            triples_offset: triples_start + 8,
            triple_count,
            by_predicate: OnceLock::new(),
            mmap,
        };
        store.validate_triples()?;

        debug!(path = %path.display(), triples = triple_count, "store opened");
        Ok(store)
    }

    /// Read only the header of a store file, without touching the dictionary
    /// or triples.
    pub fn read_header(path: &Path) -> Result<Header> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut preamble = [0u8; 10];
        if file_len < preamble.len() as u64 {
            return Err(Error::Format("truncated preamble".to_string()));
        }
        let mut reader = BufReader::new(file);
        reader.read_exact(&mut preamble)?;
        check_preamble(&preamble[0..4], u16::from_le_bytes([preamble[4], preamble[5]]))?;

        let header_len = u32::from_le_bytes([preamble[6], preamble[7], preamble[8], preamble[9]]);
        // header bytes plus their checksum must fit in the file
        if u64::from(header_len) + 4 > file_len - preamble.len() as u64 {
            return Err(Error::Format("truncated header".to_string()));
        }
        let mut header_bytes = vec![0u8; header_len as usize];
        reader.read_exact(&mut header_bytes)?;
        let mut crc = [0u8; 4];
        reader.read_exact(&mut crc)?;
        check_crc(&header_bytes, u32::from_le_bytes(crc), "header")?;
        Header::from_bytes(&header_bytes)
    }

    fn validate_triples(&self) -> Result<()> {
        let limits = Role::ALL.map(|role| self.dictionary.role_len(role) as u64);
        let mut previous: Option<TripleId> = None;
        for position in 0..self.triple_count {
            let triple = self.triple_at(position);
            let ids = [triple.subject, triple.predicate, triple.object];
            for ((id, limit), role) in ids.iter().zip(limits).zip(Role::ALL) {
                if *id == 0 || u64::from(*id) > limit {
                    return Err(Error::Format(format!(
                        "triple {} has {} ID {} outside 1..={}",
                        position, role, id, limit
                    )));
                }
            }
            if previous.is_some_and(|p| p > triple) {
                return Err(Error::Format(format!("triples not sorted at {}", position)));
            }
            previous = Some(triple);
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn dictionary(&self) -> &FourSectionDictionary {
        &self.dictionary
    }

    pub fn section(&self, section: Section) -> &DictionarySection {
        self.dictionary.section(section)
    }

    pub fn len(&self) -> usize {
        self.triple_count
    }

    pub fn is_empty(&self) -> bool {
        self.triple_count == 0
    }

    /// Role-scoped ID of a term, as used inside triples.
    pub fn term_id(&self, value: &str, role: Role) -> Option<u32> {
        self.dictionary.term_id(value, role)
    }

    pub fn locate(&self, value: &str, role: Role) -> Option<SectionId> {
        self.dictionary.locate(value, role)
    }

    pub fn term_text(&self, sid: SectionId) -> Option<&str> {
        self.dictionary.term_text(sid)
    }

    pub fn id_to_term(&self, id: u32, role: Role) -> Option<&str> {
        self.dictionary.id_to_term(id, role)
    }

    fn triple_at(&self, position: usize) -> TripleId {
        let start = self.triples_offset + position * RECORD_SIZE;
        let mut record = [0u8; RECORD_SIZE];
        record.copy_from_slice(&self.mmap[start..start + RECORD_SIZE]);
        decode_record(&record)
    }

    /// First position in `range` where `before` turns false. `before` must be
    /// monotone over the canonical order.
    fn partition_point(&self, range: Range<usize>, before: impl Fn(&TripleId) -> bool) -> usize {
        let (mut lo, mut hi) = (range.start, range.end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(&self.triple_at(mid)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn subject_range(&self, subject: u32, predicate: Option<u32>) -> Range<usize> {
        let all = 0..self.triple_count;
        match predicate {
            None => {
                let start = self.partition_point(all.clone(), |t| t.subject < subject);
                let end = self.partition_point(start..all.end, |t| t.subject <= subject);
                start..end
            }
            Some(predicate) => {
                let key = (subject, predicate);
                let start = self.partition_point(all.clone(), |t| (t.subject, t.predicate) < key);
                let end =
                    self.partition_point(start..all.end, |t| (t.subject, t.predicate) <= key);
                start..end
            }
        }
    }

    fn predicate_index(&self) -> &PredicateIndex {
        self.by_predicate.get_or_init(|| {
            let predicates = self.dictionary.role_len(Role::Predicate);
            let mut offsets = vec![0usize; predicates + 2];
            for position in 0..self.triple_count {
                offsets[self.triple_at(position).predicate as usize + 1] += 1;
            }
            for i in 1..offsets.len() {
                offsets[i] += offsets[i - 1];
            }
            let mut fill = offsets.clone();
            let mut positions = vec![0usize; self.triple_count];
            for position in 0..self.triple_count {
                let predicate = self.triple_at(position).predicate as usize;
                positions[fill[predicate]] = position;
                fill[predicate] += 1;
            }
            debug!(predicates, "predicate index built");
            PredicateIndex { offsets, positions }
        })
    }

    /// Iterate triples in canonical order, restricted to the given IDs.
    ///
    /// A fixed subject (and optional predicate) is answered with a binary-searched
    /// range. A predicate alone uses a per-predicate position index built on first
    /// use. A fixed object filters whichever range applies.
    pub fn triples_matching(
        &self,
        subject: Option<u32>,
        predicate: Option<u32>,
        object: Option<u32>,
    ) -> TripleMatches<'_> {
        let positions = match (subject, predicate) {
            (Some(s), p) => Positions::Range(self.subject_range(s, p)),
            (None, Some(p)) => {
                let index = self.predicate_index();
                let p = p as usize;
                if p == 0 || p + 1 >= index.offsets.len() {
                    Positions::Range(0..0)
                } else {
                    Positions::Listed(index.positions[index.offsets[p]..index.offsets[p + 1]].iter())
                }
            }
            (None, None) => Positions::Range(0..self.triple_count),
        };
        TripleMatches { store: self, positions, object }
    }

    /// Iterate all triples in canonical order.
    pub fn triples(&self) -> TripleMatches<'_> {
        self.triples_matching(None, None, None)
    }

    /// Pattern lookup by term text; `None` stands for a variable. A bound term
    /// that is not in the dictionary matches nothing.
    pub fn triples_with_pattern<'a>(
        &'a self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> impl Iterator<Item = TripleString> + 'a {
        let resolve = |value: Option<&str>, role| match value {
            None => Some(None),
            Some(text) => self.term_id(text, role).map(Some),
        };
        let matches = match (
            resolve(subject, Role::Subject),
            resolve(predicate, Role::Predicate),
            resolve(object, Role::Object),
        ) {
            (Some(s), Some(p), Some(o)) => self.triples_matching(s, p, o),
            _ => TripleMatches { store: self, positions: Positions::Range(0..0), object: None },
        };
        matches.filter_map(move |t| self.resolve_triple(&t))
    }

    /// Translate an ID triple back to text.
    pub fn resolve_triple(&self, triple: &TripleId) -> Option<TripleString> {
        Some(TripleString::new(
            self.id_to_term(triple.subject, Role::Subject)?,
            self.id_to_term(triple.predicate, Role::Predicate)?,
            self.id_to_term(triple.object, Role::Object)?,
        ))
    }
}

#[derive(Debug)]
enum Positions<'a> {
    Range(Range<usize>),
    Listed(std::slice::Iter<'a, usize>),
}

/// Iterator over the triples selected by [`HdtStore::triples_matching`].
#[derive(Debug)]
pub struct TripleMatches<'a> {
    store: &'a HdtStore,
    positions: Positions<'a>,
    object: Option<u32>,
}

impl Iterator for TripleMatches<'_> {
    type Item = TripleId;

    fn next(&mut self) -> Option<TripleId> {
        loop {
            let position = match &mut self.positions {
                Positions::Range(range) => range.next()?,
                Positions::Listed(iter) => *iter.next()?,
            };
            let triple = self.store.triple_at(position);
            if self.object.map_or(true, |o| triple.object == o) {
                return Some(triple);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::indexing::dictionary::TempDictionary;
    use crate::storage::indexing::sections::reorganize_dictionary;
    use tempfile::tempdir;

    fn build(triples: &[(&str, &str, &str)]) -> Hdt {
        let mut dict = TempDictionary::new();
        let mut ids = Vec::new();
        for (s, p, o) in triples {
            ids.push(TripleId::new(
                dict.insert(s, Role::Subject).unwrap(),
                dict.insert(p, Role::Predicate).unwrap(),
                dict.insert(o, Role::Object).unwrap(),
            ));
        }
        let (sections, remap) = reorganize_dictionary(&dict).unwrap();
        let mut canonical: Vec<TripleId> = ids
            .iter()
            .map(|t| {
                TripleId::new(
                    remap.role_id(Role::Subject, t.subject).unwrap(),
                    remap.role_id(Role::Predicate, t.predicate).unwrap(),
                    remap.role_id(Role::Object, t.object).unwrap(),
                )
            })
            .collect();
        canonical.sort();
        let header = Header::build("uri:unused", &sections, canonical.len() as u64, 0);
        Hdt::new(header, sections, canonical, 4)
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        let hdt = build(&[("a", "p", "b"), ("b", "p", "c"), ("a", "q", "c")]);
        hdt.save_to_file(&path).unwrap();

        let store = HdtStore::open(&path).unwrap();
        assert_eq!(store.header(), hdt.header());
        assert_eq!(store.dictionary(), hdt.dictionary());
        assert_eq!(store.triples().collect::<Vec<_>>(), hdt.triples());
    }

    #[test]
    fn test_subject_and_predicate_ranges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        build(&[("a", "p", "b"), ("a", "q", "c"), ("a", "p", "d"), ("b", "p", "c")])
            .save_to_file(&path)
            .unwrap();
        let store = HdtStore::open(&path).unwrap();

        let a = store.term_id("a", Role::Subject).unwrap();
        let p = store.term_id("p", Role::Predicate).unwrap();

        assert_eq!(store.triples_matching(Some(a), None, None).count(), 3);
        assert_eq!(store.triples_matching(Some(a), Some(p), None).count(), 2);
        assert_eq!(store.triples_matching(None, Some(p), None).count(), 3);
        assert_eq!(store.triples_matching(Some(u32::MAX), None, None).count(), 0);
        assert_eq!(store.triples_matching(None, Some(99), None).count(), 0);

        let objects: Vec<String> =
            store.triples_with_pattern(Some("a"), Some("p"), None).map(|t| t.object).collect();
        assert_eq!(objects, vec!["b", "d"]);
        assert_eq!(store.triples_with_pattern(Some("zzz"), None, None).count(), 0);
    }

    #[test]
    fn test_read_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        let hdt = build(&[("s", "p", "o")]);
        hdt.save_to_file(&path).unwrap();

        assert_eq!(HdtStore::read_header(&path).unwrap(), *hdt.header());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.hdt");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00\x00\x00").unwrap();

        assert!(matches!(HdtStore::open(&path), Err(Error::Format(_))));
        assert!(matches!(HdtStore::read_header(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_oversized_header_length_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.hdt");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(HdtStore::read_header(&path), Err(Error::Format(_))));
        assert!(matches!(HdtStore::open(&path), Err(Error::Format(_))));

        std::fs::write(&path, &MAGIC).unwrap();
        assert!(matches!(HdtStore::read_header(&path), Err(Error::Format(_))));
    }
}
