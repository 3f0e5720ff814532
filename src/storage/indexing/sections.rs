//! Four-section dictionary and the reorganization that produces it.
//!
//! After ingestion the role-scoped provisional tables are partitioned into
//! shared (subject and object), subject-only, predicate and object-only
//! sections. Each section is sorted by byte order and its terms are numbered
//! `1..=N` by rank.
//!
//! Inside triples, subject and object IDs are role-scoped: shared terms occupy
//! `1..=|shared|` and the exclusive sections follow, so a single integer is
//! unambiguous per position.

use std::sync::Arc;

use crate::core::encoding::{decode_varint, encode_varint};
use crate::core::{Role, Section, SectionId};
use crate::error::{Error, Result};
use crate::storage::indexing::dictionary::TempDictionary;

/// A sorted, duplicate-free run of terms. Term `k` (1-based) has final ID `k`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionarySection {
    terms: Vec<Arc<str>>,
}

impl DictionarySection {
    fn from_unsorted(mut terms: Vec<Arc<str>>) -> Self {
        terms.sort_unstable();
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.terms.get(index).map(|s| &**s)
    }

    pub fn locate(&self, value: &str) -> Option<u32> {
        self.terms
            .binary_search_by(|probe| (**probe).cmp(value))
            .ok()
            .map(|index| index as u32 + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.iter().map(|s| &**s)
    }

    /// Total UTF-8 bytes of all terms.
    pub fn string_bytes(&self) -> u64 {
        self.terms.iter().map(|t| t.len() as u64).sum()
    }

    /// Front-code the section.
    ///
    /// The first term of every block is stored whole (`len bytes`); the rest
    /// store `shared_prefix_len suffix_len suffix` against their predecessor.
    pub fn encode(&self, block_size: u32) -> Vec<u8> {
        let block_size = block_size.max(1) as usize;
        let mut out = Vec::new();
        let mut previous: &[u8] = &[];

        for (i, term) in self.terms.iter().enumerate() {
            let bytes = term.as_bytes();
            if i % block_size == 0 {
                encode_varint(bytes.len() as u64, &mut out);
                out.extend_from_slice(bytes);
            } else {
                let shared = previous.iter().zip(bytes).take_while(|(a, b)| a == b).count();
                encode_varint(shared as u64, &mut out);
                encode_varint((bytes.len() - shared) as u64, &mut out);
                out.extend_from_slice(&bytes[shared..]);
            }
            previous = bytes;
        }
        out
    }

    /// Inverse of [`DictionarySection::encode`]. Rejects truncated, trailing or
    /// out-of-order data.
    pub fn decode(data: &[u8], count: u64, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::Format("section block size is zero".to_string()));
        }
        let block_size = block_size as usize;
        let count = usize::try_from(count)
            .map_err(|_| Error::Format(format!("section count {} too large", count)))?;

        let mut terms: Vec<Arc<str>> = Vec::with_capacity(count.min(data.len()));
        let mut previous: Vec<u8> = Vec::new();
        let mut pos = 0usize;

        for i in 0..count {
            let mut bytes = Vec::new();
            if i % block_size != 0 {
                let shared = decode_varint(data, &mut pos)? as usize;
                if shared > previous.len() {
                    return Err(Error::Format(format!(
                        "term {} shares {} bytes with a {}-byte predecessor",
                        i,
                        shared,
                        previous.len()
                    )));
                }
                bytes.extend_from_slice(&previous[..shared]);
            }
            let len = decode_varint(data, &mut pos)? as usize;
            let end = pos
                .checked_add(len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| Error::Format(format!("term {} truncated", i)))?;
            bytes.extend_from_slice(&data[pos..end]);
            pos = end;

            let term = std::str::from_utf8(&bytes)
                .map_err(|e| Error::Format(format!("term {} is not UTF-8: {}", i, e)))?;
            if let Some(last) = terms.last() {
                if **last >= *term {
                    return Err(Error::Format(format!("section not strictly sorted at {}", i)));
                }
            }
            terms.push(Arc::from(term));
            previous = bytes;
        }

        if pos != data.len() {
            return Err(Error::Format(format!(
                "{} trailing bytes after section",
                data.len() - pos
            )));
        }
        Ok(Self { terms })
    }
}

/// ID used inside triples: exclusive subject and object sections continue
/// after the shared range.
fn role_scoped(sid: SectionId, shared_count: u32) -> u32 {
    match sid.section {
        Section::Shared | Section::Predicate => sid.id,
        Section::Subject | Section::Object => shared_count + sid.id,
    }
}

/// Shared, subject, predicate and object sections with role-aware lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FourSectionDictionary {
    sections: [DictionarySection; 4],
}

impl FourSectionDictionary {
    pub fn from_sections(
        shared: DictionarySection,
        subjects: DictionarySection,
        predicates: DictionarySection,
        objects: DictionarySection,
    ) -> Self {
        Self { sections: [shared, subjects, predicates, objects] }
    }

    pub fn section(&self, section: Section) -> &DictionarySection {
        &self.sections[section.index()]
    }

    pub fn shared_count(&self) -> u32 {
        self.section(Section::Shared).len() as u32
    }

    pub fn string_bytes(&self) -> u64 {
        self.sections.iter().map(DictionarySection::string_bytes).sum()
    }

    /// Final (section, ID) of `value` when used in `role`.
    pub fn locate(&self, value: &str, role: Role) -> Option<SectionId> {
        let exclusive = match role {
            Role::Predicate => {
                return self
                    .section(Section::Predicate)
                    .locate(value)
                    .map(|id| SectionId::new(Section::Predicate, id));
            }
            Role::Subject => Section::Subject,
            Role::Object => Section::Object,
        };
        if let Some(id) = self.section(Section::Shared).locate(value) {
            return Some(SectionId::new(Section::Shared, id));
        }
        self.section(exclusive).locate(value).map(|id| SectionId::new(exclusive, id))
    }

    /// Role-scoped ID of `value`, as it appears inside triples.
    pub fn term_id(&self, value: &str, role: Role) -> Option<u32> {
        self.locate(value, role).map(|sid| self.to_role_id(sid))
    }

    pub fn term_text(&self, sid: SectionId) -> Option<&str> {
        self.section(sid.section).get(sid.id)
    }

    pub fn id_to_term(&self, id: u32, role: Role) -> Option<&str> {
        self.from_role_id(id, role).and_then(|sid| self.term_text(sid))
    }

    pub fn to_role_id(&self, sid: SectionId) -> u32 {
        role_scoped(sid, self.shared_count())
    }

    /// Map a role-scoped ID back to its section. Returns `None` for 0 or for IDs
    /// beyond the role's range.
    pub fn from_role_id(&self, id: u32, role: Role) -> Option<SectionId> {
        if id == 0 {
            return None;
        }
        let sid = match role {
            Role::Predicate => SectionId::new(Section::Predicate, id),
            Role::Subject | Role::Object if id <= self.shared_count() => {
                SectionId::new(Section::Shared, id)
            }
            Role::Subject => SectionId::new(Section::Subject, id - self.shared_count()),
            Role::Object => SectionId::new(Section::Object, id - self.shared_count()),
        };
        (sid.id as usize <= self.section(sid.section).len()).then_some(sid)
    }

    /// Number of distinct IDs usable in `role`.
    pub fn role_len(&self, role: Role) -> usize {
        match role {
            Role::Subject => self.sections[0].len() + self.sections[1].len(),
            Role::Predicate => self.sections[2].len(),
            Role::Object => self.sections[0].len() + self.sections[3].len(),
        }
    }
}

/// Provisional ID to final ID mapping, one table per role.
#[derive(Debug, Default)]
pub struct IdRemap {
    tables: [Vec<SectionId>; 3],
    shared_count: u32,
}

impl IdRemap {
    pub fn get(&self, role: Role, provisional: u32) -> Option<SectionId> {
        let index = usize::try_from(provisional).ok()?.checked_sub(1)?;
        self.tables[role.index()].get(index).copied()
    }

    /// Role-scoped final ID for a provisional ID; a miss is an invariant violation.
    pub fn role_id(&self, role: Role, provisional: u32) -> Result<u32> {
        let sid = self.get(role, provisional).ok_or_else(|| {
            Error::Invariant(format!("no final ID for provisional {} {}", role, provisional))
        })?;
        Ok(role_scoped(sid, self.shared_count))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(Vec::is_empty)
    }
}

/// Partition the provisional tables into four sorted sections and compute the
/// remap table.
pub fn reorganize_dictionary(
    dict: &TempDictionary,
) -> Result<(FourSectionDictionary, IdRemap)> {
    let mut shared = Vec::new();
    let mut subjects = Vec::new();
    for term in dict.terms(Role::Subject) {
        if dict.lookup(term, Role::Object).is_some() {
            shared.push(Arc::clone(term));
        } else {
            subjects.push(Arc::clone(term));
        }
    }
    let objects: Vec<Arc<str>> = dict
        .terms(Role::Object)
        .iter()
        .filter(|term| dict.lookup(term, Role::Subject).is_none())
        .cloned()
        .collect();
    let predicates = dict.terms(Role::Predicate).to_vec();

    let sections = FourSectionDictionary::from_sections(
        DictionarySection::from_unsorted(shared),
        DictionarySection::from_unsorted(subjects),
        DictionarySection::from_unsorted(predicates),
        DictionarySection::from_unsorted(objects),
    );

    let mut remap = IdRemap { shared_count: sections.shared_count(), ..Default::default() };
    for role in Role::ALL {
        let table = &mut remap.tables[role.index()];
        table.reserve_exact(dict.len(role));
        for term in dict.terms(role) {
            let sid = sections.locate(term, role).ok_or_else(|| {
                Error::Invariant(format!("{} term {:?} missing from every section", role, term))
            })?;
            table.push(sid);
        }
    }

    Ok((sections, remap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(terms: &[&str]) -> DictionarySection {
        DictionarySection::from_unsorted(terms.iter().map(|t| Arc::from(*t)).collect())
    }

    #[test]
    fn test_shared_terms_are_partitioned() {
        let mut dict = TempDictionary::new();
        dict.insert("a", Role::Subject).unwrap();
        dict.insert("p", Role::Predicate).unwrap();
        dict.insert("b", Role::Object).unwrap();
        dict.insert("b", Role::Subject).unwrap();
        dict.insert("c", Role::Object).unwrap();

        let (sections, remap) = reorganize_dictionary(&dict).unwrap();

        let collect = |s: Section| sections.section(s).iter().map(str::to_string).collect::<Vec<_>>();
        assert_eq!(collect(Section::Shared), vec!["b"]);
        assert_eq!(collect(Section::Subject), vec!["a"]);
        assert_eq!(collect(Section::Predicate), vec!["p"]);
        assert_eq!(collect(Section::Object), vec!["c"]);

        // "b" is provisional subject 2 and provisional object 1
        assert_eq!(remap.get(Role::Subject, 2), Some(SectionId::new(Section::Shared, 1)));
        assert_eq!(remap.get(Role::Object, 1), Some(SectionId::new(Section::Shared, 1)));
        assert_eq!(remap.role_id(Role::Subject, 1).unwrap(), 2);
        assert_eq!(remap.role_id(Role::Object, 2).unwrap(), 2);
    }

    #[test]
    fn test_final_ids_follow_sorted_order() {
        let mut dict = TempDictionary::new();
        for term in ["zeta", "alpha", "mu", "Beta"] {
            dict.insert(term, Role::Subject).unwrap();
        }

        let (sections, remap) = reorganize_dictionary(&dict).unwrap();
        let subjects = sections.section(Section::Subject);

        assert_eq!(subjects.iter().collect::<Vec<_>>(), vec!["Beta", "alpha", "mu", "zeta"]);
        assert_eq!(subjects.locate("mu"), Some(3));
        assert_eq!(remap.get(Role::Subject, 1), Some(SectionId::new(Section::Subject, 4)));
    }

    #[test]
    fn test_remap_matches_dictionary_role_ids() {
        let mut dict = TempDictionary::new();
        let inserts =
            [("x", Role::Subject), ("y", Role::Object), ("x", Role::Object), ("w", Role::Subject)];
        for (term, role) in inserts {
            dict.insert(term, role).unwrap();
        }

        let (sections, remap) = reorganize_dictionary(&dict).unwrap();
        for role in [Role::Subject, Role::Object] {
            for (i, term) in dict.terms(role).iter().enumerate() {
                let provisional = i as u32 + 1;
                assert_eq!(
                    remap.role_id(role, provisional).unwrap(),
                    sections.term_id(term, role).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_empty_dictionary_reorganizes() {
        let (sections, remap) = reorganize_dictionary(&TempDictionary::new()).unwrap();

        for s in Section::ALL {
            assert!(sections.section(s).is_empty());
        }
        assert!(remap.is_empty());
    }

    #[test]
    fn test_unknown_provisional_id_is_invariant_violation() {
        let (_, remap) = reorganize_dictionary(&TempDictionary::new()).unwrap();
        assert!(matches!(remap.role_id(Role::Object, 7), Err(Error::Invariant(_))));
    }

    #[test]
    fn test_role_id_round_trip() {
        let dict = FourSectionDictionary::from_sections(
            section(&["b", "d"]),
            section(&["a"]),
            section(&["p", "q"]),
            section(&["c", "e", "f"]),
        );

        assert_eq!(dict.term_id("b", Role::Object), Some(1));
        assert_eq!(dict.term_id("e", Role::Object), Some(4));
        assert_eq!(dict.term_id("a", Role::Subject), Some(3));
        assert_eq!(dict.term_id("a", Role::Object), None);
        assert_eq!(dict.term_id("q", Role::Predicate), Some(2));

        assert_eq!(dict.id_to_term(4, Role::Object), Some("e"));
        assert_eq!(dict.id_to_term(3, Role::Subject), Some("a"));
        assert_eq!(dict.id_to_term(4, Role::Subject), None);
        assert_eq!(dict.id_to_term(0, Role::Predicate), None);
        assert_eq!(dict.role_len(Role::Object), 5);
    }

    #[test]
    fn test_front_coding_round_trip_with_shared_prefixes() {
        let terms = section(&[
            "http://example.org/a",
            "http://example.org/ab",
            "http://example.org/b",
            "http://example.org/é",
            "http://example.org/ê",
            "x\0y",
        ]);

        for block_size in [1, 2, 4, 16] {
            let bytes = terms.encode(block_size);
            let decoded = DictionarySection::decode(&bytes, terms.len() as u64, block_size).unwrap();
            assert_eq!(decoded, terms);
        }
    }

    #[test]
    fn test_front_coding_compresses_common_prefixes() {
        let terms = section(&["http://example.org/resource/1", "http://example.org/resource/2"]);
        let whole: usize = terms.iter().map(str::len).sum();
        assert!(terms.encode(16).len() < whole);
    }

    #[test]
    fn test_decode_rejects_trailing_and_truncated_data() {
        let terms = section(&["a", "b"]);
        let mut bytes = terms.encode(4);

        assert!(matches!(DictionarySection::decode(&bytes, 1, 4), Err(Error::Format(_))));
        assert!(matches!(DictionarySection::decode(&bytes, 3, 4), Err(Error::Format(_))));

        bytes.truncate(bytes.len() - 1);
        assert!(matches!(DictionarySection::decode(&bytes, 2, 4), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_rejects_unsorted_section() {
        let mut bytes = Vec::new();
        for term in ["b", "a"] {
            encode_varint(term.len() as u64, &mut bytes);
            bytes.extend_from_slice(term.as_bytes());
        }
        assert!(matches!(DictionarySection::decode(&bytes, 2, 1), Err(Error::Format(_))));
    }
}
