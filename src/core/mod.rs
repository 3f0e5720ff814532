//! Core data structures and types for the hdt-forge pipeline

use std::fmt;

/// Position a term occupies inside a triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Subject,
    Predicate,
    Object,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Subject, Role::Predicate, Role::Object];

    pub(crate) fn index(self) -> usize {
        match self {
            Role::Subject => 0,
            Role::Predicate => 1,
            Role::Object => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Subject => write!(f, "subject"),
            Role::Predicate => write!(f, "predicate"),
            Role::Object => write!(f, "object"),
        }
    }
}

/// One of the four dictionary partitions.
///
/// The declaration order is also the order in which sections are written to a
/// store file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Terms used both as subject and as object
    Shared,
    Subject,
    Predicate,
    Object,
}

impl Section {
    pub const ALL: [Section; 4] =
        [Section::Shared, Section::Subject, Section::Predicate, Section::Object];

    pub(crate) fn index(self) -> usize {
        match self {
            Section::Shared => 0,
            Section::Subject => 1,
            Section::Predicate => 2,
            Section::Object => 3,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Shared => write!(f, "shared"),
            Section::Subject => write!(f, "subjects"),
            Section::Predicate => write!(f, "predicates"),
            Section::Object => write!(f, "objects"),
        }
    }
}

/// A final dictionary ID: the 1-based rank of a term inside its section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId {
    pub section: Section,
    pub id: u32,
}

impl SectionId {
    pub fn new(section: Section, id: u32) -> Self {
        Self { section, id }
    }
}

/// Triple of integer IDs.
///
/// During ingestion the IDs are provisional and role-scoped; after
/// reorganization they are the role-scoped final IDs stored in the file.
/// Derived ordering is the canonical (subject, predicate, object) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleId {
    pub subject: u32,
    pub predicate: u32,
    pub object: u32,
}

impl TripleId {
    pub fn new(subject: u32, predicate: u32, object: u32) -> Self {
        Self { subject, predicate, object }
    }
}

/// User-facing triple with the term texts as delivered by the RDF parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleString {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl TripleString {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }

    /// Contribution of this triple to the header's original-size figure:
    /// the three texts plus two separators, a final dot and a newline.
    pub fn serialized_len(&self) -> u64 {
        (self.subject.len() + self.predicate.len() + self.object.len() + 4) as u64
    }
}

pub mod encoding;
pub use encoding::*;
