//! End-to-end build scenarios: streaming ingestion, reorganization and the
//! resulting in-memory store.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hdt_forge::config::BuildConfig;
use hdt_forge::core::{Role, Section, SectionId, TripleId, TripleString};
use hdt_forge::parsing::rdf_parser::{TripleSource, VecSource};
use hdt_forge::storage::builder::{HdtBuilder, NoProgress};
use hdt_forge::storage::hdt_file::Hdt;
use hdt_forge::{Error, Result};

fn source(triples: &[(&str, &str, &str)]) -> VecSource {
    VecSource::new(triples.iter().map(|(s, p, o)| TripleString::new(s, p, o)).collect())
}

fn build(triples: &[(&str, &str, &str)]) -> Hdt {
    HdtBuilder::build(BuildConfig::default(), [source(triples)], &mut NoProgress).unwrap()
}

fn section_terms(hdt: &Hdt, section: Section) -> Vec<String> {
    hdt.dictionary().section(section).iter().map(str::to_string).collect()
}

/// Yields some triples, then fails like a truncated download would.
struct FailingSource {
    remaining: u32,
}

impl TripleSource for FailingSource {
    fn next_triple(&mut self) -> Result<Option<TripleString>> {
        if self.remaining == 0 {
            return Err(Error::Source("connection reset".to_string()));
        }
        self.remaining -= 1;
        Ok(Some(TripleString::new(&format!("s{}", self.remaining), "p", "o")))
    }
}

#[test]
fn test_shared_term_scenario() {
    let hdt = build(&[("a", "p", "b"), ("b", "p", "c")]);

    assert_eq!(section_terms(&hdt, Section::Shared), vec!["b"]);
    assert_eq!(section_terms(&hdt, Section::Subject), vec!["a"]);
    assert_eq!(section_terms(&hdt, Section::Object), vec!["c"]);
    assert_eq!(section_terms(&hdt, Section::Predicate), vec!["p"]);

    // b is shared (1), a is subject-only (|SH| + 1), c is object-only (|SH| + 1)
    assert_eq!(hdt.triples(), &[TripleId::new(1, 1, 2), TripleId::new(2, 1, 1)]);

    let header = hdt.header();
    assert_eq!((header.shared, header.subjects, header.predicates, header.objects), (1, 1, 1, 1));
    assert_eq!(header.triples, 2);
}

#[test]
fn test_empty_input_builds_empty_store() {
    let hdt = build(&[]);

    for section in Section::ALL {
        assert!(hdt.dictionary().section(section).is_empty());
    }
    assert!(hdt.triples().is_empty());

    let header = hdt.header();
    assert_eq!(header.triples, 0);
    assert_eq!(header.distinct_terms(), 0);
    assert_eq!(header.original_size, 0);
    assert_eq!(header.base_uri, "uri:unused");
}

#[test]
fn test_nul_and_unicode_terms_round_trip() {
    let odd = "nul\0inside";
    let unicode = "\u{1F600} caf\u{e9} \u{65e5}\u{672c}";
    let hdt = build(&[(odd, "p", unicode), (unicode, "p", "x")]);
    let dict = hdt.dictionary();

    let sid = dict.locate(odd, Role::Subject).unwrap();
    assert_eq!(sid.section, Section::Subject);
    assert_eq!(dict.term_text(sid), Some(odd));

    let sid = dict.locate(unicode, Role::Object).unwrap();
    assert_eq!(sid, SectionId::new(Section::Shared, 1));
    assert_eq!(dict.term_text(sid), Some(unicode));
}

#[test]
fn test_duplicate_statements_are_preserved() {
    let hdt = build(&[("s", "p", "o"), ("s", "p", "o"), ("s", "p", "o")]);

    assert_eq!(hdt.triples(), &[TripleId::new(1, 1, 1); 3]);
    assert_eq!(hdt.header().triples, 3);
    assert_eq!(hdt.header().original_size, 3 * (1 + 1 + 1 + 4));
}

#[test]
fn test_original_size_counts_utf8_bytes() {
    let hdt = build(&[("\u{e9}", "p", "o")]);
    assert_eq!(hdt.header().original_size, 2 + 1 + 1 + 4);
}

#[test]
fn test_multiple_dumps_share_one_dictionary() {
    let mut builder = HdtBuilder::new(BuildConfig::default()).unwrap();
    let first = builder.ingest(&mut source(&[("a", "p", "b")]), &mut NoProgress).unwrap();
    let second = builder.ingest(&mut source(&[("b", "q", "c"), ("a", "p", "c")]), &mut NoProgress).unwrap();
    assert_eq!((first, second), (1, 2));

    let hdt = builder.finish(&mut NoProgress).unwrap();
    assert_eq!(section_terms(&hdt, Section::Shared), vec!["b"]);
    assert_eq!(section_terms(&hdt, Section::Predicate), vec!["p", "q"]);
    assert_eq!(hdt.header().triples, 3);
}

#[test]
fn test_source_error_aborts_build() {
    let mut builder = HdtBuilder::new(BuildConfig::default()).unwrap();
    let err = builder.ingest(&mut FailingSource { remaining: 5 }, &mut NoProgress).unwrap_err();

    assert!(matches!(err, Error::Source(_)));
    assert!(builder.is_empty());
    assert!(builder.is_failed());
    assert!(matches!(builder.finish(&mut NoProgress), Err(Error::Source(_))));
}

#[test]
fn test_triple_limit_blocks_partial_store() {
    let config = BuildConfig { max_triples: Some(1), ..Default::default() };
    let mut builder = HdtBuilder::new(config).unwrap();
    let err = builder
        .ingest(&mut source(&[("a", "p", "b"), ("x", "q", "y")]), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted(_)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.hdt");
    let finished = builder.finish(&mut NoProgress).map(|hdt| hdt.save_to_file(&path));
    assert!(matches!(finished, Err(Error::ResourceExhausted(_))));
    assert!(!path.exists());
}

#[test]
fn test_cancellation_reports_progress() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut builder =
        HdtBuilder::new(BuildConfig::default()).unwrap().with_cancel_flag(Arc::clone(&flag));
    builder.ingest(&mut source(&[("a", "p", "b"), ("c", "p", "d")]), &mut NoProgress).unwrap();

    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let err = builder.ingest(&mut source(&[("e", "p", "f")]), &mut NoProgress).unwrap_err();
    assert!(matches!(err, Error::Cancelled(2)));
    assert!(matches!(builder.finish(&mut NoProgress), Err(Error::Cancelled(2))));
}

#[test]
fn test_custom_base_uri_lands_in_header() {
    let config = BuildConfig { base_uri: "http://example.org/".to_string(), ..Default::default() };
    let hdt = HdtBuilder::build(config, [source(&[("a", "p", "b")])], &mut NoProgress).unwrap();
    assert_eq!(hdt.header().base_uri, "http://example.org/");
}
