// Import, export and snapshot round trips through the filesystem

use dialogue_annotator::{Annotation, Annotator, AnnotatorConfig, Taxonomy};
use std::fs;

const TAXONOMY: &str = r#"{
    "name": "persistence",
    "default": "task",
    "labels": {"task": ["inform", "greet"]},
    "qualifiers": {"task": ["partial"]},
    "links": {"answer": null}
}"#;

const TRANSCRIPT: &str = "id\tsegment\traw\tparticipant\tdatetime\tnote\tlinks\ttask\ttask-value
a\thello there\thello there how are you\tP1\t01-03-18 10:00:00\t\t\tgreet\t
b\thow are you\t\t\\\t\t\t\t\t
c\tfine\tfine\tP2\t01-03-18 10:00:09\tshort\tb-answer\tinform\tpartial
";

fn annotator() -> Annotator {
    let mut a = Annotator::new(AnnotatorConfig::default());
    a.set_taxonomy(Taxonomy::from_json_str(TAXONOMY).unwrap());
    a
}

#[test]
fn test_tsv_import_lands_in_legacy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transcript.tsv");
    fs::write(&path, TRANSCRIPT).unwrap();

    let mut a = annotator();
    a.import(&path).unwrap();
    let c = a.collection();
    assert_eq!(c.len(), 3);
    assert!(!a.can_undo());

    let texts: Vec<&str> = c.full().map(|s| s.raw()).collect();
    assert_eq!(texts, vec!["hello there", "how are you", "fine"]);
    let b = c.segment(&"b".into()).unwrap();
    assert_eq!(b.participant, "P1");

    let fine = c.segment(&"c".into()).unwrap();
    assert!(fine.annotations.is_empty());
    assert_eq!(
        fine.legacy_annotation("task"),
        Some(&Annotation::label("inform").with_qualifier("partial"))
    );
    assert!(fine.outgoing().is_empty());
    assert_eq!(fine.legacy_links().len(), 1);
    c.check_invariants().unwrap();
}

#[test]
fn test_promotion_then_tsv_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("transcript.tsv");
    fs::write(&source, TRANSCRIPT).unwrap();

    let mut a = annotator();
    a.import(&source).unwrap();
    a.promote_legacy().unwrap();

    let fine = a.collection().segment(&"c".into()).unwrap();
    assert_eq!(fine.label("task"), Some("inform"));
    assert_eq!(fine.outgoing().len(), 1);
    a.collection().check_invariants().unwrap();

    let exported = dir.path().join("out.tsv");
    a.export(&exported).unwrap();
    let text = fs::read_to_string(&exported).unwrap();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 4);
    // second row continues the first transcript line
    assert_eq!(rows[2].split('\t').nth(2), Some(""));
    assert_eq!(rows[3].split('\t').nth(6), Some("b-answer"));

    let mut b = annotator();
    b.import(&exported).unwrap();
    let texts: Vec<&str> = b.collection().full().map(|s| s.raw()).collect();
    assert_eq!(texts, vec!["hello there", "how are you", "fine"]);
    assert_eq!(
        b.collection().segment(&"a".into()).unwrap().legacy_annotation("task"),
        Some(&Annotation::label("greet"))
    );
}

#[test]
fn test_json_export_import() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("transcript.tsv");
    fs::write(&source, TRANSCRIPT).unwrap();

    let mut a = annotator();
    a.import(&source).unwrap();
    a.promote_legacy().unwrap();
    a.set_note("opening").unwrap();

    let json = dir.path().join("out.json");
    a.export(&json).unwrap();

    let mut b = annotator();
    b.import(&json).unwrap();
    let c = b.collection();
    assert_eq!(c.len(), 3);
    assert_eq!(c.active().unwrap().note.as_deref(), Some("opening"));
    assert_eq!(
        c.segment(&"c".into()).unwrap().legacy_annotation("task"),
        Some(&Annotation::label("inform").with_qualifier("partial"))
    );
    assert_eq!(c.segment(&"c".into()).unwrap().legacy_links().len(), 1);
}

#[test]
fn test_failed_import_keeps_session() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("transcript.tsv");
    fs::write(&good, TRANSCRIPT).unwrap();
    let bad = dir.path().join("broken.tsv");
    fs::write(&bad, "id\traw\tparticipant\tdatetime\na\tx\tP1\tnot a date\n").unwrap();

    let mut a = annotator();
    a.import(&good).unwrap();
    a.set_label("inform").unwrap();
    let before = a.collection().clone();

    assert!(a.import(&bad).is_err());
    assert_eq!(a.collection(), &before);
    assert!(a.can_undo());
}

#[test]
fn test_snapshot_resumes_session() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("transcript.tsv");
    fs::write(&source, TRANSCRIPT).unwrap();
    let saved = dir.path().join("session.json");

    let mut a = annotator();
    a.import(&source).unwrap();
    a.next(2);
    a.link_to(&"a".into(), "answer").unwrap();
    a.save(&saved).unwrap();

    let mut b = annotator();
    b.open(&saved).unwrap();
    assert_eq!(b.collection(), a.collection());
    assert_eq!(b.collection().cursor(), Some(2));
    assert!(!b.can_undo());
}

#[test]
fn test_taxonomy_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taxonomy.json");

    let mut a = annotator();
    a.add_label("task", "request").unwrap();
    a.save_taxonomy(&path).unwrap();

    let mut b = Annotator::default();
    b.load_taxonomy(&path).unwrap();
    assert_eq!(b.collection().taxonomy(), a.collection().taxonomy());
    assert_eq!(b.collection().active_layer(), Some("task"));
}
