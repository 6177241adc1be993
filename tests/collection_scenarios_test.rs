// Split, merge, filter and taxonomy scenarios driven through the public API

use chrono::NaiveDateTime;
use dialogue_annotator::{Annotator, AnnotatorConfig, Filter, Link, Segment, SegmentCollection, SegmentId, Taxonomy};

fn taxonomy() -> Taxonomy {
    Taxonomy::from_json_str(
        r##"{
            "name": "scenarios",
            "default": "task",
            "labels": {"task": ["inform", "greet"], "feedback": ["acknowledge"]},
            "qualifiers": {"task": ["partial"]},
            "links": {"answer": "#00aa00", "reformulation": null}
        }"##,
    )
    .unwrap()
}

fn annotator(rows: &[(&str, &str, &str)]) -> Annotator {
    let segments = rows
        .iter()
        .map(|(id, raw, who)| Segment::with_id(SegmentId::from(*id), *raw, *who, NaiveDateTime::default()))
        .collect();
    Annotator::with_collection(
        SegmentCollection::from_segments(segments, Some(taxonomy())),
        AnnotatorConfig::default(),
    )
}

fn sid(s: &str) -> SegmentId {
    SegmentId::from(s)
}

#[test]
fn test_split_redirects_back_references_to_second_half() {
    let mut a = annotator(&[("A", "hello world", "P1"), ("B", "ok", "P2")]);
    a.create_link(&sid("B"), &sid("A"), "answer").unwrap();

    a.split("hello").unwrap();
    let c = a.collection();
    assert_eq!(c.len(), 3);

    let texts: Vec<&str> = c.full().map(|s| s.raw()).collect();
    assert_eq!(texts, vec!["hello", "world", "ok"]);
    let participants: Vec<&str> = c.full().map(|s| s.participant.as_str()).collect();
    assert_eq!(participants, vec!["P1", "P1", "P2"]);

    let a2 = c.order()[1].clone();
    assert_eq!(c.segment(&sid("B")).unwrap().outgoing(), &[Link::new(a2.clone(), "answer")]);
    assert_eq!(c.segment(&a2).unwrap().incoming(), &[Link::new(sid("B"), "answer")]);
    assert!(c.segment(&sid("A")).is_none());
    c.check_invariants().unwrap();
}

#[test]
fn test_merge_concatenates_text_and_notes() {
    let mut a = annotator(&[("A", "hi", "P1"), ("B", "there", "P1")]);
    a.set_note("x").unwrap();
    a.next(1);
    a.set_note("y").unwrap();

    a.merge_with_previous().unwrap();
    let c = a.collection();
    assert_eq!(c.len(), 1);
    let merged = c.active().unwrap();
    assert_eq!(merged.raw(), "hi there");
    assert_eq!(merged.note.as_deref(), Some("x / y"));
    assert_eq!(merged.original().parts(), vec!["hi", "there"]);
    c.check_invariants().unwrap();
}

#[test]
fn test_merge_across_participants_declined() {
    let mut a = annotator(&[("A", "hi", "P1"), ("B", "there", "P2")]);
    a.next(1);
    let before = a.collection().clone();
    assert!(a.merge_with_previous().is_err());
    assert_eq!(a.collection(), &before);
}

#[test]
fn test_filter_and_unfilter_keep_position() {
    let rows: Vec<(String, String)> = (0..100).map(|i| (format!("s{}", i), format!("line {}", i))).collect();
    let refs: Vec<(&str, &str, &str)> = rows.iter().map(|(id, raw)| (id.as_str(), raw.as_str(), "P")).collect();
    let mut a = annotator(&refs);

    for index in [3, 42, 77] {
        a.go_to(index);
        a.set_label("greet").unwrap();
    }
    a.go_to(42);

    a.filter_by(Filter::Label {
        layer: "task".to_string(),
        label: "greet".to_string(),
    });
    assert_eq!(a.collection().cursor(), Some(1));
    assert_eq!(a.collection().active_id(), Some(&sid("s42")));
    assert_eq!(a.status(), "2/3 - Filter: [greet]");

    assert!(a.remove_filter());
    assert_eq!(a.collection().cursor(), Some(42));
    assert_eq!(a.status(), "43/100");
}

#[test]
fn test_rename_label_undo_restores_every_segment() {
    let mut a = annotator(&[("A", "a", "P1"), ("B", "b", "P2"), ("C", "c", "P1")]);
    a.add_label("task", "foo").unwrap();
    a.set_label("foo").unwrap();
    a.go_to(2);
    a.set_label("foo").unwrap();

    a.rename_label("task", "foo", "bar").unwrap();
    for id in ["A", "C"] {
        assert_eq!(a.collection().segment(&sid(id)).unwrap().label("task"), Some("bar"));
    }

    a.undo().unwrap();
    for id in ["A", "C"] {
        assert_eq!(a.collection().segment(&sid(id)).unwrap().label("task"), Some("foo"));
    }
    assert!(a.collection().taxonomy().unwrap().has_label("task", "foo"));
    assert!(!a.collection().taxonomy().unwrap().has_label("task", "bar"));
}

#[test]
fn test_links_must_point_backwards() {
    let mut a = annotator(&[("A", "a", "P1"), ("B", "b", "P2")]);
    assert!(a.link_to(&sid("B"), "answer").is_err());
    a.next(1);
    a.link_to(&sid("A"), "answer").unwrap();
    assert!(a.link_to(&sid("A"), "answer").is_err());
    a.link_to(&sid("A"), "reformulation").unwrap();

    a.unlink_all().unwrap();
    assert!(a.collection().segment(&sid("A")).unwrap().incoming().is_empty());
    a.collection().check_invariants().unwrap();
}

#[test]
fn test_delete_layer_strips_and_resets_active_layer() {
    let mut a = annotator(&[("A", "a", "P1")]);
    a.set_label("inform").unwrap();
    a.set_active_layer("feedback").unwrap();
    a.set_active_layer("task").unwrap();

    a.delete_layer("task").unwrap();
    assert_eq!(a.collection().active_layer(), Some("feedback"));
    assert!(a.collection().segment(&sid("A")).unwrap().annotations.is_empty());

    a.undo().unwrap();
    assert_eq!(a.collection().active_layer(), Some("task"));
    assert_eq!(a.collection().segment(&sid("A")).unwrap().label("task"), Some("inform"));
}
