use assert_matches::assert_matches;
use serde_json::{Value, json};

use bookdash::app::build_row;
use bookdash::catalog::{parse_author_detail, parse_work_detail, parse_works};
use bookdash::domain::{AuthorDetail, NOT_AVAILABLE, WorkKey};
use bookdash::error::DashError;

fn fixture(name: &str) -> Value {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn parse_works_listing() {
    let works = parse_works(&fixture("works_science.json")).unwrap();
    assert_eq!(works.len(), 4);

    assert_eq!(works[0].key.as_str(), "/works/OL893415W");
    assert_eq!(works[0].title, "Cosmos");
    let names: Vec<_> = works[0].authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Carl Sagan", "Ann Druyan"]);
    assert_eq!(
        works[0].authors[1].key.as_ref().map(|key| key.as_str()),
        Some("/authors/OL1234567A")
    );

    assert_eq!(works[1].authors.len(), 1);
    assert_eq!(works[2].title, "Entry without a key");
    assert_eq!(works[2].key, WorkKey::unlisted(2));
    assert!(!works[2].key.is_listed());
    assert!(works[3].key.is_listed());
    assert!(works[3].authors.is_empty());
}

#[test]
fn parse_works_keeps_authors_without_usable_keys() {
    let works = parse_works(&json!({
        "works": [{
            "key": "/works/OL1W",
            "title": "Good",
            "authors": [
                { "key": "/authors/OL1A", "name": "Good" },
                { "name": "No Key" },
                { "key": "/authors/OL2A.x", "name": "Bad Key" }
            ]
        }]
    }))
    .unwrap();
    let authors = &works[0].authors;
    assert_eq!(authors.len(), 3);
    assert!(authors[0].key.is_some());
    assert_eq!(authors[1].key, None);
    assert_eq!(authors[2].key, None);
    assert_eq!(authors[2].name, "Bad Key");

    let resolved = [
        parse_author_detail(&json!({ "name": "Good" })),
        AuthorDetail::default(),
        AuthorDetail::default(),
    ];
    let row = build_row(&works[0], &parse_work_detail(&json!({})), &resolved);
    assert_eq!(row.author_name, "Good, N/A, N/A");
    assert_eq!(row.author_birth_date, "N/A, N/A, N/A");
}

#[test]
fn parse_works_without_array_fails() {
    let err = parse_works(&json!({ "key": "/subjects/science" })).unwrap_err();
    assert_matches!(err, DashError::CatalogPayload(_));
}

#[test]
fn parse_work_detail_fixture() {
    let detail = parse_work_detail(&fixture("work_detail.json"));
    assert_eq!(detail.first_publish_year, Some(1980));
    assert_eq!(detail.ratings_average, Some(4.21));
    assert_eq!(detail.subjects.as_ref().map(Vec::len), Some(4));
}

#[test]
fn parse_work_detail_tolerates_missing_fields() {
    let detail = parse_work_detail(&json!({ "key": "/works/OL1W" }));
    assert_eq!(detail.first_publish_year, None);
    assert_eq!(detail.ratings_average, None);
    assert_eq!(detail.subjects, None);
}

#[test]
fn parse_author_detail_fixture() {
    let author = parse_author_detail(&fixture("author_detail.json"));
    assert_eq!(author.name.as_deref(), Some("Carl Sagan"));
    assert_eq!(author.birth_date.as_deref(), Some("9 November 1934"));
    assert_eq!(author.top_work.as_deref(), Some("Cosmos"));
}

#[test]
fn fixtures_flatten_into_a_row() {
    let works = parse_works(&fixture("works_science.json")).unwrap();
    let detail = parse_work_detail(&fixture("work_detail.json"));
    let sagan = parse_author_detail(&fixture("author_detail.json"));
    let missing = parse_author_detail(&json!({}));

    let row = build_row(&works[0], &detail, &[sagan, missing]);
    assert_eq!(row.title, "Cosmos");
    assert_eq!(row.author_name, "Carl Sagan, N/A");
    assert_eq!(row.ratings_average, "4.21");
    assert_eq!(row.first_publish_year, "1980");
    assert_eq!(row.subject, "Astronomy, Cosmology, Popular works, Science");
    assert_eq!(row.author_birth_date, "9 November 1934, N/A");
    assert_eq!(row.author_top_work, "Cosmos, N/A");

    let empty = build_row(&works[2], &parse_work_detail(&json!({ "subjects": [] })), &[]);
    assert_eq!(empty.subject, NOT_AVAILABLE);
    assert_eq!(empty.author_name, NOT_AVAILABLE);
}
