use bookdash::domain::{Row, RowField, SortDirection, WorkKey};
use bookdash::query::{Collation, ViewQuery, clamp_page, derive, derive_indices, page_count, paginate};

fn row(id: usize, title: &str, author: &str, rating: &str) -> Row {
    let key: WorkKey = format!("OL{id}W").parse().unwrap();
    let mut row = Row::placeholder(key, title);
    row.author_name = author.to_string();
    row.ratings_average = rating.to_string();
    row
}

fn sample() -> Vec<Row> {
    vec![
        row(1, "Cosmos", "Carl Sagan, Ann Druyan", "4.2"),
        row(2, "Contact", "Carl Sagan", "3.9"),
        row(3, "A Brief History of Time", "Stephen Hawking", "4.2"),
        row(4, "Silent Spring", "Rachel Carson", "N/A"),
        row(5, "The Selfish Gene", "Richard Dawkins", "4.0"),
        row(6, "Untitled", "N/A", "4.2"),
    ]
}

#[test]
fn empty_search_is_a_permutation() {
    let rows = sample();
    for field in RowField::ALL {
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let query = ViewQuery {
                sort_key: field,
                sort_direction: direction,
                ..ViewQuery::default()
            };
            let mut indices = derive_indices(&rows, &query);
            indices.sort_unstable();
            assert_eq!(indices, (0..rows.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn search_matches_author_name_case_insensitively() {
    let rows = sample();
    let query = ViewQuery {
        search_text: "SAGAN".to_string(),
        ..ViewQuery::default()
    };
    let titles: Vec<_> = derive(&rows, &query)
        .iter()
        .map(|row| row.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Contact", "Cosmos"]);

    for row in &rows {
        let included = titles.contains(&row.title.as_str());
        assert_eq!(included, row.author_name.to_lowercase().contains("sagan"));
    }
}

#[test]
fn search_ignores_other_fields() {
    let rows = sample();
    let query = ViewQuery {
        search_text: "cosmos".to_string(),
        ..ViewQuery::default()
    };
    assert!(derive(&rows, &query).is_empty());
}

#[test]
fn equal_keys_keep_input_order_in_both_directions() {
    let rows = sample();
    for direction in [SortDirection::Ascending, SortDirection::Descending] {
        let query = ViewQuery {
            sort_key: RowField::RatingsAverage,
            sort_direction: direction,
            ..ViewQuery::default()
        };
        let ties: Vec<_> = derive(&rows, &query)
            .into_iter()
            .filter(|row| row.ratings_average == "4.2")
            .map(|row| row.title.as_str())
            .collect();
        assert_eq!(ties, vec!["Cosmos", "A Brief History of Time", "Untitled"]);
    }
}

#[test]
fn lexical_sort_compares_display_strings() {
    let rows = sample();
    let query = ViewQuery {
        sort_key: RowField::RatingsAverage,
        ..ViewQuery::default()
    };
    let ratings: Vec<_> = derive(&rows, &query)
        .into_iter()
        .map(|row| row.ratings_average.as_str())
        .collect();
    assert_eq!(ratings, vec!["3.9", "4.0", "4.2", "4.2", "4.2", "N/A"]);
}

#[test]
fn numeric_collation_places_markers_last() {
    let rows = vec![
        row(1, "a", "x", "10"),
        row(2, "b", "x", "N/A"),
        row(3, "c", "x", "9.5"),
    ];
    let query = ViewQuery {
        sort_key: RowField::RatingsAverage,
        collation: Collation::Numeric,
        ..ViewQuery::default()
    };
    let titles: Vec<_> = derive(&rows, &query)
        .into_iter()
        .map(|row| row.title.as_str())
        .collect();
    assert_eq!(titles, vec!["c", "a", "b"]);
}

#[test]
fn derive_leaves_input_untouched() {
    let rows = sample();
    let before = rows.clone();
    let query = ViewQuery {
        sort_key: RowField::Title,
        sort_direction: SortDirection::Descending,
        search_text: "a".to_string(),
        ..ViewQuery::default()
    };
    let _ = derive(&rows, &query);
    assert_eq!(rows, before);
}

#[test]
fn pages_reconstruct_the_ordered_list() {
    let items: Vec<usize> = (0..23).collect();
    for size in [1, 5, 10, 23, 25] {
        let pages = page_count(items.len(), size);
        let rebuilt: Vec<usize> = (0..pages)
            .flat_map(|page| paginate(&items, page, size).iter().copied())
            .collect();
        assert_eq!(rebuilt, items);
        assert!(paginate(&items, pages, size).is_empty());
    }
}

#[test]
fn clamp_page_pulls_overrun_back() {
    assert_eq!(clamp_page(9, 23, 10), 2);
    assert_eq!(clamp_page(1, 23, 10), 1);
    assert_eq!(clamp_page(3, 0, 25), 0);
    assert_eq!(page_count(0, 10), 0);
}
