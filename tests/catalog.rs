//! Catalog query tests: point lookup and cursor pagination.

mod common;

use std::collections::HashSet;

use common::*;

#[test]
fn test_get_midi_by_id() {
    let conn = setup_test_db();
    let midi = seed_midi(&conn, "Lookup Me", 499);

    let found = queries::get_midi_by_id(&conn, &midi.id).unwrap();
    assert_eq!(found.unwrap().name, "Lookup Me");

    let missing = queries::get_midi_by_id(&conn, "mm_midi_ffffffffffffffffffffffffffffffff").unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_new_midi_starts_with_zero_sales() {
    let conn = setup_test_db();
    let midi = seed_midi(&conn, "Fresh", 499);
    assert_eq!(midi.sale_count, 0);
}

#[test]
fn test_pagination_walks_whole_catalog_without_duplicates() {
    let conn = setup_test_db();
    // Spread created_at so ordering is deterministic
    for n in 0..25 {
        let midi = seed_midi(&conn, &format!("Track {:02}", n), 100 + n);
        conn.execute(
            "UPDATE midi_files SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![1_700_000_000 + n, &midi.id],
        )
        .unwrap();
    }

    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    loop {
        let (items, has_more) = queries::list_midis_page(&conn, 10, cursor.as_deref()).unwrap();
        pages += 1;
        for item in &items {
            assert!(seen.insert(item.id.clone()), "Duplicate item across pages");
        }
        match items.last() {
            Some(last) if has_more => cursor = Some(last.id.clone()),
            _ => break,
        }
        assert!(pages < 10, "Pagination did not terminate");
    }

    assert_eq!(seen.len(), 25);
    assert_eq!(pages, 3);
}

#[test]
fn test_pagination_newest_first() {
    let conn = setup_test_db();
    for n in 0..3 {
        let midi = seed_midi(&conn, &format!("Track {}", n), 100);
        conn.execute(
            "UPDATE midi_files SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![1_700_000_000 + n, &midi.id],
        )
        .unwrap();
    }

    let (items, has_more) = queries::list_midis_page(&conn, 10, None).unwrap();
    assert!(!has_more);
    let names: Vec<&str> = items.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Track 2", "Track 1", "Track 0"]);
}

#[test]
fn test_has_more_flag_exact_boundary() {
    let conn = setup_test_db();
    for n in 0..10 {
        seed_midi(&conn, &format!("Track {}", n), 100);
    }

    // Exactly one full page: has_more must be false
    let (items, has_more) = queries::list_midis_page(&conn, 10, None).unwrap();
    assert_eq!(items.len(), 10);
    assert!(!has_more);

    let (items, has_more) = queries::list_midis_page(&conn, 9, None).unwrap();
    assert_eq!(items.len(), 9);
    assert!(has_more);
}

#[test]
fn test_hidden_items_excluded_from_listing_but_resolvable() {
    let conn = setup_test_db();
    seed_midi(&conn, "Public", 100);
    let hidden = seed_hidden_midi(&conn, "Secret");

    let (items, _) = queries::list_midis_page(&conn, 10, None).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Public");

    // Still resolvable by id: a checkout started before hiding must fulfill
    let found = queries::get_midi_by_id(&conn, &hidden.id).unwrap();
    assert!(found.is_some());
}

#[test]
fn test_stale_cursor_starts_from_top() {
    let conn = setup_test_db();
    seed_midi(&conn, "Only One", 100);

    let (items, has_more) =
        queries::list_midis_page(&conn, 10, Some("mm_midi_00000000000000000000000000000000"))
            .unwrap();
    assert_eq!(items.len(), 1);
    assert!(!has_more);
}
