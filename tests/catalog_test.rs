use packbench::catalog::{
    self, active_queries, featured, filter_by_mode, search, validate_catalog, QueryGroup,
    QUERY_PACK,
};
use packbench::Mode;

#[test]
fn test_active_queries_are_a_subset_in_catalog_order() {
    for mode in [Mode::Explore, Mode::Showcase] {
        let active = active_queries(QUERY_PACK, mode);
        assert!(!active.is_empty());
        let positions: Vec<usize> = active
            .iter()
            .map(|q| QUERY_PACK.iter().position(|c| c.id == q.id).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "{} order", mode);
        assert!(active.iter().all(|q| q.available_in(mode)));
    }
}

#[test]
fn test_modes_partition_the_catalog() {
    let explore = active_queries(QUERY_PACK, Mode::Explore);
    let showcase = active_queries(QUERY_PACK, Mode::Showcase);
    assert!(explore.len() < QUERY_PACK.len());
    assert!(showcase.len() < QUERY_PACK.len());
    assert_eq!(explore.len(), 10);
    assert_eq!(showcase.len(), 5);
}

#[test]
fn test_showcase_keeps_featured_or_showcase_group() {
    let showcase = active_queries(QUERY_PACK, Mode::Showcase);
    assert!(showcase
        .iter()
        .all(|q| q.featured || q.group == QueryGroup::Showcase));
    let by_mode = filter_by_mode(QUERY_PACK, Mode::Showcase);
    assert!(showcase.len() <= by_mode.len());
}

#[test]
fn test_selection_is_deterministic() {
    let a: Vec<&str> = active_queries(QUERY_PACK, Mode::Explore)
        .iter()
        .map(|q| q.id)
        .collect();
    let b: Vec<&str> = active_queries(QUERY_PACK, Mode::Explore)
        .iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(a, b);
}

#[test]
fn test_search_is_idempotent_and_narrowing() {
    let active = active_queries(QUERY_PACK, Mode::Explore);
    let once = search(&active, "releases");
    let twice = search(&once, "releases");
    assert_eq!(once, twice);
    assert!(once.len() <= active.len());
    assert_eq!(search(&active, "").len(), active.len());
    assert_eq!(search(&active, "   ").len(), active.len());
    assert!(search(&active, "no-such-query-anywhere").is_empty());
}

#[test]
fn test_search_ignores_case() {
    let active = active_queries(QUERY_PACK, Mode::Explore);
    let lower: Vec<&str> = search(&active, "artists").iter().map(|q| q.id).collect();
    let upper: Vec<&str> = search(&active, "ARTISTS").iter().map(|q| q.id).collect();
    assert!(!lower.is_empty());
    assert_eq!(lower, upper);
}

#[test]
fn test_featured_preserves_order() {
    let showcase = active_queries(QUERY_PACK, Mode::Showcase);
    let cards: Vec<&str> = featured(&showcase).iter().map(|q| q.id).collect();
    assert_eq!(cards[0], "overview.tables");
    assert_eq!(cards[1], "releases.top_countries");
}

#[test]
fn test_hotkeys_and_ids_are_unique() {
    assert_eq!(validate_catalog(QUERY_PACK), Ok(()));
    let explore = active_queries(QUERY_PACK, Mode::Explore);
    let hotkeys: Vec<char> = explore.iter().filter_map(|q| q.hotkey).collect();
    assert_eq!(hotkeys.len(), 10);
    assert!(catalog::find_by_hotkey(&explore, '0').is_some());
}

#[test]
fn test_validate_catalog_rejects_duplicates() {
    static DUPLICATES: &[catalog::QueryDef] = &[
        catalog::QueryDef {
            id: "a",
            title: "A",
            description: "",
            tags: &[],
            group: QueryGroup::Overview,
            sql: "SELECT 1",
            hotkey: Some('1'),
            featured: false,
            modes: None,
        },
        catalog::QueryDef {
            id: "b",
            title: "B",
            description: "",
            tags: &[],
            group: QueryGroup::Overview,
            sql: "SELECT 2",
            hotkey: Some('1'),
            featured: false,
            modes: None,
        },
    ];
    let err = validate_catalog(DUPLICATES).unwrap_err();
    assert!(err.contains("duplicate hotkey"));
}
