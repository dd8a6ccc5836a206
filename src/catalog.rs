//! Predefined queries and the pure helpers that select among them.

use std::collections::HashSet;
use std::fmt;

use crate::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryGroup {
    Overview,
    Releases,
    Artists,
    Memberships,
    Showcase,
}

impl QueryGroup {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Releases => "Releases",
            Self::Artists => "Artists",
            Self::Memberships => "Memberships",
            Self::Showcase => "Showcase",
        }
    }
}

impl fmt::Display for QueryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A catalog entry. Entries are immutable and live for the whole program.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    pub group: QueryGroup,
    pub sql: &'static str,
    /// Alt+<hotkey> runs the entry in explore mode.
    pub hotkey: Option<char>,
    pub featured: bool,
    /// Modes the entry is offered in; None means every mode.
    pub modes: Option<&'static [Mode]>,
}

impl QueryDef {
    pub fn available_in(&self, mode: Mode) -> bool {
        self.modes.is_none_or(|modes| modes.contains(&mode))
    }

    /// Text the search box matches against.
    pub fn haystack(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title,
            self.description,
            self.tags.join(" "),
            self.group.label()
        )
        .to_lowercase()
    }
}

const EXPLORE: &[Mode] = &[Mode::Explore];
const SHOWCASE: &[Mode] = &[Mode::Showcase];

pub static QUERY_PACK: &[QueryDef] = &[
    QueryDef {
        id: "explore.whats_in_here",
        title: "What's in here? (schema discovery)",
        description: "List all tables available in the current database",
        tags: &["explore", "schema", "discovery"],
        group: QueryGroup::Overview,
        sql: "SHOW TABLES",
        hotkey: Some('1'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.releases.first20",
        title: "First 20 releases (real data)",
        description: "Inspect the first real release rows",
        tags: &["explore", "releases", "sample"],
        group: QueryGroup::Releases,
        sql: "SELECT release_id, title, country, released
FROM releases
ORDER BY release_id
LIMIT 20",
        hotkey: Some('2'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.releases.by_country",
        title: "How many releases per country",
        description: "Basic GROUP BY and ORDER BY example",
        tags: &["explore", "releases", "aggregation"],
        group: QueryGroup::Releases,
        sql: "SELECT country, COUNT(*) AS n
FROM releases
WHERE country IS NOT NULL
GROUP BY country
ORDER BY n DESC
LIMIT 20",
        hotkey: Some('3'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.releases.search_keyword",
        title: "Search releases by keyword",
        description: "Search release titles using ILIKE",
        tags: &["explore", "releases", "search"],
        group: QueryGroup::Releases,
        sql: "SELECT release_id, title, country, released
FROM releases
WHERE title ILIKE '%jazz%'
ORDER BY released NULLS LAST
LIMIT 30",
        hotkey: Some('4'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.labels.top_labels",
        title: "Which labels have the most releases?",
        description: "Count distinct releases per label",
        tags: &["explore", "labels", "aggregation"],
        group: QueryGroup::Releases,
        sql: "SELECT label_name, COUNT(DISTINCT release_id) AS n_releases
FROM release_label_xref
WHERE label_name IS NOT NULL
GROUP BY label_name
ORDER BY n_releases DESC
LIMIT 20",
        hotkey: Some('5'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.join.release_label",
        title: "Basic join: release -> label",
        description: "One row per release-label pair",
        tags: &["explore", "join", "labels"],
        group: QueryGroup::Releases,
        sql: "SELECT r.release_id, r.title, x.label_name
FROM releases r
JOIN release_label_xref x ON x.release_id = r.release_id
ORDER BY r.release_id
LIMIT 30",
        hotkey: Some('6'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.join.release_artist",
        title: "Basic join: release -> artist",
        description: "Join via normalized artist name and name map",
        tags: &["explore", "join", "artists"],
        group: QueryGroup::Artists,
        sql: "SELECT
  r.release_id,
  r.title,
  a.name AS artist_name
FROM releases r
JOIN release_artists ra ON ra.release_id = r.release_id
JOIN artist_name_map am ON am.norm_name = ra.artist_norm
JOIN artists a ON a.artist_id = am.artist_id
ORDER BY r.release_id
LIMIT 30",
        hotkey: Some('7'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.alias.find_variants",
        title: "Artist aliases (name variants)",
        description: "Find alias names for a given artist",
        tags: &["explore", "artists", "aliases"],
        group: QueryGroup::Artists,
        sql: "SELECT
  a.artist_id,
  a.name,
  aa.alias_name
FROM artists a
JOIN artist_aliases aa ON aa.artist_id = a.artist_id
WHERE a.name ILIKE '%st germain%'
LIMIT 50",
        hotkey: Some('8'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.membership.top_groups",
        title: "Groups with the most members",
        description: "Simple aggregation on artist memberships",
        tags: &["explore", "memberships", "aggregation"],
        group: QueryGroup::Memberships,
        sql: "SELECT
  group_id,
  max(group_name) AS group_name,
  COUNT(DISTINCT member_id) AS n_members
FROM artist_memberships
GROUP BY group_id
ORDER BY n_members DESC
LIMIT 30",
        hotkey: Some('9'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "explore.one_release.full_context",
        title: "One release, full context",
        description: "Inspect a single release with its associated labels",
        tags: &["explore", "join", "context"],
        group: QueryGroup::Showcase,
        sql: "WITH one AS (
  SELECT release_id
  FROM releases
  WHERE title IS NOT NULL
  ORDER BY release_id
  LIMIT 1
)
SELECT
  r.release_id,
  r.title,
  r.country,
  r.released,
  x.label_name
FROM releases r
JOIN one o ON o.release_id = r.release_id
LEFT JOIN release_label_xref x ON x.release_id = r.release_id
LIMIT 50",
        hotkey: Some('0'),
        featured: false,
        modes: Some(EXPLORE),
    },
    QueryDef {
        id: "overview.tables",
        title: "Dataset overview (row counts)",
        description: "Sanity check: number of rows per table",
        tags: &["overview", "sanity"],
        group: QueryGroup::Overview,
        sql: "SELECT 'releases' AS tbl, count(*) AS n FROM releases
UNION ALL SELECT 'release_artists' AS tbl, count(*) AS n FROM release_artists
UNION ALL SELECT 'release_label_xref' AS tbl, count(*) AS n FROM release_label_xref
UNION ALL SELECT 'artist_name_map' AS tbl, count(*) AS n FROM artist_name_map
UNION ALL SELECT 'artists' AS tbl, count(*) AS n FROM artists
UNION ALL SELECT 'artist_aliases' AS tbl, count(*) AS n FROM artist_aliases
UNION ALL SELECT 'artist_memberships' AS tbl, count(*) AS n FROM artist_memberships
ORDER BY tbl",
        hotkey: None,
        featured: true,
        modes: Some(SHOWCASE),
    },
    QueryDef {
        id: "releases.top_countries",
        title: "Top countries",
        description: "Releases grouped by country",
        tags: &["releases", "aggregation"],
        group: QueryGroup::Releases,
        sql: "SELECT country, COUNT(*) AS n
FROM releases
WHERE country IS NOT NULL
GROUP BY country
ORDER BY n DESC
LIMIT 20",
        hotkey: None,
        featured: true,
        modes: Some(SHOWCASE),
    },
    QueryDef {
        id: "releases.top_styles",
        title: "Top styles",
        description: "Explode denormalized styles and aggregate",
        tags: &["releases", "unnest"],
        group: QueryGroup::Releases,
        sql: "WITH exploded AS (
  SELECT UNNEST(STRING_TO_ARRAY(styles, ',')) AS style
  FROM releases
  WHERE styles IS NOT NULL
)
SELECT TRIM(style) AS style, count(*) AS n
FROM exploded
GROUP BY TRIM(style)
ORDER BY n DESC
LIMIT 25",
        hotkey: None,
        featured: true,
        modes: Some(SHOWCASE),
    },
    QueryDef {
        id: "membership.top_groups",
        title: "Groups with the most members",
        description: "Graph-style aggregation on memberships",
        tags: &["memberships", "graph"],
        group: QueryGroup::Memberships,
        sql: "SELECT
  group_id,
  max(group_name) AS group_name,
  count(DISTINCT member_id) AS n_members
FROM artist_memberships
GROUP BY group_id
ORDER BY n_members DESC
LIMIT 50",
        hotkey: None,
        featured: true,
        modes: Some(SHOWCASE),
    },
    QueryDef {
        id: "showcase.release_rollup",
        title: "Release rollup (artists + labels)",
        description: "End-to-end joins with aggregation",
        tags: &["showcase", "joins", "modeling"],
        group: QueryGroup::Showcase,
        sql: "WITH br AS (
  SELECT release_id, title, country, released
  FROM releases
  WHERE country IS NOT NULL
  ORDER BY release_id
  LIMIT 50
),
artist_roll AS (
  SELECT
    ra.release_id,
    count(DISTINCT a.artist_id) AS n_artists
  FROM release_artists ra
  JOIN br ON br.release_id = ra.release_id
  JOIN artist_name_map am ON am.norm_name = ra.artist_norm
  JOIN artists a ON a.artist_id = am.artist_id
  GROUP BY ra.release_id
),
label_roll AS (
  SELECT
    rl.release_id,
    count(DISTINCT rl.label_name) AS n_labels
  FROM release_label_xref rl
  JOIN br ON br.release_id = rl.release_id
  GROUP BY rl.release_id
)
SELECT
  br.release_id,
  br.title,
  br.country,
  br.released,
  coalesce(ar.n_artists, 0) AS n_artists,
  coalesce(lr.n_labels, 0) AS n_labels
FROM br
LEFT JOIN artist_roll ar ON ar.release_id = br.release_id
LEFT JOIN label_roll lr ON lr.release_id = br.release_id
ORDER BY br.release_id",
        hotkey: None,
        featured: true,
        modes: Some(SHOWCASE),
    },
];

/// Entries offered in `mode`, in catalog order.
pub fn filter_by_mode(catalog: &[QueryDef], mode: Mode) -> Vec<&QueryDef> {
    catalog.iter().filter(|q| q.available_in(mode)).collect()
}

/// The working set for a session.
///
/// Showcase additionally keeps only featured entries and the Showcase group.
pub fn active_queries(catalog: &[QueryDef], mode: Mode) -> Vec<&QueryDef> {
    filter_by_mode(catalog, mode)
        .into_iter()
        .filter(|q| match mode {
            Mode::Explore => true,
            Mode::Showcase => q.featured || q.group == QueryGroup::Showcase,
        })
        .collect()
}

/// Mode for the session: command line, then config, then explore.
pub fn resolve_mode(cli: Option<Mode>, config: Option<Mode>) -> Mode {
    cli.or(config).unwrap_or_default()
}

/// Case-insensitive substring match over title, description, tags and group.
/// An empty (or all-whitespace) search matches everything.
pub fn matches_search(query: &QueryDef, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    needle.is_empty() || query.haystack().contains(&needle)
}

pub fn search<'a>(queries: &[&'a QueryDef], text: &str) -> Vec<&'a QueryDef> {
    queries
        .iter()
        .copied()
        .filter(|q| matches_search(q, text))
        .collect()
}

pub fn featured<'a>(queries: &[&'a QueryDef]) -> Vec<&'a QueryDef> {
    queries.iter().copied().filter(|q| q.featured).collect()
}

pub fn find_by_hotkey<'a>(queries: &[&'a QueryDef], key: char) -> Option<&'a QueryDef> {
    queries
        .iter()
        .copied()
        .find(|q| q.hotkey.is_some_and(|h| h.eq_ignore_ascii_case(&key)))
}

pub fn find_by_id<'a>(queries: &[&'a QueryDef], id: &str) -> Option<&'a QueryDef> {
    queries.iter().copied().find(|q| q.id == id)
}

/// Check catalog-wide uniqueness of ids and hotkeys.
pub fn validate_catalog(catalog: &[QueryDef]) -> Result<(), String> {
    let mut ids = HashSet::new();
    let mut hotkeys = HashSet::new();
    for q in catalog {
        if !ids.insert(q.id) {
            return Err(format!("duplicate query id: {}", q.id));
        }
        if q.sql.trim().is_empty() {
            return Err(format!("query {} has empty SQL", q.id));
        }
        if let Some(h) = q.hotkey {
            if !hotkeys.insert(h.to_ascii_lowercase()) {
                return Err(format!("duplicate hotkey {:?} on {}", h, q.id));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_valid() {
        assert_eq!(validate_catalog(QUERY_PACK), Ok(()));
        assert_eq!(QUERY_PACK.len(), 15);
    }

    #[test]
    fn test_resolve_mode_precedence() {
        assert_eq!(resolve_mode(None, None), Mode::Explore);
        assert_eq!(resolve_mode(None, Some(Mode::Showcase)), Mode::Showcase);
        assert_eq!(
            resolve_mode(Some(Mode::Explore), Some(Mode::Showcase)),
            Mode::Explore
        );
    }

    #[test]
    fn test_matches_search_fields() {
        let q = &QUERY_PACK[2];
        assert!(matches_search(q, "  PER COUNTRY "));
        assert!(matches_search(q, "aggregation"));
        assert!(matches_search(q, "releases"));
        assert!(matches_search(q, ""));
        assert!(!matches_search(q, "zzz"));
    }

    #[test]
    fn test_find_by_hotkey() {
        let active = active_queries(QUERY_PACK, Mode::Explore);
        assert_eq!(
            find_by_hotkey(&active, '2').map(|q| q.id),
            Some("explore.releases.first20")
        );
        assert!(find_by_hotkey(&active, 'x').is_none());
        let showcase = active_queries(QUERY_PACK, Mode::Showcase);
        assert!(find_by_hotkey(&showcase, '2').is_none());
    }
}
