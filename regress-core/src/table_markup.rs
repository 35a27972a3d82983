//! Editable tables embedded in free text
//!
//! A table lives inside a plain string as a marker
//! `[TABLE:<id>:<payload>]`, where the payload is the grid serialized as a
//! JSON array of string arrays and then percent-encoded, so it can never
//! contain the marker's own `:` or `]`. Text and markers interleave freely;
//! the string stays a plain string for storage.
//!
//! Decoding failures never abort rendering: a marker whose payload cannot be
//! decoded shows up as [`Segment::Corrupted`] and the text around it renders
//! as usual.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use std::ops::Range;
use thiserror::Error;

use crate::error::{StoreError, StoreResult};

/// Rows of cells; row 0 is conventionally the header row
pub type TableGrid = Vec<Vec<String>>;

pub const MIN_ROWS: usize = 1;
pub const MAX_ROWS: usize = 20;
pub const MIN_COLUMNS: usize = 1;
pub const MAX_COLUMNS: usize = 10;

const MARKER_OPEN: &str = "[TABLE:";

lazy_static! {
    // The payload group is optional so that bare `[TABLE:<id>]` markers are
    // still recognised (and reported as corrupted) instead of leaking as text.
    static ref MARKER_RE: Regex = Regex::new(r"\[TABLE:([^:\]]+)(?::([^\]]*))?\]").unwrap();
}

/// Why a marker's payload could not be turned back into a grid
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("table marker has no payload")]
    MissingPayload,

    #[error("payload is not valid percent-encoding: {0}")]
    Decode(String),

    #[error("payload is not a JSON array of string rows: {0}")]
    Json(String),
}

/// One marker found in a text, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub id: String,
    /// Byte range of the whole marker inside the source text
    pub range: Range<usize>,
    pub grid: Result<TableGrid, CodecError>,
}

/// A piece of rendered text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, line breaks preserved
    Text(String),
    /// A decoded table
    Table {
        id: String,
        rows: TableGrid,
        editable: bool,
    },
    /// A marker whose payload could not be decoded; `raw` is the marker text
    Corrupted {
        id: String,
        raw: String,
        error: CodecError,
    },
}

/// Serializes a grid into a complete marker
pub fn encode_marker(id: &str, grid: &TableGrid) -> String {
    format!("{}{}:{}]", MARKER_OPEN, id, encode_payload(grid))
}

fn encode_payload(grid: &TableGrid) -> String {
    // Serializing Vec<Vec<String>> cannot fail
    let json = serde_json::to_string(grid).unwrap_or_else(|_| "[]".to_string());
    urlencoding::encode(&json).into_owned()
}

/// Reverses the percent-encoding and JSON serialization of a payload
pub fn decode_payload(payload: &str) -> Result<TableGrid, CodecError> {
    let json = urlencoding::decode(payload).map_err(|e| CodecError::Decode(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| CodecError::Json(e.to_string()))
}

/// Finds every marker, left to right, decoding each payload
pub fn parse_tables(text: &str) -> Vec<ParsedTable> {
    MARKER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.get(1)?.as_str().to_string();
            let grid = match caps.get(2) {
                Some(payload) => decode_payload(payload.as_str()),
                None => Err(CodecError::MissingPayload),
            };
            Some(ParsedTable {
                id,
                range: whole.range(),
                grid,
            })
        })
        .collect()
}

/// Ids of all markers in document order
pub fn table_ids(text: &str) -> Vec<String> {
    parse_tables(text).into_iter().map(|t| t.id).collect()
}

/// Returns the decoded grid of one table, if present and readable
pub fn get_table(text: &str, id: &str) -> Option<TableGrid> {
    parse_tables(text)
        .into_iter()
        .find(|t| t.id == id)
        .and_then(|t| t.grid.ok())
}

/// Time-based id that does not clash with any id already in the text
pub fn new_table_id(text: &str) -> String {
    let existing = table_ids(text);
    let base = format!("table-{}", Utc::now().timestamp_millis());
    if !existing.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Splices a newline-wrapped marker into `text` at a character offset.
/// Offsets past the end append. Returns the new text and the table id.
pub fn insert_table(text: &str, offset: usize, grid: &TableGrid) -> (String, String) {
    let id = new_table_id(text);
    let at = text
        .char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let marker = encode_marker(&id, grid);
    let mut out = String::with_capacity(text.len() + marker.len() + 2);
    out.push_str(&text[..at]);
    out.push('\n');
    out.push_str(&marker);
    out.push('\n');
    out.push_str(&text[at..]);

    tracing::debug!(table_id = %id, offset, "inserted table marker");
    (out, id)
}

fn marker_pattern(id: &str, surrounding_newlines: bool) -> Option<Regex> {
    let core = format!(r"\[TABLE:{}(?::[^\]]*)?\]", regex::escape(id));
    let pattern = if surrounding_newlines {
        format!(r"\n?{}\n?", core)
    } else {
        core
    };
    Regex::new(&pattern).ok()
}

/// Replaces the payload of the marker with the given id; everything else is
/// left byte-for-byte as it was. Unknown ids leave the text unchanged.
pub fn update_table(text: &str, id: &str, grid: &TableGrid) -> String {
    let Some(re) = marker_pattern(id, false) else {
        return text.to_string();
    };
    let marker = encode_marker(id, grid);
    re.replace_all(text, NoExpand(&marker)).into_owned()
}

/// Deletes the marker and one adjacent newline on each side
pub fn remove_table(text: &str, id: &str) -> String {
    let Some(re) = marker_pattern(id, true) else {
        return text.to_string();
    };
    re.replace_all(text, "").into_owned()
}

/// Splits text into ordered segments for display.
///
/// Without markers the whole text is one segment. With markers,
/// whitespace-only gaps between them are dropped so a table does not get
/// blank padding lines.
pub fn render(text: &str, editable: bool) -> Vec<Segment> {
    let tables = parse_tables(text);
    if tables.is_empty() {
        return vec![Segment::Text(text.to_string())];
    }

    let mut segments = Vec::new();
    let mut cursor = 0;
    for table in tables {
        push_text(&mut segments, &text[cursor..table.range.start]);
        let segment = match table.grid {
            Ok(rows) => Segment::Table {
                id: table.id,
                rows,
                editable,
            },
            Err(error) => {
                tracing::warn!(table_id = %table.id, %error, "corrupted table marker");
                Segment::Corrupted {
                    id: table.id,
                    raw: text[table.range.clone()].to_string(),
                    error,
                }
            }
        };
        segments.push(segment);
        cursor = table.range.end;
    }
    push_text(&mut segments, &text[cursor..]);
    segments
}

fn push_text(segments: &mut Vec<Segment>, part: &str) {
    if !part.trim().is_empty() {
        segments.push(Segment::Text(part.to_string()));
    }
}

// =========================================================================
// Grid helpers
// =========================================================================

/// Rejects dimensions outside 1-20 rows and 1-10 columns
pub fn validate_dimensions(rows: usize, columns: usize) -> StoreResult<()> {
    if !(MIN_ROWS..=MAX_ROWS).contains(&rows) || !(MIN_COLUMNS..=MAX_COLUMNS).contains(&columns) {
        return Err(StoreError::validation(format!(
            "Please enter valid numbers (Rows: {}-{}, Columns: {}-{})",
            MIN_ROWS, MAX_ROWS, MIN_COLUMNS, MAX_COLUMNS
        )));
    }
    Ok(())
}

/// A rows x columns grid of empty cells
pub fn blank_grid(rows: usize, columns: usize) -> TableGrid {
    vec![vec![String::new(); columns]; rows]
}

/// Fills row 0 with `Header 1`, `Header 2`, ...
pub fn with_header_row(mut grid: TableGrid) -> TableGrid {
    if let Some(first) = grid.first_mut() {
        for (i, cell) in first.iter_mut().enumerate() {
            *cell = format!("Header {}", i + 1);
        }
    }
    grid
}

/// Column count used for display; a grid without columns shows as one wide
pub fn display_width(grid: &TableGrid) -> usize {
    grid.first().map_or(0, |row| row.len()).max(1)
}

pub fn add_row(grid: &mut TableGrid) {
    let width = display_width(grid);
    grid.push(vec![String::new(); width]);
}

pub fn add_column(grid: &mut TableGrid) {
    for row in grid.iter_mut() {
        row.push(String::new());
    }
}

/// Refuses to remove the last remaining row
pub fn remove_row(grid: &mut TableGrid, index: usize) -> bool {
    if grid.len() <= 1 || index >= grid.len() {
        return false;
    }
    grid.remove(index);
    true
}

/// Refuses to remove the last remaining column
pub fn remove_column(grid: &mut TableGrid, index: usize) -> bool {
    if grid.first().map_or(0, |r| r.len()) <= 1 || index >= display_width(grid) {
        return false;
    }
    for row in grid.iter_mut() {
        if index < row.len() {
            row.remove(index);
        }
    }
    true
}

pub fn set_cell(grid: &mut TableGrid, row: usize, column: usize, value: impl Into<String>) -> bool {
    match grid.get_mut(row).and_then(|r| r.get_mut(column)) {
        Some(cell) => {
            *cell = value.into();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid(rows: &[&[&str]]) -> TableGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_insert_into_empty_text() {
        let (text, id) = insert_table("", 0, &blank_grid(2, 2));

        assert!(text.starts_with('\n') && text.ends_with('\n'));
        let tables = parse_tables(&text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, id);
        assert_eq!(tables[0].grid, Ok(blank_grid(2, 2)));
    }

    #[test]
    fn test_insert_with_header_row() {
        let (text, id) = insert_table("", 0, &with_header_row(blank_grid(2, 3)));
        let rows = get_table(&text, &id).unwrap();
        assert_eq!(rows[0], vec!["Header 1", "Header 2", "Header 3"]);
        assert_eq!(rows[1], vec!["", "", ""]);
    }

    #[test]
    fn test_insert_at_character_offset() {
        let (text, _) = insert_table("héllo", 2, &blank_grid(1, 1));
        assert!(text.starts_with("hé\n[TABLE:"));
        assert!(text.ends_with("]\nllo"));

        let (text, _) = insert_table("abc", 99, &blank_grid(1, 1));
        assert!(text.starts_with("abc\n[TABLE:"));
    }

    #[test]
    fn test_insert_picks_fresh_id() {
        let (text, first) = insert_table("", 0, &blank_grid(1, 1));
        let (text, second) = insert_table(&text, 0, &blank_grid(1, 1));
        assert_ne!(first, second);
        assert_eq!(table_ids(&text).len(), 2);
    }

    #[test]
    fn test_payload_hides_delimiters() {
        let g = grid(&[&["[a]", "b:c"], &["]]", "::"]]);
        let marker = encode_marker("t1", &g);
        assert_eq!(marker.matches(']').count(), 1);
        assert_eq!(marker.matches(':').count(), 2);
        assert_eq!(get_table(&marker, "t1"), Some(g));
    }

    #[test]
    fn test_update_replaces_only_target() {
        let a = grid(&[&["a"]]);
        let b = grid(&[&["b", "c"]]);
        let text = format!(
            "intro\n{}\nmiddle\n{}\noutro",
            encode_marker("A", &a),
            encode_marker("B", &b)
        );
        let b_marker = encode_marker("B", &b);

        let updated = update_table(&text, "A", &grid(&[&["new"], &["row"]]));

        assert!(updated.contains(&b_marker));
        assert!(updated.starts_with("intro\n[TABLE:A:"));
        assert!(updated.ends_with("\noutro"));
        assert_eq!(get_table(&updated, "A"), Some(grid(&[&["new"], &["row"]])));
        assert_eq!(get_table(&updated, "B"), Some(b));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let text = format!("x{}y", encode_marker("A", &grid(&[&["a"]])));
        assert_eq!(update_table(&text, "Z", &blank_grid(1, 1)), text);
        assert_eq!(remove_table(&text, "Z"), text);
    }

    #[test]
    fn test_prefix_ids_do_not_collide() {
        let text = format!(
            "{}{}",
            encode_marker("t1", &grid(&[&["one"]])),
            encode_marker("t10", &grid(&[&["ten"]]))
        );
        let removed = remove_table(&text, "t1");
        assert_eq!(table_ids(&removed), vec!["t10".to_string()]);
    }

    #[test]
    fn test_remove_strips_adjacent_newlines() {
        let (text, id) = insert_table("line one\nline two", 9, &blank_grid(2, 2));
        let removed = remove_table(&text, &id);
        assert_eq!(removed, "line one\nline two");
        assert!(parse_tables(&removed).is_empty());
        assert!(!removed.contains("\n\n"));
    }

    #[test]
    fn test_render_without_tables() {
        assert_eq!(render("a\n\nb", true), vec![Segment::Text("a\n\nb".into())]);
        assert_eq!(render("", false), vec![Segment::Text(String::new())]);
    }

    #[test]
    fn test_render_order_and_flag() {
        let text = format!(
            "Steps:\n{}\nThen\n{}\n",
            encode_marker("A", &grid(&[&["a"]])),
            encode_marker("B", &grid(&[&["b"]]))
        );
        let segments = render(&text, false);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment::Text("Steps:\n".into()));
        assert!(matches!(&segments[1], Segment::Table { id, editable: false, .. } if id == "A"));
        assert_eq!(segments[2], Segment::Text("\nThen\n".into()));
        assert!(matches!(&segments[3], Segment::Table { id, .. } if id == "B"));
    }

    #[test]
    fn test_corrupted_payload_renders_placeholder() {
        let text = "before\n[TABLE:bad:%E0%A4%A]\nafter";
        let segments = render(text, true);

        assert_eq!(segments.len(), 3);
        match &segments[1] {
            Segment::Corrupted { id, raw, .. } => {
                assert_eq!(id, "bad");
                assert_eq!(raw, "[TABLE:bad:%E0%A4%A]");
            }
            other => panic!("expected corrupted segment, got {:?}", other),
        }
        assert_eq!(segments[2], Segment::Text("\nafter".into()));
    }

    #[test]
    fn test_non_grid_json_is_corrupted() {
        let payload = urlencoding::encode("{\"a\":1}").into_owned();
        let text = format!("[TABLE:x:{}]", payload);
        assert!(matches!(parse_tables(&text)[0].grid, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_bare_marker_is_corrupted() {
        let tables = parse_tables("[TABLE:table-123]");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].grid, Err(CodecError::MissingPayload));
    }

    #[test]
    fn test_validate_dimensions() {
        assert!(validate_dimensions(1, 1).is_ok());
        assert!(validate_dimensions(20, 10).is_ok());
        assert!(validate_dimensions(0, 3).is_err());
        assert!(validate_dimensions(21, 3).is_err());
        assert!(validate_dimensions(3, 11).is_err());
    }

    #[test]
    fn test_grid_editing() {
        let mut g = blank_grid(1, 2);
        add_row(&mut g);
        add_column(&mut g);
        assert_eq!(g.len(), 2);
        assert!(g.iter().all(|r| r.len() == 3));

        assert!(set_cell(&mut g, 1, 2, "x"));
        assert!(!set_cell(&mut g, 5, 0, "x"));
        assert!(remove_column(&mut g, 0));
        assert_eq!(g[1], vec!["", "x"]);
        assert!(remove_row(&mut g, 0));
        assert!(!remove_row(&mut g, 0));

        let mut narrow = blank_grid(2, 1);
        assert!(!remove_column(&mut narrow, 0));
    }

    #[test]
    fn test_display_width_of_empty_grid() {
        assert_eq!(display_width(&vec![vec![]]), 1);
        assert_eq!(display_width(&Vec::new()), 1);
        let mut g: TableGrid = vec![vec![]];
        add_row(&mut g);
        assert_eq!(g[1].len(), 1);
    }

    fn arb_cell() -> impl Strategy<Value = String> {
        prop_oneof![
            "[\\[\\]:%a-z \\n]{0,8}",
            any::<String>(),
        ]
    }

    fn arb_grid() -> impl Strategy<Value = TableGrid> {
        (MIN_ROWS..=MAX_ROWS, MIN_COLUMNS..=MAX_COLUMNS).prop_flat_map(|(rows, cols)| {
            prop::collection::vec(prop::collection::vec(arb_cell(), cols), rows)
        })
    }

    proptest! {
        #[test]
        fn prop_insert_then_parse_returns_grid(
            g in arb_grid(),
            before in "[a-z \\n]{0,20}",
            after in "[a-z \\n]{0,20}",
        ) {
            let text = format!("{}{}", before, after);
            let (encoded, id) = insert_table(&text, before.chars().count(), &g);
            let tables = parse_tables(&encoded);
            prop_assert_eq!(tables.len(), 1);
            prop_assert_eq!(&tables[0].id, &id);
            prop_assert_eq!(tables[0].grid.clone(), Ok(g));
        }

        #[test]
        fn prop_remove_undoes_insert(
            g in arb_grid(),
            before in "[a-z ]{0,20}",
            after in "[a-z ]{0,20}",
        ) {
            let text = format!("{}{}", before, after);
            let (encoded, id) = insert_table(&text, before.chars().count(), &g);
            let removed = remove_table(&encoded, &id);
            prop_assert!(parse_tables(&removed).is_empty());
            prop_assert_eq!(removed, text);
        }

        #[test]
        fn prop_update_leaves_other_payload_untouched(a in arb_grid(), b in arb_grid(), c in arb_grid()) {
            let b_marker = encode_marker("B", &b);
            let text = format!("x\n{}\ny\n{}\nz", encode_marker("A", &a), b_marker);
            let updated = update_table(&text, "A", &c);
            prop_assert!(updated.contains(&b_marker));
            prop_assert_eq!(get_table(&updated, "A"), Some(c));
        }
    }
}
