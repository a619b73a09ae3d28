//! Filtering, ordering and rendering of cached data sources.

use std::io::Write;

use log::warn;
use regex::Regex;

use crate::error::Result;
use crate::model::DataSource;

/// Width the address column is cut to in listings.
pub const ADDRESS_WIDTH: usize = 20;

const ELLIPSIS: &str = "...";
const COLUMN_GAP: &str = "  ";

/// Compiles blacklist patterns, logging and dropping invalid ones.
pub fn compile_blacklist(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Ignoring invalid blacklist pattern `{pattern}`: {e}");
                None
            }
        })
        .collect()
}

/// Removes data sources whose name matches any of `blacklist`, keeping order.
pub fn apply_blacklist(data_sources: Vec<DataSource>, blacklist: &[Regex]) -> Vec<DataSource> {
    if blacklist.is_empty() {
        return data_sources;
    }

    data_sources
        .into_iter()
        .filter(|data_source| !blacklist.iter().any(|regex| regex.is_match(&data_source.name)))
        .collect()
}

/// Most recently used first. Ties keep their relative order.
pub fn sort_by_recency(data_sources: &mut [DataSource]) {
    data_sources.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
}

/// Cuts `text` to at most `max_chars` characters, ending in `...` when cut.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

fn pad(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.chars().count());
    format!("{text}{}", " ".repeat(padding))
}

/// One row per data source: name, address and status icon in aligned
/// columns, optionally preceded by a header row.
///
/// Front ends use the header-less form and read the name back from the
/// first whitespace-separated field of the chosen line.
pub fn render_rows(data_sources: &[DataSource], with_headers: bool) -> Vec<String> {
    let addresses: Vec<String> = data_sources
        .iter()
        .map(|data_source| ellipsize(&data_source.address, ADDRESS_WIDTH))
        .collect();

    let header_width = |header: &str| if with_headers { header.len() } else { 0 };

    let name_width = data_sources
        .iter()
        .map(|data_source| data_source.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(header_width("NAME"));
    let address_width = addresses
        .iter()
        .map(|address| address.chars().count())
        .max()
        .unwrap_or(0)
        .max(header_width("ADDRESS"));

    let mut rows = Vec::with_capacity(data_sources.len() + 1);
    if with_headers {
        rows.push(format!(
            "{}{COLUMN_GAP}{}{COLUMN_GAP}STATUS",
            pad("NAME", name_width),
            pad("ADDRESS", address_width)
        ));
    }

    for (data_source, address) in data_sources.iter().zip(&addresses) {
        rows.push(format!(
            "{}{COLUMN_GAP}{}{COLUMN_GAP}{}",
            pad(&data_source.name, name_width),
            pad(address, address_width),
            data_source.status_icon()
        ));
    }

    rows
}

/// Writes the rendered rows to `writer`, one per line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_table<W: Write>(
    writer: &mut W,
    data_sources: &[DataSource],
    with_headers: bool,
) -> Result<()> {
    for row in render_rows(data_sources, with_headers) {
        writeln!(writer, "{row}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data_source(name: &str, last_used_at: i64) -> DataSource {
        DataSource {
            name: name.to_string(),
            status: "not connected".to_string(),
            address: "localhost:10001".to_string(),
            kind: "postgres".to_string(),
            tags: String::new(),
            web_url: None,
            last_used_at,
        }
    }

    fn names(data_sources: &[DataSource]) -> Vec<&str> {
        data_sources.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_blacklist_removes_matches_and_keeps_order() {
        let data_sources = vec![
            create_test_data_source("staging-db", 0),
            create_test_data_source("prod-db", 0),
            create_test_data_source("dev-cache", 0),
            create_test_data_source("reporting-production", 0),
        ];

        let blacklist = compile_blacklist(&[".*prod.*".to_string()]);
        let filtered = apply_blacklist(data_sources, &blacklist);

        assert_eq!(names(&filtered), vec!["staging-db", "dev-cache"]);
    }

    #[test]
    fn test_invalid_blacklist_pattern_is_ignored() {
        let blacklist = compile_blacklist(&["(unclosed".to_string(), "^dev-".to_string()]);
        assert_eq!(blacklist.len(), 1);

        let filtered = apply_blacklist(
            vec![create_test_data_source("dev-db", 0), create_test_data_source("qa-db", 0)],
            &blacklist,
        );
        assert_eq!(names(&filtered), vec!["qa-db"]);
    }

    #[test]
    fn test_sort_by_recency() {
        let mut data_sources = vec![
            create_test_data_source("a", 0),
            create_test_data_source("b", 50),
            create_test_data_source("c", 20),
        ];

        sort_by_recency(&mut data_sources);

        assert_eq!(names(&data_sources), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_by_recency_is_stable() {
        let mut data_sources = vec![
            create_test_data_source("first", 0),
            create_test_data_source("used", 10),
            create_test_data_source("second", 0),
        ];

        sort_by_recency(&mut data_sources);

        assert_eq!(names(&data_sources), vec!["used", "first", "second"]);
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("short", 20), "short");
        assert_eq!(ellipsize("abcdefghijklmnopqrstuvwxyz", 20), "abcdefghijklmnopq...");
        assert_eq!(ellipsize("ééééé", 4), "é...");
    }

    #[test]
    fn test_render_rows_with_headers() {
        let mut web = create_test_data_source("admin", 0);
        web.address = "https://admin.internal.example.com".to_string();
        web.web_url = Some(web.address.clone());

        let rows = render_rows(&[create_test_data_source("db", 0), web], true);

        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("NAME"));
        assert!(rows[0].ends_with("STATUS"));
        assert!(rows[1].starts_with("db     localhost:10001"));
        assert!(rows[1].ends_with("🔌"));
        assert!(rows[2].contains("https://admin.int..."));
        assert!(rows[2].ends_with("🌐"));
    }

    #[test]
    fn test_render_rows_first_field_is_name() {
        let rows = render_rows(&[create_test_data_source("prod-postgres", 0)], false);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].split_whitespace().next(), Some("prod-postgres"));
    }

    #[test]
    fn test_write_table() {
        let mut out = Vec::new();
        write_table(&mut out, &[create_test_data_source("db", 0)], false).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "db  localhost:10001  🔌\n");
    }
}
