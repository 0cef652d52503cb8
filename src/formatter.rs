//! Produce the text printed on the standard output.
//! Collections and indexes are shown as aligned tables, one row per index.

use std::iter::repeat;

use crate::{
    database::CollectionStats,
    schema::Schema,
    setup::{ApplyReport, CollectionIndex, VerifyReport},
};

pub fn format_schema(schema: &Schema) -> String {
    let rows: Vec<_> = schema
        .collections
        .iter()
        .flat_map(|c| {
            if c.indexes.is_empty() {
                vec![(c.name.clone(), "-".to_string(), "-")]
            } else {
                c.indexes
                    .iter()
                    .map(|i| (c.name.clone(), i.field_names().join(", "), unique_flag(i.unique)))
                    .collect()
            }
        })
        .collect();

    let mut result = format!("Schema {}\n", schema.version);
    result += &format_table(
        ["collection", "index fields", "unique"],
        rows.iter().map(|(c, f, u)| [c.as_str(), f.as_str(), *u]),
    );
    result
}

pub fn format_apply_report(report: &ApplyReport) -> String {
    let mut result = format!(
        "Schema {} applied at {}\n",
        report.version,
        report.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    result += &format_names("Created collections", &report.created_collections);
    result += &format_names("Existing collections", &report.existing_collections);
    result += &format_indexes("Created indexes", &report.created_indexes);
    result += &format_indexes("Existing indexes", &report.existing_indexes);
    result
}

pub fn format_verify_report(report: &VerifyReport) -> String {
    let mut result = if report.is_ok() {
        format!(
            "Schema {} is in place ({} collections, {} indexes)\n",
            report.version, report.checked_collections, report.checked_indexes
        )
    } else {
        format!("Schema {} is NOT in place\n", report.version)
    };

    result += &format_names("Missing collections", &report.missing_collections);
    result += &format_indexes("Missing indexes", &report.missing_indexes);
    if !report.mismatched_indexes.is_empty() {
        result += "Mismatching indexes:\n";
        for m in &report.mismatched_indexes {
            result += &format!(
                "  {}: expected {}, found {}\n",
                m.collection, m.expected, m.found
            );
        }
    }
    result += &format_indexes("Undeclared indexes", &report.extra_indexes);
    result
}

pub fn format_stats(stats: &[CollectionStats]) -> String {
    if stats.is_empty() {
        return "No collections to show!\n".to_string();
    }

    let rows: Vec<_> = stats
        .iter()
        .map(|s| {
            [
                s.name.clone(),
                s.count.to_string(),
                s.total_size_bytes.to_string(),
                s.avg_size_bytes().to_string(),
            ]
        })
        .collect();

    format_table(
        ["collection", "documents", "total bytes", "avg bytes"],
        rows.iter().map(|r| r.each_ref().map(String::as_str)),
    )
}

fn unique_flag(unique: bool) -> &'static str {
    if unique {
        "yes"
    } else {
        "no"
    }
}

fn format_names(title: &str, names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("{title}: {}\n", names.join(", "))
    }
}

fn format_indexes(title: &str, indexes: &[CollectionIndex]) -> String {
    indexes
        .iter()
        .map(|i| format!("  {}: {}\n", i.collection, i.index))
        .fold(
            if indexes.is_empty() {
                String::new()
            } else {
                format!("{title}:\n")
            },
            |a, b| a + &b,
        )
}

/// Lay out rows in columns padded to the widest cell.
fn format_table<'a, const N: usize, I>(header: [&str; N], rows: I) -> String
where
    I: Iterator<Item = [&'a str; N]> + Clone,
{
    let mut widths = header.map(str::len);
    for row in rows.clone() {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let format_row = |cells: [&str; N]| {
        let line = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad(cell, width))
            .collect::<Vec<_>>()
            .join(" | ");
        line.trim_end().to_string() + "\n"
    };

    let separator = widths
        .iter()
        .map(|w| repeat('-').take(*w).collect::<String>())
        .collect::<Vec<_>>()
        .join("-+-");

    let mut result = format_row(header);
    result += &separator;
    result += "\n";
    for row in rows {
        result += &format_row(row);
    }
    result
}

fn pad(cell: &str, width: usize) -> String {
    let padding: String = repeat(' ').take(width.saturating_sub(cell.len())).collect();
    format!("{cell}{padding}")
}
