//! Table builder wrapper around comfy-table for consistent list display.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};

/// Create a standard list table with the given headers.
///
/// Uses the NOTHING preset (no borders) for a clean CLI aesthetic.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Two-column key/value table.
pub fn kv_table<K: AsRef<str>, V: AsRef<str>>(rows: &[(K, V)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in rows {
        table.add_row(vec![
            Cell::new(key.as_ref()).set_alignment(CellAlignment::Right),
            Cell::new(value.as_ref()),
        ]);
    }
    table
}
