//! Command handlers. Each returns the process exit code.

pub mod audit;
pub mod list;
pub mod run;
pub mod validate;

use comfy_table::{presets::UTF8_FULL, Table};

/// Table with the standard preset.
pub(crate) fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}
