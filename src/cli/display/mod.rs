//! Display helpers shared by the commands.

pub mod colors;
pub mod table;

pub use colors::{colorize_mode, colorize_risk, colorize_step_status};
pub use table::{kv_table, list_table};
