pub mod encoding;
pub mod separator;
pub mod table;

pub use encoding::{decode_text, detect_encoding};
pub use separator::detect_separator;
pub use table::{parse_table, Cell, Table, TableOptions};
