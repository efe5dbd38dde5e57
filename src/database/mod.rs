// Database module
// SQLite for documents and chunks, a flat file-backed index for vectors

pub mod sqlite;
pub mod vector;

pub use sqlite::*;
