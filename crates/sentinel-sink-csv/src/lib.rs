pub mod error;
pub mod writer;

pub use error::{CsvSinkError, Result};
pub use writer::CsvSink;
