pub mod error;
pub mod session;
pub mod sheet;
pub mod writer;

pub use error::{Result, WorkbookError};
pub use session::WorkbookSession;
pub use sheet::WorkbookSheet;
pub use writer::WorkbookSink;
