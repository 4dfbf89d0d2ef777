//! Excel input/output: calamine for reading, rust_xlsxwriter for writing

pub mod reader;
pub mod writer;

pub use reader::{WorkbookInput, read_workbook};
pub use writer::write_results;
