pub mod driver;
pub mod error;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;
pub mod widget;

// Re-export common items
pub use error::{classify, ErrorKind, HarnessError, Severity};
pub use runner::{run_path, validate_path};
pub use utils::Config;
