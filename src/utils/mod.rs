pub mod assertions;
pub mod config;
pub mod screenshot;
pub mod test_data;

pub use assertions::{AssertionCounts, Assertions};
pub use config::Config;
pub use screenshot::{ScreenshotManager, ScreenshotRecord, ScreenshotReport};
pub use test_data::{random_message, TestDataManager, TestUser};
