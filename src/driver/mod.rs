pub mod traits;
pub mod web;

#[cfg(test)]
pub(crate) mod scripted;

pub use traits::BrowserDriver;
pub use web::{BrowserType, PlaywrightDriver, WebDriverConfig};
