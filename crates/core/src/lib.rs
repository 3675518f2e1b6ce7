pub mod config;
pub mod error;
pub mod result;
pub mod stats;

pub use config::HarnessConfig;
pub use error::*;
pub use result::*;
