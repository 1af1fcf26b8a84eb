pub mod checker;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod plugins;
pub mod utils;

// Re-export commonly used types
pub use checker::{PageChecker, RunReport};
pub use config::AppConfig;
pub use fetcher::{ChromeFetcher, PageFetcher, RenderedDocument};
pub use models::{CheckOutcome, CheckRequest, CheckResult};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
