pub mod check_request;
pub mod check_result;

// Re-exports for convenience
pub use check_request::*;
pub use check_result::*;
