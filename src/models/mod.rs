// Request/Response models
pub mod common;
pub mod purchase;
pub mod records;
