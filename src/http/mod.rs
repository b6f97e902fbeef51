//! HTTP protocol layer module
//!
//! Request parsing, Range header handling, media types and response heads.
//! Nothing in here touches sockets or files.

pub mod mime;
pub mod range;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use range::RangeSpec;
pub use request::parse;
pub use response::Status;
