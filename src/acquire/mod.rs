//! Downloading payloads
//!
//! [`Fetcher`] streams a resolved URL into a temp file; [`filename`] decides
//! what the payload is called once it is placed.

pub mod fetch;
pub mod filename;

pub use fetch::{DownloadResult, Fetcher, PART_PREFIX};
