//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `PageStatus`: The lifecycle of a page in the durable work queue
//!   (pending, in progress, done, failed)

mod page_status;

pub use page_status::PageStatus;
