//! Integration tests for Category-Harvest
//!
//! - `store_tests`: the claim protocol and document counter under real
//!   concurrency, with several connections to one database file
//! - `harvest_tests`: full harvests against wiremock servers

mod harvest_tests;
mod store_tests;
