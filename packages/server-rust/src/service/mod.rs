//! The gateway-facing side of resolution.
//!
//! 1. **Configuration** (`config`): URI normalisation, header conventions,
//!    negative-cache bound, strict operation checking
//! 2. **Service cache** (`cache`): live service table, registration fan-out
//!    to every resolver, and the ordered resolution chain

pub mod cache;
pub mod config;

pub use cache::{PreParseHook, ServiceCache, CATCH_ALL_URI};
pub use config::ResolverConfig;
