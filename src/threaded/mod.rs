//! Multi-threaded layer calls.
//!
//! An arena is not reentrant, so these take one arena per worker and hand
//! each thread its own. Thread count adapts to layer size: small layers run
//! on fewer threads because the overhead isn't worth it.
//!
//! Available implementations:
//! - `linear_mt`: batch rows split across scoped threads

pub mod linear_mt;

pub use linear_mt::{choose_thread_count, linear_parallel};
