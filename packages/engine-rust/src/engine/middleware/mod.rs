//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`trace`]: Dispatch timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes all layers over a `DispatchService`

pub mod load_shed;
pub mod pipeline;
pub mod trace;

pub use load_shed::LoadShedLayer;
pub use pipeline::build_dispatch_pipeline;
pub use trace::TraceLayer;
