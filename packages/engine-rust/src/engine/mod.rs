//! Business dispatch: definition lookup, guards, interceptors, and handler
//! execution under a keyed lock.
//!
//! A dispatch flows through:
//!
//! 1. **Registry** (`registry`): business type -> `BusinessDefinition`
//! 2. **Lock** (`crate::lock`): serialize dispatches sharing a lock key
//! 3. **Guards** (`guard`): sequential, short-circuiting preconditions
//! 4. **Interceptors** (`interceptors`): resolved by identifier, sorted by order
//! 5. **Chain** (`chain`): before hooks, handler, after hooks in reverse
//!
//! `dispatcher::BusinessEngine` drives the steps; `service` and `middleware`
//! expose it as a tower service stack.

pub mod chain;
pub mod config;
pub mod dispatcher;
pub mod guard;
pub mod interceptors;
pub mod middleware;
pub mod registry;
pub mod service;

// Re-export key types for convenient access.
pub use chain::HandlerChain;
pub use config::{DuplicatePolicy, EngineConfig};
pub use dispatcher::BusinessEngine;
pub use guard::evaluate_guards;
pub use interceptors::{resolve_sorted, ErasedInterceptor, InterceptorRegistry, InterceptorResolver};
pub use middleware::build_dispatch_pipeline;
pub use registry::DefinitionRegistry;
pub use service::{DispatchRequest, DispatchService};
