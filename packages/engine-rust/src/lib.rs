//! `bizflow` Engine: dispatches business actions to guarded handlers, serialized
//! per business id.

pub mod engine;
pub mod lock;

pub use engine::{
    build_dispatch_pipeline, BusinessEngine, DefinitionRegistry, DispatchRequest,
    DispatchService, DuplicatePolicy, EngineConfig, InterceptorRegistry, InterceptorResolver,
};
pub use lock::{KeyedLock, LocalKeyedLock, LockError, LockLease};
