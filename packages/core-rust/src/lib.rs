//! `bizflow` Core: business context, handler/guard/interceptor contracts, and
//! lifecycle definitions.

pub mod context;
pub mod definition;
pub mod error;
pub mod traits;
pub mod types;

pub use context::BusinessContext;
pub use definition::{
    ActionBinding, BusinessDefinition, DefinitionBuilder, ErasedDefinition, LockPolicy,
    StepBuilder,
};
pub use error::{ConfigurationError, FlowError};
pub use traits::{BusinessHandler, FnGuard, Guard, Interceptor};
pub use types::{Action, BusinessType, InterceptorId, PayloadTypes};
