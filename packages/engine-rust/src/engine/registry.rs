use std::collections::HashMap;
use std::sync::Arc;

use bizflow_core::{BusinessDefinition, BusinessType, ConfigurationError, ErasedDefinition};
use tracing::{error, info};

use super::config::DuplicatePolicy;

// ---------------------------------------------------------------------------
// DefinitionRegistry
// ---------------------------------------------------------------------------

/// Business type -> lifecycle definition lookup.
///
/// Built once from the full set of definitions at startup and read-only
/// afterwards, so lookups need no synchronization. Definitions are stored
/// type-erased with their payload tag; `get_definition` checks the tag before
/// handing out the typed definition.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<BusinessType, ErasedDefinition>,
}

impl DefinitionRegistry {
    /// Registers `defs` in order. A later definition for an already registered
    /// business type replaces the earlier one; each duplicate is logged.
    #[must_use]
    pub fn new(defs: impl IntoIterator<Item = ErasedDefinition>) -> Self {
        let mut definitions = HashMap::new();
        for def in defs {
            if let Some(previous) = definitions.insert(def.business_type().clone(), def) {
                error!(
                    business_type = %previous.business_type(),
                    replaced = ?previous,
                    "duplicate lifecycle definition, later registration wins"
                );
            }
        }
        info!(count = definitions.len(), "lifecycle definitions registered");
        Self { definitions }
    }

    /// Registers `defs`, resolving duplicate business types per `policy`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateDefinition` for the first
    /// duplicate when `policy` is `DuplicatePolicy::Reject`.
    pub fn build(
        defs: impl IntoIterator<Item = ErasedDefinition>,
        policy: DuplicatePolicy,
    ) -> Result<Self, ConfigurationError> {
        match policy {
            DuplicatePolicy::Replace => Ok(Self::new(defs)),
            DuplicatePolicy::Reject => {
                let mut definitions = HashMap::new();
                for def in defs {
                    let business_type = def.business_type().clone();
                    if definitions.contains_key(&business_type) {
                        error!(%business_type, "duplicate lifecycle definition rejected");
                        return Err(ConfigurationError::DuplicateDefinition { business_type });
                    }
                    definitions.insert(business_type, def);
                }
                info!(count = definitions.len(), "lifecycle definitions registered");
                Ok(Self { definitions })
            }
        }
    }

    /// Retrieve the typed definition for a business type.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::DefinitionNotFound` if nothing is registered for
    ///   `business_type`.
    /// - `ConfigurationError::PayloadTypeMismatch` if the definition was
    ///   registered with payload types other than `(T, R)`.
    pub fn get_definition<T, R>(
        &self,
        business_type: &BusinessType,
    ) -> Result<Arc<BusinessDefinition<T, R>>, ConfigurationError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.definitions
            .get(business_type)
            .ok_or_else(|| ConfigurationError::DefinitionNotFound {
                business_type: business_type.clone(),
            })?
            .downcast::<T, R>()
    }

    #[must_use]
    pub fn contains(&self, business_type: &BusinessType) -> bool {
        self.definitions.contains_key(business_type)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn business_types(&self) -> impl Iterator<Item = &BusinessType> {
        self.definitions.keys()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
