//! Business lifecycle definitions: the action -> handler/guards mapping for one
//! business type, plus the builder used to assemble it at startup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::context::BusinessContext;
use crate::error::ConfigurationError;
use crate::traits::{BusinessHandler, Guard};
use crate::types::{Action, BusinessType, InterceptorId, PayloadTypes};

// ---------------------------------------------------------------------------
// LockPolicy
// ---------------------------------------------------------------------------

/// How a dispatch for an action is keyed and bounded on the execution lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    /// Lock key template. Supports `{biz_id}`, `{business_type}` and `{action}`.
    pub key_template: String,
    /// Acquisition timeout. `None` falls back to the engine default.
    pub timeout: Option<Duration>,
}

impl LockPolicy {
    pub const BIZ_ID: &'static str = "{biz_id}";
    pub const BUSINESS_TYPE: &'static str = "{business_type}";
    pub const ACTION: &'static str = "{action}";

    /// Policy with a custom key template and the engine's default timeout.
    #[must_use]
    pub fn keyed(key_template: impl Into<String>) -> Self {
        Self {
            key_template: key_template.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Renders the lock key for a context.
    ///
    /// Placeholders are substituted in a single pass over the template;
    /// substituted values are copied verbatim, so a biz id containing
    /// `{action}` is never expanded a second time.
    #[must_use]
    pub fn render_key<T, R>(&self, ctx: &BusinessContext<T, R>) -> String {
        let placeholders = [
            (Self::BIZ_ID, ctx.biz_id()),
            (Self::BUSINESS_TYPE, ctx.business_type().as_str()),
            (Self::ACTION, ctx.action().as_str()),
        ];

        let mut key = String::with_capacity(self.key_template.len() + ctx.biz_id().len());
        let mut rest = self.key_template.as_str();
        while let Some(start) = rest.find('{') {
            key.push_str(&rest[..start]);
            let tail = &rest[start..];
            match placeholders
                .iter()
                .find(|(placeholder, _)| tail.starts_with(*placeholder))
            {
                Some(&(placeholder, value)) => {
                    key.push_str(value);
                    rest = &tail[placeholder.len()..];
                }
                None => {
                    key.push('{');
                    rest = &tail[1..];
                }
            }
        }
        key.push_str(rest);
        key
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::keyed(Self::BIZ_ID)
    }
}

// ---------------------------------------------------------------------------
// ActionBinding
// ---------------------------------------------------------------------------

/// Everything registered for one action: its handler, guards in evaluation
/// order, interceptor identifiers, and lock policy.
pub struct ActionBinding<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    handler: Arc<dyn BusinessHandler<T, R>>,
    guards: Vec<Arc<dyn Guard<T, R>>>,
    interceptors: Vec<InterceptorId>,
    lock_policy: LockPolicy,
}

impl<T, R> ActionBinding<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    fn new(handler: Arc<dyn BusinessHandler<T, R>>) -> Self {
        Self {
            handler,
            guards: Vec::new(),
            interceptors: Vec::new(),
            lock_policy: LockPolicy::default(),
        }
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn BusinessHandler<T, R>> {
        &self.handler
    }

    #[must_use]
    pub fn guards(&self) -> &[Arc<dyn Guard<T, R>>] {
        &self.guards
    }

    /// Interceptor identifiers in declaration order. The engine sorts the
    /// resolved instances by `order()` before running them.
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorId] {
        &self.interceptors
    }

    #[must_use]
    pub fn lock_policy(&self) -> &LockPolicy {
        &self.lock_policy
    }
}

// ---------------------------------------------------------------------------
// BusinessDefinition
// ---------------------------------------------------------------------------

/// Immutable mapping, for one business type, from action to its binding.
pub struct BusinessDefinition<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    business_type: BusinessType,
    bindings: HashMap<Action, ActionBinding<T, R>>,
}

impl<T, R> BusinessDefinition<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    #[must_use]
    pub fn business_type(&self) -> &BusinessType {
        &self.business_type
    }

    #[must_use]
    pub fn binding(&self, action: &Action) -> Option<&ActionBinding<T, R>> {
        self.bindings.get(action)
    }

    /// The handler registered for `action`, if any.
    #[must_use]
    pub fn handler_for(&self, action: &Action) -> Option<&Arc<dyn BusinessHandler<T, R>>> {
        self.bindings.get(action).map(ActionBinding::handler)
    }

    /// Guards for `action` in evaluation order. Empty when none are declared.
    #[must_use]
    pub fn guards_for(&self, action: &Action) -> &[Arc<dyn Guard<T, R>>] {
        match self.bindings.get(action) {
            Some(binding) => binding.guards(),
            None => &[],
        }
    }

    /// Actions configured for this business type, in no particular order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.bindings.keys()
    }
}

impl<T, R> BusinessDefinition<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Erases the payload types so definitions of different shapes can share a
    /// registry.
    #[must_use]
    pub fn into_erased(self) -> ErasedDefinition {
        ErasedDefinition {
            business_type: self.business_type.clone(),
            payload: PayloadTypes::of::<T, R>(),
            inner: Arc::new(self),
        }
    }
}

impl<T, R> fmt::Debug for BusinessDefinition<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.bindings.keys().map(Action::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("BusinessDefinition")
            .field("business_type", &self.business_type)
            .field("actions", &actions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ErasedDefinition
// ---------------------------------------------------------------------------

/// A `BusinessDefinition` with its payload types erased behind a runtime tag.
#[derive(Clone)]
pub struct ErasedDefinition {
    business_type: BusinessType,
    payload: PayloadTypes,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ErasedDefinition {
    #[must_use]
    pub fn business_type(&self) -> &BusinessType {
        &self.business_type
    }

    #[must_use]
    pub fn payload_types(&self) -> PayloadTypes {
        self.payload
    }

    /// Recovers the typed definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::PayloadTypeMismatch` if the definition was
    /// registered with payload types other than `(T, R)`.
    pub fn downcast<T, R>(&self) -> Result<Arc<BusinessDefinition<T, R>>, ConfigurationError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let mismatch = || ConfigurationError::PayloadTypeMismatch {
            subject: format!("definition [{}]", self.business_type),
            registered: self.payload,
            requested: PayloadTypes::of::<T, R>(),
        };
        if !self.payload.matches::<T, R>() {
            return Err(mismatch());
        }
        Arc::clone(&self.inner)
            .downcast::<BusinessDefinition<T, R>>()
            .map_err(|_| mismatch())
    }
}

impl fmt::Debug for ErasedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedDefinition")
            .field("business_type", &self.business_type)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

impl<T, R> From<BusinessDefinition<T, R>> for ErasedDefinition
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn from(def: BusinessDefinition<T, R>) -> Self {
        def.into_erased()
    }
}

// ---------------------------------------------------------------------------
// DefinitionBuilder
// ---------------------------------------------------------------------------

/// Assembles a `BusinessDefinition`:
///
/// ```
/// # use std::sync::Arc;
/// # use async_trait::async_trait;
/// # use bizflow_core::{Action, BusinessContext, BusinessHandler, BusinessType, DefinitionBuilder, FnGuard};
/// struct Echo;
///
/// #[async_trait]
/// impl BusinessHandler<String, String> for Echo {
///     async fn execute(&self, ctx: &BusinessContext<String, String>) -> anyhow::Result<String> {
///         Ok(ctx.input().clone())
///     }
/// }
///
/// let def = DefinitionBuilder::<String, String>::for_type(BusinessType::from_static("EATING"))
///     .when(Action::from_static("INIT"), Arc::new(Echo))
///     .guard(Arc::new(FnGuard::new("always", |_: &BusinessContext<String, String>| true)))
///     .intercept("audit")
///     .next()
///     .build();
/// assert!(def.handler_for(&Action::from_static("INIT")).is_some());
/// ```
pub struct DefinitionBuilder<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    business_type: BusinessType,
    bindings: HashMap<Action, ActionBinding<T, R>>,
}

impl<T, R> DefinitionBuilder<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    #[must_use]
    pub fn for_type(business_type: BusinessType) -> Self {
        Self {
            business_type,
            bindings: HashMap::new(),
        }
    }

    /// Binds `handler` to `action` and returns a step builder for its guards,
    /// interceptors, and lock policy.
    ///
    /// Binding an action twice replaces the earlier binding entirely.
    #[must_use]
    pub fn when(self, action: Action, handler: Arc<dyn BusinessHandler<T, R>>) -> StepBuilder<T, R> {
        StepBuilder {
            parent: self,
            action,
            binding: ActionBinding::new(handler),
        }
    }

    #[must_use]
    pub fn build(self) -> BusinessDefinition<T, R> {
        BusinessDefinition {
            business_type: self.business_type,
            bindings: self.bindings,
        }
    }
}

/// Configures the binding of a single action. Returned by [`DefinitionBuilder::when`].
pub struct StepBuilder<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    parent: DefinitionBuilder<T, R>,
    action: Action,
    binding: ActionBinding<T, R>,
}

impl<T, R> StepBuilder<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    /// Appends a guard; guards run in the order they are added.
    #[must_use]
    pub fn guard(mut self, guard: Arc<dyn Guard<T, R>>) -> Self {
        self.binding.guards.push(guard);
        self
    }

    /// Declares an interceptor by identifier; resolved by the engine at dispatch.
    #[must_use]
    pub fn intercept(mut self, id: impl Into<InterceptorId>) -> Self {
        self.binding.interceptors.push(id.into());
        self
    }

    #[must_use]
    pub fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.binding.lock_policy = policy;
        self
    }

    /// Returns to the definition builder to bind the next action.
    #[must_use]
    pub fn next(self) -> DefinitionBuilder<T, R> {
        let Self {
            mut parent,
            action,
            binding,
        } = self;
        if parent.bindings.insert(action.clone(), binding).is_some() {
            warn!(
                business_type = %parent.business_type,
                action = %action,
                "action defined more than once, replacing earlier binding"
            );
        }
        parent
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::traits::FnGuard;

    const EATING: BusinessType = BusinessType::from_static("EATING");
    const INIT: Action = Action::from_static("INIT");
    const FINISH: Action = Action::from_static("FINISH");

    struct Fixed(&'static str);

    #[async_trait]
    impl BusinessHandler<String, String> for Fixed {
        async fn execute(&self, _ctx: &BusinessContext<String, String>) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn always(name: &'static str) -> Arc<dyn Guard<String, String>> {
        Arc::new(FnGuard::new(name, |_: &BusinessContext<String, String>| true))
    }

    fn make_ctx() -> BusinessContext<String, String> {
        BusinessContext::new("order-1", EATING, INIT, String::new())
    }

    #[tokio::test]
    async fn builder_binds_handlers_guards_and_interceptors() {
        let def = DefinitionBuilder::<String, String>::for_type(EATING)
            .when(INIT, Arc::new(Fixed("init")))
            .guard(always("first"))
            .guard(always("second"))
            .intercept("audit")
            .intercept("timing")
            .next()
            .when(FINISH, Arc::new(Fixed("finish")))
            .next()
            .build();

        assert_eq!(def.business_type(), &EATING);
        let guard_names: Vec<&str> = def.guards_for(&INIT).iter().map(|g| g.name()).collect();
        assert_eq!(guard_names, vec!["first", "second"]);
        assert!(def.guards_for(&FINISH).is_empty());

        let binding = def.binding(&INIT).unwrap();
        assert_eq!(
            binding.interceptors(),
            &[InterceptorId::from("audit"), InterceptorId::from("timing")]
        );
        assert_eq!(binding.lock_policy(), &LockPolicy::default());

        let handler = def.handler_for(&FINISH).unwrap();
        assert_eq!(handler.execute(&make_ctx()).await.unwrap(), "finish");
        assert_eq!(def.actions().count(), 2);
    }

    #[test]
    fn unknown_action_has_no_handler_and_no_guards() {
        let def = DefinitionBuilder::<String, String>::for_type(EATING)
            .when(INIT, Arc::new(Fixed("init")))
            .next()
            .build();
        assert!(def.handler_for(&FINISH).is_none());
        assert!(def.guards_for(&FINISH).is_empty());
    }

    #[tokio::test]
    async fn redefining_an_action_replaces_the_binding() {
        let def = DefinitionBuilder::<String, String>::for_type(EATING)
            .when(INIT, Arc::new(Fixed("old")))
            .guard(always("old-guard"))
            .next()
            .when(INIT, Arc::new(Fixed("new")))
            .next()
            .build();

        let handler = def.handler_for(&INIT).unwrap();
        assert_eq!(handler.execute(&make_ctx()).await.unwrap(), "new");
        assert!(def.guards_for(&INIT).is_empty());
    }

    #[test]
    fn lock_policy_renders_placeholders() {
        let policy = LockPolicy::keyed("{business_type}:{action}:{biz_id}")
            .with_timeout(Duration::from_millis(250));
        assert_eq!(policy.render_key(&make_ctx()), "EATING:INIT:order-1");
        assert_eq!(policy.timeout, Some(Duration::from_millis(250)));
        assert_eq!(LockPolicy::default().render_key(&make_ctx()), "order-1");
    }

    #[test]
    fn placeholder_text_inside_biz_id_is_not_expanded() {
        let ctx = BusinessContext::<String, String>::new("{action}", EATING, INIT, String::new());
        assert_eq!(LockPolicy::default().render_key(&ctx), "{action}");

        let ctx =
            BusinessContext::<String, String>::new("{business_type}-7", EATING, INIT, String::new());
        assert_eq!(
            LockPolicy::keyed("{action}/{biz_id}").render_key(&ctx),
            "INIT/{business_type}-7"
        );
    }

    #[test]
    fn unknown_braces_in_template_are_kept() {
        let policy = LockPolicy::keyed("{tenant}:{biz_id}:{");
        assert_eq!(policy.render_key(&make_ctx()), "{tenant}:order-1:{");
    }

    #[test]
    fn erased_definition_downcasts_to_registered_types_only() {
        let erased: ErasedDefinition = DefinitionBuilder::<String, String>::for_type(EATING)
            .when(INIT, Arc::new(Fixed("init")))
            .next()
            .build()
            .into();

        assert_eq!(erased.business_type(), &EATING);
        assert!(erased.downcast::<String, String>().is_ok());

        let err = erased.downcast::<u32, String>().unwrap_err();
        assert!(matches!(err, ConfigurationError::PayloadTypeMismatch { .. }));
        assert!(err.to_string().contains("definition [EATING]"));
    }

    #[test]
    fn debug_lists_sorted_actions() {
        let def = DefinitionBuilder::<String, String>::for_type(EATING)
            .when(INIT, Arc::new(Fixed("init")))
            .next()
            .when(FINISH, Arc::new(Fixed("finish")))
            .next()
            .build();
        let rendered = format!("{def:?}");
        assert!(rendered.contains("[\"FINISH\", \"INIT\"]"));
    }

    proptest::proptest! {
        #[test]
        fn default_policy_keys_on_biz_id_alone(
            biz_id in "([a-zA-Z0-9:_{}-]|\\{biz_id\\}|\\{action\\}|\\{business_type\\}){1,20}"
        ) {
            let ctx = BusinessContext::<String, String>::new(biz_id.clone(), EATING, INIT, String::new());
            proptest::prop_assert_eq!(LockPolicy::default().render_key(&ctx), biz_id);
        }

        #[test]
        fn distinct_biz_ids_render_distinct_keys(
            a in "[a-zA-Z{}_]{1,20}",
            b in "[a-zA-Z{}_]{1,20}",
        ) {
            proptest::prop_assume!(a != b);
            let policy = LockPolicy::keyed("{business_type}:{biz_id}:{action}");
            let key_a = policy.render_key(&BusinessContext::<String, String>::new(a, EATING, INIT, String::new()));
            let key_b = policy.render_key(&BusinessContext::<String, String>::new(b, EATING, INIT, String::new()));
            proptest::prop_assert_ne!(key_a, key_b);
        }
    }
}
