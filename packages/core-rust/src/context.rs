use crate::types::{Action, BusinessType};

/// Per-dispatch context threaded through guards, interceptors, and the handler.
///
/// Everything except `output` is fixed at creation. `output` starts empty and is
/// written once by the engine after the handler chain succeeds; it exists for
/// audit and observability, callers receive the result from `process` directly.
#[derive(Debug, Clone)]
pub struct BusinessContext<T, R> {
    biz_id: String,
    business_type: BusinessType,
    action: Action,
    input: T,
    output: Option<R>,
}

impl<T, R> BusinessContext<T, R> {
    /// Creates a fresh context with no output.
    #[must_use]
    pub fn new(
        biz_id: impl Into<String>,
        business_type: BusinessType,
        action: Action,
        input: T,
    ) -> Self {
        Self {
            biz_id: biz_id.into(),
            business_type,
            action,
            input,
            output: None,
        }
    }

    /// Business identifier; also the default key of the keyed execution lock.
    #[must_use]
    pub fn biz_id(&self) -> &str {
        &self.biz_id
    }

    #[must_use]
    pub fn business_type(&self) -> &BusinessType {
        &self.business_type
    }

    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    #[must_use]
    pub fn input(&self) -> &T {
        &self.input
    }

    /// The recorded result, if the dispatch has completed.
    #[must_use]
    pub fn output(&self) -> Option<&R> {
        self.output.as_ref()
    }

    /// Records the dispatch result.
    ///
    /// The output is write-once: a second call leaves the first value in place
    /// and returns the rejected value back to the caller.
    ///
    /// # Errors
    ///
    /// Returns `Err(output)` if an output was already recorded.
    pub fn set_output(&mut self, output: R) -> Result<(), R> {
        if self.output.is_some() {
            tracing::warn!(
                biz_id = %self.biz_id,
                business_type = %self.business_type,
                action = %self.action,
                "context output already recorded, ignoring second write"
            );
            return Err(output);
        }
        self.output = Some(output);
        Ok(())
    }

    /// Consumes the context and returns the recorded output.
    #[must_use]
    pub fn into_output(self) -> Option<R> {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx() -> BusinessContext<&'static str, String> {
        BusinessContext::new(
            "X",
            BusinessType::from_static("EATING"),
            Action::from_static("INIT"),
            "bread",
        )
    }

    #[test]
    fn new_context_has_no_output() {
        let ctx = make_ctx();
        assert_eq!(ctx.biz_id(), "X");
        assert_eq!(ctx.business_type().as_str(), "EATING");
        assert_eq!(ctx.action().as_str(), "INIT");
        assert_eq!(*ctx.input(), "bread");
        assert!(ctx.output().is_none());
    }

    #[test]
    fn output_is_write_once() {
        let mut ctx = make_ctx();
        assert!(ctx.set_output("first".to_string()).is_ok());
        let rejected = ctx.set_output("second".to_string()).unwrap_err();
        assert_eq!(rejected, "second");
        assert_eq!(ctx.output().map(String::as_str), Some("first"));
        assert_eq!(ctx.into_output().as_deref(), Some("first"));
    }
}
