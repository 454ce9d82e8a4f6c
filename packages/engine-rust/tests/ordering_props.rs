//! Property-based tests for guard short-circuiting and interceptor ordering.

mod common;

use std::sync::Arc;

use bizflow_core::{DefinitionBuilder, FlowError, FnGuard};
use bizflow_engine::{BusinessEngine, EngineConfig, InterceptorRegistry};
use common::{event_log, Ctx, OrderedInterceptor, RecordingHandler, EATING, INIT};
use proptest::prelude::*;

fn distinct_orders() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::hash_set(-50i32..50, 0..8)
        .prop_map(|orders| orders.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    #[test]
    fn befores_ascend_and_afters_mirror_them(declared in distinct_orders()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let log = event_log();
            let resolver = InterceptorRegistry::new();
            let mut step = DefinitionBuilder::<String, String>::for_type(EATING)
                .when(INIT, RecordingHandler::new(&log));
            for order in &declared {
                let id = format!("i{order}");
                resolver.register::<String, String>(id.clone(), OrderedInterceptor::new(*order, &log));
                step = step.intercept(id);
            }
            let engine = BusinessEngine::local(
                vec![step.next().build().into_erased()],
                Arc::new(resolver),
                EngineConfig::default(),
            )
            .unwrap();

            engine
                .process::<String, String>("X", EATING, INIT, "bread".to_string())
                .await
                .unwrap();

            let mut sorted = declared.clone();
            sorted.sort_unstable();
            let mut expected: Vec<String> =
                sorted.iter().map(|order| format!("before:{order}")).collect();
            expected.extend(["on_enter", "execute", "on_completed"].map(String::from));
            expected.extend(sorted.iter().rev().map(|order| format!("after:{order}")));
            assert_eq!(*log.lock(), expected);
        });
    }

    #[test]
    fn handler_runs_only_when_every_guard_passes(
        verdicts in prop::collection::vec(any::<bool>(), 0..6)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let log = event_log();
            let handler = RecordingHandler::new(&log);
            let mut step = DefinitionBuilder::<String, String>::for_type(EATING)
                .when(INIT, handler.clone());
            for (i, verdict) in verdicts.iter().copied().enumerate() {
                let log = log.clone();
                step = step.guard(Arc::new(FnGuard::new("verdict", move |_: &Ctx| {
                    log.lock().push(format!("guard:{i}"));
                    verdict
                })));
            }
            let engine = BusinessEngine::local(
                vec![step.next().build().into_erased()],
                Arc::new(InterceptorRegistry::new()),
                EngineConfig::default(),
            )
            .unwrap();

            let result = engine
                .process::<String, String>("X", EATING, INIT, "bread".to_string())
                .await;

            let evaluated = log
                .lock()
                .iter()
                .filter(|entry| entry.starts_with("guard:"))
                .count();
            match verdicts.iter().position(|verdict| !verdict) {
                Some(first_false) => {
                    assert!(matches!(result, Err(FlowError::GuardRejected { .. })));
                    assert_eq!(evaluated, first_false + 1);
                    assert_eq!(handler.calls(), 0);
                }
                None => {
                    assert_eq!(result.unwrap(), "bread");
                    assert_eq!(evaluated, verdicts.len());
                    assert_eq!(handler.calls(), 1);
                }
            }
        });
    }
}
