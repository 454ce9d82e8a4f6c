//! `bizflow-demo`: dispatches one action for several business ids concurrently
//! and prints each result plus the audit trail as JSON.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizflow_core::{
    Action, BusinessContext, BusinessHandler, BusinessType, DefinitionBuilder, ErasedDefinition,
    FnGuard, Interceptor, InterceptorId,
};
use bizflow_engine::{
    build_dispatch_pipeline, BusinessEngine, DispatchRequest, EngineConfig, InterceptorRegistry,
};
use clap::Parser;
use parking_lot::Mutex;
use serde::Serialize;
use tower::ServiceExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

type DemoCtx = BusinessContext<String, String>;

const EATING: BusinessType = BusinessType::from_static("EATING");
const SLEEPING: BusinessType = BusinessType::from_static("SLEEPING");
const STUDY: BusinessType = BusinessType::from_static("STUDY");
const INIT: Action = Action::from_static("INIT");
const AUDIT: InterceptorId = InterceptorId::from_static("audit");

#[derive(Parser, Debug)]
#[command(name = "bizflow-demo")]
#[command(about = "Dispatch a business action for one or more business ids", long_about = None)]
struct Cli {
    /// Business id to dispatch for; repeat for concurrent dispatches. A random
    /// id is used when none is given.
    #[arg(short, long = "biz-id")]
    biz_ids: Vec<String>,

    /// Business type (EATING, SLEEPING, STUDY)
    #[arg(short = 't', long, default_value = "EATING")]
    business_type: String,

    #[arg(short, long, default_value = "INIT")]
    action: String,

    /// Input handed to every dispatch
    #[arg(short, long, default_value = "bread")]
    input: String,

    /// Simulated handler work per dispatch, in milliseconds
    #[arg(long, default_value_t = 50)]
    work_ms: u64,

    #[arg(long, default_value_t = 3_000)]
    lock_timeout_ms: u64,

    #[arg(long, env = "BIZFLOW_NODE_ID", default_value = "demo")]
    node_id: String,

    /// Log level used when `RUST_LOG` is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

// ---------------------------------------------------------------------------
// Demo handler and audit interceptor
// ---------------------------------------------------------------------------

struct Activity {
    verb: &'static str,
    work: Duration,
}

#[async_trait]
impl BusinessHandler<String, String> for Activity {
    async fn execute(&self, ctx: &DemoCtx) -> anyhow::Result<String> {
        tokio::time::sleep(self.work).await;
        Ok(format!("{} {} {}", ctx.biz_id(), self.verb, ctx.input()))
    }
}

#[derive(Debug, Clone, Serialize)]
struct AuditRecord {
    biz_id: String,
    business_type: BusinessType,
    action: Action,
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
}

#[derive(Default)]
struct AuditTrail {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditTrail {
    fn record(&self, ctx: &DemoCtx, phase: &'static str, result: Option<&String>) {
        self.records.lock().push(AuditRecord {
            biz_id: ctx.biz_id().to_string(),
            business_type: ctx.business_type().clone(),
            action: ctx.action().clone(),
            phase,
            result: result.cloned(),
        });
    }

    fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl Interceptor<String, String> for AuditTrail {
    async fn before_transition(&self, ctx: &DemoCtx) -> anyhow::Result<()> {
        self.record(ctx, "before", None);
        Ok(())
    }

    async fn after_transition(&self, ctx: &DemoCtx, result: &String) -> anyhow::Result<()> {
        self.record(ctx, "after", Some(result));
        Ok(())
    }
}

fn definitions(work: Duration) -> Vec<ErasedDefinition> {
    [(EATING, "eats"), (SLEEPING, "sleeps on"), (STUDY, "studies")]
        .into_iter()
        .map(|(business_type, verb)| {
            DefinitionBuilder::<String, String>::for_type(business_type)
                .when(INIT, Arc::new(Activity { verb, work }))
                .guard(Arc::new(FnGuard::new("always", |_: &DemoCtx| true)))
                .intercept(AUDIT)
                .next()
                .build()
                .into_erased()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DispatchReport {
    biz_id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    retryable: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let audit = Arc::new(AuditTrail::default());
    let interceptors = InterceptorRegistry::new();
    interceptors.register::<String, String>(AUDIT, audit.clone());

    let config = EngineConfig {
        node_id: cli.node_id,
        default_lock_timeout_ms: cli.lock_timeout_ms,
        ..EngineConfig::default()
    };
    let engine = Arc::new(BusinessEngine::local(
        definitions(Duration::from_millis(cli.work_ms)),
        Arc::new(interceptors),
        config.clone(),
    )?);
    let pipeline = build_dispatch_pipeline::<String, String>(engine, &config);

    let biz_ids = if cli.biz_ids.is_empty() {
        vec![Uuid::new_v4().to_string()]
    } else {
        cli.biz_ids
    };
    let business_type = BusinessType::new(cli.business_type);
    let action = Action::new(cli.action);
    info!(dispatches = biz_ids.len(), %business_type, %action, "starting demo");

    let mut tasks = Vec::with_capacity(biz_ids.len());
    for biz_id in biz_ids {
        let req = DispatchRequest::new(
            biz_id.clone(),
            business_type.clone(),
            action.clone(),
            cli.input.clone(),
        );
        tasks.push((biz_id, tokio::spawn(pipeline.clone().oneshot(req))));
    }

    for (biz_id, task) in tasks {
        let report = match task.await? {
            Ok(output) => DispatchReport {
                biz_id,
                ok: true,
                output: Some(output),
                error: None,
                retryable: false,
            },
            Err(err) => DispatchReport {
                biz_id,
                ok: false,
                output: None,
                retryable: err.is_retryable(),
                error: Some(err.to_string()),
            },
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    println!("{}", serde_json::to_string_pretty(&audit.snapshot())?);
    Ok(())
}
