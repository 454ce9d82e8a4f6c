//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bizflow_core::{Action, BusinessContext, BusinessHandler, BusinessType, Interceptor};
use parking_lot::Mutex;

pub type Ctx = BusinessContext<String, String>;
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub const EATING: BusinessType = BusinessType::from_static("EATING");
pub const SLEEPING: BusinessType = BusinessType::from_static("SLEEPING");
pub const INIT: Action = Action::from_static("INIT");
pub const FINISH: Action = Action::from_static("FINISH");

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Echoes the input and records every hook it receives.
pub struct RecordingHandler {
    log: EventLog,
    calls: AtomicU32,
}

impl RecordingHandler {
    pub fn new(log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            log: log.clone(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusinessHandler<String, String> for RecordingHandler {
    async fn execute(&self, ctx: &Ctx) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push("execute".to_string());
        Ok(ctx.input().clone())
    }

    async fn on_enter(&self, _ctx: &Ctx, _result: Option<&String>) -> anyhow::Result<()> {
        self.log.lock().push("on_enter".to_string());
        Ok(())
    }

    async fn on_completed(&self, _ctx: &Ctx, _result: &String) -> anyhow::Result<()> {
        self.log.lock().push("on_completed".to_string());
        Ok(())
    }
}

/// Error raised by a failing interceptor, so tests can downcast it.
#[derive(Debug, thiserror::Error)]
#[error("interceptor {order} refused")]
pub struct Refused {
    pub order: i32,
}

/// Logs `before:N` / `after:N`; optionally fails its before hook.
pub struct OrderedInterceptor {
    order: i32,
    log: EventLog,
    fail_before: bool,
}

impl OrderedInterceptor {
    pub fn new(order: i32, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            order,
            log: log.clone(),
            fail_before: false,
        })
    }

    pub fn failing(order: i32, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            order,
            log: log.clone(),
            fail_before: true,
        })
    }
}

#[async_trait]
impl Interceptor<String, String> for OrderedInterceptor {
    async fn before_transition(&self, _ctx: &Ctx) -> anyhow::Result<()> {
        self.log.lock().push(format!("before:{}", self.order));
        if self.fail_before {
            return Err(Refused { order: self.order }.into());
        }
        Ok(())
    }

    async fn after_transition(&self, _ctx: &Ctx, _result: &String) -> anyhow::Result<()> {
        self.log.lock().push(format!("after:{}", self.order));
        Ok(())
    }

    fn order(&self) -> i32 {
        self.order
    }
}
