//! Typed helpers over `DurableContext`.
//!
//! Handlers that journal their own work (prompt chains, notifications) use
//! `run_typed` instead of dealing with encoded bytes.

use std::time::Duration;

use serde_json::Value;

use keel_codec::{Typed, TypedCodec};
use keel_contracts::{
    error::KeelResult,
    retry::RetryPolicy,
    run::{RunId, StepName},
};

use crate::traits::{DurableContext, StepAction};

/// Run `action` as a durable step named `name` and decode its result as `T`.
///
/// The closure receives the 1-based attempt number. Its result is encoded
/// with `T`'s declared type before being recorded, so a value that violates
/// `T`'s schema ends the step with `InvalidPayload`.
pub fn run_typed<T, F>(
    ctx: &dyn DurableContext,
    name: impl Into<String>,
    policy: &RetryPolicy,
    mut action: F,
) -> KeelResult<T>
where
    T: Typed,
    F: FnMut(u32) -> KeelResult<T>,
{
    let codec = TypedCodec::new();
    let bytes = ctx.run_step(
        StepName::custom(name),
        Value::Null,
        policy,
        &mut |attempt: u32| {
            let value = action(attempt)?;
            codec.encode(&value)
        },
    )?;
    codec.decode(&bytes)
}

/// A view of a context whose steps are named `<scope>/<name>`.
///
/// Lets several agents share one run: each gets its own scope, so their
/// `model:0` steps do not collide.
pub struct Scoped<'a> {
    inner: &'a dyn DurableContext,
    scope: String,
}

impl<'a> Scoped<'a> {
    pub fn new(inner: &'a dyn DurableContext, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }
}

impl DurableContext for Scoped<'_> {
    fn run_id(&self) -> &RunId {
        self.inner.run_id()
    }

    fn run_step(
        &self,
        name: StepName,
        input: Value,
        policy: &RetryPolicy,
        action: &mut StepAction<'_>,
    ) -> KeelResult<Vec<u8>> {
        self.inner
            .run_step(name.within(&self.scope), input, policy, action)
    }

    fn sleep(&self, duration: Duration) -> KeelResult<()> {
        self.inner.sleep(duration)
    }

    fn unique_id(&self) -> KeelResult<String> {
        self.inner.unique_id()
    }
}
