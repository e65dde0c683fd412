//! Step definitions.
//!
//! A step is the unit of work of a workflow: a forward action that may be
//! undone later by a compensating action. Steps are defined either by
//! implementing [`Step`] or from closures with [`from_fn`].

use std::marker::PhantomData;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::container::ServiceRequirement;
use crate::context::ExecutionContext;
use crate::error::StepError;

/// Result of a step's forward action.
///
/// `output` is stored under the step's alias for later nodes. `compensate_with`
/// is kept by the engine and handed back to the compensation if a later node
/// fails; `None` means there is nothing to undo.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse<O, C = O> {
    pub output: O,
    pub compensate_with: Option<C>,
}

impl<O, C> StepResponse<O, C> {
    pub fn new(output: O, compensate_with: C) -> Self {
        Self {
            output,
            compensate_with: Some(compensate_with),
        }
    }

    pub fn without_compensation(output: O) -> Self {
        Self {
            output,
            compensate_with: None,
        }
    }
}

impl<O: Clone> StepResponse<O, O> {
    /// Uses the output itself as the compensation input.
    pub fn compensate_with_output(output: O) -> Self {
        Self {
            compensate_with: Some(output.clone()),
            output,
        }
    }
}

/// A unit of work with an optional compensating action.
///
/// Inputs and outputs cross the workflow as JSON, hence the serde bounds.
#[async_trait]
pub trait Step: Send + Sync + 'static {
    /// Data the forward action receives.
    type Input: DeserializeOwned + Send + 'static;

    /// Data stored under the step's alias.
    type Output: Serialize + Send + 'static;

    /// Data the compensation receives.
    type CompensateInput: Serialize + DeserializeOwned + Send + 'static;

    /// Stable name used in logs, events and failures.
    fn name(&self) -> &str;

    /// Services this step resolves at runtime.
    ///
    /// The engine checks every declared key and type before the first node
    /// runs.
    fn requires(&self) -> Vec<ServiceRequirement> {
        Vec::new()
    }

    /// Performs the forward action.
    async fn invoke(
        &self,
        input: Self::Input,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Self::Output, Self::CompensateInput>, StepError>;

    /// Undoes the forward action.
    ///
    /// Called only if `invoke` returned `Ok` in the same run. Must treat
    /// `None` as a no-op. The default does nothing, which suits read-only
    /// steps.
    async fn compensate(
        &self,
        input: Option<Self::CompensateInput>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let _ = (input, ctx);
        Ok(())
    }
}

type InvokeFn<I, O, C> = dyn for<'a> Fn(I, &'a ExecutionContext) -> BoxFuture<'a, Result<StepResponse<O, C>, StepError>>
    + Send
    + Sync;

type CompensateFn<C> =
    dyn for<'a> Fn(Option<C>, &'a ExecutionContext) -> BoxFuture<'a, Result<(), StepError>> + Send + Sync;

/// A step built from closures.
pub struct FnStep<I, O, C> {
    name: String,
    requires: Vec<ServiceRequirement>,
    invoke: Box<InvokeFn<I, O, C>>,
    compensate: Option<Box<CompensateFn<C>>>,
    _types: PhantomData<fn(I) -> (O, C)>,
}

/// Creates a step from a forward closure.
///
/// ```ignore
/// let reserve = step::from_fn("reserve-inventory", |input: Order, ctx| {
///     async move { /* ... */ }.boxed()
/// })
/// .with_compensation(|reservation: Option<Reservation>, ctx| {
///     async move { /* ... */ }.boxed()
/// });
/// ```
pub fn from_fn<I, O, C, F>(name: impl Into<String>, invoke: F) -> FnStep<I, O, C>
where
    F: for<'a> Fn(I, &'a ExecutionContext) -> BoxFuture<'a, Result<StepResponse<O, C>, StepError>>
        + Send
        + Sync
        + 'static,
{
    FnStep {
        name: name.into(),
        requires: Vec::new(),
        invoke: Box::new(invoke),
        compensate: None,
        _types: PhantomData,
    }
}

impl<I, O, C> FnStep<I, O, C> {
    /// Adds a compensating closure.
    pub fn with_compensation<G>(mut self, compensate: G) -> Self
    where
        G: for<'a> Fn(Option<C>, &'a ExecutionContext) -> BoxFuture<'a, Result<(), StepError>>
            + Send
            + Sync
            + 'static,
    {
        self.compensate = Some(Box::new(compensate));
        self
    }

    /// Declares a service the closures resolve as a `T`.
    pub fn requiring<T: Send + Sync + 'static>(mut self, key: &'static str) -> Self {
        self.requires.push(ServiceRequirement::of::<T>(key));
        self
    }
}

#[async_trait]
impl<I, O, C> Step for FnStep<I, O, C>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    C: Serialize + DeserializeOwned + Send + 'static,
{
    type Input = I;
    type Output = O;
    type CompensateInput = C;

    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        self.requires.clone()
    }

    async fn invoke(
        &self,
        input: I,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<O, C>, StepError> {
        (self.invoke)(input, ctx).await
    }

    async fn compensate(&self, input: Option<C>, ctx: &ExecutionContext) -> Result<(), StepError> {
        match &self.compensate {
            Some(compensate) => compensate(input, ctx).await,
            None => Ok(()),
        }
    }
}
