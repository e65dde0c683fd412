use async_trait::async_trait;
use serde_json::Value;

use crate::container::ServiceRequirement;
use crate::context::ExecutionContext;
use crate::error::StepError;
use crate::step::Step;

/// Why an erased invocation failed.
#[derive(Debug)]
pub(crate) enum InvokeError {
    /// The stored input does not match the step's input type.
    Decode(serde_json::Error),
    /// The forward action itself failed.
    Step(StepError),
    /// The forward action succeeded but its output could not be encoded.
    /// Whatever compensation input could be encoded is kept so the step can
    /// still be undone.
    Encode {
        source: serde_json::Error,
        compensate_with: Option<Value>,
    },
}

pub(crate) struct Invoked {
    pub output: Value,
    pub compensate_with: Option<Value>,
}

/// A step with its types erased to JSON.
#[async_trait]
pub(crate) trait ErasedStep: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<ServiceRequirement>;

    async fn invoke_erased(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<Invoked, InvokeError>;

    async fn compensate_erased(
        &self,
        input: Option<Value>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError>;
}

pub(crate) struct StepWrapper<S> {
    step: S,
}

impl<S> StepWrapper<S> {
    pub(crate) fn new(step: S) -> Self {
        Self { step }
    }
}

#[async_trait]
impl<S: Step> ErasedStep for StepWrapper<S> {
    fn name(&self) -> &str {
        self.step.name()
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        self.step.requires()
    }

    async fn invoke_erased(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<Invoked, InvokeError> {
        let typed: S::Input = serde_json::from_value(input).map_err(InvokeError::Decode)?;
        let response = self.step.invoke(typed, ctx).await.map_err(InvokeError::Step)?;

        let compensate_with = match response.compensate_with {
            Some(c) => Some(serde_json::to_value(c).map_err(|source| InvokeError::Encode {
                source,
                compensate_with: None,
            })?),
            None => None,
        };
        let output = serde_json::to_value(response.output).map_err(|source| {
            InvokeError::Encode {
                source,
                compensate_with: compensate_with.clone(),
            }
        })?;

        Ok(Invoked {
            output,
            compensate_with,
        })
    }

    async fn compensate_erased(
        &self,
        input: Option<Value>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let typed = match input {
            Some(value) => Some(serde_json::from_value::<S::CompensateInput>(value)?),
            None => None,
        };
        self.step.compensate(typed, ctx).await
    }
}
