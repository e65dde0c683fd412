//! Workflow definitions.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::RunId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::container::ServiceRequirement;
use crate::context::{ExecutionContext, RunOptions};
use crate::engine::{self, RunResult, WorkflowEngine};
use crate::erased::{ErasedStep, StepWrapper};
use crate::error::{
    CompensationOutcome, DefinitionError, StepError, TransformError, WorkflowFailure,
};
use crate::record::ExecutionRecord;
use crate::step::{Step, StepResponse};
use crate::transform::{INPUT_ALIAS, Transform, WorkflowData};

pub(crate) enum Node {
    Step {
        alias: String,
        input_from: String,
        step: Arc<dyn ErasedStep>,
    },
    Transform(Transform),
}

impl Node {
    pub(crate) fn alias(&self) -> &str {
        match self {
            Node::Step { alias, .. } => alias,
            Node::Transform(t) => &t.alias,
        }
    }

    fn reads(&self) -> Vec<&str> {
        match self {
            Node::Step { input_from, .. } => vec![input_from.as_str()],
            Node::Transform(t) => t.reads.iter().map(String::as_str).collect(),
        }
    }
}

/// The untyped part of a workflow, shared by every handle to it.
pub(crate) struct Definition {
    pub id: String,
    pub nodes: Vec<Node>,
    pub result_alias: String,
}

impl Definition {
    /// Services declared by the steps, one per key and type.
    pub(crate) fn requirements(&self) -> Vec<ServiceRequirement> {
        let mut requirements: Vec<ServiceRequirement> = self
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Step { step, .. } => Some(step.requires()),
                Node::Transform(_) => None,
            })
            .flatten()
            .collect();
        requirements.sort_by_key(|r| (r.key(), r.type_name()));
        requirements.dedup_by_key(|r| (r.key(), r.type_name()));
        requirements
    }

    pub(crate) fn required_services(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> =
            self.requirements().iter().map(ServiceRequirement::key).collect();
        keys.dedup();
        keys
    }
}

/// An ordered composition of steps and transforms.
///
/// `I` is the input type stored under the `input` alias, `O` the type of the
/// result alias. A workflow is an immutable value: cloning it is cheap and
/// one workflow may be run concurrently any number of times.
pub struct Workflow<I, O> {
    def: Arc<Definition>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Workflow<I, O> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            _types: PhantomData,
        }
    }
}

impl<I, O> std::fmt::Debug for Workflow<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.def.id)
            .field(
                "nodes",
                &self.def.nodes.iter().map(Node::alias).collect::<Vec<_>>(),
            )
            .field("result", &self.def.result_alias)
            .finish()
    }
}

impl<I, O> Workflow<I, O> {
    /// Starts a definition.
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder<I, O> {
        WorkflowBuilder {
            id: id.into(),
            nodes: Vec::new(),
            result_alias: None,
            _types: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    /// Names of the step nodes, in definition order.
    pub fn step_names(&self) -> Vec<&str> {
        self.def
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Step { step, .. } => Some(step.name()),
                Node::Transform(_) => None,
            })
            .collect()
    }

    /// Service keys the workflow's steps declare.
    pub fn required_services(&self) -> Vec<&'static str> {
        self.def.required_services()
    }

    pub fn result_alias(&self) -> &str {
        &self.def.result_alias
    }

    pub(crate) fn definition(&self) -> &Definition {
        &self.def
    }

    /// Embeds the workflow into another one.
    pub fn into_step(self) -> WorkflowStep<I, O> {
        WorkflowStep { workflow: self }
    }
}

impl<I: Serialize, O: DeserializeOwned> Workflow<I, O> {
    /// Runs the workflow on an engine without a journal.
    pub async fn run(
        &self,
        input: I,
        options: impl Into<RunOptions>,
    ) -> Result<RunResult<O>, WorkflowFailure> {
        WorkflowEngine::new().run(self, input, options).await
    }
}

/// Builds a [`Workflow`].
///
/// Each node writes its result under an alias. A step added with
/// [`step`](Self::step) reads the alias written by the previous node (the
/// workflow input for the first node); [`step_from`](Self::step_from) names
/// the alias explicitly.
pub struct WorkflowBuilder<I, O> {
    id: String,
    nodes: Vec<Node>,
    result_alias: Option<String>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> WorkflowBuilder<I, O> {
    fn last_alias(&self) -> String {
        self.nodes
            .last()
            .map(|node| node.alias().to_string())
            .unwrap_or_else(|| INPUT_ALIAS.to_string())
    }

    /// Appends a step reading the previous node's result.
    pub fn step<S: Step>(self, alias: impl Into<String>, step: S) -> Self {
        let from = self.last_alias();
        self.step_from(alias, from, step)
    }

    /// Appends a step reading the given alias.
    pub fn step_from<S: Step>(
        mut self,
        alias: impl Into<String>,
        from: impl Into<String>,
        step: S,
    ) -> Self {
        self.nodes.push(Node::Step {
            alias: alias.into(),
            input_from: from.into(),
            step: Arc::new(StepWrapper::new(step)),
        });
        self
    }

    /// Appends a transform.
    ///
    /// `reads` lists the aliases `f` looks at. `f` must be deterministic and
    /// free of side effects.
    pub fn transform<T, F>(mut self, alias: impl Into<String>, reads: &[&str], f: F) -> Self
    where
        T: Serialize,
        F: Fn(&WorkflowData) -> Result<T, TransformError> + Send + Sync + 'static,
    {
        let reads = reads.iter().map(|r| r.to_string()).collect();
        self.nodes.push(Node::Transform(Transform::new(alias, reads, f)));
        self
    }

    /// Designates the alias returned by the workflow. Defaults to the last
    /// node's alias.
    pub fn returns(mut self, alias: impl Into<String>) -> Self {
        self.result_alias = Some(alias.into());
        self
    }

    /// Validates the definition.
    pub fn build(self) -> Result<Workflow<I, O>, DefinitionError> {
        if self.nodes.is_empty() {
            return Err(DefinitionError::Empty(self.id));
        }

        let mut defined: HashSet<&str> = HashSet::from([INPUT_ALIAS]);
        for node in &self.nodes {
            for read in node.reads() {
                if !defined.contains(read) {
                    return Err(DefinitionError::UnknownAlias {
                        workflow: self.id.clone(),
                        node: node.alias().to_string(),
                        alias: read.to_string(),
                    });
                }
            }
            let alias = node.alias();
            if alias == INPUT_ALIAS {
                return Err(DefinitionError::ReservedAlias {
                    workflow: self.id.clone(),
                });
            }
            if !defined.insert(alias) {
                return Err(DefinitionError::DuplicateAlias {
                    workflow: self.id.clone(),
                    alias: alias.to_string(),
                });
            }
        }

        let result_alias = self
            .result_alias
            .clone()
            .unwrap_or_else(|| self.last_alias());
        if !defined.contains(result_alias.as_str()) {
            return Err(DefinitionError::UnknownResult {
                workflow: self.id.clone(),
                alias: result_alias,
            });
        }

        Ok(Workflow {
            def: Arc::new(Definition {
                id: self.id,
                nodes: self.nodes,
                result_alias,
            }),
            _types: PhantomData,
        })
    }
}

/// A workflow running as a single step of a parent workflow.
///
/// The nested run shares the parent's resolver, transaction and journal but
/// has its own run id. If it fails, its completed steps are compensated
/// before the parent sees the failure. If the parent fails later, the
/// compensation of this step rolls back the nested run from its record.
pub struct WorkflowStep<I, O> {
    workflow: Workflow<I, O>,
}

#[async_trait]
impl<I: 'static, O: 'static> Step for WorkflowStep<I, O> {
    type Input = Value;
    type Output = Value;
    type CompensateInput = ExecutionRecord;

    fn name(&self) -> &str {
        self.workflow.id()
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        self.workflow.def.requirements()
    }

    async fn invoke(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Value, ExecutionRecord>, StepError> {
        let def = self.workflow.definition();
        let nested = ctx.nested(RunId::new(), &def.id);

        let (output, record) = engine::execute(def, Ok(input), &nested, Ok)
            .await
            .map_err(|failure| StepError::Nested(Box::new(failure)))?;

        Ok(StepResponse::new(output, record))
    }

    async fn compensate(
        &self,
        record: Option<ExecutionRecord>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(record) = record else {
            return Ok(());
        };
        let def = self.workflow.definition();
        let nested = ctx.nested(record.run_id, &def.id);
        let reason = format!("parent workflow '{}' is compensating", ctx.workflow_id());

        let failures: Vec<_> = engine::rollback_record(def, &record, &nested, reason)
            .await
            .into_iter()
            .filter_map(|outcome| match outcome {
                CompensationOutcome::Failed(err) => Some(err),
                CompensationOutcome::Compensated { .. } => None,
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StepError::NestedCompensation {
                workflow: def.id.clone(),
                failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::step::from_fn;

    fn echo(name: &'static str) -> impl Step {
        from_fn(name, |v: Value, _ctx| {
            async move { Ok(StepResponse::<Value, Value>::without_compensation(v)) }.boxed()
        })
    }

    #[test]
    fn test_build_defaults_result_to_last_node() {
        let wf = Workflow::<Value, Value>::builder("wf")
            .step("a", echo("a"))
            .transform("b", &["a"], |data: &WorkflowData| data.get::<Value>("a"))
            .build()
            .unwrap();

        assert_eq!(wf.id(), "wf");
        assert_eq!(wf.result_alias(), "b");
        assert_eq!(wf.step_names(), vec!["a"]);
    }

    #[test]
    fn test_step_reads_previous_alias() {
        let wf = Workflow::<Value, Value>::builder("wf")
            .step("a", echo("a"))
            .step("b", echo("b"))
            .build()
            .unwrap();

        let Node::Step { input_from, .. } = &wf.definition().nodes[1] else {
            panic!("expected a step");
        };
        assert_eq!(input_from, "a");
    }

    #[test]
    fn test_empty_workflow_is_rejected() {
        let err = Workflow::<Value, Value>::builder("wf").build().unwrap_err();
        assert_eq!(err, DefinitionError::Empty("wf".into()));
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let err = Workflow::<Value, Value>::builder("wf")
            .step("a", echo("first"))
            .step("a", echo("second"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateAlias { alias, .. } if alias == "a"));
    }

    #[test]
    fn test_reserved_alias_is_rejected() {
        let err = Workflow::<Value, Value>::builder("wf")
            .step("input", echo("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::ReservedAlias { .. }));
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let err = Workflow::<Value, Value>::builder("wf")
            .step_from("a", "b", echo("a"))
            .step("b", echo("b"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownAlias {
                workflow: "wf".into(),
                node: "a".into(),
                alias: "b".into(),
            }
        );
    }

    #[test]
    fn test_unknown_result_is_rejected() {
        let err = Workflow::<Value, Value>::builder("wf")
            .step("a", echo("a"))
            .returns("missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownResult { .. }));
    }

    #[test]
    fn test_required_services_are_collected_from_steps() {
        let needs = |key: &'static str| {
            from_fn("needs", |v: Value, _ctx| {
                async move { Ok(StepResponse::<Value, Value>::without_compensation(v)) }.boxed()
            })
            .requiring::<Arc<String>>(key)
        };

        let inner = Workflow::<Value, Value>::builder("inner")
            .step("x", needs("payment"))
            .build()
            .unwrap();
        let wf = Workflow::<Value, Value>::builder("outer")
            .step("a", needs("fulfillment"))
            .step("b", needs("payment"))
            .step("c", inner.into_step())
            .transform("d", &["input", "c"], |_data: &WorkflowData| Ok(json!(null)))
            .build()
            .unwrap();

        assert_eq!(wf.required_services(), vec!["fulfillment", "payment"]);
        assert_eq!(wf.step_names(), vec!["needs", "needs", "inner"]);
    }
}
