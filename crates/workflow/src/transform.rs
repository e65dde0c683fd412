//! Workflow data and transform nodes.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransformError;

/// Alias under which the workflow input is stored.
pub const INPUT_ALIAS: &str = "input";

/// Results of the nodes executed so far, keyed by alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowData {
    values: BTreeMap<String, Value>,
}

impl WorkflowData {
    /// Creates the data of a fresh run.
    pub fn with_input(input: Value) -> Self {
        let mut values = BTreeMap::new();
        values.insert(INPUT_ALIAS.to_string(), input);
        Self { values }
    }

    /// Decodes the workflow input.
    pub fn input<T: DeserializeOwned>(&self) -> Result<T, TransformError> {
        self.get(INPUT_ALIAS)
    }

    /// Decodes the value stored under `alias`.
    pub fn get<T: DeserializeOwned>(&self, alias: &str) -> Result<T, TransformError> {
        let value = self
            .get_value(alias)
            .ok_or_else(|| TransformError::new(format!("alias '{alias}' is not bound")))?;
        T::deserialize(value)
            .map_err(|e| TransformError::new(format!("alias '{alias}' has unexpected shape: {e}")))
    }

    pub fn get_value(&self, alias: &str) -> Option<&Value> {
        self.values.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.values.contains_key(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, alias: &str, value: Value) {
        self.values.insert(alias.to_string(), value);
    }
}

type TransformFn = dyn Fn(&WorkflowData) -> Result<Value, TransformError> + Send + Sync;

/// Pure data reshaping between steps.
pub(crate) struct Transform {
    pub alias: String,
    pub reads: Vec<String>,
    apply: Box<TransformFn>,
}

impl Transform {
    pub fn new<T, F>(alias: impl Into<String>, reads: Vec<String>, f: F) -> Self
    where
        T: Serialize,
        F: Fn(&WorkflowData) -> Result<T, TransformError> + Send + Sync + 'static,
    {
        Self {
            alias: alias.into(),
            reads,
            apply: Box::new(move |data| {
                let value = f(data)?;
                serde_json::to_value(value)
                    .map_err(|e| TransformError::new(format!("result is not serializable: {e}")))
            }),
        }
    }

    /// Runs the transform. Errors and panics are attributed to its alias.
    pub fn apply(&self, data: &WorkflowData) -> Result<Value, TransformError> {
        match catch_unwind(AssertUnwindSafe(|| (self.apply)(data))) {
            Ok(result) => result.map_err(|e| e.at(&self.alias)),
            Err(payload) => Err(TransformError::panicked(&self.alias, payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Shipment {
        id: String,
    }

    #[test]
    fn typed_access_to_aliases() {
        let mut data = WorkflowData::with_input(json!({ "id": "ful_1" }));
        data.insert("count", json!(3));

        assert_eq!(
            data.input::<Shipment>().unwrap(),
            Shipment { id: "ful_1".into() }
        );
        assert_eq!(data.get::<u32>("count").unwrap(), 3);
        assert_eq!(data.aliases().collect::<Vec<_>>(), vec!["count", "input"]);
    }

    #[test]
    fn missing_alias_is_a_transform_error() {
        let data = WorkflowData::with_input(json!(null));
        let err = data.get::<u32>("nope").unwrap_err();
        assert!(err.reason.contains("'nope' is not bound"));
    }

    #[test]
    fn apply_attributes_errors_to_alias() {
        let t = Transform::new("merged", vec!["input".into()], |data: &WorkflowData| {
            data.get::<u32>("input")
        });

        let err = t.apply(&WorkflowData::with_input(json!("text"))).unwrap_err();
        assert_eq!(err.node, "merged");
    }

    #[test]
    fn apply_catches_panics() {
        let t = Transform::new("boom", vec![], |_data: &WorkflowData| -> Result<u32, _> {
            panic!("index out of bounds")
        });

        let err = t.apply(&WorkflowData::default()).unwrap_err();
        assert_eq!(err.node, "boom");
        assert!(err.reason.contains("index out of bounds"));
    }

    #[test]
    fn apply_serializes_result() {
        let t = Transform::new("shipped", vec!["input".into()], |data: &WorkflowData| {
            let id: String = data.get("input")?;
            Ok(json!({ "id": id, "shipped": true }))
        });

        let value = t.apply(&WorkflowData::with_input(json!("ful_1"))).unwrap();
        assert_eq!(value, json!({ "id": "ful_1", "shipped": true }));
    }
}
