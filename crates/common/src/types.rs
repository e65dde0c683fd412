use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single workflow run.
///
/// Every invocation of a workflow gets a fresh run ID, including nested
/// workflows executed as steps of a parent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RunId> for Uuid {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// Identifier of a commerce entity, rendered as `<prefix>_<hex>`.
///
/// The prefix names the entity kind (`pl` for price lists, `acchld` for
/// account holders, ...) so identifiers stay readable in logs and responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generates a new identifier with the given prefix.
    pub fn generate(prefix: &str) -> Self {
        Self(format!(
            "{prefix}_{}",
            Uuid::new_v4().simple().to_string().to_uppercase()
        ))
    }

    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the prefix part, if the identifier has one.
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once('_').map(|(prefix, _)| prefix)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_new_creates_unique_ids() {
        let id1 = RunId::new();
        let id2 = RunId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn run_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = RunId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn run_id_serializes_as_plain_uuid() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn entity_id_generate_uses_prefix() {
        let id = EntityId::generate("acchld");
        assert!(id.as_str().starts_with("acchld_"));
        assert_eq!(id.prefix(), Some("acchld"));
        assert_eq!(id.as_str().len(), "acchld_".len() + 32);
    }

    #[test]
    fn entity_id_generate_is_unique() {
        assert_ne!(EntityId::generate("pl"), EntityId::generate("pl"));
    }

    #[test]
    fn entity_id_without_prefix() {
        let id = EntityId::new("legacy");
        assert_eq!(id.prefix(), None);
        assert_eq!(id.to_string(), "legacy");
    }
}
