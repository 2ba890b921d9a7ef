use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::catalog::{entity_reference, EntityCatalog};
use super::Tool;

const KIND_DESCRIPTION: &str = "The kind of entity to search for. Some examples of entity kinds \
include: API, template, repository, environment, operation, project, service, resource, tool, \
work station, PC.";

const QUERY_DESCRIPTION: &str = "The text from the user, in natural language, to consider when \
searching for relevant entities.";

fn log_matches(tool: &str, entities: &[Value]) {
    let refs: Vec<String> = entities.iter().filter_map(entity_reference).collect();
    debug!(tool, count = entities.len(), refs = ?refs, "entity lookup");
}

/// Finds entities of one kind that match a user query.
pub struct FindEntitiesByKindTool {
    catalog: Arc<EntityCatalog>,
}

impl FindEntitiesByKindTool {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self { catalog }
    }
}

#[derive(Deserialize)]
struct ByKindInput {
    // Accepted so the model can pass it; the catalog filter is kind-only.
    #[allow(dead_code)]
    #[serde(default)]
    query: String,
    kind: String,
}

#[async_trait::async_trait]
impl Tool for FindEntitiesByKindTool {
    fn name(&self) -> &str {
        "find_entities_by_kind"
    }

    fn description(&self) -> &str {
        "Find entities of a specific kind that match a user query."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": QUERY_DESCRIPTION },
                "kind": { "type": "string", "description": KIND_DESCRIPTION }
            },
            "required": ["query", "kind"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: ByKindInput = serde_json::from_value(input)?;
        let entities = self.catalog.of_kind(&input.kind)?;
        log_matches(self.name(), &entities);
        Ok(Value::Array(entities))
    }
}

/// Finds entities matching any of several kinds.
pub struct FindEntitiesOfKindsTool {
    catalog: Arc<EntityCatalog>,
}

impl FindEntitiesOfKindsTool {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self { catalog }
    }
}

#[derive(Deserialize)]
struct OfKindsInput {
    #[allow(dead_code)]
    #[serde(default)]
    query: String,
    kinds: Vec<String>,
}

#[async_trait::async_trait]
impl Tool for FindEntitiesOfKindsTool {
    fn name(&self) -> &str {
        "find_entities_of_kinds"
    }

    fn description(&self) -> &str {
        "Find entities that match a specific set of kinds and match the users query."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": QUERY_DESCRIPTION },
                "kinds": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": KIND_DESCRIPTION
                }
            },
            "required": ["query", "kinds"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: OfKindsInput = serde_json::from_value(input)?;
        let entities = self.catalog.of_kinds(&input.kinds)?;
        log_matches(self.name(), &entities);
        Ok(Value::Array(entities))
    }
}

/// Returns every entity of one kind.
pub struct GetAllEntitiesOfKindTool {
    catalog: Arc<EntityCatalog>,
}

impl GetAllEntitiesOfKindTool {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self { catalog }
    }
}

#[derive(Deserialize)]
struct AllOfKindInput {
    kind: String,
}

#[async_trait::async_trait]
impl Tool for GetAllEntitiesOfKindTool {
    fn name(&self) -> &str {
        "get_all_entities_of_kind"
    }

    fn description(&self) -> &str {
        "Get all entities of a specific kind."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "description": KIND_DESCRIPTION }
            },
            "required": ["kind"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: AllOfKindInput = serde_json::from_value(input)?;
        let entities = self.catalog.of_kind(&input.kind)?;
        log_matches(self.name(), &entities);
        Ok(Value::Array(entities))
    }
}
