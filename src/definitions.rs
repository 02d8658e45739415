//! Definition Registry
//!
//! Shared schema fragments, keyed by `$id`. A definition module must export
//! exactly one value, named after its file, whose `$id` is that same name.

use std::collections::BTreeMap;

use crate::envelope::capitalize;
use crate::error::{CompileError, Result};
use crate::loader::DefinitionSource;
use crate::schema::{Keywords, SchemaNode};

/// Prefix/suffix for refs inside `definitions/<name>.json`
pub const DEFINITION_FILE_REF: (&str, &str) = ("../definitions/", ".json");

/// Name → fragment map, as authored (references are bare definition names)
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, SchemaNode>,
}

impl DefinitionRegistry {
    /// Validate and register every source, then check that all references
    /// between definitions resolve
    pub fn from_sources(sources: impl IntoIterator<Item = DefinitionSource>) -> Result<Self> {
        let mut registry = Self::default();
        for source in sources {
            registry.register(source)?;
        }
        for (name, schema) in &registry.definitions {
            registry.check_refs(&format!("Definition {name}"), schema)?;
        }
        Ok(registry)
    }

    fn register(&mut self, source: DefinitionSource) -> Result<()> {
        let file = source.file_name();
        let name = source.name;

        let mut exports = match source.exports {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(CompileError::DefinitionNameMismatch {
                    file,
                    reason: "module must be a JSON object of exports".to_string(),
                })
            }
        };
        let found: Vec<String> = exports.keys().cloned().collect();
        let mut schema = match exports.remove(&name) {
            Some(value) if exports.is_empty() => SchemaNode::from(value),
            _ => {
                return Err(CompileError::DefinitionNameMismatch {
                    reason: format!(
                        "expected a single export named '{name}', found [{}]",
                        found.join(", ")
                    ),
                    file,
                })
            }
        };

        let id = schema
            .keyword_str("$id")
            .map(str::to_string)
            .ok_or_else(|| CompileError::DefinitionMissingId { file: file.clone() })?;
        if id != name {
            return Err(CompileError::DefinitionNameMismatch {
                reason: format!("$id '{id}' does not match the file name"),
                file,
            });
        }
        if self.definitions.contains_key(&id) {
            return Err(CompileError::DuplicateDefinition { id });
        }

        schema.set_default_title(capitalize(&name));
        tracing::debug!(definition = %id, "registered definition");
        self.definitions.insert(id, schema);
        Ok(())
    }

    /// Fail unless every `$ref` in `schema` names a registered definition
    pub fn check_refs(&self, owner: &str, schema: &SchemaNode) -> Result<()> {
        match schema
            .refs()
            .into_iter()
            .find(|reference| !self.definitions.contains_key(reference))
        {
            Some(reference) => Err(CompileError::UnresolvedReference {
                owner: owner.to_string(),
                reference,
            }),
            None => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Content of `definitions/<name>.json`
    pub fn file_artifact(&self, name: &str) -> Option<SchemaNode> {
        let (prefix, suffix) = DEFINITION_FILE_REF;
        self.get(name).map(|schema| schema.with_refs_rewritten(prefix, suffix))
    }

    /// Unrewritten map for embedding under `definitions`
    pub fn embedded(&self) -> Keywords {
        self.definitions.clone()
    }
}
