//! Compiled Schema Assembly
//!
//! Merges every synthesized schema into a single `anyOf` union with all shared
//! definitions embedded, so the result resolves without any file lookups.

use std::collections::BTreeSet;

use crate::definitions::DefinitionRegistry;
use crate::envelope::CommandConfig;
use crate::error::{CompileError, Result};
use crate::schema::SchemaNode;

/// Pointer prefix of references inside the compiled artifact
pub const DEFINITIONS_POINTER: &str = "#/definitions/";

/// Assemble the union of all command schemas, in command order
pub fn assemble<'a>(
    commands: impl IntoIterator<Item = &'a CommandConfig>,
    definitions: &DefinitionRegistry,
) -> Result<SchemaNode> {
    let variants: Vec<SchemaNode> = commands
        .into_iter()
        .flat_map(|command| command.schema.schemas())
        .map(|(_, schema)| schema.clone())
        .collect();

    let mut compiled = SchemaNode::union(variants)
        .with_keyword("definitions", SchemaNode::Keywords(definitions.embedded()));
    compiled.rewrite_refs(DEFINITIONS_POINTER, "");

    check_closure(&compiled)?;
    Ok(compiled)
}

/// Fail on the first `$ref` that does not point into the embedded `definitions`
pub fn check_closure(compiled: &SchemaNode) -> Result<()> {
    let defined: BTreeSet<&str> = match compiled.keyword("definitions") {
        Some(SchemaNode::Keywords(map)) => map.keys().map(String::as_str).collect(),
        _ => BTreeSet::new(),
    };

    let mut dangling = None;
    compiled.for_each_ref(&mut |reference| {
        let resolves = reference
            .strip_prefix(DEFINITIONS_POINTER)
            .is_some_and(|name| defined.contains(name));
        if !resolves && dangling.is_none() {
            dangling = Some(reference.to_string());
        }
    });

    match dangling {
        Some(reference) => Err(CompileError::DanglingReference { reference }),
        None => Ok(()),
    }
}
