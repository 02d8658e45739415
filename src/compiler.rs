//! Compilation Pipeline
//!
//! ```text
//! definitions ──► DefinitionRegistry ─────────────────────────┐
//!                                                             ▼
//! endpoints ──► EndpointConfig ──► CommandConfig ──► SchemaMeta + compiled union
//! ```
//!
//! [`compile`] is pure: it never touches the filesystem, and any error aborts
//! the whole run before a single artifact is produced.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use crate::artifacts::{CompiledArtifacts, WrittenArtifact};
use crate::compiled;
use crate::config::CompilerConfig;
use crate::definitions::DefinitionRegistry;
use crate::endpoint::{CommandId, EndpointConfig};
use crate::envelope::{synthesize, CommandConfig};
use crate::error::{CompileError, Result};
use crate::loader::{load_definition_sources, load_endpoint_sources, DefinitionSource, EndpointSource};
use crate::routing::SchemaMeta;

/// Compile in-memory sources into artifacts
pub fn compile(
    endpoint_sources: Vec<EndpointSource>,
    definition_sources: Vec<DefinitionSource>,
) -> Result<CompiledArtifacts> {
    let definitions = DefinitionRegistry::from_sources(definition_sources)?;
    tracing::debug!(count = definitions.len(), "registered definitions");

    let mut sources = endpoint_sources;
    sources.sort_by(|a, b| {
        (a.service_id.as_str(), a.endpoint_id.as_str())
            .cmp(&(b.service_id.as_str(), b.endpoint_id.as_str()))
    });

    let mut command_configs: BTreeMap<CommandId, CommandConfig> = BTreeMap::new();
    for source in sources {
        let command = compile_endpoint(source, &definitions)?;
        match command_configs.entry(command.command_id.clone()) {
            Entry::Occupied(entry) => {
                return Err(CompileError::DuplicateCommand {
                    command_id: entry.key().to_string(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(command);
            }
        }
    }

    let schema_meta = SchemaMeta::build(command_configs.values())?;
    let compiled_schema = compiled::assemble(command_configs.values(), &definitions)?;

    tracing::info!(
        commands = command_configs.len(),
        definitions = definitions.len(),
        services = schema_meta.service_ids.len(),
        "compiled protocol"
    );

    Ok(CompiledArtifacts {
        command_configs,
        compiled_schema,
        schema_meta,
        definitions,
    })
}

fn compile_endpoint(source: EndpointSource, definitions: &DefinitionRegistry) -> Result<CommandConfig> {
    let command_id = CommandId::new(&source.service_id, &source.endpoint_id)?;
    let config = EndpointConfig::from_value(&command_id, source.declaration)?;

    let owner = format!("Endpoint {command_id}");
    for schema in config.payload_schemas() {
        definitions.check_refs(&owner, schema)?;
    }

    tracing::debug!(command_id = %command_id, event = config.is_event(), "synthesized endpoint");
    Ok(synthesize(&command_id, &config))
}

/// Load and compile the source tree described by `config`, without writing
pub fn load_project(config: &CompilerConfig) -> Result<CompiledArtifacts> {
    let load_config = config.load_config();
    let definitions = load_definition_sources(&config.definitions_path(), &load_config)?;
    let endpoints = load_endpoint_sources(&config.source.root, &load_config)?;
    compile(endpoints, definitions)
}

/// Load, compile and write; nothing is written if compilation fails
pub fn compile_project(config: &CompilerConfig) -> Result<(CompiledArtifacts, Vec<WrittenArtifact>)> {
    let artifacts = load_project(config)?;
    let written = artifacts.write(Path::new(&config.output.dir), &config.output)?;
    Ok((artifacts, written))
}
