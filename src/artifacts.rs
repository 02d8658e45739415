//! Compiled Artifacts
//!
//! The immutable result of one compilation run and its on-disk layout:
//!
//! ```text
//! <out>/
//! ├── definitions/<name>.json                      refs → ../definitions/<name>.json
//! ├── <serviceId>/<endpointId>/{request,response,event}.json
//! │                                                refs → ../../definitions/<name>.json
//! ├── compiled.json                                refs → #/definitions/<name>
//! ├── meta.json                                    actor routing + service index
//! └── checksums.sha256
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path};

use serde::Serialize;
use serde_json::Value;

use crate::checksum::{Checksum, ChecksumManifest, MANIFEST_FILE};
use crate::config::{OutputConfig, OutputFormat};
use crate::definitions::DefinitionRegistry;
use crate::endpoint::CommandId;
use crate::envelope::{CommandConfig, ENDPOINT_FILE_REF};
use crate::error::Result;
use crate::routing::SchemaMeta;
use crate::schema::SchemaNode;

pub const COMPILED_FILE: &str = "compiled.json";
pub const META_FILE: &str = "meta.json";

/// Everything a compilation run produces
#[derive(Debug, Clone)]
pub struct CompiledArtifacts {
    pub command_configs: BTreeMap<CommandId, CommandConfig>,
    pub compiled_schema: SchemaNode,
    pub schema_meta: SchemaMeta,
    pub definitions: DefinitionRegistry,
}

/// One file to emit, path relative to the output directory
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFile {
    pub path: String,
    pub content: Value,
}

/// A file that was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub path: String,
    pub checksum: Checksum,
}

impl CompiledArtifacts {
    pub fn command(&self, command_id: &str) -> Option<&CommandConfig> {
        self.command_configs.get(command_id)
    }

    /// Endpoint ids of a service, by declared `order` (undeclared last), then id
    pub fn ordered_endpoints(&self, service_id: &str) -> Vec<&str> {
        let mut endpoints: Vec<(Option<i64>, &str)> = self
            .command_configs
            .values()
            .filter(|command| command.command_id.service_id() == service_id)
            .map(|command| (command.config.order, command.command_id.endpoint_id()))
            .collect();
        endpoints.sort_by(|(a_order, a_id), (b_order, b_id)| {
            let a_key = (a_order.is_none(), *a_order);
            let b_key = (b_order.is_none(), *b_order);
            a_key.cmp(&b_key).then_with(|| a_id.cmp(b_id))
        });
        endpoints.into_iter().map(|(_, id)| id).collect()
    }

    /// Every artifact file, in write order
    pub fn files(&self, include_meta: bool) -> Result<Vec<ArtifactFile>> {
        let mut files = Vec::new();

        for (name, _) in self.definitions.iter() {
            if let Some(schema) = self.definitions.file_artifact(name) {
                files.push(ArtifactFile {
                    path: format!("definitions/{name}.json"),
                    content: schema.into(),
                });
            }
        }

        let (prefix, suffix) = ENDPOINT_FILE_REF;
        for (command_id, command) in &self.command_configs {
            for (kind, schema) in command.schema.schemas() {
                files.push(ArtifactFile {
                    path: format!("{}/{}.json", command_id, kind.as_str()),
                    content: schema.with_refs_rewritten(prefix, suffix).into(),
                });
            }
        }

        files.push(ArtifactFile {
            path: COMPILED_FILE.to_string(),
            content: self.compiled_schema.to_value(),
        });

        if include_meta {
            files.push(ArtifactFile {
                path: META_FILE.to_string(),
                content: serde_json::to_value(&self.schema_meta)?,
            });
        }

        Ok(files)
    }

    /// Write all artifacts under `out_dir`, replacing the output of an earlier run
    pub fn write(&self, out_dir: &Path, output: &OutputConfig) -> Result<Vec<WrittenArtifact>> {
        let files = self.files(output.include_meta)?;
        let removed = self.prune(out_dir, &files)?;

        let mut written = Vec::new();
        let mut manifest = ChecksumManifest::default();

        for file in files {
            let bytes = render(&file.content, output.format)?;
            let path = out_dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &bytes)?;

            let checksum = Checksum::from_bytes(&bytes);
            tracing::debug!(path = %file.path, checksum = %checksum, "wrote artifact");
            manifest.push(file.path.clone(), checksum.clone());
            written.push(WrittenArtifact {
                path: file.path,
                checksum,
            });
        }

        if output.include_checksums {
            fs::write(out_dir.join(MANIFEST_FILE), manifest.render())?;
        }

        tracing::info!(
            out_dir = %out_dir.display(),
            files = written.len(),
            stale = removed.len(),
            "wrote protocol artifacts"
        );
        Ok(written)
    }

    /// Clear every command directory about to be written, then delete files
    /// listed in the previous manifest that this run no longer produces.
    /// Files the compiler never wrote are left alone.
    fn prune(&self, out_dir: &Path, files: &[ArtifactFile]) -> Result<Vec<String>> {
        for command_id in self.command_configs.keys() {
            let dir = out_dir.join(command_id.as_str());
            if dir.is_dir() {
                fs::remove_dir_all(&dir)?;
            }
        }

        let manifest_path = out_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Ok(Vec::new());
        }

        let previous = ChecksumManifest::parse(&fs::read_to_string(&manifest_path)?);
        let current: BTreeSet<&str> = files.iter().map(|file| file.path.as_str()).collect();
        let mut removed = Vec::new();

        for (path, _) in previous.entries() {
            let relative = Path::new(path);
            if current.contains(path.as_str())
                || !relative.components().all(|c| matches!(c, Component::Normal(_)))
            {
                continue;
            }
            let stale = out_dir.join(relative);
            if stale.is_file() {
                fs::remove_file(&stale)?;
                remove_empty_parents(out_dir, &stale)?;
                tracing::debug!(path = %path, "removed stale artifact");
                removed.push(path.clone());
            }
        }

        fs::remove_file(&manifest_path)?;
        Ok(removed)
    }
}

fn remove_empty_parents(out_dir: &Path, file: &Path) -> Result<()> {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == out_dir || fs::read_dir(current)?.next().is_some() {
            break;
        }
        fs::remove_dir(current)?;
        dir = current.parent();
    }
    Ok(())
}

/// Serialize in the configured layout
pub fn render(value: &Value, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Compact => Ok(serde_json::to_vec(value)?),
        OutputFormat::Pretty => {
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer)?;
            Ok(buf)
        }
    }
}
