//! Tachyon Protocol Schemas
//!
//! Compiles the Tachyon lobby protocol, declared as one JSON file per
//! endpoint plus shared definition modules, into JSON Schema (draft-07)
//! artifacts and an actor routing table.
//!
//! ## Features
//!
//! - **Validated Declarations**: structural endpoint rules, checked in a fixed order
//! - **Envelope Synthesis**: request/response/event schemas with `type`, `messageId`, `commandId`
//! - **Closed Compiled Schema**: one `anyOf` union with every definition embedded
//! - **Actor Routing**: who sends and receives each command, per message kind
//! - **Reproducible Output**: sorted keys, lexical source order, SHA256 manifest
//!
//! ## Architecture
//!
//! ```text
//! src/schema/                       schema/
//! ├── definitions/                  ├── definitions/
//! │   └── player.json      ──►      │   └── player.json
//! ├── lobby/                        ├── lobby/
//! │   ├── join.json                 │   └── join/
//! │   └── updated.json              │       ├── request.json
//! └── user/                         │       └── response.json
//!     └── ...                       ├── compiled.json
//!                                   ├── meta.json
//!                                   └── checksums.sha256
//! ```

pub mod artifacts;
pub mod checksum;
pub mod compiled;
pub mod compiler;
pub mod config;
pub mod definitions;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod loader;
pub mod routing;
pub mod schema;

pub use artifacts::{CompiledArtifacts, WrittenArtifact};
pub use checksum::{Checksum, ChecksumManifest};
pub use compiler::{compile, compile_project, load_project};
pub use config::{CompilerConfig, OutputFormat};
pub use definitions::DefinitionRegistry;
pub use endpoint::{Actor, CommandId, EndpointConfig, ResponseVariant};
pub use envelope::{CommandConfig, CommandSchema, MessageKind};
pub use error::{CompileError, Result};
pub use loader::{load_definition_sources, load_endpoint_sources, DefinitionSource, EndpointSource, LoadConfig};
pub use routing::SchemaMeta;
pub use schema::SchemaNode;
