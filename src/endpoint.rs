//! Endpoint Declarations
//!
//! Author-supplied endpoint declarations are parsed loosely into
//! [`RawEndpoint`], then validated in a fixed order into the closed, typed
//! [`EndpointConfig`]. Synthesis only ever sees validated configs.

use std::borrow::Borrow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompileError, Result};
use crate::schema::SchemaNode;

// =============================================================================
// Actor
// =============================================================================

/// A fixed protocol participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Server,
    User,
    Autohost,
}

impl Actor {
    pub const ALL: [Actor; 3] = [Actor::Server, Actor::User, Actor::Autohost];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "server" => Some(Self::Server),
            "user" => Some(Self::User),
            "autohost" => Some(Self::Autohost),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Server => "server",
            Actor::User => "user",
            Actor::Autohost => "autohost",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CommandId
// =============================================================================

/// Globally unique `serviceId/endpointId`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    pub fn new(service_id: &str, endpoint_id: &str) -> Result<Self> {
        check_identifier("service", service_id, &['/', '.'])?;
        check_identifier("endpoint", endpoint_id, &['/'])?;
        Ok(Self(format!("{service_id}/{endpoint_id}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn service_id(&self) -> &str {
        self.split().0
    }

    pub fn endpoint_id(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // identifiers never contain '/', so there is exactly one separator
        self.0.split_once('/').unwrap_or((&self.0, ""))
    }
}

/// Ids are opaque apart from the characters that would break the
/// `service/endpoint` split or the directory layout
fn check_identifier(kind: &'static str, id: &str, forbidden: &[char]) -> Result<()> {
    if id.is_empty() || id.contains(forbidden) {
        Err(CompileError::InvalidIdentifier {
            kind,
            id: id.to_string(),
        })
    } else {
        Ok(())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CommandId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CommandId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CommandId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// `request` or `event` body declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SchemaNode>,
}

/// One declared response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseVariant {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<SchemaNode>,
    },
    Failed {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<SchemaNode>,
    },
}

impl ResponseVariant {
    pub fn data(&self) -> Option<&SchemaNode> {
        match self {
            Self::Success { data, .. } | Self::Failed { data, .. } => data.as_ref(),
        }
    }
}

/// Declaration as written by the author, before validation.
///
/// Payload sections stay untyped until the presence rules have run, so a
/// malformed response variant never masks an earlier rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEndpoint {
    pub source: Option<String>,
    pub target: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub request: Option<Value>,
    pub response: Option<Value>,
    pub event: Option<Value>,
}

/// Payload shape of a validated endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EndpointPayload {
    RequestResponse {
        request: PayloadConfig,
        response: Vec<ResponseVariant>,
    },
    Event {
        event: PayloadConfig,
    },
}

/// A validated endpoint declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointConfig {
    pub source: Actor,
    pub target: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub payload: EndpointPayload,
}

impl EndpointConfig {
    /// Parse and validate a declaration document
    pub fn from_value(command_id: &CommandId, declaration: Value) -> Result<Self> {
        let raw: RawEndpoint =
            serde_json::from_value(declaration).map_err(|e| CompileError::InvalidEndpoint {
                command_id: command_id.to_string(),
                reason: e.to_string(),
            })?;
        Self::validate(command_id, raw)
    }

    /// Apply the structural rules in order; the first violation wins
    pub fn validate(command_id: &CommandId, raw: RawEndpoint) -> Result<Self> {
        let id = || command_id.to_string();

        let source = resolve_actor(raw.source, "source", command_id)?;
        let target = resolve_actor(raw.target, "target", command_id)?;

        let payload = match (raw.request, raw.response, raw.event) {
            (Some(_), _, Some(_)) => {
                return Err(CompileError::RequestAndEvent { command_id: id() })
            }
            (None, _, None) => return Err(CompileError::NoRequestOrEvent { command_id: id() }),
            (Some(_), None, None) => {
                return Err(CompileError::RequestWithoutResponse { command_id: id() })
            }
            (None, Some(_), Some(_)) => {
                return Err(CompileError::ResponseWithoutRequest { command_id: id() })
            }
            (Some(request), Some(response), None) => {
                let request = parse_section(command_id, "request", request)?;
                let response: Vec<ResponseVariant> = parse_section(command_id, "response", response)?;
                check_responses(command_id, &response)?;
                EndpointPayload::RequestResponse { request, response }
            }
            (None, None, Some(event)) => EndpointPayload::Event {
                event: parse_section(command_id, "event", event)?,
            },
        };

        Ok(Self {
            source,
            target,
            scopes: raw.scopes,
            description: raw.description,
            order: raw.order,
            payload,
        })
    }

    pub fn is_event(&self) -> bool {
        matches!(self.payload, EndpointPayload::Event { .. })
    }

    /// Every author-supplied payload schema, including failure data
    pub fn payload_schemas(&self) -> Vec<&SchemaNode> {
        match &self.payload {
            EndpointPayload::RequestResponse { request, response } => request
                .data
                .iter()
                .chain(response.iter().filter_map(ResponseVariant::data))
                .collect(),
            EndpointPayload::Event { event } => event.data.iter().collect(),
        }
    }
}

fn resolve_actor(
    value: Option<String>,
    field: &'static str,
    command_id: &CommandId,
) -> Result<Actor> {
    let command_id = command_id.to_string();
    let name = match value {
        Some(name) => name,
        None if field == "source" => return Err(CompileError::MissingSource { command_id }),
        None => return Err(CompileError::MissingTarget { command_id }),
    };
    Actor::parse(&name).ok_or(CompileError::UnknownActor {
        command_id,
        field,
        actor: name,
    })
}

fn parse_section<T: DeserializeOwned>(command_id: &CommandId, section: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| CompileError::InvalidEndpoint {
        command_id: command_id.to_string(),
        reason: format!("{section}: {e}"),
    })
}

fn check_responses(command_id: &CommandId, response: &[ResponseVariant]) -> Result<()> {
    let success_titles: Vec<Option<&str>> = response
        .iter()
        .filter_map(|variant| match variant {
            ResponseVariant::Success { title, .. } => Some(title.as_deref()),
            ResponseVariant::Failed { .. } => None,
        })
        .collect();
    let has_failure = response
        .iter()
        .any(|variant| matches!(variant, ResponseVariant::Failed { .. }));

    if success_titles.is_empty() {
        return Err(CompileError::MissingSuccessResponse {
            command_id: command_id.to_string(),
        });
    }
    if !has_failure {
        return Err(CompileError::MissingFailedResponse {
            command_id: command_id.to_string(),
        });
    }
    if success_titles.len() > 1 {
        let untitled = success_titles
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, title)| title.map_or(true, |t| t.trim().is_empty()));
        if let Some((index, _)) = untitled {
            return Err(CompileError::AmbiguousSuccessVariant {
                command_id: command_id.to_string(),
                index: index + 1,
            });
        }
    }
    Ok(())
}
