//! Envelope Synthesis
//!
//! Wraps each validated endpoint's payloads in the standard message envelope
//! (`type`, `messageId`, `commandId`, plus `status`/`reason` on responses) and
//! produces the concrete request/response/event schemas for a command.
//!
//! Failure variants are collapsed: a response schema has one member per
//! success variant and a single failure member whose `reason` enumerates every
//! declared failure reason.

use serde::Serialize;

use crate::endpoint::{CommandId, EndpointConfig, EndpointPayload, PayloadConfig, ResponseVariant};
use crate::schema::SchemaNode;

/// `$schema` of every synthesized top-level schema
pub const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Prefix/suffix for refs inside `<service>/<endpoint>/<kind>.json`
pub const ENDPOINT_FILE_REF: (&str, &str) = ("../../definitions/", ".json");

/// Kind of message on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    Event,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [MessageKind::Request, MessageKind::Response, MessageKind::Event];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Event => "event",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            MessageKind::Request => "Request",
            MessageKind::Response => "Response",
            MessageKind::Event => "Event",
        }
    }
}

/// Synthesized schemas of one command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "schema", rename_all = "camelCase")]
pub enum CommandSchema {
    RequestResponse {
        request: SchemaNode,
        response: SchemaNode,
    },
    Event {
        event: SchemaNode,
    },
}

impl CommandSchema {
    /// Schemas in emission order
    pub fn schemas(&self) -> Vec<(MessageKind, &SchemaNode)> {
        match self {
            CommandSchema::RequestResponse { request, response } => vec![
                (MessageKind::Request, request),
                (MessageKind::Response, response),
            ],
            CommandSchema::Event { event } => vec![(MessageKind::Event, event)],
        }
    }

    pub fn get(&self, kind: MessageKind) -> Option<&SchemaNode> {
        self.schemas()
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, schema)| schema)
    }
}

/// Compiled result for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandConfig {
    pub command_id: CommandId,
    pub config: EndpointConfig,
    #[serde(flatten)]
    pub schema: CommandSchema,
}

/// Upper-case the first character
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build the schemas for a validated endpoint
pub fn synthesize(command_id: &CommandId, config: &EndpointConfig) -> CommandConfig {
    let envelope = Envelope {
        command_id,
        base_name: format!(
            "{}{}",
            capitalize(command_id.service_id()),
            capitalize(command_id.endpoint_id())
        ),
        scopes: config.scopes.as_deref(),
    };

    let schema = match &config.payload {
        EndpointPayload::RequestResponse { request, response } => CommandSchema::RequestResponse {
            request: envelope.message(MessageKind::Request, request),
            response: envelope.response(response),
        },
        EndpointPayload::Event { event } => CommandSchema::Event {
            event: envelope.message(MessageKind::Event, event),
        },
    };

    CommandConfig {
        command_id: command_id.clone(),
        config: config.clone(),
        schema,
    }
}

struct Envelope<'a> {
    command_id: &'a CommandId,
    base_name: String,
    scopes: Option<&'a [String]>,
}

impl Envelope<'_> {
    fn fields(&self, kind: MessageKind) -> Vec<(&'static str, SchemaNode)> {
        vec![
            ("type", SchemaNode::literal(kind.as_str())),
            ("messageId", SchemaNode::string()),
            ("commandId", SchemaNode::literal(self.command_id.as_str())),
        ]
    }

    fn message(&self, kind: MessageKind, payload: &PayloadConfig) -> SchemaNode {
        let mut fields = self.fields(kind);
        push_data(
            &mut fields,
            payload.data.as_ref(),
            format!("{}{}Data", self.base_name, kind.suffix()),
        );
        self.top_level(SchemaNode::object(fields), kind)
    }

    fn response(&self, variants: &[ResponseVariant]) -> SchemaNode {
        let mut members = Vec::new();
        let mut reasons: Vec<&str> = Vec::new();

        for variant in variants {
            match variant {
                ResponseVariant::Success { title, data } => {
                    let title = title
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| format!("{}OkResponse", self.base_name));
                    let mut fields = self.fields(MessageKind::Response);
                    fields.push(("status", SchemaNode::literal("success")));
                    push_data(&mut fields, data.as_ref(), format!("{title}Data"));
                    members.push(SchemaNode::object(fields).with_keyword("title", SchemaNode::text(title)));
                }
                ResponseVariant::Failed { reason, .. } => {
                    if !reasons.contains(&reason.as_str()) {
                        reasons.push(reason);
                    }
                }
            }
        }

        let mut failed = self.fields(MessageKind::Response);
        failed.push(("status", SchemaNode::literal("failed")));
        failed.push(("reason", SchemaNode::string_enum(reasons)));
        members.push(
            SchemaNode::object(failed)
                .with_keyword("title", SchemaNode::text(format!("{}FailResponse", self.base_name))),
        );

        self.top_level(SchemaNode::union(members), MessageKind::Response)
    }

    fn top_level(&self, node: SchemaNode, kind: MessageKind) -> SchemaNode {
        let node = node
            .with_keyword("$schema", SchemaNode::text(JSON_SCHEMA_DRAFT))
            .with_keyword("$id", SchemaNode::text(format!("{}/{}", self.command_id, kind.as_str())))
            .with_keyword("title", SchemaNode::text(format!("{}{}", self.base_name, kind.suffix())));
        match self.scopes {
            Some(scopes) => node.with_keyword(
                "scopes",
                SchemaNode::List(scopes.iter().map(|s| SchemaNode::text(s.as_str())).collect()),
            ),
            None => node,
        }
    }
}

fn push_data(fields: &mut Vec<(&'static str, SchemaNode)>, data: Option<&SchemaNode>, default_title: String) {
    if let Some(data) = data {
        let mut data = data.clone();
        data.set_default_title(default_title);
        fields.push(("data", data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn synth(service: &str, endpoint: &str, declaration: serde_json::Value) -> CommandConfig {
        let id = CommandId::new(service, endpoint).unwrap();
        let config = EndpointConfig::from_value(&id, declaration).unwrap();
        synthesize(&id, &config)
    }

    fn send_message() -> CommandConfig {
        synth(
            "lobby",
            "sendMessage",
            json!({
                "source": "user",
                "target": "server",
                "scopes": ["tachyon.lobby"],
                "request": { "data": { "type": "object", "properties": { "message": { "type": "string", "maxLength": 300 } } } },
                "response": [
                    { "status": "success" },
                    { "status": "failed", "reason": "not_in_lobby" },
                    { "status": "failed", "reason": "muted" },
                    { "status": "failed", "reason": "muted" }
                ]
            }),
        )
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("lobby"), "Lobby");
        assert_eq!(capitalize("sendMessage"), "SendMessage");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_request_envelope() {
        let command = send_message();
        let request = command.schema.get(MessageKind::Request).unwrap().to_value();

        assert_eq!(request["$schema"], JSON_SCHEMA_DRAFT);
        assert_eq!(request["$id"], "lobby/sendMessage/request");
        assert_eq!(request["title"], "LobbySendMessageRequest");
        assert_eq!(request["scopes"], json!(["tachyon.lobby"]));
        assert_eq!(request["properties"]["type"]["const"], "request");
        assert_eq!(request["properties"]["messageId"], json!({ "type": "string" }));
        assert_eq!(request["properties"]["commandId"]["const"], "lobby/sendMessage");
        assert_eq!(request["properties"]["data"]["title"], "LobbySendMessageRequestData");
        assert_eq!(request["required"], json!(["type", "messageId", "commandId", "data"]));
    }

    #[test]
    fn test_response_collapses_failures() {
        let command = send_message();
        let response = command.schema.get(MessageKind::Response).unwrap();
        let members = response.variants().unwrap();
        assert_eq!(members.len(), 2);

        let ok = members[0].to_value();
        assert_eq!(ok["title"], "LobbySendMessageOkResponse");
        assert_eq!(ok["properties"]["status"]["const"], "success");
        assert!(ok["properties"].get("data").is_none());

        let failed = members[1].to_value();
        assert_eq!(failed["title"], "LobbySendMessageFailResponse");
        assert_eq!(failed["properties"]["status"]["const"], "failed");
        assert_eq!(failed["properties"]["reason"]["enum"], json!(["not_in_lobby", "muted"]));
    }

    #[test]
    fn test_request_and_response_share_command_id() {
        let command = send_message();
        let request = command.schema.get(MessageKind::Request).unwrap().to_value();
        let response = command.schema.get(MessageKind::Response).unwrap().to_value();
        for member in response["anyOf"].as_array().unwrap() {
            assert_eq!(member["properties"]["commandId"], request["properties"]["commandId"]);
        }
    }

    #[test]
    fn test_titled_success_variants() {
        let command = synth(
            "matchmaking",
            "queue",
            json!({
                "source": "user",
                "target": "server",
                "request": {},
                "response": [
                    { "status": "success", "data": { "type": "object" } },
                    { "status": "success", "title": "MatchmakingQueueFullResponse", "data": { "type": "object", "title": "Full" } },
                    { "status": "failed", "reason": "invalid_queue" }
                ]
            }),
        );
        let response = command.schema.get(MessageKind::Response).unwrap().to_value();
        let members = response["anyOf"].as_array().unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0]["properties"]["data"]["title"], "MatchmakingQueueOkResponseData");
        assert_eq!(members[1]["title"], "MatchmakingQueueFullResponse");
        assert_eq!(members[1]["properties"]["data"]["title"], "Full");
        assert!(response.get("scopes").is_none());
    }

    #[test]
    fn test_event_envelope() {
        let command = synth(
            "user",
            "add",
            json!({
                "source": "server",
                "target": "user",
                "event": { "data": { "anyOf": [
                    { "type": "object", "properties": { "self": { "$ref": "privateUser" } } },
                    { "type": "object", "properties": { "users": { "type": "array", "items": { "$ref": "user" } } } }
                ] } }
            }),
        );
        assert!(matches!(command.schema, CommandSchema::Event { .. }));
        let event = command.schema.get(MessageKind::Event).unwrap();
        assert_eq!(event.refs(), vec!["privateUser", "user"]);

        let value = event.to_value();
        assert_eq!(value["$id"], "user/add/event");
        assert_eq!(value["title"], "UserAddEvent");
        assert_eq!(value["properties"]["type"]["const"], "event");
        assert_eq!(value["properties"]["data"]["title"], "UserAddEventData");
    }

    #[test]
    fn test_command_config_serialization() {
        let value = serde_json::to_value(send_message()).unwrap();
        assert_eq!(value["commandId"], "lobby/sendMessage");
        assert_eq!(value["type"], "requestResponse");
        assert_eq!(value["config"]["source"], "user");
        assert!(value["schema"]["request"].is_object());
        assert!(value["schema"]["response"].is_object());
    }
}
