//! Actor Routing
//!
//! Folds compiled commands into [`SchemaMeta`]: for every actor and message
//! kind, which commands it sends and which it receives.
//!
//! ```text
//! request/response, source A → target B:
//!     A.request.send    B.request.receive
//!     B.response.send   A.response.receive
//! event, source A → target B:
//!     A.event.send      B.event.receive
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::endpoint::{Actor, CommandId};
use crate::envelope::{CommandConfig, CommandSchema, MessageKind};
use crate::error::{CompileError, Result};

static EMPTY_ROUTE: Route = Route {
    send: Vec::new(),
    receive: Vec::new(),
};

/// Commands an actor sends and receives for one message kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Route {
    pub send: Vec<CommandId>,
    pub receive: Vec<CommandId>,
}

/// Routes of one actor, per message kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActorRoutes {
    pub request: Route,
    pub response: Route,
    pub event: Route,
}

impl ActorRoutes {
    pub fn route(&self, kind: MessageKind) -> &Route {
        match kind {
            MessageKind::Request => &self.request,
            MessageKind::Response => &self.response,
            MessageKind::Event => &self.event,
        }
    }

    fn route_mut(&mut self, kind: MessageKind) -> &mut Route {
        match kind {
            MessageKind::Request => &mut self.request,
            MessageKind::Response => &mut self.response,
            MessageKind::Event => &mut self.event,
        }
    }
}

/// Actor communication graph plus the service → endpoints index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMeta {
    pub actors: BTreeMap<Actor, ActorRoutes>,
    pub service_ids: BTreeMap<String, Vec<String>>,
}

impl Default for SchemaMeta {
    fn default() -> Self {
        Self {
            actors: Actor::ALL
                .into_iter()
                .map(|actor| (actor, ActorRoutes::default()))
                .collect(),
            service_ids: BTreeMap::new(),
        }
    }
}

impl SchemaMeta {
    /// Fold commands in iteration order. A repeated CommandId is an error.
    pub fn build<'a>(commands: impl IntoIterator<Item = &'a CommandConfig>) -> Result<Self> {
        let mut meta = Self::default();
        let mut seen = BTreeSet::new();

        for command in commands {
            let id = &command.command_id;
            if !seen.insert(id.clone()) {
                return Err(CompileError::DuplicateCommand {
                    command_id: id.to_string(),
                });
            }

            let (source, target) = (command.config.source, command.config.target);
            match command.schema {
                CommandSchema::RequestResponse { .. } => {
                    meta.push(source, MessageKind::Request, Direction::Send, id);
                    meta.push(target, MessageKind::Request, Direction::Receive, id);
                    meta.push(target, MessageKind::Response, Direction::Send, id);
                    meta.push(source, MessageKind::Response, Direction::Receive, id);
                }
                CommandSchema::Event { .. } => {
                    meta.push(source, MessageKind::Event, Direction::Send, id);
                    meta.push(target, MessageKind::Event, Direction::Receive, id);
                }
            }

            meta.service_ids
                .entry(id.service_id().to_string())
                .or_default()
                .push(id.endpoint_id().to_string());
        }

        Ok(meta)
    }

    pub fn routes(&self, actor: Actor, kind: MessageKind) -> &Route {
        self.actors
            .get(&actor)
            .map(|routes| routes.route(kind))
            .unwrap_or(&EMPTY_ROUTE)
    }

    /// Actors that send `command_id` as a message of `kind`
    pub fn senders(&self, command_id: &str, kind: MessageKind) -> Vec<Actor> {
        self.actors
            .iter()
            .filter(|(_, routes)| routes.route(kind).send.iter().any(|id| id == command_id))
            .map(|(actor, _)| *actor)
            .collect()
    }

    fn push(&mut self, actor: Actor, kind: MessageKind, direction: Direction, id: &CommandId) {
        let route = self.actors.entry(actor).or_default().route_mut(kind);
        match direction {
            Direction::Send => route.send.push(id.clone()),
            Direction::Receive => route.receive.push(id.clone()),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Send,
    Receive,
}
