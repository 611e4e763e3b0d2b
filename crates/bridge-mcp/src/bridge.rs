//! Protocol Front Door
//!
//! Ties the streaming side to the invocation side. An invocation is answered
//! twice: [`Bridge::on_invocation`] returns an acknowledgment immediately,
//! and the actual result is pushed later over the streaming connections as an
//! [`InvocationOutcome`] carrying the caller's correlation id.

use crate::outcome::{InvocationBody, InvocationOutcome, InvocationRequest, StreamEvent};
use crate::session::{ConnectionId, EventSink, SessionManager};
use bridge_core::DeliveryMode;
use bridge_tools::{Dispatcher, ToolDefinition};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Invocation refused before dispatch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationRejected {
    #[error("malformed invocation: {0}")]
    Malformed(String),

    #[error("{}", no_channel_message(.0))]
    NoActiveChannel(Option<ConnectionId>),
}

fn no_channel_message(connection: &Option<ConnectionId>) -> String {
    match connection {
        Some(id) => format!("no active streaming connection: {} is not open", id),
        None => "no active streaming connection to deliver the result".to_string(),
    }
}

/// Immediate answer to an accepted invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub ok: bool,
    pub id: String,
}

pub struct Bridge {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
    delivery: DeliveryMode,
}

impl Bridge {
    pub fn new(dispatcher: Arc<Dispatcher>, sessions: Arc<SessionManager>) -> Self {
        Self {
            dispatcher,
            sessions,
            delivery: DeliveryMode::default(),
        }
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    pub fn on_connection_open(&self, sink: impl EventSink + 'static) -> ConnectionId {
        self.sessions.open(sink)
    }

    pub fn on_connection_close(&self, id: ConnectionId) -> bool {
        self.sessions.close(id)
    }

    pub fn on_list_tools(&self) -> Vec<ToolDefinition> {
        self.dispatcher.registry().definitions()
    }

    /// Check a raw invocation body, generating a correlation id when absent
    pub fn parse_invocation(
        &self,
        body: InvocationBody,
        origin: Option<ConnectionId>,
    ) -> Result<InvocationRequest, InvocationRejected> {
        let name = body
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| InvocationRejected::Malformed("name is required".into()))?;

        let correlation_id = match body.id {
            None | Some(Value::Null) => Uuid::new_v4().to_string(),
            Some(Value::String(s)) if s.is_empty() => Uuid::new_v4().to_string(),
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(InvocationRejected::Malformed(format!(
                    "id must be a string or number, got {}",
                    other
                )))
            }
        };

        let arguments = body.arguments.unwrap_or(Value::Object(Default::default()));

        let mut request = InvocationRequest::new(correlation_id, name, arguments);
        request.origin = origin;
        Ok(request)
    }

    /// Accept an invocation and run it in the background.
    ///
    /// Fails only when there is nowhere to push the result. Must be called
    /// from within a tokio runtime.
    pub fn on_invocation(&self, request: InvocationRequest) -> Result<Accepted, InvocationRejected> {
        self.check_channel(&request)?;

        let id = request.correlation_id.clone();
        info!(id = %id, tool = %request.tool_name, "Invocation accepted");

        let dispatcher = self.dispatcher.clone();
        let sessions = self.sessions.clone();
        let delivery = self.delivery;
        tokio::spawn(async move {
            run_invocation(&dispatcher, &sessions, delivery, request).await;
        });

        Ok(Accepted { ok: true, id })
    }

    /// Dispatch and deliver in the current task, returning the outcome
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationOutcome {
        run_invocation(&self.dispatcher, &self.sessions, self.delivery, request).await
    }

    fn check_channel(&self, request: &InvocationRequest) -> Result<(), InvocationRejected> {
        match self.delivery {
            DeliveryMode::Broadcast => {
                if self.sessions.is_empty() {
                    return Err(InvocationRejected::NoActiveChannel(None));
                }
            }
            DeliveryMode::Origin => {
                let origin = request
                    .origin
                    .ok_or(InvocationRejected::NoActiveChannel(None))?;
                if !self.sessions.is_open(origin) {
                    return Err(InvocationRejected::NoActiveChannel(Some(origin)));
                }
            }
        }
        Ok(())
    }
}

async fn run_invocation(
    dispatcher: &Dispatcher,
    sessions: &SessionManager,
    delivery: DeliveryMode,
    request: InvocationRequest,
) -> InvocationOutcome {
    let InvocationRequest {
        correlation_id,
        tool_name,
        arguments,
        origin,
    } = request;

    let result = dispatcher.dispatch(&tool_name, arguments).await;
    let outcome = InvocationOutcome::from_dispatch(correlation_id, tool_name, result);
    let event = StreamEvent::from(outcome.clone());

    // Nobody listening any more is fine; the outcome is simply dropped.
    let delivered = match (delivery, origin) {
        (DeliveryMode::Origin, Some(origin)) => usize::from(sessions.send_to(origin, &event)),
        _ => sessions.broadcast(&event),
    };
    debug!(
        id = %outcome.id,
        tool = %outcome.name,
        status = ?outcome.status,
        delivered,
        "Outcome delivered"
    );
    outcome
}
