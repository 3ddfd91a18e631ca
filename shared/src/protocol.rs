//! Wire vocabulary exchanged over a connection.
//!
//! Every frame is a JSON [`Envelope`] carrying a kind tag and a payload whose
//! shape depends on the kind. Decoding happens in two stages: the envelope is
//! parsed first, then the payload is converted into the strongly typed variant
//! for its kind. Unknown kinds decode to `Ok(None)` so newer clients can talk
//! to older servers; a known kind with a payload of the wrong shape is a
//! [`ProtocolError`].

use crate::{GameId, GameView, PlayerId, PlayerProfile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    JoinQueue,
    LeaveQueue,
    MakeMove,
    GameFound,
    GameUpdate,
    Error,
    Leaderboard,
    PlayerUpdate,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::JoinQueue => "join_queue",
            MessageKind::LeaveQueue => "leave_queue",
            MessageKind::MakeMove => "make_move",
            MessageKind::GameFound => "game_found",
            MessageKind::GameUpdate => "game_update",
            MessageKind::Error => "error",
            MessageKind::Leaderboard => "leaderboard",
            MessageKind::PlayerUpdate => "player_update",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "join_queue" => MessageKind::JoinQueue,
            "leave_queue" => MessageKind::LeaveQueue,
            "make_move" => MessageKind::MakeMove,
            "game_found" => MessageKind::GameFound,
            "game_update" => MessageKind::GameUpdate,
            "error" => MessageKind::Error,
            "leaderboard" => MessageKind::Leaderboard,
            "player_update" => MessageKind::PlayerUpdate,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Addressed, typed unit of communication.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
}

impl Envelope {
    pub fn new(kind: MessageKind, data: Value) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            data,
            game_id: None,
            player_id: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Envelope)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            kind: MessageKind::from_tag(&self.kind).unwrap_or(MessageKind::Error),
            source,
        })
    }

    fn payload<T: DeserializeOwned>(self, kind: MessageKind) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data).map_err(|source| ProtocolError::Payload { kind, source })
    }
}

fn to_data<T: Serialize>(kind: MessageKind, payload: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|source| ProtocolError::Encode { kind, source })
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub game_id: GameId,
    /// Any JSON number. Values that are not a board index reach the rules
    /// engine and are rejected there.
    pub position: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
struct ErrorPayload {
    error: String,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinQueue,
    LeaveQueue,
    MakeMove(MovePayload),
    RequestLeaderboard,
}

impl ClientMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ClientMessage::JoinQueue => MessageKind::JoinQueue,
            ClientMessage::LeaveQueue => MessageKind::LeaveQueue,
            ClientMessage::MakeMove(_) => MessageKind::MakeMove,
            ClientMessage::RequestLeaderboard => MessageKind::Leaderboard,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let kind = self.kind();
        match self {
            ClientMessage::MakeMove(payload) => {
                let mut envelope = Envelope::new(kind, to_data(kind, payload)?);
                envelope.game_id = Some(payload.game_id);
                Ok(envelope)
            }
            _ => Ok(Envelope::new(kind, Value::Null)),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.to_envelope()?.to_json()
    }

    /// Returns `Ok(None)` for kinds a server does not accept.
    pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>, ProtocolError> {
        let message = match MessageKind::from_tag(&envelope.kind) {
            Some(MessageKind::JoinQueue) => ClientMessage::JoinQueue,
            Some(MessageKind::LeaveQueue) => ClientMessage::LeaveQueue,
            Some(MessageKind::MakeMove) => {
                ClientMessage::MakeMove(envelope.payload(MessageKind::MakeMove)?)
            }
            Some(MessageKind::Leaderboard) => ClientMessage::RequestLeaderboard,
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    pub fn decode(text: &str) -> Result<Option<Self>, ProtocolError> {
        Self::from_envelope(Envelope::parse(text)?)
    }
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    PlayerUpdate(PlayerProfile),
    Leaderboard(Vec<PlayerProfile>),
    GameFound(GameView),
    GameUpdate(GameView),
    Error { reason: String },
}

impl ServerMessage {
    pub fn error(reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::PlayerUpdate(_) => MessageKind::PlayerUpdate,
            ServerMessage::Leaderboard(_) => MessageKind::Leaderboard,
            ServerMessage::GameFound(_) => MessageKind::GameFound,
            ServerMessage::GameUpdate(_) => MessageKind::GameUpdate,
            ServerMessage::Error { .. } => MessageKind::Error,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let kind = self.kind();
        let envelope = match self {
            ServerMessage::PlayerUpdate(profile) => {
                let mut envelope = Envelope::new(kind, to_data(kind, profile)?);
                envelope.player_id = Some(profile.id);
                envelope
            }
            ServerMessage::Leaderboard(entries) => Envelope::new(kind, to_data(kind, entries)?),
            ServerMessage::GameFound(view) | ServerMessage::GameUpdate(view) => {
                let mut envelope = Envelope::new(kind, to_data(kind, view)?);
                envelope.game_id = Some(view.game_id);
                envelope
            }
            ServerMessage::Error { reason } => {
                let payload = ErrorPayload {
                    error: reason.clone(),
                };
                Envelope::new(kind, to_data(kind, &payload)?)
            }
        };
        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.to_envelope()?.to_json()
    }

    /// Returns `Ok(None)` for kinds a client does not understand.
    pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>, ProtocolError> {
        let message = match MessageKind::from_tag(&envelope.kind) {
            Some(MessageKind::PlayerUpdate) => {
                ServerMessage::PlayerUpdate(envelope.payload(MessageKind::PlayerUpdate)?)
            }
            Some(MessageKind::Leaderboard) => {
                ServerMessage::Leaderboard(envelope.payload(MessageKind::Leaderboard)?)
            }
            Some(MessageKind::GameFound) => {
                ServerMessage::GameFound(envelope.payload(MessageKind::GameFound)?)
            }
            Some(MessageKind::GameUpdate) => {
                ServerMessage::GameUpdate(envelope.payload(MessageKind::GameUpdate)?)
            }
            Some(MessageKind::Error) => {
                let payload: ErrorPayload = envelope.payload(MessageKind::Error)?;
                ServerMessage::Error {
                    reason: payload.error,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    pub fn decode(text: &str) -> Result<Option<Self>, ProtocolError> {
        Self::from_envelope(Envelope::parse(text)?)
    }
}
