//! Inbound message protocol
//!
//! The presentation surface sends user intent as a versioned envelope:
//!
//! ```json
//! { "version": 1, "message": { "t": "generate", "package": "org.example" } }
//! ```
//!
//! The set of message kinds is closed. A kind outside [`InboundMessage::KINDS`]
//! is rejected with [`ProtocolError::UnknownKind`]; a known kind with the wrong
//! shape is rejected with [`ProtocolError::Malformed`]. Nothing is guessed.

use crate::events::{Mode, ModeledMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Protocol version spoken in both directions
pub const PROTOCOL_VERSION: u32 = 1;

/// User intent sent by the presentation surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// Re-send every view's full state
    Refresh,
    /// Persist the given signatures with the given models
    Save {
        signatures: Vec<String>,
        methods: BTreeMap<String, ModeledMethod>,
    },
    /// Record user edits without saving them
    SetModeledMethods {
        methods: BTreeMap<String, ModeledMethod>,
    },
    /// Start background generation for a package
    Generate { package: String },
    /// Stop background generation for a package
    StopGenerate { package: String },
    /// Switch between application and framework mode
    SwitchMode { mode: Mode },
    /// Show or hide already-modeled methods
    ToggleHideModeled,
    /// Ask the workbench to open the analysis database
    OpenDatabase,
    /// Ask the workbench to open the extension pack
    OpenExtensionPack,
}

impl InboundMessage {
    /// Every message kind the protocol accepts
    pub const KINDS: [&'static str; 9] = [
        "refresh",
        "save",
        "setModeledMethods",
        "generate",
        "stopGenerate",
        "switchMode",
        "toggleHideModeled",
        "openDatabase",
        "openExtensionPack",
    ];

    /// Kind name, matching the serialized `t` tag
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Refresh => "refresh",
            InboundMessage::Save { .. } => "save",
            InboundMessage::SetModeledMethods { .. } => "setModeledMethods",
            InboundMessage::Generate { .. } => "generate",
            InboundMessage::StopGenerate { .. } => "stopGenerate",
            InboundMessage::SwitchMode { .. } => "switchMode",
            InboundMessage::ToggleHideModeled => "toggleHideModeled",
            InboundMessage::OpenDatabase => "openDatabase",
            InboundMessage::OpenExtensionPack => "openExtensionPack",
        }
    }
}

/// Versioned inbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub version: u32,
    pub message: InboundMessage,
}

impl InboundEnvelope {
    pub fn new(message: InboundMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }
}

/// Envelope before the message kind is checked
#[derive(Deserialize)]
struct RawEnvelope {
    version: u32,
    message: serde_json::Value,
}

/// Inbound protocol violations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Envelope is not valid JSON or lacks `version`/`message`
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    /// Envelope speaks another protocol version
    #[error("unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// Message kind is missing or not part of the protocol
    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    /// Known kind whose payload does not match its shape
    #[error("malformed '{kind}' message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse and validate one inbound envelope
pub fn parse_inbound(raw: &str) -> Result<InboundMessage, ProtocolError> {
    let envelope: RawEnvelope = serde_json::from_str(raw).map_err(ProtocolError::InvalidEnvelope)?;

    if envelope.version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion {
            expected: PROTOCOL_VERSION,
            found: envelope.version,
        });
    }

    let kind = match envelope.message.get("t").and_then(|t| t.as_str()) {
        Some(kind) => kind.to_string(),
        None => return Err(ProtocolError::UnknownKind("<missing>".to_string())),
    };

    if !InboundMessage::KINDS.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownKind(kind));
    }

    serde_json::from_value(envelope.message).map_err(|source| ProtocolError::Malformed { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_round_trips() {
        let samples = vec![
            InboundMessage::Refresh,
            InboundMessage::Save {
                signatures: vec!["a#b()".to_string()],
                methods: BTreeMap::from([("a#b()".to_string(), ModeledMethod::none("a#b()"))]),
            },
            InboundMessage::SetModeledMethods {
                methods: BTreeMap::new(),
            },
            InboundMessage::Generate {
                package: "org.example".to_string(),
            },
            InboundMessage::StopGenerate {
                package: "org.example".to_string(),
            },
            InboundMessage::SwitchMode {
                mode: Mode::Framework,
            },
            InboundMessage::ToggleHideModeled,
            InboundMessage::OpenDatabase,
            InboundMessage::OpenExtensionPack,
        ];
        assert_eq!(samples.len(), InboundMessage::KINDS.len());

        for message in samples {
            let raw = serde_json::to_string(&InboundEnvelope::new(message.clone())).expect("encode");
            let parsed = parse_inbound(&raw).expect("parse");
            assert_eq!(parsed, message);
            assert!(InboundMessage::KINDS.contains(&parsed.kind()));
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let raw = json!({ "version": 1, "message": { "t": "deleteEverything" } }).to_string();
        match parse_inbound(&raw) {
            Err(ProtocolError::UnknownKind(kind)) => assert_eq!(kind, "deleteEverything"),
            other => panic!("expected UnknownKind, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_kind_rejected() {
        let raw = json!({ "version": 1, "message": { "package": "x" } }).to_string();
        assert!(matches!(parse_inbound(&raw), Err(ProtocolError::UnknownKind(_))));
    }

    #[test]
    fn test_known_kind_with_wrong_shape_is_malformed() {
        let raw = json!({ "version": 1, "message": { "t": "generate", "pkg": "x" } }).to_string();
        match parse_inbound(&raw) {
            Err(ProtocolError::Malformed { kind, .. }) => assert_eq!(kind, "generate"),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let raw = json!({ "version": 2, "message": { "t": "refresh" } }).to_string();
        assert!(matches!(
            parse_inbound(&raw),
            Err(ProtocolError::UnsupportedVersion {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_garbage_is_invalid_envelope() {
        assert!(matches!(
            parse_inbound("not json"),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
    }
}
