//! Content-Part Codec — bidirectional conversion between the wire [`Part`]
//! tagged union and the runtime [`ContentPart`] representation used by the
//! conversation-reply layer.
//!
//! The wire `Part` discriminates by field presence (`text`, then `raw` +
//! `media_type`, then `url` + `media_type`, then `data`); `ContentPart` is a
//! proper Rust enum a `Conversation` implementation can match on directly.
//! Ingress and egress are free functions rather than `From`/`TryFrom` impls
//! because ingress is fallible in a way that needs a descriptive error
//! message — the same explicit match-and-reject style used for JSON-RPC
//! param parsing in `axum_integration.rs`, favored over a blanket `TryFrom`.

use base64::Engine as _;
use serde_json::Value;

use crate::error::A2AError;
use crate::types::{Artifact, Message, Part, Role};

/// The kind of media carried by a [`ContentPart::Media`], inferred from the
/// MIME type's prefix during ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
}

impl MediaKind {
    /// Infer a [`MediaKind`] from a MIME type string.
    ///
    /// `image/*` -> Image, `audio/*` -> Audio, `video/*` -> Video,
    /// `application/pdf` or `text/*` -> Document, anything else -> Document.
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.starts_with("image/") {
            MediaKind::Image
        } else if media_type.starts_with("audio/") {
            MediaKind::Audio
        } else if media_type.starts_with("video/") {
            MediaKind::Video
        } else {
            // application/pdf, text/*, and everything else default to document.
            MediaKind::Document
        }
    }
}

/// Where a [`ContentPart::Media`]'s bytes live.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Base64-encoded bytes, as carried on the wire.
    Base64(String),
    /// A remote URL reference.
    Url(String),
}

/// The runtime representation of a single unit of message/artifact content,
/// as consumed and produced by a [`crate::server::Conversation`]
/// implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Media {
        kind: MediaKind,
        media_type: String,
        source: MediaSource,
        filename: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ContentPart::Text(t) => t.is_empty(),
            ContentPart::Media { .. } => false,
        }
    }
}

/// Convert a wire [`Part`] into a runtime [`ContentPart`].
///
/// Dispatches on field presence in order `text -> raw+media_type ->
/// url+media_type -> data`. A `data` part is always rejected (structured
/// data is not supported on ingress). An empty part (no populated field) is
/// rejected.
pub fn ingress(part: &Part) -> Result<ContentPart, A2AError> {
    if let Some(ref text) = part.text {
        return Ok(ContentPart::Text(text.clone()));
    }

    if let Some(ref bytes) = part.raw {
        let media_type = part
            .media_type
            .clone()
            .ok_or_else(|| A2AError::invalid_params("raw part is missing media_type"))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        return Ok(ContentPart::Media {
            kind: MediaKind::from_media_type(&media_type),
            media_type,
            source: MediaSource::Base64(encoded),
            filename: part.filename.clone(),
        });
    }

    if let Some(ref url) = part.url {
        let media_type = part
            .media_type
            .clone()
            .ok_or_else(|| A2AError::invalid_params("url part is missing media_type"))?;
        return Ok(ContentPart::Media {
            kind: MediaKind::from_media_type(&media_type),
            media_type,
            source: MediaSource::Url(url.clone()),
            filename: part.filename.clone(),
        });
    }

    if part.data.is_some() {
        return Err(A2AError::invalid_params(
            "structured data parts are not supported",
        ));
    }

    Err(A2AError::invalid_params("part has no populated content field"))
}

/// Convert a runtime [`ContentPart`] into a wire [`Part`].
///
/// Text parts become `{text}`. Media parts with base64-encoded data are
/// decoded to raw bytes and emitted as `{raw, mediaType}`; media parts with
/// a URL are emitted as `{url, mediaType}`. An empty text part fails.
pub fn egress(part: &ContentPart) -> Result<Part, A2AError> {
    match part {
        ContentPart::Text(text) => {
            if text.is_empty() {
                return Err(A2AError::internal_error("empty content part"));
            }
            Ok(Part::text(text.clone()))
        }
        ContentPart::Media {
            media_type,
            source,
            filename,
            ..
        } => match source {
            MediaSource::Base64(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| A2AError::internal_error(format!("invalid base64 media: {e}")))?;
                Ok(match filename {
                    Some(name) => Part::raw_with_filename(bytes, media_type.clone(), name.clone()),
                    None => Part::raw(bytes, media_type.clone()),
                })
            }
            MediaSource::Url(url) => Ok(Part::url(url.clone(), media_type.clone())),
        },
    }
}

/// The runtime equivalent of a [`Message`]: role, content parts, and
/// metadata, plus a convenience `content` field concatenating all text
/// parts. Produced from a wire `Message` for consumption by a
/// `Conversation` implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeMessage {
    pub role: RuntimeRole,
    pub parts: Vec<ContentPart>,
    pub content: String,
    pub metadata: Option<Value>,
}

/// Runtime role naming: `agent` becomes `"assistant"` (matching the common
/// chat-completion convention), `user` is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeRole {
    User,
    Assistant,
}

impl std::fmt::Display for RuntimeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RuntimeRole::User => "user",
            RuntimeRole::Assistant => "assistant",
        })
    }
}

/// Convert a wire [`Message`] into a [`RuntimeMessage`].
///
/// Each part is ingested via [`ingress`]; parts that fail ingress (e.g. a
/// `data` part) are skipped rather than failing the whole message, since a
/// message may legitimately mix supported and unsupported parts.
pub fn message_ingress(message: &Message) -> RuntimeMessage {
    let parts: Vec<ContentPart> = message.parts.iter().filter_map(|p| ingress(p).ok()).collect();

    let content = parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text(t) => Some(t.as_str()),
            ContentPart::Media { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("");

    RuntimeMessage {
        role: match message.role {
            Role::Agent => RuntimeRole::Assistant,
            Role::User => RuntimeRole::User,
        },
        parts,
        content,
        metadata: message.metadata.clone(),
    }
}

/// Synthesize an [`Artifact`] from a non-empty list of runtime content
/// parts, with the stable id `"artifact-1"`. Returns `None` for an empty
/// list.
pub fn synthesize_artifact(parts: &[ContentPart]) -> Result<Option<Artifact>, A2AError> {
    if parts.is_empty() {
        return Ok(None);
    }
    let wire_parts = parts.iter().map(egress).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Artifact {
        artifact_id: "artifact-1".to_string(),
        name: None,
        description: None,
        parts: wire_parts,
    }))
}
