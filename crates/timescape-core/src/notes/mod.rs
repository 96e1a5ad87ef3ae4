//! Sticky note records and the export payload.
//!
//! The companion's `/export` endpoint and exported files on disk share one
//! JSON format:
//!
//! ```json
//! {
//!   "version": 1,
//!   "generatedAt": 1718000000000,
//!   "stickyNotes": [
//!     {
//!       "id": 101, "flowId": 1, "flowName": "Daily Phrases",
//!       "cardId": 11, "cardTitle": "Greetings",
//!       "color": "#FFFFF8A6", "rotation": -2.5,
//!       "front": { "label": "front", "text": "你好" },
//!       "back": { "label": "back", "text": "Hello" }
//!     }
//!   ],
//!   "totalStickyNotes": 1,
//!   "totalFlows": 1
//! }
//! ```
//!
//! Unknown fields are ignored and the list and totals default when missing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// ARGB colour used when a note's colour can't be parsed.
pub const DEFAULT_NOTE_COLOR: u32 = 0xFFFF_F8A6;

/// One side of a note card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSide {
    /// Short label, e.g. "front"
    pub label: String,
    /// Card text
    pub text: String,
}

/// A single sticky note as exported by the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    /// Note ID
    pub id: i64,
    /// ID of the flow the card belongs to
    pub flow_id: i64,
    /// Flow display name
    pub flow_name: String,
    /// Card ID within the flow
    pub card_id: i64,
    /// Card title
    pub card_title: String,
    /// `#RRGGBB` or `#AARRGGBB`
    pub color: String,
    /// Tilt in degrees
    pub rotation: f64,
    /// Front of the card
    pub front: NoteSide,
    /// Back of the card
    pub back: NoteSide,
}

impl NoteRecord {
    /// The note colour as ARGB, falling back to [`DEFAULT_NOTE_COLOR`].
    #[must_use]
    pub fn argb(&self) -> u32 {
        parse_color(&self.color)
    }
}

/// Payload returned by `/export` and stored in export files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    /// Format version
    pub version: i32,
    /// Generation time, milliseconds since the UNIX epoch
    pub generated_at: i64,
    /// Exported notes
    #[serde(default)]
    pub sticky_notes: Vec<NoteRecord>,
    /// Note count as reported by the companion
    #[serde(default)]
    pub total_sticky_notes: i32,
    /// Flow count as reported by the companion
    #[serde(default)]
    pub total_flows: i32,
}

/// Decode an export payload from raw JSON bytes.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] if the bytes are not a valid payload.
pub fn decode_export(bytes: &[u8]) -> Result<ExportPayload> {
    serde_json::from_slice(bytes).map_err(|e| Error::MalformedPayload(e.to_string()))
}

/// Read and decode an export file from disk.
///
/// # Errors
///
/// Returns an I/O error if the file can't be read, or
/// [`Error::MalformedPayload`] if its content isn't a valid payload.
pub fn load_export_file(path: &Path) -> Result<ExportPayload> {
    let bytes = std::fs::read(path)?;
    let payload = decode_export(&bytes)?;

    tracing::debug!(
        path = %path.display(),
        notes = payload.sticky_notes.len(),
        "Loaded export file"
    );

    Ok(payload)
}

/// Parse `#RRGGBB` or `#AARRGGBB` into ARGB.
///
/// Six-digit colours are fully opaque. Anything else yields
/// [`DEFAULT_NOTE_COLOR`].
#[must_use]
pub fn parse_color(value: &str) -> u32 {
    let Some(hex) = value.trim().strip_prefix('#') else {
        return DEFAULT_NOTE_COLOR;
    };
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return DEFAULT_NOTE_COLOR;
    }

    match (hex.len(), u32::from_str_radix(hex, 16)) {
        (6, Ok(rgb)) => 0xFF00_0000 | rgb,
        (8, Ok(argb)) => argb,
        _ => DEFAULT_NOTE_COLOR,
    }
}

/// Notes bundled with the app, shown before anything has been imported.
#[must_use]
pub fn default_notes() -> Vec<NoteRecord> {
    vec![
        bundled_note(
            (101, 1, 11),
            ("Daily Phrases", "Greetings"),
            ("#FFFFF8A6", -2.5),
            ("你好", "Hello"),
        ),
        bundled_note(
            (102, 1, 12),
            ("Daily Phrases", "Thanks"),
            ("#FFD7E8FF", 1.0),
            ("谢谢", "Thank you"),
        ),
        bundled_note(
            (103, 2, 21),
            ("Travel", "Where"),
            ("#FFFFDAD7", 0.0),
            ("厕所在哪里？", "Where is the restroom?"),
        ),
    ]
}

fn bundled_note(
    (id, flow_id, card_id): (i64, i64, i64),
    (flow_name, card_title): (&str, &str),
    (color, rotation): (&str, f64),
    (front, back): (&str, &str),
) -> NoteRecord {
    NoteRecord {
        id,
        flow_id,
        flow_name: flow_name.to_string(),
        card_id,
        card_title: card_title.to_string(),
        color: color.to_string(),
        rotation,
        front: NoteSide {
            label: "front".to_string(),
            text: front.to_string(),
        },
        back: NoteSide {
            label: "back".to_string(),
            text: back.to_string(),
        },
    }
}
