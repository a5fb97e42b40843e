//! Saved authoring sessions
//!
//! A session file pairs the exported schema with canvas positions keyed by
//! node id. Positions are matched back to models by *name* on load, so a model
//! renamed between save and load falls back to default placement.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EditorSession, ModelId, Position};
use crate::error::Result;
use crate::schema::SchemaDocument;

/// Position of one node at save time, tagged with the model's name then
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub x: i32,
    pub y: i32,
    pub name: String,
}

/// On-disk form of an authoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub schema: SchemaDocument,
    #[serde(default)]
    pub positions: BTreeMap<ModelId, SavedPosition>,
}

impl SessionFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Suggested download name, `{app_name}_schema.json`
    pub fn file_name(&self) -> String {
        format!("{}_schema.json", self.schema.app_name)
    }
}

/// Parse a bare schema document or a session file. For a session file the
/// embedded schema is returned as written, without a trip through the editor.
pub fn document_from_json(json: &str) -> Result<SchemaDocument> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    if raw.get("schema").is_some_and(serde_json::Value::is_object) {
        let file: SessionFile = serde_json::from_value(raw)?;
        return Ok(file.schema);
    }
    Ok(serde_json::from_value(raw)?)
}

impl EditorSession {
    /// Snapshot the session: exported schema plus every node's position
    pub fn save(&self) -> SessionFile {
        let positions = self
            .models()
            .map(|(id, node)| {
                let saved = SavedPosition {
                    x: node.position.x,
                    y: node.position.y,
                    name: node.name.clone(),
                };
                (id, saved)
            })
            .collect();

        SessionFile {
            schema: self.export(),
            positions,
        }
    }

    /// Rebuild a session, restoring positions for models whose name matches
    pub fn load(file: &SessionFile) -> Self {
        let mut session = Self::import(&file.schema);

        for node in session.models.values_mut() {
            if let Some(saved) = file.positions.values().find(|p| p.name == node.name) {
                node.position = Position { x: saved.x, y: saved.y };
            }
        }

        session
    }
}
