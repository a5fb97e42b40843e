//! Graph Editor State
//!
//! The authoring-side store: model nodes and directed association edges,
//! each keyed by a monotonic id. The store itself is a dumb container with
//! cascade-delete; interactive checks (self-loops, duplicate pairs) live in
//! [`EditorSession::connect`], which callers use instead of inserting edges
//! directly.
//!
//! Ids are never reused within a session. Because they increase
//! monotonically, iterating the ordered maps yields insertion order, and
//! export preserves that order.
//!
//! ```text
//!   model-1 (Post) ──has_many comments──▶ model-2 (Comment)
//!        ▲                                    │
//!        └──────────belongs_to post───────────┘
//! ```

pub mod session_file;

pub use session_file::{document_from_json, SavedPosition, SessionFile};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::EditorError;
use crate::names::{pluralize, to_snake_case};
use crate::schema::{
    Association, AssociationKind, AssociationOptions, Callback, Database, Field, Index, JoinTable,
    Model, SchemaDocument, ValidationRule,
};

const DEFAULT_APP_NAME: &str = "my_rails_app";
const DEFAULT_FRAMEWORK_VERSION: &str = "7.1";

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a model node, rendered as `model-N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(u64);

/// Identifier of an association edge, rendered as `conn-N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssociationId(u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl FromStr for ModelId {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("model-")
            .and_then(|n| n.parse().ok())
            .map(ModelId)
            .ok_or_else(|| EditorError::UnknownModel(s.to_string()))
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Nodes and Edges
// =============================================================================

/// Canvas coordinates; metadata for the rendering layer only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Staggered placement used when nothing better is known
    pub fn staggered(slot: usize) -> Self {
        let slot = slot as i32;
        Self {
            x: 100 + slot * 50,
            y: 100 + slot * 30,
        }
    }
}

/// A model being authored. Associations live on edges, not here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub fields: Vec<Field>,
    pub validations: Vec<ValidationRule>,
    pub callbacks: Vec<Callback>,
    pub indices: Vec<Index>,
    pub position: Position,
}

impl ModelNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Build a node from a document model, dropping its associations
    fn from_model(model: &Model, position: Position) -> Self {
        Self {
            name: model.name.clone(),
            fields: model.fields.clone(),
            validations: model.validations.clone(),
            callbacks: model.callbacks.clone(),
            indices: model.indices.clone(),
            position,
        }
    }
}

/// A directed association: `source` declares it, `target` is referenced
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationEdge {
    pub source: ModelId,
    pub target: ModelId,
    pub kind: AssociationKind,
    pub name: String,
    pub options: AssociationOptions,
    /// Explicit join table name for `has_and_belongs_to_many`
    pub join_table_name: Option<String>,
}

impl AssociationEdge {
    pub fn new(source: ModelId, target: ModelId, kind: AssociationKind, name: impl Into<String>) -> Self {
        Self {
            source,
            target,
            kind,
            name: name.into(),
            options: AssociationOptions::default(),
            join_table_name: None,
        }
    }

    pub fn with_options(mut self, options: AssociationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn touches(&self, id: ModelId) -> bool {
        self.source == id || self.target == id
    }
}

// =============================================================================
// Editor Session
// =============================================================================

/// One authoring session's state. Created per session, torn down by `clear()`.
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub app_name: String,
    pub framework_version: String,
    pub database: Database,
    pub api_only: bool,
    models: BTreeMap<ModelId, ModelNode>,
    associations: BTreeMap<AssociationId, AssociationEdge>,
    next_model_id: u64,
    next_association_id: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            framework_version: DEFAULT_FRAMEWORK_VERSION.to_string(),
            database: Database::default(),
            api_only: false,
            models: BTreeMap::new(),
            associations: BTreeMap::new(),
            next_model_id: 1,
            next_association_id: 1,
        }
    }

    // --- Store operations ---

    /// Insert a model under a fresh id. No validation happens here.
    pub fn add_model(&mut self, model: ModelNode) -> ModelId {
        let id = ModelId(self.next_model_id);
        self.next_model_id += 1;
        self.models.insert(id, model);
        id
    }

    /// Add a placeholder model named after its slot, as the toolbar does
    pub fn create_model(&mut self) -> ModelId {
        let slot = self.next_model_id;
        let node = ModelNode::new(format!("Model{}", slot)).at(Position::staggered(slot as usize));
        self.add_model(node)
    }

    /// Remove a model and every association touching it. Absent ids are a no-op.
    pub fn remove_model(&mut self, id: ModelId) {
        if self.models.remove(&id).is_none() {
            return;
        }

        let before = self.associations.len();
        self.associations.retain(|_, edge| !edge.touches(id));
        let cascaded = before - self.associations.len();
        if cascaded > 0 {
            debug!(model = %id, cascaded, "removed associations with deleted model");
        }
    }

    /// Insert an edge under a fresh id. Callers decide whether it is allowed.
    pub fn add_association(&mut self, edge: AssociationEdge) -> AssociationId {
        let id = AssociationId(self.next_association_id);
        self.next_association_id += 1;
        self.associations.insert(id, edge);
        id
    }

    /// Remove one edge. Absent ids are a no-op.
    pub fn remove_association(&mut self, id: AssociationId) {
        self.associations.remove(&id);
    }

    /// Drop everything and reset both id counters
    pub fn clear(&mut self) {
        self.models.clear();
        self.associations.clear();
        self.next_model_id = 1;
        self.next_association_id = 1;
    }

    // --- Interactive operations ---

    /// Create an association the way the canvas does: refuse self-loops,
    /// duplicate (source, target) pairs and unknown endpoints.
    pub fn connect(
        &mut self,
        source: ModelId,
        target: ModelId,
        kind: AssociationKind,
        name: impl Into<String>,
        options: AssociationOptions,
    ) -> Result<AssociationId, EditorError> {
        for id in [source, target] {
            if !self.models.contains_key(&id) {
                return Err(EditorError::UnknownModel(id.to_string()));
            }
        }
        if source == target {
            return Err(EditorError::SelfAssociation);
        }
        if self.associations.values().any(|e| e.source == source && e.target == target) {
            return Err(EditorError::DuplicateAssociation);
        }

        let edge = AssociationEdge::new(source, target, kind, name).with_options(options);
        Ok(self.add_association(edge))
    }

    /// Rename a model. Exported association targets follow automatically.
    pub fn rename_model(&mut self, id: ModelId, name: impl Into<String>) -> bool {
        match self.models.get_mut(&id) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    // --- Queries ---

    pub fn model(&self, id: ModelId) -> Option<&ModelNode> {
        self.models.get(&id)
    }

    pub fn model_mut(&mut self, id: ModelId) -> Option<&mut ModelNode> {
        self.models.get_mut(&id)
    }

    pub fn association(&self, id: AssociationId) -> Option<&AssociationEdge> {
        self.associations.get(&id)
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelId, &ModelNode)> {
        self.models.iter().map(|(id, node)| (*id, node))
    }

    pub fn associations(&self) -> impl Iterator<Item = (AssociationId, &AssociationEdge)> {
        self.associations.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn associations_touching(&self, id: ModelId) -> Vec<AssociationId> {
        self.associations
            .iter()
            .filter(|(_, edge)| edge.touches(id))
            .map(|(edge_id, _)| *edge_id)
            .collect()
    }

    /// First model (in insertion order) carrying this name
    pub fn find_model_by_name(&self, name: &str) -> Option<ModelId> {
        self.models.iter().find(|(_, node)| node.name == name).map(|(id, _)| *id)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    // --- Export / import ---

    /// Denormalize the graph into a schema document.
    ///
    /// Each model lists its outgoing edges in edge insertion order with the
    /// target resolved to its current name. Edges whose target no longer
    /// exists are skipped. Every `has_and_belongs_to_many` edge contributes a
    /// join table unless its model pair already has one.
    pub fn export(&self) -> SchemaDocument {
        let mut models = Vec::with_capacity(self.models.len());
        let mut join_tables = Vec::new();
        let mut joined_pairs = HashSet::new();

        for (id, node) in &self.models {
            let mut associations = Vec::new();

            for edge in self.associations.values().filter(|e| e.source == *id) {
                let Some(target) = self.models.get(&edge.target) else {
                    continue;
                };

                associations.push(Association {
                    kind: edge.kind.clone(),
                    name: edge.name.clone(),
                    target: target.name.clone(),
                    options: edge.options.clone(),
                });

                if edge.kind == AssociationKind::HasAndBelongsToMany {
                    let table = JoinTable {
                        models: (node.name.clone(), target.name.clone()),
                        table_name: edge.join_table_name.clone(),
                    };
                    if joined_pairs.insert(table.pair_key()) {
                        join_tables.push(table);
                    }
                }
            }

            models.push(Model {
                name: node.name.clone(),
                fields: node.fields.clone(),
                validations: node.validations.clone(),
                callbacks: node.callbacks.clone(),
                indices: node.indices.clone(),
                associations,
            });
        }

        SchemaDocument {
            app_name: self.app_name.clone(),
            framework_version: self.framework_version.clone(),
            database: self.database.clone(),
            api_only: self.api_only,
            models: Some(models),
            join_tables,
        }
    }

    /// Rebuild a session from a document.
    ///
    /// Associations are matched to models by name (first match wins); those
    /// naming a model that is not in the document are dropped. Explicit join
    /// table names are carried onto the matching many-to-many edge.
    pub fn import(document: &SchemaDocument) -> Self {
        let mut session = Self::new();
        session.app_name = document.app_name.clone();
        session.framework_version = document.framework_version.clone();
        session.database = document.database.clone();
        session.api_only = document.api_only;

        for (slot, model) in document.models().iter().enumerate() {
            session.add_model(ModelNode::from_model(model, Position::staggered(slot)));
        }

        for model in document.models() {
            let Some(source) = session.find_model_by_name(&model.name) else {
                continue;
            };
            for association in &model.associations {
                let Some(target) = session.find_model_by_name(&association.target) else {
                    debug!(
                        model = %model.name,
                        association = %association.name,
                        target = %association.target,
                        "dropping association to unknown model on import"
                    );
                    continue;
                };
                let edge = AssociationEdge::new(source, target, association.kind.clone(), association.name.clone())
                    .with_options(association.options.clone());
                session.add_association(edge);
            }
        }

        for table in document.join_tables.iter().filter(|t| t.table_name.is_some()) {
            session.apply_join_table_name(table);
        }

        session
    }

    fn apply_join_table_name(&mut self, table: &JoinTable) {
        let (Some(left), Some(right)) = (
            self.find_model_by_name(&table.models.0),
            self.find_model_by_name(&table.models.1),
        ) else {
            return;
        };

        if let Some(edge) = self.associations.values_mut().find(|e| {
            e.kind == AssociationKind::HasAndBelongsToMany
                && ((e.source == left && e.target == right) || (e.source == right && e.target == left))
        }) {
            edge.join_table_name = table.table_name.clone();
        }
    }
}

/// Default association name the editor proposes for a new edge.
///
/// Singular associations use the target's snake_case name, collections its plural.
pub fn suggest_association_name(kind: &AssociationKind, target_name: &str) -> String {
    let base = to_snake_case(target_name);
    if kind.is_collection() {
        pluralize(&base)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn blog() -> (EditorSession, ModelId, ModelId) {
        let mut session = EditorSession::new();
        let post = session.add_model(ModelNode::new("Post").with_field(Field::new("title", FieldType::String)));
        let comment = session.add_model(ModelNode::new("Comment"));
        (session, post, comment)
    }

    #[test]
    fn test_ids_are_monotonic_and_reset_on_clear() {
        let mut session = EditorSession::new();
        let a = session.add_model(ModelNode::new("A"));
        session.remove_model(a);
        let b = session.add_model(ModelNode::new("B"));
        assert_eq!(a.to_string(), "model-1");
        assert_eq!(b.to_string(), "model-2");

        session.clear();
        assert!(session.is_empty());
        let c = session.add_model(ModelNode::new("C"));
        assert_eq!(c.to_string(), "model-1");
    }

    #[test]
    fn test_remove_model_cascades() {
        let (mut session, post, comment) = blog();
        let tag = session.add_model(ModelNode::new("Tag"));
        session.add_association(AssociationEdge::new(post, comment, AssociationKind::HasMany, "comments"));
        session.add_association(AssociationEdge::new(comment, post, AssociationKind::BelongsTo, "post"));
        let kept = session.add_association(AssociationEdge::new(tag, comment, AssociationKind::HasMany, "comments"));

        session.remove_model(post);

        assert_eq!(session.association_count(), 1);
        assert!(session.association(kept).is_some());
        assert!(session.associations_touching(post).is_empty());
    }

    #[test]
    fn test_removals_are_idempotent() {
        let (mut session, post, comment) = blog();
        let edge = session.add_association(AssociationEdge::new(post, comment, AssociationKind::HasMany, "comments"));

        session.remove_association(edge);
        session.remove_association(edge);
        session.remove_model(post);
        session.remove_model(post);

        assert_eq!(session.model_count(), 1);
        assert_eq!(session.association_count(), 0);
    }

    #[test]
    fn test_connect_rejections() {
        let (mut session, post, comment) = blog();

        assert_eq!(
            session.connect(post, post, AssociationKind::HasMany, "posts", Default::default()),
            Err(EditorError::SelfAssociation)
        );

        session
            .connect(post, comment, AssociationKind::HasMany, "comments", Default::default())
            .unwrap();
        assert_eq!(
            session.connect(post, comment, AssociationKind::HasOne, "comment", Default::default()),
            Err(EditorError::DuplicateAssociation)
        );

        // The reverse direction is a different pair
        assert!(session
            .connect(comment, post, AssociationKind::BelongsTo, "post", Default::default())
            .is_ok());

        let ghost = ModelId(99);
        assert_eq!(
            session.connect(post, ghost, AssociationKind::HasMany, "ghosts", Default::default()),
            Err(EditorError::UnknownModel("model-99".to_string()))
        );
    }

    #[test]
    fn test_export_resolves_current_target_name() {
        let (mut session, post, comment) = blog();
        session.add_association(AssociationEdge::new(post, comment, AssociationKind::HasMany, "comments"));
        session.rename_model(comment, "Reply");

        let doc = session.export();
        let post_model = doc.find_model("Post").unwrap();
        assert_eq!(post_model.associations[0].target, "Reply");
        assert_eq!(doc.app_name, "my_rails_app");
        assert_eq!(doc.framework_version, "7.1");
    }

    #[test]
    fn test_export_skips_edges_to_missing_models() {
        let (mut session, post, _) = blog();
        session.add_association(AssociationEdge::new(post, ModelId(42), AssociationKind::HasMany, "ghosts"));
        let doc = session.export();
        assert!(doc.find_model("Post").unwrap().associations.is_empty());
    }

    #[test]
    fn test_habtm_derives_one_join_table_per_pair() {
        let mut session = EditorSession::new();
        let post = session.add_model(ModelNode::new("Post"));
        let tag = session.add_model(ModelNode::new("Tag"));
        session.add_association(AssociationEdge::new(post, tag, AssociationKind::HasAndBelongsToMany, "tags"));
        session.add_association(AssociationEdge::new(tag, post, AssociationKind::HasAndBelongsToMany, "posts"));

        let doc = session.export();
        assert_eq!(doc.join_tables, vec![JoinTable::new("Post", "Tag")]);
        assert_eq!(doc.join_tables[0].resolved_table_name(), "post_tag");
    }

    #[test]
    fn test_create_model_uses_slot_name() {
        let mut session = EditorSession::new();
        let id = session.create_model();
        let node = session.model(id).unwrap();
        assert_eq!(node.name, "Model1");
        assert_eq!(node.position, Position { x: 150, y: 130 });
    }

    #[test]
    fn test_suggest_association_name() {
        assert_eq!(suggest_association_name(&AssociationKind::BelongsTo, "BlogPost"), "blog_post");
        assert_eq!(suggest_association_name(&AssociationKind::HasMany, "Category"), "categories");
        assert_eq!(suggest_association_name(&AssociationKind::HasAndBelongsToMany, "Tag"), "tags");
    }

    #[test]
    fn test_model_id_parse() {
        assert_eq!("model-7".parse::<ModelId>().unwrap(), ModelId(7));
        assert!("conn-7".parse::<ModelId>().is_err());
    }
}
