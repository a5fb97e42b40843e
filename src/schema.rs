//! Schema Document types
//!
//! The canonical description of an application: its name, target metadata and
//! the models with their fields, validations, callbacks, indices and
//! associations. Pure data; the only behavior here is (de)serialization.
//!
//! The shape is lenient. Anything the validator reports as
//! "required" deserializes to an empty value instead of failing, whether it is
//! missing or `null`; a number or boolean where a name belongs becomes its JSON
//! text. Missing or `null` arrays become empty, and every enumerated vocabulary
//! keeps values it does not recognize so the validator can name them back to
//! the user.
//!
//! ## Wire format
//! ```json
//! {
//!   "app_name": "blog",
//!   "rails_version": "7.1",
//!   "database": "postgresql",
//!   "api_only": false,
//!   "models": [
//!     {
//!       "name": "Post",
//!       "fields": [{ "name": "title", "type": "string", "options": {} }],
//!       "validations": [{ "field": "title", "type": "presence", "options": {} }],
//!       "callbacks": [{ "type": "before_save", "method": "normalize_title" }],
//!       "indices": [{ "fields": ["title"], "unique": true }],
//!       "associations": [{ "type": "has_many", "name": "comments", "target": "Comment", "options": {} }]
//!     }
//!   ],
//!   "join_tables": [{ "models": ["Post", "Tag"] }]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Open key/value bag attached to fields and validations.
///
/// Key order is preserved so scripts render options in authoring order.
pub type OptionMap = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Vocabularies
// =============================================================================

/// Declares a closed vocabulary that still round-trips unknown values.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Value outside the recognized vocabulary, kept verbatim
            Unrecognized(String),
        }

        impl $name {
            /// Every recognized wire value, in declaration order
            pub const VALUES: &'static [&'static str] = &[$($wire),+];

            /// Wire representation
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Unrecognized(other) => other,
                }
            }

            pub fn is_recognized(&self) -> bool {
                !matches!(self, Self::Unrecognized(_))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $( $wire => Self::$variant, )+
                    _ => Self::Unrecognized(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                lenient_string(deserializer).map(Self::from)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Unrecognized(other) => other,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Column type accepted by `rails generate model`
    pub enum FieldType {
        String => "string",
        Text => "text",
        Integer => "integer",
        Bigint => "bigint",
        Decimal => "decimal",
        Float => "float",
        Boolean => "boolean",
        Date => "date",
        Datetime => "datetime",
        Time => "time",
        Binary => "binary",
        Json => "json",
        Jsonb => "jsonb",
        Uuid => "uuid",
        /// Foreign key column plus index
        References => "references",
    }
}

vocabulary! {
    /// Kind of a directed association
    pub enum AssociationKind {
        BelongsTo => "belongs_to",
        HasMany => "has_many",
        HasOne => "has_one",
        HasAndBelongsToMany => "has_and_belongs_to_many",
    }
}

vocabulary! {
    /// Built-in validator a rule applies
    pub enum ValidationKind {
        Presence => "presence",
        Uniqueness => "uniqueness",
        Numericality => "numericality",
        Length => "length",
        Format => "format",
        Inclusion => "inclusion",
        Exclusion => "exclusion",
        Acceptance => "acceptance",
        Confirmation => "confirmation",
        Comparison => "comparison",
    }
}

vocabulary! {
    /// Model lifecycle hook
    pub enum CallbackHook {
        BeforeValidation => "before_validation",
        AfterValidation => "after_validation",
        BeforeSave => "before_save",
        AroundSave => "around_save",
        AfterSave => "after_save",
        BeforeCreate => "before_create",
        AroundCreate => "around_create",
        AfterCreate => "after_create",
        BeforeUpdate => "before_update",
        AroundUpdate => "around_update",
        AfterUpdate => "after_update",
        BeforeDestroy => "before_destroy",
        AroundDestroy => "around_destroy",
        AfterDestroy => "after_destroy",
        AfterCommit => "after_commit",
        AfterRollback => "after_rollback",
    }
}

vocabulary! {
    /// Database adapter passed to `rails new --database`
    pub enum Database {
        Postgresql => "postgresql",
        Mysql => "mysql",
        Sqlite3 => "sqlite3",
        Trilogy => "trilogy",
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::Postgresql
    }
}

impl AssociationKind {
    /// Whether the association name is conventionally plural
    pub fn is_collection(&self) -> bool {
        matches!(self, AssociationKind::HasMany | AssociationKind::HasAndBelongsToMany)
    }
}

/// What happens to associated records when the owner is destroyed.
///
/// Accepts both `"destroy"` and the symbol form `":destroy"` the canvas emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum DependentAction {
    Destroy,
    DeleteAll,
    Nullify,
    RestrictWithException,
    RestrictWithError,
    Unrecognized(String),
}

impl DependentAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Destroy => "destroy",
            Self::DeleteAll => "delete_all",
            Self::Nullify => "nullify",
            Self::RestrictWithException => "restrict_with_exception",
            Self::RestrictWithError => "restrict_with_error",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<String> for DependentAction {
    fn from(value: String) -> Self {
        match value.trim_start_matches(':') {
            "destroy" => Self::Destroy,
            "delete_all" => Self::DeleteAll,
            "nullify" => Self::Nullify,
            "restrict_with_exception" => Self::RestrictWithException,
            "restrict_with_error" => Self::RestrictWithError,
            _ => Self::Unrecognized(value),
        }
    }
}

impl<'de> Deserialize<'de> for DependentAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(Self::from)
    }
}

impl From<DependentAction> for String {
    fn from(value: DependentAction) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DependentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Default value helpers
fn unspecified<T: From<String>>() -> T {
    T::from(String::new())
}

/// A name or other validated scalar: `null` becomes empty and any other
/// non-string value becomes its JSON text
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// A list of names, with the same leniency per element
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Name(#[serde(deserialize_with = "lenient_string")] String);

    let names: Vec<Name> = nullable_vec(deserializer)?;
    Ok(names.into_iter().map(|Name(name)| name).collect())
}

fn nullable_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_map<'de, D>(deserializer: D) -> Result<OptionMap, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OptionMap>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Model Parts
// =============================================================================

/// A column on a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "type", default = "unspecified")]
    pub field_type: FieldType,
    #[serde(default, deserialize_with = "nullable_map")]
    pub options: OptionMap,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            options: OptionMap::new(),
        }
    }

    /// Attach a generator option such as `limit` or `precision`
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A `validates` declaration. Nested option maps are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default, deserialize_with = "lenient_string")]
    pub field: String,
    #[serde(rename = "type", default = "unspecified")]
    pub kind: ValidationKind,
    #[serde(default, deserialize_with = "nullable_map")]
    pub options: OptionMap,
}

impl ValidationRule {
    pub fn new(field: impl Into<String>, kind: ValidationKind) -> Self {
        Self {
            field: field.into(),
            kind,
            options: OptionMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A lifecycle hook bound to a model method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    #[serde(rename = "type", default = "unspecified")]
    pub lifecycle_hook: CallbackHook,
    #[serde(rename = "method", default, deserialize_with = "lenient_string")]
    pub method_name: String,
    /// Ruby source placed in the generated method
    #[serde(rename = "code", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Callback {
    pub fn new(lifecycle_hook: CallbackHook, method_name: impl Into<String>) -> Self {
        Self {
            lifecycle_hook,
            method_name: method_name.into(),
            body: None,
        }
    }
}

/// A database index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default, deserialize_with = "lenient_strings")]
    pub fields: Vec<String>,
    #[serde(default, deserialize_with = "nullable_default")]
    pub unique: bool,
}

/// Options recognized on an association, with a pass-through bag for the rest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent: Option<DependentAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polymorphic: Option<bool>,
    /// Name of the intermediate association, e.g. `:taggings`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
    #[serde(flatten)]
    pub extra: OptionMap,
}

impl AssociationOptions {
    pub fn is_empty(&self) -> bool {
        self.optional.is_none()
            && self.dependent.is_none()
            && self.polymorphic.is_none()
            && self.through.is_none()
            && self.extra.is_empty()
    }

    /// `through` without the leading symbol colon
    pub fn through_name(&self) -> Option<&str> {
        self.through.as_deref().map(|t| t.trim_start_matches(':'))
    }
}

/// An association as declared on its source model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    #[serde(rename = "type", default = "unspecified")]
    pub kind: AssociationKind,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Name of the referenced model
    #[serde(default, deserialize_with = "lenient_string")]
    pub target: String,
    #[serde(default, deserialize_with = "nullable_options")]
    pub options: AssociationOptions,
}

fn nullable_options<'de, D>(deserializer: D) -> Result<AssociationOptions, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<AssociationOptions>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Model
// =============================================================================

/// One data entity definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub fields: Vec<Field>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub validations: Vec<ValidationRule>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub callbacks: Vec<Callback>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub indices: Vec<Index>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub associations: Vec<Association>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the model carries anything beyond plain columns
    pub fn has_behavior(&self) -> bool {
        !self.associations.is_empty() || !self.validations.is_empty() || !self.callbacks.is_empty()
    }
}

/// A many-to-many join table derived from `has_and_belongs_to_many`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    pub models: (String, String),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

impl JoinTable {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            models: (left.into(), right.into()),
            table_name: None,
        }
    }

    /// Explicit table name, or both model names lowercased in declared order
    pub fn resolved_table_name(&self) -> String {
        match &self.table_name {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.models.0.to_lowercase(), self.models.1.to_lowercase()),
        }
    }

    /// Order-independent identity of the pair
    pub fn pair_key(&self) -> (String, String) {
        let (a, b) = (&self.models.0, &self.models.1);
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }
}

// =============================================================================
// Schema Document
// =============================================================================

/// The document handed from the editor to the validator and script builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    pub app_name: String,
    #[serde(
        rename = "rails_version",
        alias = "framework_version",
        default,
        deserialize_with = "lenient_string"
    )]
    pub framework_version: String,
    #[serde(default, deserialize_with = "nullable_default")]
    pub database: Database,
    #[serde(default, deserialize_with = "nullable_default")]
    pub api_only: bool,
    /// `None` when the key is absent, which the validator reports
    #[serde(default)]
    pub models: Option<Vec<Model>>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub join_tables: Vec<JoinTable>,
}

impl SchemaDocument {
    pub fn new(app_name: impl Into<String>, framework_version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            framework_version: framework_version.into(),
            models: Some(Vec::new()),
            ..Default::default()
        }
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Models in document order; empty when absent
    pub fn models(&self) -> &[Model] {
        self.models.as_deref().unwrap_or(&[])
    }

    pub fn push_model(&mut self, model: Model) {
        self.models.get_or_insert_with(Vec::new).push(model);
    }

    pub fn find_model(&self, name: &str) -> Option<&Model> {
        self.models().iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_vocabulary_round_trips() {
        let field: Field = serde_json::from_value(json!({"name": "title", "type": "strng"})).unwrap();
        assert_eq!(field.field_type, FieldType::Unrecognized("strng".to_string()));
        assert!(!field.field_type.is_recognized());

        let back = serde_json::to_value(&field).unwrap();
        assert_eq!(back["type"], "strng");
    }

    #[test]
    fn test_missing_scalars_default_to_empty() {
        let doc: SchemaDocument = serde_json::from_value(json!({
            "models": [{ "fields": null, "associations": [{}] }]
        }))
        .unwrap();

        assert_eq!(doc.app_name, "");
        assert_eq!(doc.framework_version, "");
        assert_eq!(doc.database, Database::Postgresql);
        let model = &doc.models()[0];
        assert!(model.fields.is_empty());
        assert_eq!(model.associations[0].kind, AssociationKind::Unrecognized(String::new()));
        assert_eq!(model.associations[0].target, "");
    }

    #[test]
    fn test_null_scalars_default_to_empty() {
        let doc: SchemaDocument = serde_json::from_value(json!({
            "app_name": null,
            "rails_version": null,
            "database": null,
            "api_only": null,
            "models": [{
                "name": null,
                "fields": [{ "name": null, "type": null }],
                "validations": [{ "field": null, "type": null }],
                "callbacks": [{ "type": null, "method": null }],
                "indices": [{ "fields": [null], "unique": null }],
                "associations": [{ "type": null, "name": null, "target": null, "options": { "dependent": null } }]
            }]
        }))
        .unwrap();

        assert_eq!(doc.app_name, "");
        assert_eq!(doc.framework_version, "");
        assert_eq!(doc.database, Database::Postgresql);
        assert!(!doc.api_only);

        let model = &doc.models()[0];
        assert_eq!(model.name, "");
        assert_eq!(model.fields[0].name, "");
        assert_eq!(model.fields[0].field_type, FieldType::Unrecognized(String::new()));
        assert_eq!(model.validations[0].field, "");
        assert_eq!(model.callbacks[0].method_name, "");
        assert_eq!(model.indices[0].fields, vec![String::new()]);
        assert!(!model.indices[0].unique);
        assert_eq!(model.associations[0].target, "");
        assert_eq!(model.associations[0].options.dependent, None);
    }

    #[test]
    fn test_non_string_scalars_become_text() {
        let doc: SchemaDocument = serde_json::from_value(json!({
            "app_name": 42,
            "rails_version": 7.1,
            "models": [{
                "name": true,
                "fields": [{ "name": "title", "type": 3 }],
                "associations": [{ "type": "has_many", "name": "tags", "target": ["Tag"] }]
            }]
        }))
        .unwrap();

        assert_eq!(doc.app_name, "42");
        assert_eq!(doc.framework_version, "7.1");
        let model = &doc.models()[0];
        assert_eq!(model.name, "true");
        assert_eq!(model.fields[0].field_type, FieldType::Unrecognized("3".to_string()));
        assert_eq!(model.associations[0].target, r#"["Tag"]"#);
    }

    #[test]
    fn test_absent_models_is_none() {
        let doc: SchemaDocument = serde_json::from_value(json!({"app_name": "blog"})).unwrap();
        assert!(doc.models.is_none());
        assert!(doc.models().is_empty());
    }

    #[test]
    fn test_framework_version_aliases() {
        let a: SchemaDocument = serde_json::from_value(json!({"rails_version": "7.1"})).unwrap();
        let b: SchemaDocument = serde_json::from_value(json!({"framework_version": "7.1"})).unwrap();
        assert_eq!(a.framework_version, "7.1");
        assert_eq!(b.framework_version, "7.1");
        assert_eq!(serde_json::to_value(&a).unwrap()["rails_version"], "7.1");
    }

    #[test]
    fn test_association_options_keep_unknown_keys() {
        let assoc: Association = serde_json::from_value(json!({
            "type": "has_many",
            "name": "comments",
            "target": "Comment",
            "options": { "dependent": ":destroy", "inverse_of": ":post", "counter_cache": true }
        }))
        .unwrap();

        assert_eq!(assoc.options.dependent, Some(DependentAction::Destroy));
        assert_eq!(assoc.options.extra.len(), 2);
        let keys: Vec<_> = assoc.options.extra.keys().cloned().collect();
        assert_eq!(keys, vec!["inverse_of", "counter_cache"]);

        let back = serde_json::to_value(&assoc).unwrap();
        assert_eq!(back["options"]["dependent"], "destroy");
        assert_eq!(back["options"]["inverse_of"], ":post");
    }

    #[test]
    fn test_nested_validation_options_preserved() {
        let rule: ValidationRule = serde_json::from_value(json!({
            "field": "title",
            "type": "length",
            "options": { "length": { "minimum": 3, "maximum": 120 } }
        }))
        .unwrap();
        assert_eq!(rule.options["length"]["maximum"], 120);
    }

    #[test]
    fn test_join_table_default_name_is_order_dependent() {
        let forward = JoinTable::new("Post", "Tag");
        let backward = JoinTable::new("Tag", "Post");
        assert_eq!(forward.resolved_table_name(), "post_tag");
        assert_eq!(backward.resolved_table_name(), "tag_post");
        assert_eq!(forward.pair_key(), backward.pair_key());

        let named = JoinTable {
            table_name: Some("posts_tags".to_string()),
            ..forward
        };
        assert_eq!(named.resolved_table_name(), "posts_tags");
    }

    #[test]
    fn test_callback_wire_names() {
        let cb: Callback = serde_json::from_value(json!({
            "type": "before_save", "method": "normalize", "code": "self.title = title.strip"
        }))
        .unwrap();
        assert_eq!(cb.lifecycle_hook, CallbackHook::BeforeSave);
        assert_eq!(cb.method_name, "normalize");
        assert_eq!(cb.body.as_deref(), Some("self.title = title.strip"));
    }
}
