//! Schema Validation
//!
//! Static checks that must pass before a document reaches the script builder.
//! Every rule appends independently; nothing short-circuits except a missing
//! model name, which skips the remaining checks for that one model.
//!
//! ## Rules
//! 1. **App name**: required, snake_case, camelized form not reserved
//! 2. **Framework version**: `X.Y`
//! 3. **Models**: present and non-empty; per model: CamelCase name, not
//!    reserved; fields snake_case, not auto-added, known type; associations
//!    with a known kind, a snake_case name and a CamelCase target
//! 4. **Identifiers**: validation fields, callback methods, index columns and
//!    `through` names are snake_case, since all of them end up in the script
//! 5. **Cross-model**: one combined error for duplicated model names
//! 6. **Join tables**: CamelCase model names, snake_case table name
//!
//! Association targets are not checked against the model list. The advisory
//! linter in [`crate::lint`] reports those instead.

use std::collections::HashSet;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;

use crate::names::{camelize, is_auto_field, reserved_words};
use crate::schema::{Association, Callback, Field, FieldType, Index, JoinTable, Model, SchemaDocument, ValidationRule};

/// Validate a document with a freshly built validator
pub fn validate(document: &SchemaDocument) -> Vec<String> {
    SchemaValidator::new().validate(document)
}

/// The schema validator. Holds compiled patterns; safe to reuse across calls.
pub struct SchemaValidator {
    snake_case: Regex,
    camel_case: Regex,
    version: Regex,
    reserved: HashSet<&'static str>,
    matcher: SkimMatcherV2,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            snake_case: Regex::new(r"^[a-z][a-z0-9_]*$").unwrap(),
            camel_case: Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap(),
            version: Regex::new(r"^\d+\.\d+$").unwrap(),
            reserved: reserved_words(),
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Collect every violation in document order. Empty means "proceed".
    pub fn validate(&self, document: &SchemaDocument) -> Vec<String> {
        let mut errors = Vec::new();

        self.validate_app_name(&document.app_name, &mut errors);
        self.validate_framework_version(&document.framework_version, &mut errors);
        self.validate_models(document.models.as_deref(), &mut errors);

        for (index, join_table) in document.join_tables.iter().enumerate() {
            self.validate_join_table(join_table, index, &mut errors);
        }

        errors
    }

    fn validate_app_name(&self, app_name: &str, errors: &mut Vec<String>) {
        if app_name.trim().is_empty() {
            errors.push("App name is required".to_string());
            return;
        }

        if !self.snake_case.is_match(app_name) {
            errors.push(format!(
                "App name must be snake_case and start with a letter (got: {})",
                app_name
            ));
        }

        if self.reserved.contains(camelize(app_name).as_str()) {
            errors.push(format!("App name '{}' conflicts with reserved word", app_name));
        }
    }

    fn validate_framework_version(&self, version: &str, errors: &mut Vec<String>) {
        if !self.version.is_match(version) {
            let shown = if version.is_empty() { "(none)" } else { version };
            errors.push(format!(
                "Invalid Rails version format (expected: X.Y, got: {})",
                shown
            ));
        }
    }

    fn validate_models(&self, models: Option<&[Model]>, errors: &mut Vec<String>) {
        let Some(models) = models else {
            errors.push("Models are required".to_string());
            return;
        };

        if models.is_empty() {
            errors.push("At least one model is required".to_string());
            return;
        }

        for (index, model) in models.iter().enumerate() {
            self.validate_model(model, index, errors);
        }

        let duplicates = duplicate_names(models);
        if !duplicates.is_empty() {
            errors.push(format!("Duplicate model names found: {}", duplicates.join(", ")));
        }
    }

    fn validate_model(&self, model: &Model, index: usize, errors: &mut Vec<String>) {
        let name = model.name.as_str();

        if name.trim().is_empty() {
            errors.push(format!("Model #{}: Name is required", index + 1));
            return;
        }

        if !self.camel_case.is_match(name) {
            errors.push(format!(
                "Model '{}': Must be CamelCase and start with uppercase letter",
                name
            ));
        }

        if self.reserved.contains(name) {
            errors.push(format!("Model name '{}' is a reserved word", name));
        }

        for field in &model.fields {
            self.validate_field(field, name, errors);
        }

        for association in &model.associations {
            self.validate_association(association, name, errors);
        }

        for rule in &model.validations {
            self.validate_rule(rule, name, errors);
        }

        for callback in &model.callbacks {
            self.validate_callback(callback, name, errors);
        }

        for index in &model.indices {
            self.validate_index(index, name, errors);
        }
    }

    fn validate_field(&self, field: &Field, model_name: &str, errors: &mut Vec<String>) {
        let field_name = field.name.as_str();

        if field_name.trim().is_empty() {
            errors.push(format!("Model '{}': Field name is required", model_name));
            return;
        }

        if !self.snake_case.is_match(field_name) {
            errors.push(format!(
                "Model '{}': Field '{}' must be snake_case",
                model_name, field_name
            ));
        }

        if is_auto_field(field_name) {
            errors.push(format!(
                "Model '{}': Field '{}' is automatically added by Rails",
                model_name, field_name
            ));
        }

        if !field.field_type.is_recognized() {
            let offending = field.field_type.as_str();
            let mut message = format!(
                "Model '{}': Invalid field type '{}' for field '{}'",
                model_name, offending, field_name
            );
            if let Some(suggestion) = self.suggest_field_type(offending) {
                message.push_str(&format!(" (did you mean '{}'?)", suggestion));
            }
            errors.push(message);
        }
    }

    fn validate_association(&self, association: &Association, model_name: &str, errors: &mut Vec<String>) {
        if !association.kind.is_recognized() {
            errors.push(format!(
                "Model '{}': Invalid association type '{}'",
                model_name, association.kind
            ));
        }

        let name = association.name.as_str();
        if name.trim().is_empty() {
            errors.push(format!("Model '{}': Association name is required", model_name));
        } else if !self.snake_case.is_match(name) {
            errors.push(format!(
                "Model '{}': Association name '{}' must be snake_case",
                model_name, name
            ));
        }

        let target = association.target.as_str();
        if target.trim().is_empty() {
            errors.push(format!(
                "Model '{}': Association target model is required",
                model_name
            ));
        } else if !self.camel_case.is_match(target) {
            errors.push(format!(
                "Model '{}': Association target '{}' must be CamelCase",
                model_name, target
            ));
        }

        if let Some(through) = association.options.through_name() {
            if !self.snake_case.is_match(through) {
                errors.push(format!(
                    "Model '{}': Association '{}' through '{}' must be snake_case",
                    model_name, name, through
                ));
            }
        }
    }

    fn validate_rule(&self, rule: &ValidationRule, model_name: &str, errors: &mut Vec<String>) {
        if rule.field.trim().is_empty() {
            errors.push(format!("Model '{}': Validation field is required", model_name));
        } else if !self.snake_case.is_match(&rule.field) {
            errors.push(format!(
                "Model '{}': Validation field '{}' must be snake_case",
                model_name, rule.field
            ));
        }
    }

    fn validate_callback(&self, callback: &Callback, model_name: &str, errors: &mut Vec<String>) {
        let method = callback.method_name.as_str();
        if method.trim().is_empty() {
            errors.push(format!("Model '{}': Callback method is required", model_name));
        } else if !self.snake_case.is_match(method) {
            errors.push(format!(
                "Model '{}': Callback method '{}' must be snake_case",
                model_name, method
            ));
        }
    }

    fn validate_index(&self, index: &Index, model_name: &str, errors: &mut Vec<String>) {
        for field in index.fields.iter().filter(|f| !self.snake_case.is_match(f)) {
            errors.push(format!(
                "Model '{}': Index field '{}' must be snake_case",
                model_name, field
            ));
        }
    }

    fn validate_join_table(&self, join_table: &JoinTable, index: usize, errors: &mut Vec<String>) {
        for name in [&join_table.models.0, &join_table.models.1] {
            if !self.camel_case.is_match(name) {
                errors.push(format!(
                    "Join table #{}: Model '{}' must be CamelCase",
                    index + 1,
                    name
                ));
            }
        }

        if let Some(table) = &join_table.table_name {
            if !self.snake_case.is_match(table) {
                errors.push(format!(
                    "Join table #{}: Table name '{}' must be snake_case",
                    index + 1,
                    table
                ));
            }
        }
    }

    /// Closest valid field type for a misspelling, if any is close enough
    fn suggest_field_type(&self, offending: &str) -> Option<&'static str> {
        let pattern = offending.trim().to_lowercase();
        if pattern.len() < 3 {
            return None;
        }

        let mut best: Option<(i64, &'static str)> = None;
        for &candidate in FieldType::VALUES {
            if let Some(score) = self.matcher.fuzzy_match(candidate, &pattern) {
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, candidate));
                }
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}

/// Names appearing more than once, each listed once, in first-seen order
fn duplicate_names(models: &[Model]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();

    for model in models {
        let name = model.name.as_str();
        if name.trim().is_empty() {
            continue;
        }
        if !seen.insert(name) && reported.insert(name) {
            duplicates.push(name);
        }
    }

    // Order by first occurrence rather than by second occurrence
    let position = |name: &str| models.iter().position(|m| m.name == name).unwrap_or(usize::MAX);
    duplicates.sort_by_key(|name| position(name));
    duplicates
}
