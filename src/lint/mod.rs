//! Schema Linting
//!
//! Advisory checks that sit beside the validator. The validator decides
//! whether a document may be generated; the linter only points at things that
//! generate fine but are probably mistakes. Nothing here blocks generation.
//!
//! ## Lints
//! 1. **Graph shape**: dangling targets, self-associations, duplicated
//!    source/target pairs, unknown `through`, missing inverse `belongs_to`
//! 2. **Required cycles**: non-optional `belongs_to` chains that loop, which
//!    make it impossible to insert the first record
//! 3. **Vocabulary**: database, validation kinds and callback hooks outside
//!    the recognized lists (the validator does not check these)
//! 4. **Dead entries**: validations on unknown fields, indices with no fields

use std::collections::{HashMap, HashSet};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::names::is_auto_field;
use crate::schema::{Association, AssociationKind, Model, SchemaDocument};

/// Result of linting a document
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Warning codes in report order
    pub fn codes(&self) -> Vec<&'static str> {
        self.warnings.iter().map(|w| w.code).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

/// Lint a document
pub fn lint(document: &SchemaDocument) -> LintResult {
    SchemaLinter::new(document).run()
}

/// Single-use linter over one document
struct SchemaLinter<'a> {
    document: &'a SchemaDocument,
    /// First model index for each name
    by_name: HashMap<&'a str, usize>,
    result: LintResult,
}

impl<'a> SchemaLinter<'a> {
    fn new(document: &'a SchemaDocument) -> Self {
        let mut by_name = HashMap::new();
        for (index, model) in document.models().iter().enumerate() {
            by_name.entry(model.name.as_str()).or_insert(index);
        }
        Self {
            document,
            by_name,
            result: LintResult::default(),
        }
    }

    fn run(mut self) -> LintResult {
        if !self.document.database.is_recognized() {
            self.warn(
                "UNKNOWN_DATABASE",
                format!("Unknown database adapter '{}'", self.document.database),
                "database".to_string(),
            );
        }

        let document = self.document;
        for (index, model) in document.models().iter().enumerate() {
            self.lint_model(model, index);
        }

        self.lint_belongs_to_cycles();
        self.result
    }

    fn warn(&mut self, code: &'static str, message: String, path: String) {
        self.result.warnings.push(LintWarning { code, message, path });
    }

    fn lint_model(&mut self, model: &'a Model, index: usize) {
        let mut seen_targets = HashSet::new();

        for (j, association) in model.associations.iter().enumerate() {
            let path = format!("models[{}].associations[{}]", index, j);
            self.lint_association(model, association, &path);

            if !association.target.is_empty() && !seen_targets.insert(association.target.as_str()) {
                self.warn(
                    "DUPLICATE_ASSOCIATION",
                    format!(
                        "Model '{}' declares more than one association to '{}'",
                        model.name, association.target
                    ),
                    path,
                );
            }
        }

        for (j, rule) in model.validations.iter().enumerate() {
            let path = format!("models[{}].validations[{}]", index, j);
            if !rule.kind.is_recognized() {
                self.warn(
                    "UNKNOWN_VALIDATION_KIND",
                    format!("Model '{}': unknown validation '{}'", model.name, rule.kind),
                    path.clone(),
                );
            }
            if !knows_attribute(model, &rule.field) {
                self.warn(
                    "UNKNOWN_VALIDATION_FIELD",
                    format!(
                        "Model '{}': validation references unknown field '{}'",
                        model.name, rule.field
                    ),
                    path,
                );
            }
        }

        for (j, callback) in model.callbacks.iter().enumerate() {
            if !callback.lifecycle_hook.is_recognized() {
                self.warn(
                    "UNKNOWN_CALLBACK_HOOK",
                    format!(
                        "Model '{}': unknown callback hook '{}'",
                        model.name, callback.lifecycle_hook
                    ),
                    format!("models[{}].callbacks[{}]", index, j),
                );
            }
        }

        for (j, idx) in model.indices.iter().enumerate() {
            if idx.fields.is_empty() {
                self.warn(
                    "EMPTY_INDEX",
                    format!("Model '{}': index has no fields and will be skipped", model.name),
                    format!("models[{}].indices[{}]", index, j),
                );
            }
        }
    }

    fn lint_association(&mut self, model: &Model, association: &Association, path: &str) {
        let target = association.target.as_str();
        if target.is_empty() {
            return;
        }

        if target == model.name {
            self.warn(
                "SELF_ASSOCIATION",
                format!("Model '{}' has an association to itself ('{}')", model.name, association.name),
                path.to_string(),
            );
        }

        let polymorphic = association.options.polymorphic == Some(true);
        let Some(&target_index) = self.by_name.get(target) else {
            if !polymorphic {
                self.warn(
                    "DANGLING_TARGET",
                    format!(
                        "Model '{}': association '{}' targets unknown model '{}'",
                        model.name, association.name, target
                    ),
                    path.to_string(),
                );
            }
            return;
        };

        if let Some(through) = association.options.through_name() {
            if !model.associations.iter().any(|a| a.name == through) {
                self.warn(
                    "UNKNOWN_THROUGH",
                    format!(
                        "Model '{}': association '{}' goes through unknown association '{}'",
                        model.name, association.name, through
                    ),
                    path.to_string(),
                );
            }
            return;
        }

        let expects_inverse = matches!(association.kind, AssociationKind::HasMany | AssociationKind::HasOne)
            && !association.options.extra.contains_key("as");
        if expects_inverse {
            let document = self.document;
            let target_model = &document.models()[target_index];
            let has_inverse = target_model
                .associations
                .iter()
                .any(|a| a.kind == AssociationKind::BelongsTo && a.target == model.name);
            if !has_inverse {
                self.warn(
                    "MISSING_INVERSE",
                    format!(
                        "Model '{}': '{} :{}' has no matching belongs_to on '{}'",
                        model.name, association.kind, association.name, target
                    ),
                    path.to_string(),
                );
            }
        }
    }

    /// Required `belongs_to` chains that loop back on themselves
    fn lint_belongs_to_cycles(&mut self) {
        let document = self.document;
        let models = document.models();
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.by_name.len(), models.len());
        let mut nodes: HashMap<usize, NodeIndex> = HashMap::with_capacity(self.by_name.len());

        for (index, model) in models.iter().enumerate() {
            if self.by_name.get(model.name.as_str()) == Some(&index) {
                nodes.insert(index, graph.add_node(index));
            }
        }

        for model in models {
            let Some(&from) = self.by_name.get(model.name.as_str()).and_then(|i| nodes.get(i)) else {
                continue;
            };
            for association in &model.associations {
                let required = association.kind == AssociationKind::BelongsTo
                    && association.options.optional != Some(true)
                    && association.target != model.name;
                if !required {
                    continue;
                }
                if let Some(&to) = self.by_name.get(association.target.as_str()).and_then(|i| nodes.get(i)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<usize>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<usize> = scc.into_iter().filter_map(|n| graph.node_weight(n).copied()).collect();
                members.sort_unstable();
                members
            })
            .collect();
        cycles.sort();

        for members in cycles {
            let names: Vec<&str> = members.iter().map(|&i| models[i].name.as_str()).collect();
            self.warn(
                "BELONGS_TO_CYCLE",
                format!(
                    "Required belongs_to cycle between {}; mark one side optional",
                    names.join(", ")
                ),
                format!("models[{}]", members[0]),
            );
        }
    }
}

/// Whether a validation may legitimately name this attribute
fn knows_attribute(model: &Model, name: &str) -> bool {
    model.field(name).is_some()
        || is_auto_field(name)
        || model.associations.iter().any(|a| a.name == name)
        || name
            .strip_suffix("_confirmation")
            .is_some_and(|base| model.field(base).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AssociationOptions, Callback, CallbackHook, Database, Field, FieldType, Index, ValidationKind,
        ValidationRule,
    };

    fn assoc(kind: AssociationKind, name: &str, target: &str) -> Association {
        Association {
            kind,
            name: name.to_string(),
            target: target.to_string(),
            options: AssociationOptions::default(),
        }
    }

    fn doc(models: Vec<Model>) -> SchemaDocument {
        let mut doc = SchemaDocument::new("blog", "7.1");
        for model in models {
            doc.push_model(model);
        }
        doc
    }

    #[test]
    fn test_clean_blog() {
        let mut post = Model::new("Post").with_field(Field::new("title", FieldType::String));
        post.associations.push(assoc(AssociationKind::HasMany, "comments", "Comment"));
        post.validations.push(ValidationRule::new("title", ValidationKind::Presence));
        let mut comment = Model::new("Comment");
        comment.associations.push(assoc(AssociationKind::BelongsTo, "post", "Post"));

        let result = lint(&doc(vec![post, comment]));
        assert!(result.is_clean(), "{:?}", result.warnings);
    }

    #[test]
    fn test_dangling_target() {
        let mut post = Model::new("Post");
        post.associations.push(assoc(AssociationKind::BelongsTo, "author", "Author"));
        let result = lint(&doc(vec![post]));

        assert_eq!(result.codes(), vec!["DANGLING_TARGET"]);
        assert_eq!(result.warnings[0].path, "models[0].associations[0]");
        assert_eq!(
            result.warnings[0].message,
            "Model 'Post': association 'author' targets unknown model 'Author'"
        );
    }

    #[test]
    fn test_missing_inverse_and_duplicate() {
        let mut post = Model::new("Post");
        post.associations.push(assoc(AssociationKind::HasMany, "comments", "Comment"));
        post.associations.push(assoc(AssociationKind::HasOne, "pinned_comment", "Comment"));
        let result = lint(&doc(vec![post, Model::new("Comment")]));

        assert_eq!(
            result.codes(),
            vec!["MISSING_INVERSE", "MISSING_INVERSE", "DUPLICATE_ASSOCIATION"]
        );
    }

    #[test]
    fn test_through_must_name_an_association() {
        let mut post = Model::new("Post");
        let mut tags = assoc(AssociationKind::HasMany, "tags", "Tag");
        tags.options.through = Some(":taggings".to_string());
        post.associations.push(tags);

        let result = lint(&doc(vec![post, Model::new("Tag")]));
        assert_eq!(result.codes(), vec!["UNKNOWN_THROUGH"]);
    }

    #[test]
    fn test_self_association() {
        let mut employee = Model::new("Employee");
        let mut manager = assoc(AssociationKind::BelongsTo, "manager", "Employee");
        manager.options.optional = Some(true);
        employee.associations.push(manager);

        let result = lint(&doc(vec![employee]));
        assert_eq!(result.codes(), vec!["SELF_ASSOCIATION"]);
    }

    #[test]
    fn test_required_belongs_to_cycle() {
        let mut a = Model::new("Account");
        a.associations.push(assoc(AssociationKind::BelongsTo, "owner", "User"));
        let mut u = Model::new("User");
        u.associations.push(assoc(AssociationKind::BelongsTo, "account", "Account"));

        let result = lint(&doc(vec![a.clone(), u.clone()]));
        assert_eq!(result.codes(), vec!["BELONGS_TO_CYCLE"]);
        assert_eq!(
            result.warnings[0].message,
            "Required belongs_to cycle between Account, User; mark one side optional"
        );
        assert_eq!(result.warnings[0].path, "models[0]");

        u.associations[0].options.optional = Some(true);
        assert!(lint(&doc(vec![a, u])).is_clean());
    }

    #[test]
    fn test_vocabulary_and_dead_entries() {
        let mut post = Model::new("Post").with_field(Field::new("password", FieldType::String));
        post.validations.push(ValidationRule::new("password_confirmation", ValidationKind::Confirmation));
        post.validations.push(ValidationRule::new("slug", ValidationKind::from("slugness")));
        post.callbacks.push(Callback::new(CallbackHook::from("before_lunch"), "eat"));
        post.indices.push(Index { fields: Vec::new(), unique: false });

        let mut document = doc(vec![post]);
        document.database = Database::from("oracle");

        assert_eq!(
            lint(&document).codes(),
            vec![
                "UNKNOWN_DATABASE",
                "UNKNOWN_VALIDATION_KIND",
                "UNKNOWN_VALIDATION_FIELD",
                "UNKNOWN_CALLBACK_HOOK",
                "EMPTY_INDEX",
            ]
        );
    }
}
