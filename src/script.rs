//! Scaffolding Script Builder
//!
//! Turns a validated [`SchemaDocument`] into a bash script that creates the
//! Rails application. The builder performs no validation of its own; feeding
//! it an invalid document produces a broken script. Every interpolated word is
//! still shell-quoted when it needs to be, Ruby names that are not plain
//! identifiers render as quoted symbols, and heredoc delimiters never collide
//! with a body line.
//!
//! Output is fully determined by the document and [`GeneratorConfig`], so the
//! same document always yields the same lines in the same order.
//!
//! Sections, in order:
//! 1. Header and `rails new`
//! 2. `generate model` per model
//! 3. Join table migrations
//! 4. Model class files, rendered whole (associations, validations, callbacks)
//! 5. Index migrations
//! 6. Database setup

use serde_json::Value;

use crate::config::GeneratorConfig;
use crate::names::{camelize, model_file_path, table_name, to_snake_case};
use crate::schema::{
    Association, AssociationKind, Callback, Field, FieldType, Index, JoinTable, Model, OptionMap,
    SchemaDocument, ValidationRule,
};

/// Heredoc delimiter for Ruby sources written by the script
const RUBY_DELIMITER: &str = "RUBY";

/// Build the script text with default generator settings
pub fn generate_script(document: &SchemaDocument) -> String {
    ScriptBuilder::new(document, GeneratorConfig::default()).build()
}

/// Deterministic script renderer for one document
pub struct ScriptBuilder<'a> {
    document: &'a SchemaDocument,
    config: GeneratorConfig,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(document: &'a SchemaDocument, config: GeneratorConfig) -> Self {
        Self { document, config }
    }

    /// The whole script as one string
    pub fn build(&self) -> String {
        self.lines().join("\n")
    }

    /// The script as ordered lines
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        let app = &self.document.app_name;

        out.push("#!/bin/bash".to_string());
        out.push("set -e".to_string());
        out.push(String::new());
        out.push("echo 'Starting Rails app generation...'".to_string());
        out.push(String::new());
        out.push(self.rails_new_command());
        out.push(String::new());
        out.push(format!("cd {}", shell_word(app)));
        out.push(String::new());

        for model in self.document.models() {
            out.push(generate_model_command(model));
        }
        if !self.document.models().is_empty() {
            out.push(String::new());
        }

        for join_table in &self.document.join_tables {
            self.emit_join_table(&mut out, join_table);
            out.push(String::new());
        }

        for model in self.document.models() {
            if model.has_behavior() || has_reference_fields(model) {
                self.emit_model_file(&mut out, model);
                out.push(String::new());
            }
        }

        for model in self.document.models() {
            for index in model.indices.iter().filter(|i| !i.fields.is_empty()) {
                self.emit_index(&mut out, model, index);
                out.push(String::new());
            }
        }

        if self.config.setup_database {
            out.push("echo 'Setting up database...'".to_string());
            out.push("bin/rails db:create".to_string());
            out.push("bin/rails db:migrate".to_string());
            out.push(String::new());
        }

        out.push("echo 'Rails app generated successfully!'".to_string());
        out.push(echo(&format!("App location: {}", app)));
        out.push(echo(&format!("To start the server: cd {} && bin/rails server", app)));

        out
    }

    fn rails_new_command(&self) -> String {
        let mut cmd = format!(
            "{} new {} {}",
            self.config.rails_command,
            shell_word(&self.document.app_name),
            shell_word(&format!("--database={}", self.document.database))
        );
        if self.document.api_only {
            cmd.push_str(" --api");
        }
        if self.config.skip_test {
            cmd.push_str(" --skip-test");
        }
        cmd
    }

    fn migration_version(&self) -> &str {
        &self.document.framework_version
    }

    // =========================================================================
    // Join Tables
    // =========================================================================

    fn emit_join_table(&self, out: &mut Vec<String>, join_table: &JoinTable) {
        let (left, right) = (&join_table.models.0, &join_table.models.1);
        let class_name = format!("CreateJoinTable{}{}", left, right);

        out.push(format!(
            "bin/rails generate migration {} {} {}",
            shell_word(&class_name),
            shell_word(&to_snake_case(left)),
            shell_word(&to_snake_case(right))
        ));

        if let Some(custom) = &join_table.table_name {
            let body = vec![
                format!("class {} < ActiveRecord::Migration[{}]", class_name, self.migration_version()),
                "  def change".to_string(),
                format!(
                    "    create_join_table {}, {}, table_name: {}",
                    ruby_symbol(&table_name(left)),
                    ruby_symbol(&table_name(right)),
                    ruby_string(custom)
                ),
                "  end".to_string(),
                "end".to_string(),
            ];
            emit_migration_overwrite(out, &class_name, body);
        }
    }

    // =========================================================================
    // Model Files
    // =========================================================================

    fn emit_model_file(&self, out: &mut Vec<String>, model: &Model) {
        out.push(echo(&format!("Writing {} model", model.name)));
        emit_heredoc(out, &shell_word(&model_file_path(&model.name)), self.model_source(model));
    }

    /// The complete class body for a model file
    fn model_source(&self, model: &Model) -> Vec<String> {
        let mut src = vec![format!("class {} < ApplicationRecord", model.name)];

        // `generate model ... x:references` writes a belongs_to we are about to overwrite
        for field in model.fields.iter().filter(|f| f.field_type == FieldType::References) {
            let declared = model
                .associations
                .iter()
                .any(|a| a.kind == AssociationKind::BelongsTo && a.name == field.name);
            if !declared {
                src.push(format!("  belongs_to {}", ruby_symbol(&field.name)));
            }
        }

        for association in &model.associations {
            src.push(format!("  {}", self.association_line(model, association)));
        }

        for rule in &model.validations {
            src.push(format!("  {}", validation_line(rule)));
        }

        for callback in &model.callbacks {
            src.push(format!("  {} {}", callback.lifecycle_hook, ruby_symbol(&callback.method_name)));
        }

        if !model.callbacks.is_empty() {
            src.push(String::new());
            src.push("  private".to_string());
            for callback in &model.callbacks {
                src.push(String::new());
                src.extend(callback_method(callback));
            }
        }

        src.push("end".to_string());
        src
    }

    fn association_line(&self, model: &Model, association: &Association) -> String {
        let mut parts = vec![format!("{} {}", association.kind, ruby_symbol(&association.name))];
        let options = &association.options;

        if let Some(optional) = options.optional {
            parts.push(format!("optional: {}", optional));
        }
        if let Some(dependent) = &options.dependent {
            parts.push(format!("dependent: {}", ruby_symbol(dependent.as_str().trim_start_matches(':'))));
        }
        if let Some(polymorphic) = options.polymorphic {
            parts.push(format!("polymorphic: {}", polymorphic));
        }
        if let Some(through) = options.through_name() {
            parts.push(format!("through: {}", ruby_symbol(through)));
        }
        for (key, value) in &options.extra {
            parts.push(format!("{}: {}", ruby_key(key), ruby_literal(value)));
        }

        if association.kind == AssociationKind::HasAndBelongsToMany && !options.extra.contains_key("join_table") {
            if let Some(custom) = self.custom_join_table(&model.name, &association.target) {
                parts.push(format!("join_table: {}", ruby_string(custom)));
            }
        }

        parts.join(", ")
    }

    fn custom_join_table(&self, a: &str, b: &str) -> Option<&str> {
        self.document
            .join_tables
            .iter()
            .find(|t| (t.models.0 == a && t.models.1 == b) || (t.models.0 == b && t.models.1 == a))
            .and_then(|t| t.table_name.as_deref())
    }

    // =========================================================================
    // Indices
    // =========================================================================

    fn emit_index(&self, out: &mut Vec<String>, model: &Model, index: &Index) {
        let table = table_name(&model.name);
        let class_name = index_migration_name(&table, index);

        out.push(format!("bin/rails generate migration {}", shell_word(&class_name)));

        let columns = if index.fields.len() == 1 {
            ruby_symbol(&index.fields[0])
        } else {
            let list: Vec<String> = index.fields.iter().map(|f| ruby_symbol(f)).collect();
            format!("[{}]", list.join(", "))
        };
        let unique = if index.unique { ", unique: true" } else { "" };

        let body = vec![
            format!("class {} < ActiveRecord::Migration[{}]", class_name, self.migration_version()),
            "  def change".to_string(),
            format!("    add_index {}, {}{}", ruby_symbol(&table), columns, unique),
            "  end".to_string(),
            "end".to_string(),
        ];
        emit_migration_overwrite(out, &class_name, body);
    }
}

// =============================================================================
// Line Rendering
// =============================================================================

/// `bin/rails generate model Post title:string 'price:decimal{10,2}'`
fn generate_model_command(model: &Model) -> String {
    let mut cmd = format!("bin/rails generate model {}", shell_word(&model.name));
    for field in &model.fields {
        cmd.push(' ');
        cmd.push_str(&field_argument(field));
    }
    cmd
}

/// Generator argument for one column, quoted when braces or anything else
/// would be interpreted by the shell.
fn field_argument(field: &Field) -> String {
    let options = &field.options;
    let mut arg = format!("{}:{}", field.name, field.field_type);

    let limit = options.get("limit").and_then(Value::as_u64);
    let precision = options.get("precision").and_then(Value::as_u64);
    let scale = options.get("scale").and_then(Value::as_u64);

    match (precision, scale, limit) {
        (Some(p), Some(s), _) => arg.push_str(&format!("{{{},{}}}", p, s)),
        (Some(p), None, _) => arg.push_str(&format!("{{{}}}", p)),
        (None, _, Some(l)) => arg.push_str(&format!("{{{}}}", l)),
        _ => {}
    }
    if field.field_type == FieldType::References && flag(options, "polymorphic") {
        arg.push_str("{polymorphic}");
    }

    if flag(options, "unique") {
        arg.push_str(":uniq");
    } else if flag(options, "index") {
        arg.push_str(":index");
    }

    shell_word(&arg)
}

fn flag(options: &OptionMap, key: &str) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn has_reference_fields(model: &Model) -> bool {
    model.fields.iter().any(|f| f.field_type == FieldType::References)
}

/// `validates :title, presence: true` or `validates :title, length: { minimum: 3 }`
fn validation_line(rule: &ValidationRule) -> String {
    if rule.options.is_empty() {
        format!("validates {}, {}: true", ruby_symbol(&rule.field), ruby_key(rule.kind.as_str()))
    } else {
        format!(
            "validates {}, {}: {}",
            ruby_symbol(&rule.field),
            ruby_key(rule.kind.as_str()),
            ruby_hash(&rule.options)
        )
    }
}

fn callback_method(callback: &Callback) -> Vec<String> {
    let mut lines = vec![format!("  def {}", callback.method_name)];
    match callback.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => lines.extend(body.lines().map(|l| format!("    {}", l))),
        None => lines.push(format!("    # TODO: implement {}", callback.method_name)),
    }
    lines.push("  end".to_string());
    lines
}

/// Overwrite the body of a just-generated migration, located by its file suffix
fn emit_migration_overwrite(out: &mut Vec<String>, class_name: &str, body: Vec<String>) {
    let target = format!(
        "\"$(ls db/migrate/*_{} | head -n 1)\"",
        shell_word(&format!("{}.rb", to_snake_case(class_name)))
    );
    emit_heredoc(out, &target, body);
}

/// `cat > {target} << 'RUBY'`, the body, then the delimiter
fn emit_heredoc(out: &mut Vec<String>, target: &str, body: Vec<String>) {
    let delimiter = heredoc_delimiter(&body);
    out.push(format!("cat > {} << '{}'", target, delimiter));
    out.extend(body);
    out.push(delimiter);
}

/// `RUBY`, or `RUBY_n` when some body line would end the heredoc early
fn heredoc_delimiter(body: &[String]) -> String {
    let collides = |candidate: &str| body.iter().flat_map(|l| l.split('\n')).any(|l| l == candidate);

    let mut delimiter = RUBY_DELIMITER.to_string();
    let mut suffix = 0;
    while collides(&delimiter) {
        suffix += 1;
        delimiter = format!("{}_{}", RUBY_DELIMITER, suffix);
    }
    delimiter
}

fn echo(message: &str) -> String {
    format!("echo {}", shell_word(message))
}

/// A single bash word: left bare when every character is inert, otherwise
/// single-quoted
fn shell_word(word: &str) -> String {
    let inert = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=,+@%".contains(c));
    if inert {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// `AddUniqueIndexToPostsOnTitleAndSlug`
fn index_migration_name(table: &str, index: &Index) -> String {
    let columns: Vec<String> = index.fields.iter().map(|f| camelize(f)).collect();
    format!(
        "Add{}IndexTo{}On{}",
        if index.unique { "Unique" } else { "" },
        camelize(table),
        columns.join("And")
    )
}

fn is_ruby_identifier(name: &str) -> bool {
    let stem = name.strip_suffix(['?', '!']).unwrap_or(name);
    let mut chars = stem.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `:name`, or `:'odd name'` when the name is not a plain identifier
fn ruby_symbol(name: &str) -> String {
    if is_ruby_identifier(name) {
        format!(":{}", name)
    } else {
        format!(":{}", ruby_string(name))
    }
}

/// Hash key in `key: value` position
fn ruby_key(key: &str) -> String {
    if is_ruby_identifier(key) && !key.ends_with(['?', '!']) {
        key.to_string()
    } else {
        ruby_string(key)
    }
}

/// Single-quoted when possible; double-quoted with escapes once control
/// characters are involved, so a literal never spans lines
fn ruby_string(s: &str) -> String {
    if !s.chars().any(char::is_control) {
        return format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"));
    }

    let mut quoted = String::from("\"");
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '#' => quoted.push_str("\\#"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Render a JSON value as a Ruby literal. Strings of the form `:identifier`
/// are symbols.
fn ruby_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.strip_prefix(':').is_some_and(is_ruby_identifier) => s.clone(),
        Value::String(s) => ruby_string(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(ruby_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => ruby_hash(map),
    }
}

fn ruby_hash(map: &OptionMap) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }
    let pairs: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", ruby_key(k), ruby_literal(v)))
        .collect();
    format!("{{ {} }}", pairs.join(", "))
}
