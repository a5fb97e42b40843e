//! Validator behavior over whole documents

use pretty_assertions::assert_eq;
use railyard::{lint, validate, SchemaDocument, SchemaValidator};

fn fixture(json: &str) -> SchemaDocument {
    SchemaDocument::from_json(json).unwrap()
}

#[test]
fn test_blog_fixture_is_valid() {
    let doc = fixture(include_str!("fixtures/blog_schema.json"));
    assert_eq!(validate(&doc), Vec::<String>::new());
}

#[test]
fn test_duplicate_post_reports_exactly_one_error() {
    let doc = fixture(include_str!("fixtures/duplicate_post.json"));
    assert_eq!(validate(&doc), vec!["Duplicate model names found: Post"]);
}

#[test]
fn test_every_violation_is_collected_in_order() {
    let doc = fixture(include_str!("fixtures/invalid_schema.json"));

    assert_eq!(
        validate(&doc),
        vec![
            "App name must be snake_case and start with a letter (got: 1blog)",
            "Invalid Rails version format (expected: X.Y, got: seven)",
            "Model 'user_account': Must be CamelCase and start with uppercase letter",
            "Model 'user_account': Field 'id' is automatically added by Rails",
            "Model 'user_account': Invalid field type 'strin' for field 'email' (did you mean 'string'?)",
            "Model #2: Name is required",
            "Model name 'Object' is a reserved word",
            "Model 'Object': Invalid association type 'has_few'",
            "Model 'Object': Association name is required",
            "Model 'Object': Association target model is required",
            "Model name 'Object' is a reserved word",
            "Duplicate model names found: Object",
        ]
    );
}

#[test]
fn test_validation_is_idempotent_and_pure() {
    let doc = fixture(include_str!("fixtures/invalid_schema.json"));
    let before = doc.clone();
    let validator = SchemaValidator::new();

    let first = validator.validate(&doc);
    let second = validator.validate(&doc);

    assert_eq!(first, second);
    assert_eq!(doc, before);
}

#[test]
fn test_missing_models_key() {
    let doc = fixture(r#"{"app_name": "blog", "rails_version": "7.1"}"#);
    assert_eq!(validate(&doc), vec!["Models are required"]);
}

#[test]
fn test_dangling_target_is_a_warning_not_an_error() {
    let doc = fixture(
        r#"{
            "app_name": "blog",
            "rails_version": "7.1",
            "models": [{
                "name": "Post",
                "associations": [{ "type": "belongs_to", "name": "author", "target": "Author" }]
            }]
        }"#,
    );

    assert!(validate(&doc).is_empty());
    assert_eq!(lint::lint(&doc).codes(), vec!["DANGLING_TARGET"]);
}

#[test]
fn test_blog_fixture_lints_clean() {
    let doc = fixture(include_str!("fixtures/blog_schema.json"));
    let result = lint::lint(&doc);
    assert!(result.is_clean(), "{:?}", result.warnings);
}

#[test]
fn test_snake_case_app_name_is_accepted() {
    let mut doc = fixture(include_str!("fixtures/blog_schema.json"));
    doc.app_name = "blog_app".to_string();
    assert!(validate(&doc).iter().all(|e| !e.starts_with("App name")));

    doc.app_name = "My App".to_string();
    assert!(validate(&doc)
        .iter()
        .any(|e| e == "App name must be snake_case and start with a letter (got: My App)"));
}
