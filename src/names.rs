//! Naming rules
//!
//! Case conversion between Ruby class names, file names and table names, and
//! the word lists the validator checks against. Conversions follow Rails'
//! own inflections closely enough for generated file paths to line up.

use std::collections::HashSet;

/// Names that collide with framework or core-language constants
pub const RESERVED_WORDS: &[&str] = &[
    "Application", "Record", "Base", "Class", "Module", "Object", "Kernel",
    "String", "Integer", "Float", "Array", "Hash",
    "ActiveRecord", "ActiveModel", "ActionController", "ActionView",
    "ApplicationRecord", "ApplicationController",
];

/// Columns Rails adds on its own (`type` is the STI discriminator)
pub const AUTO_FIELDS: &[&str] = &["id", "created_at", "updated_at", "type"];

/// Lookup set over [`RESERVED_WORDS`]
pub fn reserved_words() -> HashSet<&'static str> {
    RESERVED_WORDS.iter().copied().collect()
}

pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

pub fn is_auto_field(name: &str) -> bool {
    AUTO_FIELDS.contains(&name)
}

/// `blog_app` -> `BlogApp`.
///
/// Each underscore-separated part is capitalized and the rest of the part
/// lowercased, so `my_OBJECT` becomes `MyObject`.
pub fn camelize(s: &str) -> String {
    s.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = first.to_uppercase().collect::<String>();
                    out.push_str(&chars.as_str().to_lowercase());
                    out
                }
                None => String::new(),
            }
        })
        .collect()
}

/// `BlogPost` -> `blog_post`, `HTTPRequest` -> `http_request`
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !result.ends_with('_') {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            result.push('_');
        } else {
            result.push(c);
        }
    }

    result
}

/// Naive English plural used for table names
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.ends_with('y')
        && !matches!(lower.chars().rev().nth(1), Some('a' | 'e' | 'i' | 'o' | 'u'))
        && word.len() > 1
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// `BlogPost` -> `blog_posts`
pub fn table_name(model_name: &str) -> String {
    pluralize(&to_snake_case(model_name))
}

/// `BlogPost` -> `app/models/blog_post.rb`
pub fn model_file_path(model_name: &str) -> String {
    format!("app/models/{}.rb", to_snake_case(model_name))
}
