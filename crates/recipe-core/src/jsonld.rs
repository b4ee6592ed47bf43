//! Structured-data extraction from `<script type="application/ld+json">` blocks.

use crate::dedup::normalize_whitespace;
use crate::ogp::resolve_url;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("Invalid script selector"));

/// Fields taken from a JSON-LD Recipe object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredRecipe {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
}

fn is_ld_json(type_attr: &str) -> bool {
    type_attr
        .split(';')
        .next()
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
}

/// Raw text of every linked-data block, in document order.
pub fn ld_json_blocks(document: &Html) -> Vec<String> {
    document
        .select(&SCRIPT)
        .filter(|el| el.value().attr("type").is_some_and(is_ld_json))
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// Escape raw control characters inside string literals, which some CMSes
/// emit verbatim and strict JSON rejects.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                result.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    result.push(c);
                }
                '"' => {
                    in_string = false;
                    result.push(c);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if c.is_control() => {}
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }

    result
}

fn parse_block(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim())
        .or_else(|_| serde_json::from_str(sanitize_json(text.trim()).as_str()))
        .ok()
}

/// True for `Recipe` written bare or as a full vocabulary identifier
/// (`schema:Recipe`, `https://schema.org/Recipe`).
fn is_recipe_type_name(name: &str) -> bool {
    let name = name.trim();
    let local = name.rsplit(['/', ':', '#']).next().unwrap_or(name);
    local == "Recipe"
}

pub fn is_recipe_type(type_val: &Value) -> bool {
    match type_val {
        Value::String(s) => is_recipe_type_name(s),
        Value::Array(arr) => arr
            .iter()
            .any(|v| v.as_str().is_some_and(is_recipe_type_name)),
        _ => false,
    }
}

/// Depth-first search for the first object typed as a Recipe.
pub fn find_recipe(json: &Value) -> Option<&Value> {
    match json {
        Value::Object(obj) => {
            if obj.get("@type").is_some_and(is_recipe_type) {
                return Some(json);
            }
            if let Some(recipe) = obj.get("@graph").and_then(find_recipe) {
                return Some(recipe);
            }
            obj.iter()
                .filter(|(k, _)| k.as_str() != "@graph")
                .find_map(|(_, v)| find_recipe(v))
        }
        Value::Array(arr) => arr.iter().find_map(find_recipe),
        _ => None,
    }
}

/// First Recipe object across all linked-data blocks of the page.
pub fn find_recipe_in_document(document: &Html) -> Option<Value> {
    ld_json_blocks(document).iter().find_map(|block| {
        let json = parse_block(block)?;
        find_recipe(&json).cloned()
    })
}

fn image_candidate(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| obj.get("@id").and_then(Value::as_str)),
        _ => None,
    }
}

/// Resolve the `image` field: a URL string, an ImageObject (`url` or `@id`),
/// or a list of either. The first usable entry wins.
pub fn resolve_image(image: &Value, base: &Url) -> Option<String> {
    match image {
        Value::Array(arr) => arr
            .iter()
            .filter_map(image_candidate)
            .find_map(|raw| resolve_url(base, raw)),
        other => image_candidate(other).and_then(|raw| resolve_url(base, raw)),
    }
}

/// `recipeIngredient` when it is a list of strings, whitespace-normalized
/// with empty entries dropped. Duplicates are kept.
pub fn ingredient_list(recipe: &Value) -> Vec<String> {
    let Some(Value::Array(items)) = recipe.get("recipeIngredient") else {
        return Vec::new();
    };
    if !items.iter().all(Value::is_string) {
        return Vec::new();
    }
    items
        .iter()
        .filter_map(Value::as_str)
        .map(normalize_whitespace)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Map a Recipe object to title, image and ingredients.
pub fn recipe_fields(recipe: &Value, base: &Url) -> StructuredRecipe {
    let title = recipe
        .get("name")
        .and_then(Value::as_str)
        .map(normalize_whitespace)
        .filter(|s| !s.is_empty());
    let image_url = recipe.get("image").and_then(|img| resolve_image(img, base));

    StructuredRecipe {
        title,
        image_url,
        ingredients: ingredient_list(recipe),
    }
}

/// Structured-data pass over a parsed page. `None` when no Recipe object exists.
pub fn extract_structured(document: &Html, base: &Url) -> Option<StructuredRecipe> {
    let recipe = find_recipe_in_document(document)?;
    Some(recipe_fields(&recipe, base))
}
