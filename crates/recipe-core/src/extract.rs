use crate::models::RecipeMeta;
use crate::{jsonld, ogp, scrape};
use scraper::Html;
use tracing::{debug, info};
use url::Url;

/// Run the full extraction over a fetched page.
///
/// Structured data is tried first. The fallback scraper only runs when it
/// produced no ingredients, and meta tags only fill in a missing title or
/// image. `requested_url` is what the client sent and becomes the title
/// when nothing better is found; `page_url` (after redirects) is the base
/// for relative image URLs.
pub fn extract_recipe(html: &str, page_url: &Url, requested_url: &str) -> RecipeMeta {
    let document = Html::parse_document(html);

    let structured = jsonld::extract_structured(&document, page_url).unwrap_or_default();
    let mut title = structured.title;
    let mut image_url = structured.image_url;
    let mut ingredients = structured.ingredients;

    if ingredients.is_empty() {
        match scrape::scrape_ingredients(&document, page_url) {
            Some(hit) => {
                info!(
                    url = %page_url,
                    strategy = hit.strategy,
                    count = hit.ingredients.len(),
                    "Ingredients found by fallback scraper"
                );
                ingredients = hit.ingredients;
            }
            None => debug!(url = %page_url, "No ingredients found"),
        }
    } else {
        info!(url = %page_url, count = ingredients.len(), "Ingredients found in structured data");
    }

    if title.is_none() || image_url.is_none() {
        let meta = ogp::extract_meta(html, page_url);
        title = title.or(meta.title);
        image_url = image_url.or(meta.image_url);
    }

    RecipeMeta {
        title: title.unwrap_or_else(|| requested_url.to_string()),
        image_url,
        ingredients,
    }
}
