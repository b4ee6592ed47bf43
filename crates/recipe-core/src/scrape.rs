//! Fallback ingredient scraping for pages without usable structured data.
//!
//! Strategies live in one ordered table of (matcher, extractor) pairs. Site
//! rules come first, then the generic heuristics. The first strategy that
//! yields a non-empty list wins; every result is normalized and
//! deduplicated in first-seen order.

use crate::dedup::{dedup_preserving_order, normalize_whitespace};
use scraper::{ElementRef, Html, Selector};
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

const INGREDIENT_WORDS: &[&str] = &["ingredient", "ingrediens"];

const STOP_WORDS: &[&str] = &[
    "instruction",
    "direction",
    "method",
    "preparation",
    "steps",
    "gör så här",
    "så gör du",
    "instruktioner",
    "tillagning",
];

/// Recipe-card containers used by common recipe plugins and themes.
const CARD_CONTAINERS: &[&str] = &[
    ".wprm-recipe-container",
    ".wprm-recipe",
    ".tasty-recipes",
    ".mv-create-card",
    ".recipe-card",
    ".easyrecipe",
    ".recipe-container",
    ".recipe-content",
    "[itemtype*='schema.org/Recipe']",
    "article.recipe",
    ".recipe",
];

const INGREDIENT_CONTAINERS: &str = "[class*='ingredient'], [class*='Ingredient'], \
     [class*='ingrediens'], [class*='Ingrediens'], .ERSIngredients, .recipe-ingred_txt, \
     .jetpack-recipe-ingredients, .cookbook-ingredients";

static HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("Invalid heading selector"));

static LISTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul, ol").expect("Invalid list selector"));

static LIST_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("Invalid li selector"));

static PARAGRAPHS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("Invalid p selector"));

static INGREDIENT_CLASS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(INGREDIENT_CONTAINERS).expect("Invalid ingredient class selector")
});

/// Which pages a strategy applies to.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// The host or any of its subdomains.
    Host(&'static str),
    Any,
}

impl Matcher {
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Host(domain) => url.host_str().is_some_and(|host| {
                let host = host.to_ascii_lowercase();
                host == *domain
                    || host
                        .strip_suffix(*domain)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }),
        }
    }
}

/// How a strategy pulls candidate lines out of a page.
#[derive(Clone, Copy)]
pub enum Extractor {
    /// Text of every element matching the first selector that yields anything.
    Selectors(&'static [&'static str]),
    Custom(fn(&Html) -> Vec<String>),
}

impl Extractor {
    fn run(&self, document: &Html) -> Vec<String> {
        match self {
            Extractor::Selectors(selectors) => first_selector_hit(document, selectors),
            Extractor::Custom(f) => f(document),
        }
    }
}

pub struct Strategy {
    pub name: &'static str,
    pub matcher: Matcher,
    pub extractor: Extractor,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "ica.se",
        matcher: Matcher::Host("ica.se"),
        extractor: Extractor::Selectors(&[
            ".ingredients-list-group__card__ingr",
            ".ingredients__list__item",
            "[class*='IngredientList'] li",
        ]),
    },
    Strategy {
        name: "arla.se",
        matcher: Matcher::Host("arla.se"),
        extractor: Extractor::Selectors(&[
            ".c-recipe__ingredients-inner li",
            ".c-recipe__ingredients li",
        ]),
    },
    Strategy {
        name: "koket.se",
        matcher: Matcher::Host("koket.se"),
        extractor: Extractor::Selectors(&[
            "[class*='ingredients_ingredient']",
            "[data-testid='ingredients'] li",
        ]),
    },
    Strategy {
        name: "coop.se",
        matcher: Matcher::Host("coop.se"),
        extractor: Extractor::Selectors(&[".IngredientList-content li", ".Ingredient"]),
    },
    Strategy {
        name: "tasteline.com",
        matcher: Matcher::Host("tasteline.com"),
        extractor: Extractor::Selectors(&[".ingredient-group li", ".recipe-ingredients li"]),
    },
    Strategy {
        name: "allrecipes.com",
        matcher: Matcher::Host("allrecipes.com"),
        extractor: Extractor::Selectors(&[
            ".mm-recipes-structured-ingredients__list-item",
            ".ingredients-item-name",
        ]),
    },
    Strategy {
        name: "bbcgoodfood.com",
        matcher: Matcher::Host("bbcgoodfood.com"),
        extractor: Extractor::Selectors(&[
            ".recipe__ingredients li",
            "[class*='ingredients-list'] li",
        ]),
    },
    Strategy {
        name: "microdata",
        matcher: Matcher::Any,
        extractor: Extractor::Selectors(&[
            "[itemprop='recipeIngredient']",
            "[itemprop='ingredients']",
        ]),
    },
    Strategy {
        name: "recipe-card",
        matcher: Matcher::Any,
        extractor: Extractor::Custom(from_recipe_card),
    },
    Strategy {
        name: "ingredient-heading",
        matcher: Matcher::Any,
        extractor: Extractor::Custom(from_ingredient_heading),
    },
    Strategy {
        name: "ingredient-class",
        matcher: Matcher::Any,
        extractor: Extractor::Custom(from_ingredient_class),
    },
];

/// Ingredient lines and the name of the strategy that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeHit {
    pub strategy: &'static str,
    pub ingredients: Vec<String>,
}

/// Strategy names in the order they are tried.
pub fn strategy_names() -> Vec<&'static str> {
    STRATEGIES.iter().map(|s| s.name).collect()
}

/// Run the cascade and return the first non-empty result.
pub fn scrape_ingredients(document: &Html, url: &Url) -> Option<ScrapeHit> {
    run_strategies(STRATEGIES, document, url)
}

/// A strategy that panics is logged and skipped.
fn run_strategies(strategies: &[Strategy], document: &Html, url: &Url) -> Option<ScrapeHit> {
    for strategy in strategies.iter().filter(|s| s.matcher.matches(url)) {
        let raw = match panic::catch_unwind(AssertUnwindSafe(|| strategy.extractor.run(document))) {
            Ok(raw) => raw,
            Err(_) => {
                warn!(strategy = strategy.name, url = %url, "Scrape strategy panicked, skipping");
                continue;
            }
        };
        let ingredients = dedup_preserving_order(raw);
        if !ingredients.is_empty() {
            return Some(ScrapeHit {
                strategy: strategy.name,
                ingredients,
            });
        }
        debug!(strategy = strategy.name, "Scrape strategy found nothing");
    }
    None
}

fn text_of(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

fn mentions(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

fn class_mentions(el: ElementRef, words: &[&str]) -> bool {
    el.value().attr("class").is_some_and(|c| mentions(c, words))
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// True when an element between `el` and `root` (both exclusive) has a class
/// mentioning one of `words`.
fn ancestor_class_mentions(el: ElementRef, root: ElementRef, words: &[&str]) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(|a| class_mentions(a, words))
}

fn first_selector_hit(document: &Html, selectors: &[&str]) -> Vec<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = %raw, "Invalid scrape selector");
            continue;
        };
        let items: Vec<String> = document.select(&selector).map(text_of).collect();
        if items.iter().any(|s| !s.is_empty()) {
            return items;
        }
    }
    Vec::new()
}

/// Walk a recipe card in document order, collecting list items that sit in
/// an ingredient section. Accumulation ends at the first instructions
/// heading or container once something has been collected.
fn collect_from_card(card: ElementRef) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for node in card.descendants().skip(1) {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let name = el.value().name();

        if is_heading(name) {
            let text = text_of(el);
            if mentions(&text, STOP_WORDS) {
                if !items.is_empty() {
                    break;
                }
                in_section = false;
            } else if mentions(&text, INGREDIENT_WORDS) {
                in_section = true;
            }
            continue;
        }

        if name != "li" {
            if class_mentions(el, STOP_WORDS)
                && !class_mentions(el, INGREDIENT_WORDS)
                && !items.is_empty()
            {
                break;
            }
            continue;
        }

        if ancestor_class_mentions(el, card, STOP_WORDS)
            && !ancestor_class_mentions(el, card, INGREDIENT_WORDS)
        {
            continue;
        }
        if in_section || ancestor_class_mentions(el, card, INGREDIENT_WORDS) {
            items.push(text_of(el));
        }
    }

    items
}

fn from_recipe_card(document: &Html) -> Vec<String> {
    for raw in CARD_CONTAINERS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for card in document.select(&selector) {
            let items = collect_from_card(card);
            if items.iter().any(|s| !s.is_empty()) {
                return items;
            }
        }
    }
    Vec::new()
}

fn list_items(list: ElementRef) -> Vec<String> {
    list.select(&LIST_ITEMS).map(text_of).collect()
}

/// The first list following `heading` among its siblings, then among its
/// parent's siblings when the heading is wrapped.
fn list_after(heading: ElementRef) -> Vec<String> {
    let parent = heading.parent().and_then(ElementRef::wrap);
    for start in std::iter::once(heading).chain(parent) {
        for sibling in start.next_siblings().filter_map(ElementRef::wrap) {
            let name = sibling.value().name();
            if is_heading(name) {
                break;
            }
            if name == "ul" || name == "ol" {
                return list_items(sibling);
            }
            if let Some(list) = sibling.select(&LISTS).next() {
                return list_items(list);
            }
        }
    }
    Vec::new()
}

fn from_ingredient_heading(document: &Html) -> Vec<String> {
    document
        .select(&HEADINGS)
        .filter(|h| mentions(&text_of(*h), INGREDIENT_WORDS))
        .map(list_after)
        .find(|items| items.iter().any(|s| !s.is_empty()))
        .unwrap_or_default()
}

fn from_ingredient_class(document: &Html) -> Vec<String> {
    let mut items = Vec::new();
    for el in document.select(&INGREDIENT_CLASS) {
        let name = el.value().name();
        if matches!(name, "html" | "body") || class_mentions(el, STOP_WORDS) {
            continue;
        }
        if name == "li" || name == "p" {
            items.push(text_of(el));
            continue;
        }
        let lis: Vec<String> = el.select(&LIST_ITEMS).map(text_of).collect();
        if lis.is_empty() {
            items.extend(el.select(&PARAGRAPHS).map(text_of));
        } else {
            items.extend(lis);
        }
    }
    items
}
