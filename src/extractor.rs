use log::{debug, info};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::ParseFailure;
use crate::models::RawListing;
use crate::normalizer::at_path;

pub type Strategy = fn(&str) -> Result<Vec<RawListing>, ParseFailure>;

#[derive(Debug, Default)]
pub struct Extraction {
    pub listings: Vec<RawListing>,
    pub strategy: Option<&'static str>,
    pub failures: Vec<(&'static str, ParseFailure)>,
}

#[derive(Clone, Default)]
pub struct Extractor {
    strategies: Vec<(&'static str, Strategy)>,
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, name: &'static str, strategy: Strategy) -> Self {
        self.strategies.push((name, strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    pub fn extract(&self, body: &str) -> Vec<RawListing> {
        self.run(body).listings
    }

    pub fn run(&self, body: &str) -> Extraction {
        let mut extraction = Extraction::default();
        for &(name, strategy) in &self.strategies {
            match strategy(body) {
                Ok(listings) if !listings.is_empty() => {
                    info!("Extracted {} listings via {}", listings.len(), name);
                    extraction.listings = listings;
                    extraction.strategy = Some(name);
                    return extraction;
                }
                Ok(_) => {
                    debug!("Strategy {} found nothing", name);
                    extraction.failures.push((name, ParseFailure::MissingListings));
                }
                Err(failure) => {
                    debug!("Strategy {} failed: {}", name, failure);
                    extraction.failures.push((name, failure));
                }
            }
        }
        extraction
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

// ---- structured data islands ----

pub fn selector(css: &str) -> Result<Selector, ParseFailure> {
    Selector::parse(css)
        .map_err(|e| ParseFailure::Selector(format!("{}: {}", css, e)))
}

pub fn script_json(document: &Html, css: &str) -> Result<Value, ParseFailure> {
    let sel = selector(css)?;
    let script = document
        .select(&sel)
        .next()
        .ok_or(ParseFailure::MissingIsland)?;
    let raw: String = script.text().collect();
    serde_json::from_str(raw.trim())
        .map_err(|e| ParseFailure::MalformedJson(e.to_string()))
}

pub fn next_data(body: &str) -> Result<Value, ParseFailure> {
    let document = Html::parse_document(body);
    script_json(
        &document,
        r#"script#__NEXT_DATA__[type="application/json"]"#,
    )
}

pub fn first_present<'a>(root: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| at_path(root, path))
        .find(|v| !is_blank(v))
}

pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub fn listings_from_array(value: &Value) -> Vec<RawListing> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

// ---- document cards ----

/// Elements of the first selector in `patterns` that matches anything.
pub fn first_matching<'a>(
    document: &'a Html,
    patterns: &[&str],
) -> Result<Vec<ElementRef<'a>>, ParseFailure> {
    for css in patterns {
        let sel = selector(css)?;
        let found: Vec<ElementRef<'a>> = document.select(&sel).collect();
        if !found.is_empty() {
            debug!("Card selector {} matched {} elements", css, found.len());
            return Ok(found);
        }
    }
    Err(ParseFailure::NoCards)
}

pub fn find_in<'a>(scope: ElementRef<'a>, patterns: &[&str]) -> Option<ElementRef<'a>> {
    patterns.iter().find_map(|css| {
        let sel = selector(css).ok()?;
        scope.select(&sel).next()
    })
}

pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn text_in(scope: ElementRef<'_>, patterns: &[&str]) -> Option<String> {
    find_in(scope, patterns)
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// All text fragments of a card joined with `" | "`, for keyword scans.
pub fn card_text(card: ElementRef<'_>) -> String {
    card.text()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn always_fails(_: &str) -> Result<Vec<RawListing>, ParseFailure> {
        Err(ParseFailure::MissingIsland)
    }

    fn finds_nothing(_: &str) -> Result<Vec<RawListing>, ParseFailure> {
        Ok(Vec::new())
    }

    fn finds_one(_: &str) -> Result<Vec<RawListing>, ParseFailure> {
        Ok(vec![json!({"id": "1"}).as_object().cloned().unwrap()])
    }

    #[test]
    fn chain_takes_first_non_empty_result() {
        let extractor = Extractor::new()
            .with_strategy("broken", always_fails)
            .with_strategy("empty", finds_nothing)
            .with_strategy("cards", finds_one);
        let extraction = extractor.run("<html></html>");
        assert_eq!(extraction.strategy, Some("cards"));
        assert_eq!(extraction.listings.len(), 1);
        assert_eq!(extraction.failures.len(), 2);
        assert_eq!(extraction.failures[0].1, ParseFailure::MissingIsland);
    }

    #[test]
    fn malformed_island_is_reported_not_raised() {
        let body = r#"<html><script id="__NEXT_DATA__" type="application/json">{"props": </script></html>"#;
        assert!(matches!(
            next_data(body),
            Err(ParseFailure::MalformedJson(_))
        ));
        assert_eq!(next_data("<html></html>"), Err(ParseFailure::MissingIsland));
    }

    #[test]
    fn first_present_skips_blank_paths() {
        let root = json!({"props": {"pageProps": {"search": {}, "searchResults": {"jobs": [1]}}}});
        let found = first_present(
            &root,
            &[
                &["props", "pageProps", "search"],
                &["props", "pageProps", "searchResults"],
            ],
        );
        assert_eq!(found, Some(&json!({"jobs": [1]})));
    }

    #[test]
    fn card_helpers_read_visible_text() {
        let html = Html::parse_fragment(
            r#"<div class="card"><h3>  Senior
                Engineer </h3><span class="loc">Jakarta</span></div>"#,
        );
        let cards = first_matching(&html, &["article", "div.card"]).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(text_in(cards[0], &["h2", "h3"]).as_deref(), Some("Senior Engineer"));
        assert_eq!(card_text(cards[0]), "Senior Engineer | Jakarta");
        assert!(matches!(
            first_matching(&html, &["article"]),
            Err(ParseFailure::NoCards)
        ));
    }
}
