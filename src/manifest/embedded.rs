//! JSON embedded in page HTML.
//!
//! Many services ship their player configuration as a JSON object
//! assigned inside a `<script>` element. This parser walks the script
//! elements with `scraper`, finds the first one containing a marker
//! (e.g. `__PLAYER_STATE__` or `ytInitialPlayerResponse`), extracts the
//! object literal that follows it by brace matching, and hands the
//! decoded value to the stream-table parser.

use scraper::{Html, Selector};
use serde_json::Value;

use super::{api, ParseError, ParsedStreams};

/// Extract and decode the JSON object following `marker` in `html`.
pub fn extract_script_json(html: &str, marker: &str) -> Result<Value, ParseError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").expect("static selector");

    for script in document.select(&selector) {
        let text: String = script.text().collect();
        if !text.contains(marker) {
            continue;
        }
        if let Some(object) = extract_json_object(&text, marker) {
            return Ok(serde_json::from_str(object)?);
        }
    }

    Err(ParseError::UnrecognizedFormat(format!(
        "no script JSON found for marker `{marker}`"
    )))
}

/// Parse the streams out of a page's embedded player JSON.
pub fn parse(html: &str, marker: &str, page_url: &str) -> Result<ParsedStreams, ParseError> {
    let value = extract_script_json(html, marker)?;
    api::parse(&value, page_url)
}

/// Slice out the first balanced `{...}` object after `marker`,
/// skipping braces inside string literals.
#[must_use]
pub fn extract_json_object<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let after = text.find(marker)? + marker.len();
    let start = after + text[after..].find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
