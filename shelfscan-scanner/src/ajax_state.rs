//! Extraction of the JSON payload embedded in listing-page inline scripts.
//!
//! Listing pages carry their product containers as a JavaScript call of the
//! form `window.AjaxState.register([...]);`. The argument is a list of
//! two-element sections `[meta, items]`, where `meta.type` names the section.

use crate::error::{Result, ScanError};
use crate::types::ProductStub;
use serde_json::Value;

pub const REGISTER_PREFIX: &str = "window.AjaxState.register(";

/// Section type holding the products available in a category.
pub const AVAILS_CONTAINER: &str = "avails-container";

/// One `[meta, items]` entry of a register call. Neither half is checked
/// here; only the available-products section has to be well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct AjaxSection {
    pub meta: Value,
    pub items: Value,
}

impl AjaxSection {
    pub fn section_type(&self) -> Option<&str> {
        self.meta.get("type").and_then(Value::as_str)
    }
}

/// Parse one `window.AjaxState.register(<json>);` script into its sections.
pub fn parse_register_call(script: &str) -> Result<Vec<AjaxSection>> {
    let body = script
        .trim()
        .strip_prefix(REGISTER_PREFIX)
        .ok_or_else(|| ScanError::ParseError("script is not an AjaxState.register call".into()))?;

    let body = body.trim_end();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let body = body
        .strip_suffix(')')
        .ok_or_else(|| ScanError::ParseError("unterminated AjaxState.register call".into()))?;

    let raw: Vec<Value> = serde_json::from_str(body).map_err(|source| ScanError::Json {
        context: "AjaxState.register payload".to_string(),
        source,
    })?;

    Ok(raw.iter().map(section_from_value).collect())
}

fn section_from_value(value: &Value) -> AjaxSection {
    AjaxSection {
        meta: value.get(0).cloned().unwrap_or(Value::Null),
        items: value.get(1).cloned().unwrap_or(Value::Null),
    }
}

/// Product stubs of the first available-products section, if there is one.
pub fn find_product_stubs(sections: &[AjaxSection]) -> Result<Option<Vec<ProductStub>>> {
    let Some(section) = sections
        .iter()
        .find(|s| s.section_type() == Some(AVAILS_CONTAINER))
    else {
        return Ok(None);
    };

    let items = section.items.as_array().ok_or_else(|| {
        ScanError::ParseError(format!("{AVAILS_CONTAINER} items are not a list"))
    })?;

    items
        .iter()
        .map(|item| {
            item.pointer("/data/product")
                .and_then(Value::as_str)
                .map(ProductStub::new)
                .ok_or_else(|| {
                    ScanError::ParseError(format!("{AVAILS_CONTAINER} item without data.product"))
                })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Walk a page's inline scripts and return the products of the first
/// register call that carries an available-products section.
///
/// `Ok(None)` means no script on the page has that section.
pub fn extract_product_stubs<'a, I>(scripts: I) -> Result<Option<Vec<ProductStub>>>
where
    I: IntoIterator<Item = &'a str>,
{
    for script in scripts {
        if !script.trim_start().starts_with(REGISTER_PREFIX) {
            continue;
        }
        let sections = parse_register_call(script)?;
        if let Some(stubs) = find_product_stubs(&sections)? {
            return Ok(Some(stubs));
        }
    }
    Ok(None)
}
