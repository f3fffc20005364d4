//! Storefront section responses.
//!
//! Cart mutations answer with a JSON envelope carrying re-rendered HTML
//! fragments keyed by section id. Components hand those fragments to a
//! [`SectionRenderer`] instead of patching the DOM themselves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorefrontError;

/// Section id the cart drawer renders from.
pub const CART_DRAWER_SECTION: &str = "cart-drawer";

/// DOM-patching collaborator: replaces the section's markup with `html`.
pub trait SectionRenderer {
    fn render_section(&self, section: &str, html: &str);
}

/// Cart mutation response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

impl CartResponse {
    pub fn from_json(raw: &str) -> Result<Self, StorefrontError> {
        serde_json::from_str(raw).map_err(|err| StorefrontError::Malformed(err.to_string()))
    }

    /// A truthy `status` marks an error envelope.
    pub fn is_error(&self) -> bool {
        is_truthy(&self.status)
    }

    pub fn into_sections(self) -> Result<BTreeMap<String, String>, StorefrontError> {
        if self.is_error() {
            let message = self
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "cart request failed".to_string());
            return Err(StorefrontError::Application(message));
        }
        Ok(self.sections)
    }

    /// Payload published on `cart:add-item` / `cart:update-item`.
    pub fn into_event_payload(self) -> Result<Value, StorefrontError> {
        let sections = self.into_sections()?;
        Ok(serde_json::json!({ "sections": sections }))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Extract section fragments from a cart event payload.
///
/// Accepts `{ "sections": { id: html } }`, a full [`CartResponse`] envelope,
/// or a bare HTML string that is treated as the cart drawer section.
pub fn sections_from_payload(
    payload: Option<&Value>,
) -> Result<BTreeMap<String, String>, StorefrontError> {
    match payload {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::String(html)) => Ok(BTreeMap::from([(
            CART_DRAWER_SECTION.to_string(),
            html.clone(),
        )])),
        Some(value @ Value::Object(_)) => {
            let response: CartResponse = serde_json::from_value(value.clone())
                .map_err(|err| StorefrontError::Malformed(err.to_string()))?;
            response.into_sections()
        }
        Some(other) => Err(StorefrontError::Malformed(format!(
            "expected sections object or html string, got {other}"
        ))),
    }
}

/// Render every fragment through `renderer`, in section-id order.
pub fn render_sections<R>(renderer: &R, sections: &BTreeMap<String, String>)
where
    R: SectionRenderer + ?Sized,
{
    for (section, html) in sections {
        renderer.render_section(section, html);
    }
}
