//! Page metadata lookups: meta tags, JSON-LD nodes and the first heading.

use crate::Document;
use serde_json::Value;

impl Document {
    /// Get meta tag content by `name`, `property` or `itemprop` attribute.
    pub fn meta_content(&self, attr: &str) -> Option<String> {
        for key in ["name", "property", "itemprop"] {
            let selector = format!("meta[{}=\"{}\"]", key, attr);
            if let Ok(elements) = self.select(&selector)
                && let Some(el) = elements.first()
                && let Some(content) = el.attr("content")
            {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
        None
    }

    /// Every JSON object found in `application/ld+json` scripts.
    ///
    /// Top-level arrays and `@graph` containers are flattened so callers can
    /// look for a node by field without caring how the site nested it.
    pub fn json_ld_objects(&self) -> Vec<Value> {
        let mut objects = Vec::new();
        if let Ok(elements) = self.select("script[type=\"application/ld+json\"]") {
            for el in elements.iter() {
                if let Ok(value) = serde_json::from_str::<Value>(el.text().trim()) {
                    flatten_json_ld(value, &mut objects);
                }
            }
        }
        objects
    }

    /// First `<h1>` text, trimmed, if non-empty.
    pub fn first_heading(&self) -> Option<String> {
        let elements = self.select("h1").ok()?;
        let text = elements.first()?.text();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| flatten_json_ld(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}
