mod classify;
pub mod cli;
pub mod healer;
pub mod options;
#[cfg(feature = "proxy")]
pub mod proxy;
pub mod schema;

pub use healer::Healer;
pub use options::Options;

use std::sync::Arc;

use serde_json::Value;

/// Heal a complete payload in one call: strip any conversational preamble,
/// close open containers, and (with a schema) inject missing required
/// properties.
pub fn heal_to_string(input: &str, schema: Option<&Value>) -> String {
    heal_chunks_to_string(std::iter::once(input), schema)
}

/// Heal a sequence of UTF-8 chunks with the streaming healer and collect the
/// forwarded output plus the closing tail into a single string.
pub fn heal_chunks_to_string<'a, I>(chunks: I, schema: Option<&Value>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut healer = match schema {
        Some(s) => Healer::with_schema(Arc::new(s.clone()), Options::default()),
        None => Healer::new(Options::default()),
    };
    let mut out = String::new();
    for chunk in chunks {
        let forwarded = healer.process(chunk);
        if !forwarded.is_empty() {
            out.push_str(&forwarded);
        }
    }
    out.push_str(&healer.finish());
    out
}

#[cfg(test)]
mod tests;
