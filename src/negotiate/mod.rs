//! Response content negotiation.
//!
//! The engine speaks two representations, JSON and YAML, preferred in that
//! order. Negotiation reads the request's `Accept` header, honors q-values,
//! and always produces an answer: absent headers, `*/*` and media types the
//! engine does not speak all fall back to JSON. The chosen
//! [`ResponseFormat`] travels on the response so the transport serializes
//! the handler's result value with it.

use serde_json::Value;

/// A serialization format the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Yaml,
}

/// Capability list in preference order; ties and wildcards resolve to the
/// earlier entry.
const CAPABILITIES: &[(ResponseFormat, &str)] = &[
    (ResponseFormat::Json, "application/json"),
    (ResponseFormat::Yaml, "application/x-yaml"),
];

impl ResponseFormat {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Yaml => "application/x-yaml",
        }
    }

    /// Serialize a result value in this format.
    pub fn serialize(self, value: &Value) -> anyhow::Result<String> {
        match self {
            ResponseFormat::Json => Ok(serde_json::to_string(value)?),
            ResponseFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }
}

/// Pick the best supported format for an `Accept` header.
///
/// Never fails: malformed ranges are skipped and no acceptable range means
/// JSON.
#[must_use]
pub fn negotiate(accept: Option<&str>) -> ResponseFormat {
    let Some(accept) = accept else {
        return ResponseFormat::Json;
    };

    // (format, q, specificity, capability rank); best q wins, then the more
    // specific range, then capability order.
    let mut best: Option<(ResponseFormat, f32, u8, usize)> = None;
    for range in accept.split(',') {
        let mut parts = range.split(';');
        let Some(media) = parts.next() else { continue };
        let media = media.trim().to_ascii_lowercase();
        if media.is_empty() {
            continue;
        }
        let q = parse_q(parts).unwrap_or(1.0);
        if q <= 0.0 {
            continue;
        }
        for (rank, (format, supported)) in CAPABILITIES.iter().enumerate() {
            let specificity = match media.as_str() {
                m if m == *supported => 2,
                "*/*" => 0,
                m => match m.strip_suffix("/*") {
                    Some(ty) if supported.starts_with(ty) => 1,
                    _ => continue,
                },
            };
            let candidate = (*format, q, specificity, rank);
            let better = match best {
                None => true,
                Some((_, best_q, best_spec, best_rank)) => {
                    q > best_q
                        || (q == best_q && specificity > best_spec)
                        || (q == best_q && specificity == best_spec && rank < best_rank)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best.map_or(ResponseFormat::Json, |(format, ..)| format)
}

fn parse_q<'a>(params: impl Iterator<Item = &'a str>) -> Option<f32> {
    for param in params {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("q") {
            return value.trim().parse::<f32>().ok();
        }
    }
    None
}
