use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Maximum accepted length for an inbound correlation id.
///
/// Anything longer is treated as garbage and replaced with a fresh id.
const MAX_INBOUND_LEN: usize = 128;

/// Per-request correlation identifier.
///
/// Freshly generated ids are ULIDs. Inbound ids supplied via the
/// `x-request-id` header are reused verbatim so that callers keep their own
/// correlation chain intact, as long as they are printable ASCII tokens of
/// reasonable length; anything else is discarded and a ULID minted instead.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn new() -> Self {
        Self(Arc::from(ulid::Ulid::new().to_string()))
    }

    /// Reuse an inbound header value, or mint a fresh ULID when the header is
    /// absent or unusable.
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when an inbound id cannot serve as a correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRequestId;

impl Display for InvalidRequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid request id")
    }
}

impl std::error::Error for InvalidRequestId {}

impl FromStr for RequestId {
    type Err = InvalidRequestId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > MAX_INBOUND_LEN {
            return Err(InvalidRequestId);
        }
        if !s.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return Err(InvalidRequestId);
        }
        Ok(RequestId(Arc::from(s)))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}
