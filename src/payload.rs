//! Decoding of request batches from their serialized payload.
//!
//! A payload is a JSON array where every element describes one request:
//!
//! ```json
//! [
//!     {"method": "GET", "url": "http://example.org/a", "headers": {"X": "1"}},
//!     {"method": "POST", "url": "http://example.org/b", "body": "hi"}
//! ]
//! ```
//!
//! `headers` and `body` may be omitted or `null`. Decoding is all or nothing:
//! a single malformed element rejects the whole payload.

use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::{error::Error as StdError, fmt, str::FromStr};

/// Describes a single HTTP request to be executed as part of a batch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct RequestSpec {
    method: String,
    url: String,
    #[serde(default, deserialize_with = "nullable")]
    headers: Headers,
    #[serde(default, deserialize_with = "nullable")]
    body: String,
}

impl RequestSpec {
    /// Create a request specification with no headers and an empty body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::default(),
            body: String::new(),
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entries
            .push((name.into(), FieldValue::Text(value.into())));
        self
    }

    /// Set the body of the request.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method, exactly as given.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request URL, exactly as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers to set on the request, in payload order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The request body. Empty means no body is sent.
    pub fn body_str(&self) -> &str {
        &self.body
    }
}

/// Header fields of a [`RequestSpec`], in the order they appeared.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Headers {
    entries: Vec<(String, FieldValue)>,
}

impl Headers {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// The value of a header field as it appeared in the payload.
///
/// Header values must be strings. Anything else is kept around rather than
/// rejected, so that only the request carrying it fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    /// A string value.
    Text(String),

    /// Some other JSON value, in its serialized form.
    Invalid(String),
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of header names and values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Headers, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some((name, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => FieldValue::Text(s),
                        other => FieldValue::Invalid(other.to_string()),
                    };

                    entries.push((name, value));
                }

                Ok(Headers { entries })
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// An ordered sequence of request specifications.
///
/// Order is the order of the payload. It has no effect on execution, but each
/// request keeps its position as an index so results can be correlated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Batch {
    requests: Vec<RequestSpec>,
}

impl Batch {
    /// Decode a batch from a JSON payload.
    ///
    /// Fails if the payload is empty, not valid JSON, not an array, or if any
    /// element is not a valid request object.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let trimmed = payload.trim_start();

        if trimmed.is_empty() {
            return Err(PayloadError::new(PayloadErrorKind::Empty, None));
        }

        if !trimmed.starts_with('[') {
            // Tell apart "valid JSON, wrong shape" from garbage.
            return Err(match serde_json::from_str::<de::IgnoredAny>(payload) {
                Ok(_) => PayloadError::new(PayloadErrorKind::NotArray, None),
                Err(e) => PayloadError::new(PayloadErrorKind::Syntax, Some(e)),
            });
        }

        serde_json::from_str::<Vec<RequestSpec>>(payload)
            .map(Self::from)
            .map_err(|e| {
                let kind = match e.classify() {
                    serde_json::error::Category::Data => PayloadErrorKind::InvalidElement,
                    _ => PayloadErrorKind::Syntax,
                };

                PayloadError::new(kind, Some(e))
            })
    }

    /// Number of requests in the batch.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if the batch contains no requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Iterate over the requests in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, RequestSpec> {
        self.requests.iter()
    }
}

impl From<Vec<RequestSpec>> for Batch {
    fn from(requests: Vec<RequestSpec>) -> Self {
        Self { requests }
    }
}

impl FromIterator<RequestSpec> for Batch {
    fn from_iter<I: IntoIterator<Item = RequestSpec>>(iter: I) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Batch {
    type Item = RequestSpec;
    type IntoIter = std::vec::IntoIter<RequestSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

impl FromStr for Batch {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Why a payload was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum PayloadErrorKind {
    /// The payload was empty or unset.
    Empty,
    /// The payload is not valid JSON.
    Syntax,
    /// The payload is valid JSON, but not an array.
    NotArray,
    /// An element of the array is not a valid request object.
    InvalidElement,
}

/// A payload could not be decoded into a batch. Nothing in the batch is
/// executed when this happens.
#[derive(Debug)]
pub struct PayloadError {
    kind: PayloadErrorKind,
    source: Option<serde_json::Error>,
}

impl PayloadError {
    fn new(kind: PayloadErrorKind, source: Option<serde_json::Error>) -> Self {
        Self { kind, source }
    }

    /// Get the kind of error this is.
    pub fn kind(&self) -> PayloadErrorKind {
        self.kind
    }

    /// Line and column in the payload where decoding failed, if known.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.source
            .as_ref()
            .filter(|e| e.line() > 0)
            .map(|e| (e.line(), e.column()))
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self.kind {
            PayloadErrorKind::Empty => "payload is empty",
            PayloadErrorKind::Syntax => "payload is not valid JSON",
            PayloadErrorKind::NotArray => "payload is not a JSON array",
            PayloadErrorKind::InvalidElement => "payload contains an invalid request",
        };

        match &self.source {
            Some(source) => write!(f, "{}: {}", message, source),
            None => f.write_str(message),
        }
    }
}

impl StdError for PayloadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SCENARIO: &str = r#"[
        {"method":"GET","url":"http://host/a","headers":{"X":"1"},"body":""},
        {"method":"POST","url":"http://host/b","headers":{},"body":"hi"}
    ]"#;

    #[test]
    fn parse_two_requests_in_order() {
        let batch = Batch::parse(SCENARIO).unwrap();
        let requests = batch.iter().collect::<Vec<_>>();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method(), "GET");
        assert_eq!(requests[0].url(), "http://host/a");
        assert_eq!(
            requests[0].headers().iter().collect::<Vec<_>>(),
            vec![("X", &FieldValue::Text("1".into()))]
        );
        assert_eq!(requests[1].method(), "POST");
        assert_eq!(requests[1].body_str(), "hi");
        assert!(requests[1].headers().is_empty());
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(Batch::parse(SCENARIO).unwrap(), Batch::parse(SCENARIO).unwrap());
    }

    #[test]
    fn empty_array_is_an_empty_batch() {
        assert!(Batch::parse(" [ ] ").unwrap().is_empty());
    }

    #[test]
    fn headers_and_body_are_optional() {
        let batch = Batch::parse(r#"[{"method":"GET","url":"http://host/"}]"#).unwrap();

        assert_eq!(batch.iter().next(), Some(&RequestSpec::new("GET", "http://host/")));
    }

    #[test]
    fn null_headers_and_body_are_empty() {
        let batch =
            Batch::parse(r#"[{"method":"GET","url":"u","headers":null,"body":null}]"#).unwrap();
        let request = batch.iter().next().unwrap();

        assert!(request.headers().is_empty());
        assert_eq!(request.body_str(), "");
    }

    #[test]
    fn non_string_header_values_are_kept_as_invalid() {
        let batch = Batch::parse(
            r#"[{"method":"GET","url":"u","headers":{"A":"ok","B":1,"C":{"d":true}}}]"#,
        )
        .unwrap();
        let headers = batch.iter().next().unwrap().headers().clone();

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![
                ("A", &FieldValue::Text("ok".into())),
                ("B", &FieldValue::Invalid("1".into())),
                ("C", &FieldValue::Invalid(r#"{"d":true}"#.into())),
            ]
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        assert_eq!(
            Batch::parse(r#"[{"method":"GET","url":"u","retries":3}]"#)
                .unwrap()
                .len(),
            1
        );
    }

    #[test_case("", PayloadErrorKind::Empty ; "empty")]
    #[test_case("   \n", PayloadErrorKind::Empty ; "whitespace")]
    #[test_case("not json", PayloadErrorKind::Syntax ; "garbage")]
    #[test_case("[{\"method\":", PayloadErrorKind::Syntax ; "truncated")]
    #[test_case("{}", PayloadErrorKind::NotArray ; "object")]
    #[test_case("\"GET\"", PayloadErrorKind::NotArray ; "string")]
    #[test_case("[1]", PayloadErrorKind::InvalidElement ; "number element")]
    #[test_case("[{\"url\":\"u\"}]", PayloadErrorKind::InvalidElement ; "missing method")]
    #[test_case("[{\"method\":\"GET\",\"url\":\"u\",\"body\":5}]", PayloadErrorKind::InvalidElement ; "numeric body")]
    #[test_case("[{\"method\":\"GET\",\"url\":\"u\",\"headers\":[]}]", PayloadErrorKind::InvalidElement ; "array headers")]
    fn malformed_payloads_are_rejected(payload: &str, kind: PayloadErrorKind) {
        assert_eq!(Batch::parse(payload).unwrap_err().kind(), kind);
    }

    #[test]
    fn one_bad_element_rejects_the_whole_batch() {
        let error = Batch::parse(
            r#"[{"method":"GET","url":"a"},{"method":"GET"},{"method":"GET","url":"c"}]"#,
        )
        .unwrap_err();

        assert_eq!(error.kind(), PayloadErrorKind::InvalidElement);
        assert!(error.position().is_some());
    }
}
