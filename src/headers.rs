//! Assembly of the header list sent with each request.

use crate::{
    error::{Error, ErrorKind},
    payload::{FieldValue, Headers},
};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Headers curl adds on its own unless told otherwise. An empty `Name:` entry
/// in the header list suppresses them.
const SUPPRESSED: [HeaderName; 2] = [header::CONTENT_TYPE, header::EXPECT];

/// Combine the client's default headers with the headers of a request.
///
/// A header given by the request replaces every default value of the same
/// name. If the request names the same header twice, the later value wins.
pub(crate) fn merge(defaults: &HeaderMap, headers: &Headers) -> Result<HeaderMap, Error> {
    let mut merged = defaults.clone();

    for (name, value) in headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            Error::with_context(
                ErrorKind::InvalidRequest,
                format!("invalid header name `{}`", name),
            )
        })?;

        let header_value = match value {
            FieldValue::Text(text) => HeaderValue::from_str(text).map_err(|_| {
                Error::with_context(
                    ErrorKind::InvalidRequest,
                    format!("invalid value for header `{}`", name),
                )
            })?,
            FieldValue::Invalid(json) => {
                return Err(Error::with_context(
                    ErrorKind::InvalidRequest,
                    format!("value of header `{}` is not a string: {}", name, json),
                ))
            }
        };

        merged.insert(header_name, header_value);
    }

    Ok(merged)
}

/// Convert a header map into the list format curl expects.
pub(crate) fn to_curl_list(headers: &HeaderMap) -> Result<curl::easy::List, curl::Error> {
    let mut list = curl::easy::List::new();

    for (name, value) in headers {
        list.append(&to_curl_string(name, value))?;
    }

    for name in SUPPRESSED.iter() {
        if !headers.contains_key(name) {
            list.append(&format!("{}:", title_case(name.as_str())))?;
        }
    }

    Ok(list)
}

fn to_curl_string(name: &HeaderName, value: &HeaderValue) -> String {
    let name = title_case(name.as_str());

    // Curl drops headers with empty values written as `Name:`, but sends
    // `Name;` as a header with an empty value.
    if value.is_empty() {
        format!("{};", name)
    } else {
        format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()))
    }
}

/// Canonical capitalization of a header name, such as `Content-Type`.
fn title_case(name: &str) -> String {
    let mut upper = true;

    name.chars()
        .map(|c| {
            let c = if upper { c.to_ascii_uppercase() } else { c };
            upper = c == '-';
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Batch;

    fn request_headers_from(json: &str) -> Headers {
        let payload = format!(r#"[{{"method":"GET","url":"u","headers":{}}}]"#, json);
        Batch::parse(&payload).unwrap().iter().next().unwrap().headers().clone()
    }

    fn defaults() -> HeaderMap {
        let mut defaults = HeaderMap::new();
        defaults.insert(header::USER_AGENT, HeaderValue::from_static("volley/test"));
        defaults.append(header::ACCEPT, HeaderValue::from_static("text/plain"));
        defaults.append(header::ACCEPT, HeaderValue::from_static("text/html"));
        defaults
    }

    #[test]
    fn request_headers_are_added_to_defaults() {
        let merged = merge(&defaults(), &request_headers_from(r#"{"X":"1"}"#)).unwrap();

        assert_eq!(merged["x"], "1");
        assert_eq!(merged[header::USER_AGENT], "volley/test");
    }

    #[test]
    fn request_header_replaces_all_default_values() {
        let merged = merge(&defaults(), &request_headers_from(r#"{"accept":"*/*"}"#)).unwrap();

        assert_eq!(
            merged.get_all(header::ACCEPT).iter().collect::<Vec<_>>(),
            vec!["*/*"]
        );
    }

    #[test]
    fn later_duplicate_wins() {
        let merged = merge(&HeaderMap::new(), &request_headers_from(r#"{"X":"1","x":"2"}"#)).unwrap();

        assert_eq!(merged.get_all("x").iter().collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn non_string_value_is_rejected() {
        let error = merge(&defaults(), &request_headers_from(r#"{"X":1}"#)).unwrap_err();

        assert_eq!(error.kind(), &ErrorKind::InvalidRequest);
        assert!(error.to_string().contains("`X`"));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let error = merge(&defaults(), &request_headers_from(r#"{"bad name":"1"}"#)).unwrap_err();

        assert_eq!(error.kind(), &ErrorKind::InvalidRequest);
    }

    #[test]
    fn invalid_value_is_rejected() {
        let error = merge(&defaults(), &request_headers_from(r#"{"X":"a\nb"}"#)).unwrap_err();

        assert_eq!(error.kind(), &ErrorKind::InvalidRequest);
    }

    #[test]
    fn curl_strings_are_title_cased() {
        let value = HeaderValue::from_static("gzip");

        assert_eq!(
            to_curl_string(&header::ACCEPT_ENCODING, &value),
            "Accept-Encoding: gzip"
        );
        assert_eq!(
            to_curl_string(&HeaderName::from_static("x-empty"), &HeaderValue::from_static("")),
            "X-Empty;"
        );
    }
}
