/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::BTreeMap;

/// Name of the query parameter that requests an artificial delay.
pub const DELAY_PARAM: &str = "delay";

/// Flattened view of one inbound request, built before resolution starts.
///
/// Header names are stored in canonical form (`X-Api-Key`). Repeated
/// header or query names keep the last value, except `delay`
/// which is taken from its first occurrence in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query_parameters: BTreeMap<String, String>,
    delay: Option<String>,
}

impl RequestSnapshot {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn from_parts<'a, H>(method: &str, path: &str, headers: H, query: &str) -> Self
    where
        H: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let (query_parameters, delay) = extract_query_parameters(query);
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: extract_headers(headers),
            query_parameters,
            delay,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        let (query_parameters, delay) = extract_query_parameters(query);
        self.query_parameters = query_parameters;
        self.delay = delay;
        self
    }

    /// Raw `delay` query parameter, if the request carried one.
    pub fn delay_param(&self) -> Option<&str> {
        self.delay.as_deref()
    }
}

pub fn extract_headers<'a, H>(headers: H) -> BTreeMap<String, String>
where
    H: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            (
                canonical_header_name(name),
                String::from_utf8_lossy(value).into_owned(),
            )
        })
        .collect()
}

/// `x-api-key` becomes `X-Api-Key`.
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

pub fn extract_query_parameters(query: &str) -> (BTreeMap<String, String>, Option<String>) {
    let mut params = BTreeMap::new();
    let mut delay = None;

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if delay.is_none() && name == DELAY_PARAM {
            delay = Some(value.to_string());
        }
        params.insert(name.into_owned(), value.into_owned());
    }

    (params, delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_headers_last_value_wins() {
        let headers = vec![
            ("x-api-key", b"first".as_slice()),
            ("accept", b"*/*".as_slice()),
            ("x-api-key", b"second".as_slice()),
        ];

        let extracted = extract_headers(headers);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted.get("X-Api-Key"), Some(&"second".to_string()));
        assert_eq!(extracted.get("Accept"), Some(&"*/*".to_string()));
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-api-key"), "X-Api-Key");
        assert_eq!(canonical_header_name("CONTENT-TYPE"), "Content-Type");
        assert_eq!(canonical_header_name("dnt"), "Dnt");
        assert_eq!(canonical_header_name("x--y"), "X--Y");
    }

    #[test]
    fn test_extract_headers_non_utf8_value() {
        let headers = vec![("x-binary", &[0xffu8, b'a'][..])];
        let extracted = extract_headers(headers);
        assert_eq!(extracted.get("X-Binary"), Some(&"\u{fffd}a".to_string()));
    }

    #[test]
    fn test_extract_query_parameters() {
        let (params, delay) = extract_query_parameters("foo=bar&name=John%20Doe&flag");
        assert_eq!(params.get("foo"), Some(&"bar".to_string()));
        assert_eq!(params.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(params.get("flag"), Some(&String::new()));
        assert_eq!(delay, None);
    }

    #[test]
    fn test_delay_param_first_occurrence() {
        let (params, delay) = extract_query_parameters("delay=10ms&delay=2s");
        assert_eq!(delay.as_deref(), Some("10ms"));
        assert_eq!(params.get("delay"), Some(&"2s".to_string()));
    }

    #[test]
    fn test_empty_query() {
        let (params, delay) = extract_query_parameters("");
        assert!(params.is_empty());
        assert!(delay.is_none());
    }

    #[test]
    fn test_from_parts() {
        let snapshot = RequestSnapshot::from_parts(
            "GET",
            "/hello",
            vec![("authorization", b"Bearer T".as_slice())],
            "delay=250&x=1",
        );

        assert_eq!(snapshot.method, "GET");
        assert_eq!(snapshot.path, "/hello");
        assert_eq!(
            snapshot.headers.get("Authorization"),
            Some(&"Bearer T".to_string())
        );
        assert_eq!(snapshot.query_parameters.len(), 2);
        assert_eq!(snapshot.delay_param(), Some("250"));
    }

    #[test]
    fn test_builder() {
        let snapshot = RequestSnapshot::new("POST", "/submit")
            .with_header("X-Trace", "abc")
            .with_query("delay=");

        assert_eq!(snapshot.headers.get("X-Trace"), Some(&"abc".to_string()));
        assert_eq!(snapshot.delay_param(), Some(""));
    }
}
