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

//! OpenTelemetry semantic convention names used by echomock's spans,
//! metrics and resources.
//!
//! References:
//! - https://opentelemetry.io/docs/specs/semconv/http/http-spans/
//! - https://opentelemetry.io/docs/specs/semconv/attributes-registry/

/// HTTP semantic conventions
pub mod http {
    pub const METHOD: &str = "http.method";

    /// Configured route path the request was dispatched to
    pub const ROUTE: &str = "http.route";

    pub const TARGET: &str = "http.target";

    pub const RESPONSE_STATUS_CODE: &str = "http.response.status_code";
}

/// Service semantic conventions
pub mod service {
    pub const NAME: &str = "service.name";

    pub const VERSION: &str = "service.version";
}

/// Attributes specific to the responder
pub mod responder {
    /// How a request ended: `responded` or `aborted`
    pub const OUTCOME: &str = "echomock.outcome";

    pub const OUTCOME_RESPONDED: &str = "responded";

    pub const OUTCOME_ABORTED: &str = "aborted";
}

#[cfg(feature = "otel")]
pub mod kv {
    use opentelemetry::KeyValue;

    pub fn http_method(method: impl Into<String>) -> KeyValue {
        KeyValue::new(super::http::METHOD, method.into())
    }

    pub fn http_route(route: impl Into<String>) -> KeyValue {
        KeyValue::new(super::http::ROUTE, route.into())
    }

    pub fn http_response_status_code(status: u16) -> KeyValue {
        KeyValue::new(super::http::RESPONSE_STATUS_CODE, status as i64)
    }

    pub fn outcome(outcome: &'static str) -> KeyValue {
        KeyValue::new(super::responder::OUTCOME, outcome)
    }

    pub fn service_name(name: impl Into<String>) -> KeyValue {
        KeyValue::new(super::service::NAME, name.into())
    }

    pub fn service_version(version: impl Into<String>) -> KeyValue {
        KeyValue::new(super::service::VERSION, version.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_constants() {
        assert_eq!(http::METHOD, "http.method");
        assert_eq!(http::ROUTE, "http.route");
        assert_eq!(http::TARGET, "http.target");
        assert_eq!(http::RESPONSE_STATUS_CODE, "http.response.status_code");
        assert_ne!(http::RESPONSE_STATUS_CODE, "http.status_code");
    }

    #[cfg(feature = "otel")]
    #[test]
    fn test_kv_helpers() {
        let kv = kv::http_method("GET");
        assert_eq!(kv.key.as_str(), "http.method");
        assert_eq!(kv.value.to_string(), "GET");

        let kv = kv::http_response_status_code(404);
        assert_eq!(kv.key.as_str(), "http.response.status_code");
        assert_eq!(kv.value.to_string(), "404");

        let kv = kv::outcome(responder::OUTCOME_ABORTED);
        assert_eq!(kv.key.as_str(), "echomock.outcome");
        assert_eq!(kv.value.to_string(), "aborted");

        let kv = kv::service_name("echomock");
        assert_eq!(kv.key.as_str(), "service.name");
    }
}
