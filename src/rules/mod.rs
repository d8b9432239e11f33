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

pub mod composer;
pub mod delay;
pub mod matcher;
pub mod sleeper;
pub mod snapshot;
pub mod table;

use crate::config::Route;
use crate::utils::Shutdown;
use composer::{ResponseComposer, CONTENT_TYPE};
use delay::parse_delay;
use matcher::ConditionMatcher;
use sleeper::{CancellableSleeper, SleepOutcome};
use snapshot::RequestSnapshot;
use tracing::debug;

pub use table::RouteTable;

/// Drives one request through delay, condition matching and composition.
#[derive(Debug, Clone)]
pub struct RequestResolver {
    sleeper: CancellableSleeper,
}

impl RequestResolver {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            sleeper: CancellableSleeper::new(shutdown),
        }
    }

    pub async fn resolve(&self, route: &Route, snapshot: RequestSnapshot) -> Resolution {
        debug!(
            method = %snapshot.method,
            path = %snapshot.path,
            "Received request"
        );

        let delay = match parse_delay(snapshot.delay_param()) {
            Ok(delay) => delay,
            Err(e) => {
                debug!(error = %e, "Rejecting request with invalid delay parameter");
                return Resolution::Respond(RuleResponse::bad_request(format!(
                    "Invalid delay parameter: {}",
                    e
                )));
            }
        };

        if delay.is_positive() && self.sleeper.sleep(delay).await == SleepOutcome::Cancelled {
            return Resolution::Aborted;
        }

        let matched = ConditionMatcher::find_match(&route.conditions, &snapshot.headers);
        if let Some(index) = matched {
            debug!(
                method = %route.method(),
                path = %route.path,
                condition = index,
                "Condition matched"
            );
        }

        let response = ResponseComposer::compose(
            route,
            matched.map(|index| &route.conditions[index]),
            &snapshot,
        );

        debug!(
            method = %route.method(),
            path = %route.path,
            status = response.status,
            response_bytes = response.body.len(),
            "Request handled"
        );

        Resolution::Respond(response)
    }
}

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Respond(RuleResponse),
    /// Shutdown interrupted the delay. Nothing must be written back.
    Aborted,
}

impl Resolution {
    pub fn response(&self) -> Option<&RuleResponse> {
        match self {
            Resolution::Respond(response) => Some(response),
            Resolution::Aborted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResponse {
    pub status: u16,
    /// Set in order; names are unique ignoring ASCII case.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RuleResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        let mut response = Self::new(400, message);
        response.set_header(CONTENT_TYPE, mime::TEXT_PLAIN.as_ref());
        response
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Last write wins per header name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Condition;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn secure_route() -> Route {
        Route {
            path: "/api/secure".to_string(),
            method: "GET".to_string(),
            response_body: "Unauthorized".to_string(),
            response_status: 401,
            conditions: vec![Condition {
                header_match: HashMap::from([(
                    "Authorization".to_string(),
                    "Bearer T".to_string(),
                )]),
                response_body: r#"{"data":"ok"}"#.to_string(),
                response_status: 200,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn hello_route() -> Route {
        Route {
            path: "/hello".to_string(),
            method: "GET".to_string(),
            response_body: "Hello, World!".to_string(),
            ..Default::default()
        }
    }

    fn respond(resolution: Resolution) -> RuleResponse {
        match resolution {
            Resolution::Respond(response) => response,
            Resolution::Aborted => panic!("expected a response, request was aborted"),
        }
    }

    #[tokio::test]
    async fn test_condition_match_overrides_route() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot =
            RequestSnapshot::new("GET", "/api/secure").with_header("authorization", "Bearer T");

        let response = respond(resolver.resolve(&secure_route(), snapshot).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"data":"ok"}"#);
    }

    #[tokio::test]
    async fn test_no_condition_match_uses_route_defaults() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot = RequestSnapshot::new("GET", "/api/secure");

        let response = respond(resolver.resolve(&secure_route(), snapshot).await);
        assert_eq!(response.status, 401);
        assert_eq!(response.body, "Unauthorized");
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_empty_conditions_use_route_defaults() {
        let resolver = RequestResolver::new(Shutdown::new());
        let mut route = hello_route();
        route.response_header = HashMap::from([("X-Mock".to_string(), "1".to_string())]);

        let snapshot = RequestSnapshot::new("GET", "/hello").with_header("x-anything", "y");
        let response = respond(resolver.resolve(&route, snapshot).await);

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "Hello, World!");
        assert_eq!(response.header("X-Mock"), Some("1"));
    }

    #[tokio::test]
    async fn test_invalid_delay_is_bad_request() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot = RequestSnapshot::new("GET", "/hello").with_query("delay=invalid");

        let response = respond(resolver.resolve(&hello_route(), snapshot).await);
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body,
            "Invalid delay parameter: invalid duration \"invalid\""
        );
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot = RequestSnapshot::new("GET", "/hello").with_query("delay=10ms");

        let start = Instant::now();
        let response = respond(resolver.resolve(&hello_route(), snapshot).await);

        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "Hello, World!");
    }

    #[tokio::test]
    async fn test_integer_delay_is_milliseconds() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot = RequestSnapshot::new("GET", "/hello").with_query("delay=30");

        let start = Instant::now();
        let response = respond(resolver.resolve(&hello_route(), snapshot).await);

        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_negative_delay_responds_immediately() {
        let resolver = RequestResolver::new(Shutdown::new());
        let snapshot = RequestSnapshot::new("GET", "/hello").with_query("delay=-100ms");

        let start = Instant::now();
        let response = respond(resolver.resolve(&hello_route(), snapshot).await);

        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(response.body, "Hello, World!");
    }

    #[tokio::test]
    async fn test_shutdown_during_delay_aborts() {
        let shutdown = Shutdown::new();
        let resolver = RequestResolver::new(shutdown.clone());
        let snapshot = RequestSnapshot::new("GET", "/hello").with_query("delay=200ms");

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let start = Instant::now();
        let resolution = resolver.resolve(&hello_route(), snapshot).await;

        assert_eq!(resolution, Resolution::Aborted);
        assert!(resolution.response().is_none());
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_shutdown_does_not_affect_undelayed_requests() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let resolver = RequestResolver::new(shutdown);

        let response = respond(
            resolver
                .resolve(&hello_route(), RequestSnapshot::new("GET", "/hello"))
                .await,
        );
        assert_eq!(response.body, "Hello, World!");
    }

    #[tokio::test]
    async fn test_dump_route() {
        let resolver = RequestResolver::new(Shutdown::new());
        let mut route = hello_route();
        route.response_dump = true;

        let snapshot = RequestSnapshot::new("GET", "/hello")
            .with_header("x-api-key", "secret")
            .with_query("foo=bar");
        let response = respond(resolver.resolve(&route, snapshot).await);

        assert!(response.body.contains("\"headers\""));
        assert!(response.body.contains("\"query_parameters\""));
        assert!(!response.body.contains("Hello, World!"));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_set_header_last_write_wins() {
        let mut response = RuleResponse::new(200, "");
        response.set_header("X-Thing", "a");
        response.set_header("x-thing", "b");

        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.header("X-THING"), Some("b"));
    }
}
