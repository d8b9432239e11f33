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

use crate::config::{Condition, Route};
use crate::rules::snapshot::RequestSnapshot;
use crate::rules::RuleResponse;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

pub const CONTENT_TYPE: &str = "Content-Type";

#[derive(Serialize)]
struct RequestDump<'a> {
    headers: &'a BTreeMap<String, String>,
    query_parameters: &'a BTreeMap<String, String>,
}

/// Pretty-printed JSON echo of the request's headers and query parameters.
pub fn render_dump(snapshot: &RequestSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&RequestDump {
        headers: &snapshot.headers,
        query_parameters: &snapshot.query_parameters,
    })
}

pub struct ResponseComposer;

impl ResponseComposer {
    pub fn compose(
        route: &Route,
        condition: Option<&Condition>,
        snapshot: &RequestSnapshot,
    ) -> RuleResponse {
        Self::compose_with(route, condition, snapshot, render_dump)
    }

    pub(crate) fn compose_with<F>(
        route: &Route,
        condition: Option<&Condition>,
        snapshot: &RequestSnapshot,
        dump: F,
    ) -> RuleResponse
    where
        F: FnOnce(&RequestSnapshot) -> serde_json::Result<String>,
    {
        let (body, headers, status) = match condition {
            Some(condition) => (
                &condition.response_body,
                &condition.response_header,
                condition.status(),
            ),
            None => (&route.response_body, &route.response_header, route.status()),
        };

        let mut response = RuleResponse::new(status, body.clone());
        for (name, value) in headers {
            response.set_header(name, value);
        }

        if response.header(CONTENT_TYPE).is_none() {
            response.set_header(CONTENT_TYPE, mime::TEXT_PLAIN.as_ref());
        }

        if route.response_dump {
            match dump(snapshot) {
                Ok(json) => {
                    response.body = json;
                    response.set_header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
                }
                Err(e) => {
                    error!(
                        method = %route.method(),
                        path = %route.path,
                        error = %e,
                        "Failed to marshal request dump"
                    );
                }
            }
        }

        response
    }
}
