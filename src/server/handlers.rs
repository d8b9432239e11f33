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

use crate::rules::snapshot::RequestSnapshot;
use crate::rules::{Resolution, RuleResponse};
use crate::server::app::AppState;
use crate::telemetry::{record_aborted, record_latency, record_request};
use actix_web::http::{header, StatusCode};
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use std::time::Instant;
use tracing::{debug, warn};

pub async fn route_handler(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let start_time = Instant::now();
    let method = req.method().as_str().to_string();
    let pattern = req
        .match_pattern()
        .unwrap_or_else(|| req.path().to_string());

    let Some(route) = data.routes.get(&method, &pattern) else {
        warn!(method = %method, route = %pattern, "No route registered for matched pattern");
        return not_found();
    };

    let snapshot = RequestSnapshot::from_parts(
        &method,
        req.path(),
        req.headers()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes())),
        req.query_string(),
    );

    match data.resolver.resolve(&route, snapshot).await {
        Resolution::Respond(response) => {
            let latency = start_time.elapsed().as_secs_f64() * 1000.0;
            record_request(&method, &pattern, response.status);
            record_latency(&method, &pattern, latency);

            into_http_response(response)
        }
        Resolution::Aborted => {
            record_aborted(&method, &pattern);
            debug!(method = %method, route = %pattern, "Dropping response for aborted request");

            // The server is stopping; the connection is closed without a
            // response once the graceful shutdown window ends.
            std::future::pending::<HttpResponse>().await
        }
    }
}

pub async fn not_found_handler() -> HttpResponse {
    not_found()
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .insert_header((header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref()))
        .body("404 Not Found")
}

fn into_http_response(response: RuleResponse) -> HttpResponse {
    let mut builder = HttpResponse::build(
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );

    for (name, value) in &response.headers {
        builder.insert_header((name.as_str(), value.as_str()));
    }

    builder.body(response.body)
}
