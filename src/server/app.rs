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

use crate::config::Config;
use crate::rules::{RequestResolver, RouteTable};
use crate::telemetry::tracing_middleware;
use crate::utils::Shutdown;
use actix_web::dev::Server;
use actix_web::http::Method;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub resolver: RequestResolver,
}

impl AppState {
    pub fn new(routes: RouteTable, shutdown: Shutdown) -> Self {
        Self {
            routes: Arc::new(routes),
            resolver: RequestResolver::new(shutdown),
        }
    }
}

/// Register one actix resource per configured path, with a route for each
/// of its methods. A known path hit with another method answers 405.
pub fn configure_routes(cfg: &mut web::ServiceConfig, routes: &RouteTable) {
    for (path, methods) in routes.paths() {
        let mut resource = web::resource(path);

        for method in methods {
            match Method::from_bytes(method.as_bytes()) {
                Ok(method) => {
                    debug!(method = %method, path = %path, "Registered route");
                    resource = resource.route(web::method(method).to(super::route_handler));
                }
                Err(e) => {
                    warn!(method = %method, path = %path, error = %e, "Skipping route with invalid method");
                }
            }
        }

        cfg.service(resource);
    }
}

pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<Server> {
    let addr = config.bind_address();

    info!("Starting server on {}", addr);
    info!("Server workers: {}", config.server.workers);
    info!("Loaded routes: {}", state.routes.len());

    let server = HttpServer::new(move || {
        let state = state.clone();
        let routes = state.routes.clone();

        App::new()
            .wrap(tracing_middleware())
            .app_data(web::Data::new(state))
            .configure(|cfg| configure_routes(cfg, &routes))
            .default_service(web::to(super::not_found_handler))
    })
    .workers(config.server.workers)
    .shutdown_timeout(config.server.shutdown_timeout)
    .bind(&addr)
    .with_context(|| format!("Failed to bind {}", addr))?
    .run();

    Ok(server)
}
