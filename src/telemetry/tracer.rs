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
use crate::telemetry::attributes;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};
use tracing::{debug, info, warn, Instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[cfg(feature = "otel")]
use std::sync::OnceLock;

#[cfg(feature = "otel")]
static TRACER_PROVIDER: OnceLock<opentelemetry_sdk::trace::SdkTracerProvider> = OnceLock::new();

#[cfg(feature = "otel")]
static LOGGER_PROVIDER: OnceLock<opentelemetry_sdk::logs::SdkLoggerProvider> = OnceLock::new();

/// Adapts actix-web's `HeaderMap` to the `opentelemetry::propagation::Extractor`
/// trait so that W3C `traceparent`/`tracestate` headers can be extracted from
/// incoming requests.
#[cfg(feature = "otel")]
struct ActixHeaderExtractor<'a>(&'a actix_web::http::header::HeaderMap);

#[cfg(feature = "otel")]
impl opentelemetry::propagation::Extractor for ActixHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Console-only subscriber: env filter from `log_level` plus a text or JSON
/// formatter.
fn init_fmt_subscriber(config: &Config) {
    let subscriber = Registry::default().with(EnvFilter::new(config.log_level()));

    if config.log_format == "json" {
        let _ = subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = subscriber.with(tracing_subscriber::fmt::layer()).try_init();
    }
}

#[cfg(feature = "otel")]
pub async fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use crate::telemetry::{otel_resource, signal_endpoint, ExportProtocol};
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use std::time::Duration;

    if tracing::dispatcher::has_been_set() {
        info!("A tracing subscriber is already set, skipping initialization");
        return Ok(());
    }

    let telemetry = &config.telemetry;
    if !telemetry.enabled {
        init_fmt_subscriber(config);
        info!("OpenTelemetry export is disabled, logging to stdout only");
        return Ok(());
    }

    let resource = otel_resource(telemetry);
    let timeout = Duration::from_secs(telemetry.timeout_seconds);
    let protocol = ExportProtocol::from_config(telemetry);

    let span_exporter = match protocol {
        ExportProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&telemetry.endpoint)
            .with_timeout(timeout)
            .build(),
        ExportProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(signal_endpoint(&telemetry.endpoint, "traces"))
            .with_timeout(timeout)
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry span exporter build failed: {}", e))?;

    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource.clone())
        .with_sampler(opentelemetry_sdk::trace::Sampler::ParentBased(Box::new(
            opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(telemetry.sampling_rate),
        )))
        .build();

    let log_exporter = match protocol {
        ExportProtocol::Grpc => opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(&telemetry.endpoint)
            .with_timeout(timeout)
            .build(),
        ExportProtocol::Http => opentelemetry_otlp::LogExporter::builder()
            .with_http()
            .with_endpoint(signal_endpoint(&telemetry.endpoint, "logs"))
            .with_timeout(timeout)
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry log exporter build failed: {}", e))?;

    let logger_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_text_map_propagator(
        opentelemetry_sdk::propagation::TraceContextPropagator::new(),
    );
    opentelemetry::global::set_tracer_provider(tracer_provider.clone());

    let tracer = tracer_provider.tracer("echomock");
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let otel_log_layer =
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&logger_provider);

    let subscriber = Registry::default()
        .with(EnvFilter::new(config.log_level()))
        .with(telemetry_layer)
        .with(otel_log_layer);

    if config.log_format == "json" {
        let _ = subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = subscriber.with(tracing_subscriber::fmt::layer()).try_init();
    }

    let _ = TRACER_PROVIDER.set(tracer_provider);
    let _ = LOGGER_PROVIDER.set(logger_provider);

    info!(
        endpoint = %telemetry.endpoint,
        protocol = ?protocol,
        "OpenTelemetry tracing initialized"
    );
    Ok(())
}

#[cfg(not(feature = "otel"))]
pub async fn init_tracing(config: &Config) -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        info!("A tracing subscriber is already set, skipping initialization");
        return Ok(());
    }

    init_fmt_subscriber(config);

    if config.telemetry.enabled {
        warn!("Telemetry export requested but the otel feature is not enabled");
    }
    Ok(())
}

/// Flush and stop the span and log exporters, if they were started.
#[cfg(feature = "otel")]
pub(crate) fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            warn!("Failed to shut down tracer provider: {}", e);
        }
    }
    if let Some(provider) = LOGGER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            warn!("Failed to shut down logger provider: {}", e);
        }
    }
}

#[cfg(not(feature = "otel"))]
pub(crate) fn shutdown_tracing() {}

pub fn tracing_middleware() -> TracingMiddleware {
    TracingMiddleware
}

/// Wraps every request in an `http.request` span carrying a request id.
pub struct TracingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TracingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = TracingMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TracingMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct TracingMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TracingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let request_id = uuid::Uuid::new_v4();

        let span = tracing::info_span!(
            "http.request",
            http.method = %req.method(),
            http.target = %req.uri(),
            request.id = %request_id,
            http.route = tracing::field::Empty,
            http.response.status_code = tracing::field::Empty,
        );

        #[cfg(feature = "otel")]
        {
            use opentelemetry::propagation::TextMapPropagator;
            use opentelemetry_sdk::propagation::TraceContextPropagator;
            use tracing_opentelemetry::OpenTelemetrySpanExt;

            let parent_cx =
                TraceContextPropagator::new().extract(&ActixHeaderExtractor(req.headers()));
            let _ = span.set_parent(parent_cx);
        }

        Box::pin(
            async move {
                let response = service.call(req).await?;
                let status = response.status().as_u16();
                let span = tracing::Span::current();

                // Routing has run by now, so the matched pattern is known.
                if let Some(route) = response.request().match_pattern() {
                    span.record(attributes::http::ROUTE, route.as_str());
                }
                span.record(attributes::http::RESPONSE_STATUS_CODE, status);

                if status >= 500 {
                    tracing::error!(status, "Server error");
                } else if status >= 400 {
                    warn!(status, "Client error");
                } else {
                    debug!(status, "Request successful");
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use actix_web::web;
    use actix_web::App;
    use actix_web::HttpResponse;

    #[actix_web::test]
    async fn test_tracing_middleware() {
        let app = test::init_service(App::new().wrap(tracing_middleware()).route(
            "/test",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_tracing_middleware_passes_through_error_status() {
        let app = test::init_service(
            App::new()
                .wrap(tracing_middleware())
                .route(
                    "/missing",
                    web::get().to(|| async { HttpResponse::NotFound().finish() }),
                )
                .route(
                    "/error",
                    web::get().to(|| async { HttpResponse::InternalServerError().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/missing").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get().uri("/error").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 500);
    }

    #[actix_web::test]
    async fn test_tracing_middleware_with_traceparent_header() {
        let app = test::init_service(App::new().wrap(tracing_middleware()).route(
            "/propagate",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/propagate?delay=0")
            .insert_header((
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_init_tracing_without_export() {
        let config = Config::default();
        assert!(init_tracing(&config).await.is_ok());
        // A second call finds the subscriber already installed.
        assert!(init_tracing(&config).await.is_ok());
    }
}
