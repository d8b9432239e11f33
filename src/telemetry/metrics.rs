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

use crate::config::TelemetryConfig;
use tracing::{debug, info};

#[cfg(feature = "otel")]
use crate::telemetry::attributes;

#[cfg(feature = "otel")]
use std::sync::OnceLock;

#[cfg(feature = "otel")]
static METER_PROVIDER: OnceLock<opentelemetry_sdk::metrics::SdkMeterProvider> = OnceLock::new();

#[cfg(feature = "otel")]
struct Instruments {
    requests: opentelemetry::metrics::Counter<u64>,
    aborted: opentelemetry::metrics::Counter<u64>,
    duration: opentelemetry::metrics::Histogram<f64>,
}

#[cfg(feature = "otel")]
static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

#[cfg(feature = "otel")]
fn instruments() -> &'static Instruments {
    INSTRUMENTS.get_or_init(|| {
        let meter = opentelemetry::global::meter("echomock");
        Instruments {
            requests: meter
                .u64_counter("http_server_request_count_total")
                .with_description("Total number of HTTP requests answered")
                .build(),
            aborted: meter
                .u64_counter("http_server_aborted_request_count_total")
                .with_description("Requests abandoned because shutdown interrupted their delay")
                .build(),
            duration: meter
                .f64_histogram("http_server_request_duration")
                .with_description("HTTP request duration in seconds")
                .with_unit("s")
                .build(),
        }
    })
}

#[cfg(feature = "otel")]
pub async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<()> {
    use crate::telemetry::{otel_resource, signal_endpoint, ExportProtocol};
    use opentelemetry_otlp::WithExportConfig;
    use std::time::Duration;

    if !config.enabled {
        info!("Metrics export is disabled");
        return Ok(());
    }

    let timeout = Duration::from_secs(config.timeout_seconds);
    let exporter = match ExportProtocol::from_config(config) {
        ExportProtocol::Grpc => opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&config.endpoint)
            .with_timeout(timeout)
            .build(),
        ExportProtocol::Http => opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(signal_endpoint(&config.endpoint, "metrics"))
            .with_timeout(timeout)
            .build(),
    }
    .map_err(|e| anyhow::anyhow!("OpenTelemetry metric exporter build failed: {}", e))?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(10))
        .build();

    let meter_provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(otel_resource(config))
        .build();

    opentelemetry::global::set_meter_provider(meter_provider.clone());
    let _ = METER_PROVIDER.set(meter_provider);

    info!("OpenTelemetry metrics initialized");
    Ok(())
}

#[cfg(not(feature = "otel"))]
pub async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<()> {
    if config.enabled {
        info!("Metrics export requires the otel feature; recording to logs only");
    }
    Ok(())
}

#[cfg(feature = "otel")]
pub(crate) fn shutdown_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!("Failed to shut down meter provider: {}", e);
        }
    }
}

#[cfg(not(feature = "otel"))]
pub(crate) fn shutdown_metrics() {}

/// Count a request that was answered, including 400s for a bad delay.
pub fn record_request(method: &str, route: &str, status: u16) {
    #[cfg(feature = "otel")]
    instruments().requests.add(
        1,
        &[
            attributes::kv::http_method(method),
            attributes::kv::http_route(route),
            attributes::kv::http_response_status_code(status),
            attributes::kv::outcome(attributes::responder::OUTCOME_RESPONDED),
        ],
    );

    debug!(
        method = %method,
        route = %route,
        status = status,
        "Request completed"
    );
}

/// Count a request whose delay was cut short by shutdown.
pub fn record_aborted(method: &str, route: &str) {
    #[cfg(feature = "otel")]
    instruments().aborted.add(
        1,
        &[
            attributes::kv::http_method(method),
            attributes::kv::http_route(route),
            attributes::kv::outcome(attributes::responder::OUTCOME_ABORTED),
        ],
    );

    debug!(
        method = %method,
        route = %route,
        "Request aborted by shutdown"
    );
}

pub fn record_latency(method: &str, route: &str, latency_ms: f64) {
    #[cfg(feature = "otel")]
    instruments().duration.record(
        latency_ms / 1000.0,
        &[
            attributes::kv::http_method(method),
            attributes::kv::http_route(route),
        ],
    );

    debug!(
        method = %method,
        route = %route,
        latency_ms = %latency_ms,
        "Request latency"
    );
}
