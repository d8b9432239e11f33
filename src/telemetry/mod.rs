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

pub mod attributes;
pub mod metrics;
pub mod tracer;

pub use metrics::{init_metrics, record_aborted, record_latency, record_request};
pub use tracer::{init_tracing, tracing_middleware};

use crate::config::{Config, TelemetryConfig};
use anyhow::Context;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProtocol {
    Grpc,
    Http,
}

impl ExportProtocol {
    /// Anything other than `http` exports over gRPC.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        if config.protocol.eq_ignore_ascii_case("http") {
            ExportProtocol::Http
        } else {
            ExportProtocol::Grpc
        }
    }
}

/// OTLP/HTTP endpoint for one signal (`traces`, `logs`, `metrics`).
pub fn signal_endpoint(endpoint: &str, signal: &str) -> String {
    let suffix = format!("/v1/{}", signal);
    if endpoint.contains(&suffix) {
        endpoint.to_string()
    } else {
        format!("{}{}", endpoint.trim_end_matches('/'), suffix)
    }
}

#[cfg(feature = "otel")]
pub(crate) fn otel_resource(config: &TelemetryConfig) -> opentelemetry_sdk::Resource {
    opentelemetry_sdk::Resource::builder()
        .with_attributes(vec![
            attributes::kv::service_name(config.service_name.clone()),
            attributes::kv::service_version(config.service_version.clone()),
        ])
        .build()
}

pub async fn init_telemetry(config: &Config) -> anyhow::Result<()> {
    init_tracing(config)
        .await
        .context("Failed to initialize tracing")?;

    init_metrics(&config.telemetry)
        .await
        .context("Failed to initialize metrics")?;

    if config.telemetry.enabled {
        info!(
            service_name = %config.telemetry.service_name,
            endpoint = %config.telemetry.endpoint,
            "Telemetry initialized"
        );
    }
    Ok(())
}

pub async fn shutdown_telemetry() {
    info!("Shutting down telemetry");
    metrics::shutdown_metrics();
    tracer::shutdown_tracing();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_telemetry_disabled() {
        let config = Config::default();
        assert!(init_telemetry(&config).await.is_ok());
        shutdown_telemetry().await;
    }

    #[test]
    fn test_export_protocol() {
        let mut config = TelemetryConfig::default();
        assert_eq!(ExportProtocol::from_config(&config), ExportProtocol::Grpc);

        config.protocol = "HTTP".to_string();
        assert_eq!(ExportProtocol::from_config(&config), ExportProtocol::Http);
    }

    #[test]
    fn test_signal_endpoint() {
        assert_eq!(
            signal_endpoint("http://localhost:4318", "traces"),
            "http://localhost:4318/v1/traces"
        );
        assert_eq!(
            signal_endpoint("http://localhost:4318/", "logs"),
            "http://localhost:4318/v1/logs"
        );
        assert_eq!(
            signal_endpoint("http://collector/v1/metrics", "metrics"),
            "http://collector/v1/metrics"
        );
    }
}
