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

use crate::config::types::{Condition, Config, Route, TelemetryConfig};
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> anyhow::Result<Config> {
        let mut config: Config =
            serde_yaml::from_str(content).with_context(|| "Failed to parse YAML configuration")?;

        Self::normalize(&mut config);
        Self::validate(&config).context("Invalid configuration")?;

        Ok(config)
    }

    fn normalize(config: &mut Config) {
        if config.address.is_empty() {
            config.address = ":12330".to_string();
        }

        for route in &mut config.routes {
            route.method = route.method().to_uppercase();
        }
    }

    fn validate(config: &Config) -> anyhow::Result<()> {
        if config.server.workers == 0 {
            anyhow::bail!("Number of workers cannot be 0");
        }

        if !matches!(config.log_format.as_str(), "text" | "json") {
            anyhow::bail!(
                "Log format must be 'text' or 'json', got '{}'",
                config.log_format
            );
        }

        if config.telemetry.enabled {
            Self::validate_telemetry_config(&config.telemetry)?;
        }

        let mut seen = HashSet::new();
        for (index, route) in config.routes.iter().enumerate() {
            Self::validate_route(index, route)?;

            if !seen.insert((route.method.as_str(), route.path.as_str())) {
                anyhow::bail!(
                    "route {}: duplicate route {} {}",
                    index,
                    route.method,
                    route.path
                );
            }
        }

        Ok(())
    }

    fn validate_telemetry_config(config: &TelemetryConfig) -> anyhow::Result<()> {
        if config.endpoint.is_empty() {
            anyhow::bail!("Telemetry endpoint cannot be empty");
        }

        let url = url::Url::parse(&config.endpoint).map_err(|_| {
            anyhow::anyhow!("Invalid telemetry endpoint URL format: {}", config.endpoint)
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("Telemetry endpoint must use http:// or https:// scheme");
        }

        if url.host().is_none() {
            anyhow::bail!("Telemetry endpoint must have a host");
        }

        let protocol = config.protocol.to_lowercase();
        if protocol != "http" && protocol != "grpc" {
            anyhow::bail!(
                "Telemetry protocol must be 'http' or 'grpc', got '{}'",
                config.protocol
            );
        }

        if !(0.0..=1.0).contains(&config.sampling_rate) {
            anyhow::bail!("Sampling rate must be between 0.0 and 1.0");
        }

        if config.timeout_seconds == 0 {
            anyhow::bail!("Telemetry timeout must be greater than 0");
        }

        Ok(())
    }

    fn validate_route(index: usize, route: &Route) -> anyhow::Result<()> {
        if route.path.is_empty() {
            anyhow::bail!("route {}: path cannot be empty", index);
        }

        if !route.path.starts_with('/') {
            anyhow::bail!("route {}: path '{}' must begin with '/'", index, route.path);
        }

        Self::validate_path_pattern(&route.path)
            .with_context(|| format!("route {}: path '{}'", index, route.path))?;

        if !ALLOWED_METHODS.contains(&route.method.as_str()) {
            anyhow::bail!("route {}: invalid HTTP method '{}'", index, route.method);
        }

        Self::validate_status(route.response_status)
            .with_context(|| format!("route {}", index))?;
        Self::validate_headers(&route.response_header)
            .with_context(|| format!("route {}", index))?;

        for (position, condition) in route.conditions.iter().enumerate() {
            Self::validate_condition(condition)
                .with_context(|| format!("route {}: condition {}", index, position))?;
        }

        Ok(())
    }

    // Dynamic segments use `{name}` or `{name:regex}`. Braces must pair up
    // and never nest; names must be non-empty and unique within the path.
    fn validate_path_pattern(path: &str) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        let mut segment: Option<String> = None;

        for c in path.chars() {
            match c {
                '{' => {
                    if segment.is_some() {
                        anyhow::bail!("Nested '{{' in path pattern");
                    }
                    segment = Some(String::new());
                }
                '}' => {
                    let Some(inner) = segment.take() else {
                        anyhow::bail!("Unmatched '}}' in path pattern");
                    };
                    let name = inner.split(':').next().unwrap_or_default().trim();
                    if name.is_empty() {
                        anyhow::bail!("Empty segment name in path pattern");
                    }
                    if !names.insert(name.to_string()) {
                        anyhow::bail!("Duplicate segment name '{}' in path pattern", name);
                    }
                }
                _ => {
                    if let Some(inner) = segment.as_mut() {
                        inner.push(c);
                    }
                }
            }
        }

        if segment.is_some() {
            anyhow::bail!("Unclosed '{{' in path pattern");
        }
        Ok(())
    }

    fn validate_condition(condition: &Condition) -> anyhow::Result<()> {
        Self::validate_status(condition.response_status)?;
        Self::validate_headers(&condition.response_header)?;
        Ok(())
    }

    // Zero means "use the default status".
    fn validate_status(status: u16) -> anyhow::Result<()> {
        if status != 0 && !(100..600).contains(&status) {
            anyhow::bail!("Invalid HTTP status code: {}", status);
        }
        Ok(())
    }

    fn validate_headers(headers: &HashMap<String, String>) -> anyhow::Result<()> {
        for (name, value) in headers {
            http::HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid response header name: {:?}", name))?;
            http::HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for response header {:?}", name))?;
        }
        Ok(())
    }
}
