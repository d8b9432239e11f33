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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_STATUS: u16 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub routes: Vec<Route>,
}

fn default_address() -> String {
    ":12330".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Log level understood by `EnvFilter`, lower-cased and with the
    /// `warning` alias folded into `warn`. Unknown levels fall back to info.
    pub fn log_level(&self) -> String {
        match self.log_level.to_lowercase().as_str() {
            "" => "info".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" => "error".to_string(),
            _ => "info".to_string(),
        }
    }

    /// Socket address for the listener. A bare `:port` binds every interface.
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_workers() -> usize {
    4
}

fn default_shutdown_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_service_name() -> String {
    "echomock".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_protocol() -> String {
    "grpc".to_string()
}

fn default_sampling_rate() -> f64 {
    1.0
}

fn default_timeout_seconds() -> u64 {
    10
}

/// A declarative response for one `(method, path)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub response_body: String,
    #[serde(default)]
    pub response_header: HashMap<String, String>,
    #[serde(default)]
    pub response_status: u16,
    #[serde(default)]
    pub response_dump: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Route {
    pub fn method(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }

    pub fn status(&self) -> u16 {
        effective_status(self.response_status)
    }
}

/// Header-guarded override of a route's response. Conditions are evaluated
/// in declared order and the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub header_match: HashMap<String, String>,
    #[serde(default)]
    pub response_body: String,
    #[serde(default)]
    pub response_header: HashMap<String, String>,
    #[serde(default)]
    pub response_status: u16,
}

impl Condition {
    pub fn status(&self) -> u16 {
        effective_status(self.response_status)
    }
}

fn effective_status(status: u16) -> u16 {
    if status == 0 {
        DEFAULT_STATUS
    } else {
        status
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: default_service_name(),
            service_version: default_service_version(),
            endpoint: default_endpoint(),
            protocol: default_protocol(),
            sampling_rate: default_sampling_rate(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
