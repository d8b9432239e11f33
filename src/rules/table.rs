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

use crate::config::Route;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: String,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
        }
    }
}

/// Immutable `(method, path) -> Route` lookup consulted at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<RouteKey, Arc<Route>>,
    // Paths in configuration order, each with its methods in configuration order.
    paths: Vec<(String, Vec<String>)>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        let mut table = Self::default();

        for route in routes {
            let key = RouteKey::new(route.method(), &route.path);
            if table.routes.contains_key(&key) {
                continue;
            }

            match table.paths.iter().position(|(path, _)| *path == key.path) {
                Some(index) => table.paths[index].1.push(key.method.clone()),
                None => table
                    .paths
                    .push((key.path.clone(), vec![key.method.clone()])),
            }
            table.routes.insert(key, Arc::new(route));
        }

        table
    }

    pub fn get(&self, method: &str, path: &str) -> Option<Arc<Route>> {
        self.routes.get(&RouteKey::new(method, path)).cloned()
    }

    /// Configured paths and the methods registered under each.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.paths
            .iter()
            .map(|(path, methods)| (path.as_str(), methods.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: &str, path: &str, body: &str) -> Route {
        Route {
            path: path.to_string(),
            method: method.to_string(),
            response_body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lookup_by_method_and_path() {
        let table = RouteTable::new(vec![
            route("GET", "/api/users", "list"),
            route("POST", "/api/users", "create"),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("GET", "/api/users").unwrap().response_body, "list");
        assert_eq!(
            table.get("POST", "/api/users").unwrap().response_body,
            "create"
        );
        assert!(table.get("DELETE", "/api/users").is_none());
        assert!(table.get("GET", "/api/products").is_none());
    }

    #[test]
    fn test_method_lookup_is_case_insensitive() {
        let table = RouteTable::new(vec![route("GET", "/test", "ok")]);
        assert!(table.get("get", "/test").is_some());
    }

    #[test]
    fn test_empty_method_defaults_to_get() {
        let table = RouteTable::new(vec![route("", "/test", "ok")]);
        assert!(table.get("GET", "/test").is_some());
    }

    #[test]
    fn test_paths_grouped_in_configuration_order() {
        let table = RouteTable::new(vec![
            route("GET", "/b", ""),
            route("GET", "/a", ""),
            route("POST", "/b", ""),
        ]);

        let paths: Vec<(&str, Vec<String>)> = table
            .paths()
            .map(|(path, methods)| (path, methods.to_vec()))
            .collect();

        assert_eq!(
            paths,
            vec![
                ("/b", vec!["GET".to_string(), "POST".to_string()]),
                ("/a", vec!["GET".to_string()]),
            ]
        );
    }

    #[test]
    fn test_first_duplicate_wins() {
        let table = RouteTable::new(vec![
            route("GET", "/dup", "first"),
            route("GET", "/dup", "second"),
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("GET", "/dup").unwrap().response_body, "first");
        assert_eq!(table.paths().count(), 1);
    }

    #[test]
    fn test_empty_table() {
        let table = RouteTable::new(vec![]);
        assert!(table.is_empty());
        assert!(table.get("GET", "/").is_none());
    }
}
