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

use crate::config::Condition;
use std::collections::BTreeMap;

pub struct ConditionMatcher;

impl ConditionMatcher {
    /// Index of the first condition whose required headers are all present
    /// in the request, or `None` so the caller falls back to route defaults.
    pub fn find_match(
        conditions: &[Condition],
        request_headers: &BTreeMap<String, String>,
    ) -> Option<usize> {
        conditions
            .iter()
            .position(|condition| Self::matches(condition, request_headers))
    }

    /// Header names compare case-insensitively, values byte-for-byte.
    /// An empty `header_match` matches every request.
    pub fn matches(condition: &Condition, request_headers: &BTreeMap<String, String>) -> bool {
        condition
            .header_match
            .iter()
            .all(|(expected_name, expected_value)| {
                request_headers.iter().any(|(name, value)| {
                    name.eq_ignore_ascii_case(expected_name) && value == expected_value
                })
            })
    }
}
