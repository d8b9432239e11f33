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

use crate::rules::delay::Delay;
use crate::utils::Shutdown;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    Cancelled,
}

/// Waits out a request delay unless the process starts shutting down first.
///
/// Each call owns its own timer; waits on concurrent requests are independent.
#[derive(Debug, Clone)]
pub struct CancellableSleeper {
    shutdown: Shutdown,
}

impl CancellableSleeper {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }

    pub async fn sleep(&self, delay: Delay) -> SleepOutcome {
        let Some(wait) = delay.to_wait() else {
            return SleepOutcome::Completed;
        };

        let mut listener = self.shutdown.listener();
        // The losing branch is dropped on return, which releases the timer.
        tokio::select! {
            _ = tokio::time::sleep(wait) => SleepOutcome::Completed,
            _ = listener.wait() => {
                debug!(remaining_delay = %delay, "Request delay cancelled due to server shutdown");
                SleepOutcome::Cancelled
            }
        }
    }
}
