// This file is part of gateway-qos.
//
// Copyright (C) 2026 The Gateway Team.
//
// gateway-qos is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// gateway-qos is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with gateway-qos. If not, see <https://www.gnu.org/licenses/>.

//! Rolling relay latency statistics.

use crate::base::Mutex;
use std::{collections::VecDeque, time::Duration};

/// Number of samples retained by the tracker.
const MAX_SAMPLES: usize = 1000;

/// Percentile exposed by [LatencyTracker::p90].
const P90: f64 = 0.9;

/// Keeps the most recent relay latencies of a node (in milliseconds).
///
/// Samples are pushed by the relay dispatch layer, the QoS core only reads
/// the percentile.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    samples: Mutex<VecDeque<f64>>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a relay latency, evicting the oldest sample when full.
    pub fn record(&self, latency: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(latency.as_micros() as f64 / 1000.0);
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 90th percentile (nearest rank) of the retained samples.
    /// Zero when no sample has been recorded.
    pub fn p90(&self) -> f64 {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = (P90 * sorted.len() as f64).ceil() as usize;
        sorted[rank.saturating_sub(1)]
    }
}
