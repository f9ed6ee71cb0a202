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

//! Per node, per session QoS record.

use super::LatencyTracker;
use crate::{base::Mutex, Error};
use std::{
    fmt::{Display, Formatter},
    sync::atomic::{AtomicBool, Ordering},
    time::SystemTime,
};

/// Max length (in characters) of the last known error description.
const MAX_ERROR_STR: usize = 100;

/// Chain identifiers served by Solana-family nodes.
const CHAIN_SOLANA: &str = "0006";
const CHAIN_SOLANA_CUSTOM: &str = "C006";

/// Why a node has been put in timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutReason {
    /// Node height lags too far behind the rest of the session.
    #[serde(rename = "out_of_sync_timeout")]
    OutOfSync,
    /// Node returned data not matching the majority of the session.
    #[serde(rename = "invalid_data_timeout")]
    DataIntegrity,
    /// Node exhausted the relays allowed for the session.
    #[serde(rename = "maximum_relays_timeout")]
    MaximumRelays,
    /// Node failed to answer a probe.
    #[serde(rename = "node_response_timeout")]
    NodeResponseTimeout,
}

impl TimeoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutReason::OutOfSync => "out_of_sync_timeout",
            TimeoutReason::DataIntegrity => "invalid_data_timeout",
            TimeoutReason::MaximumRelays => "maximum_relays_timeout",
            TimeoutReason::NodeResponseTimeout => "node_response_timeout",
        }
    }
}

impl Display for TimeoutReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chain family, selects the probes applicable to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Solana,
}

/// Remote node identity as reported by the session dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Node public key (hex).
    pub public_key: String,
    /// Network address used to reach the node.
    pub service_url: String,
}

/// Session the node has been assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    /// 4-characters chain identifier.
    pub chain: String,
    /// Height at which the session has been negotiated.
    pub session_height: u64,
    /// Public key of the application signing the session relays.
    pub app_public_key: String,
}

/// Quarantine field group. Always written as a whole.
#[derive(Debug, Default)]
struct TimeoutState {
    until: Option<SystemTime>,
    reason: Option<TimeoutReason>,
    error: Option<String>,
}

/// Height observation field group.
#[derive(Debug, Default)]
struct HeightState {
    height: u64,
    checked_at: Option<SystemTime>,
}

/// QoS information of a specific node within a session.
///
/// Every field group has its own lock (or atomic), concurrent readers may
/// observe a node between two group updates but never a partially written
/// group.
#[derive(Debug)]
pub struct QosNode {
    node: NodeIdentity,
    session: SessionHeader,
    latency: LatencyTracker,
    synced: AtomicBool,
    timeout: Mutex<TimeoutState>,
    height: Mutex<HeightState>,
    last_data_integrity_check: Mutex<Option<SystemTime>>,
}

impl QosNode {
    /// New node record, unsynced and not in timeout.
    pub fn new(node: NodeIdentity, session: SessionHeader) -> Self {
        QosNode {
            node,
            session,
            latency: LatencyTracker::new(),
            synced: AtomicBool::new(false),
            timeout: Mutex::new(TimeoutState::default()),
            height: Mutex::new(HeightState::default()),
            last_data_integrity_check: Mutex::new(None),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.node.public_key
    }

    pub fn service_url(&self) -> &str {
        &self.node.service_url
    }

    pub fn chain(&self) -> &str {
        &self.session.chain
    }

    pub fn session_height(&self) -> u64 {
        self.session.session_height
    }

    pub fn app_public_key(&self) -> &str {
        &self.session.app_public_key
    }

    /// Relay latency statistics, fed by the relay dispatch layer.
    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// A node is healthy when synced and not in timeout.
    pub fn is_healthy(&self) -> bool {
        self.is_healthy_at(SystemTime::now())
    }

    /// Health evaluated at the given instant.
    pub fn is_healthy_at(&self, now: SystemTime) -> bool {
        self.is_synced() && !self.is_in_timeout_at(now)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Release);
    }

    pub fn is_in_timeout(&self) -> bool {
        self.is_in_timeout_at(SystemTime::now())
    }

    pub fn is_in_timeout_at(&self, now: SystemTime) -> bool {
        match self.timeout.lock().until {
            Some(until) => now < until,
            None => false,
        }
    }

    /// Put the node in timeout up to `until`.
    /// Reason and error are replaced together with the deadline.
    pub fn set_timeout_until(&self, until: SystemTime, reason: TimeoutReason, err: Option<Error>) {
        let mut timeout = self.timeout.lock();
        timeout.until = Some(until);
        timeout.reason = Some(reason);
        timeout.error = err.map(|err| err.to_string_full());
    }

    pub fn timeout_until(&self) -> Option<SystemTime> {
        self.timeout.lock().until
    }

    pub fn timeout_reason(&self) -> Option<TimeoutReason> {
        self.timeout.lock().reason
    }

    /// Last error description, truncated to 100 characters.
    /// Empty if no error has been recorded.
    pub fn last_known_error_str(&self) -> String {
        match self.timeout.lock().error {
            Some(ref err) => err.chars().take(MAX_ERROR_STR).collect(),
            None => String::new(),
        }
    }

    /// Record a height observation along with the observation time.
    pub fn record_height(&self, height: u64, at: SystemTime) {
        let mut state = self.height.lock();
        state.height = height;
        state.checked_at = Some(at);
    }

    pub fn set_last_known_height(&self, height: u64) {
        self.height.lock().height = height;
    }

    pub fn last_known_height(&self) -> u64 {
        self.height.lock().height
    }

    pub fn set_last_height_check_time(&self, at: SystemTime) {
        self.height.lock().checked_at = Some(at);
    }

    pub fn last_height_check_time(&self) -> Option<SystemTime> {
        self.height.lock().checked_at
    }

    pub fn set_last_data_integrity_check_time(&self, at: SystemTime) {
        *self.last_data_integrity_check.lock() = Some(at);
    }

    pub fn last_data_integrity_check_time(&self) -> Option<SystemTime> {
        *self.last_data_integrity_check.lock()
    }

    pub fn chain_family(&self) -> ChainFamily {
        match self.chain() {
            CHAIN_SOLANA | CHAIN_SOLANA_CUSTOM => ChainFamily::Solana,
            _ => ChainFamily::Evm,
        }
    }

    pub fn is_solana_chain(&self) -> bool {
        self.chain_family() == ChainFamily::Solana
    }

    pub fn is_evm_chain(&self) -> bool {
        !self.is_solana_chain()
    }
}
