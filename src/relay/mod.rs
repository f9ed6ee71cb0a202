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

//! Relay sending capability.
//!
//! Delivering a signed relay to a node is the job of the relay transport,
//! the QoS core only needs a way to send a payload to one specific node of a
//! session and get back the raw node response.

use crate::Result;

#[cfg(test)]
use mockall::automock;

/// HTTP method used by JSON-RPC probes.
pub const POST_METHOD: &str = "POST";

/// Relay payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Request body.
    pub data: String,
    /// HTTP method.
    pub method: String,
    /// Optional path appended to the node chain endpoint.
    pub path: Option<String>,
}

impl Payload {
    /// JSON-RPC payload, always posted to the chain endpoint root.
    pub fn json_rpc(data: String) -> Self {
        Payload {
            data,
            method: POST_METHOD.to_owned(),
            path: None,
        }
    }
}

/// Relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub payload: Payload,
    /// Chain identifier.
    pub chain: String,
    /// When set the relay must be delivered to this node, no load balancing.
    pub selected_node_pub_key: Option<String>,
}

/// Raw node response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub response: String,
}

/// Trait providing the relay transport.
///
/// Implementations are expected to enforce their own request timeout, a call
/// may otherwise block the calling task indefinitely.
#[cfg_attr(test, automock)]
pub trait Relayer: Send + Sync + 'static {
    /// Send a relay and wait for the node response.
    fn send_relay(&self, request: &RelayRequest) -> Result<RelayResponse>;
}
