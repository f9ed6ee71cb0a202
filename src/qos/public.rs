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

//! Read-only projection of a QoS node, for operator inspection.

use super::QosNode;
use crate::base::unix_secs;

/// Snapshot of the QoS state of a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicQosNode {
    pub node_public_key: String,
    pub service_url: String,
    pub chain: String,
    pub session_height: u64,
    pub app_public_key: String,
    /// Unix seconds, zero when the node has never been in timeout.
    pub timeout_until: u64,
    /// Empty when the node has never been in timeout.
    pub timeout_reason: String,
    pub last_known_err: String,
    pub is_healthy: bool,
    pub is_synced: bool,
    pub last_known_height: u64,
    pub p90_latency: f64,
}

impl From<&QosNode> for PublicQosNode {
    fn from(node: &QosNode) -> Self {
        PublicQosNode {
            node_public_key: node.public_key().to_owned(),
            service_url: node.service_url().to_owned(),
            chain: node.chain().to_owned(),
            session_height: node.session_height(),
            app_public_key: node.app_public_key().to_owned(),
            timeout_until: node.timeout_until().map(unix_secs).unwrap_or_default(),
            timeout_reason: node
                .timeout_reason()
                .map(|reason| reason.to_string())
                .unwrap_or_default(),
            last_known_err: node.last_known_error_str(),
            is_healthy: node.is_healthy(),
            is_synced: node.is_synced(),
            last_known_height: node.last_known_height(),
            p90_latency: node.latency().p90(),
        }
    }
}
