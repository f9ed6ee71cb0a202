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

//! Session registry read interface.
//!
//! The registry owns the QoS node records: it creates them when a session is
//! established and drops them once the session expires.

use crate::qos::QosNode;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// Trait providing the current node roster.
#[cfg_attr(test, automock)]
pub trait SessionRegistry: Send + Sync + 'static {
    /// Every node of every active session.
    fn get_nodes(&self) -> Vec<Arc<QosNode>>;

    /// Nodes of the active sessions for `chain`.
    /// `None` if the chain is unknown to the registry.
    fn get_nodes_by_chain(&self, chain: &str) -> Option<Vec<Arc<QosNode>>>;
}
