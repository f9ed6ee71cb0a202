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

//! Quality-of-service node state.
//!
//! A [QosNode] is created by the session registry when a session is
//! established and dropped when the session expires. Checks and the node
//! selector only hold shared references and mutate the node through its
//! field-group entry points.

pub mod latency;
pub mod node;
pub mod public;

pub use latency::LatencyTracker;
pub use node::{ChainFamily, NodeIdentity, QosNode, SessionHeader, TimeoutReason};
pub use public::PublicQosNode;
