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

//! Quality-of-service core of a relay gateway.
//!
//! Nodes serving a session are untrusted: they may be slow, stale or plainly
//! dishonest. The crate keeps a QoS record per node, periodically probes the
//! nodes (chain height and cross-node data integrity checks) and hands out
//! only the nodes believed healthy.
//!
//! The session registry and the relay transport are external collaborators,
//! plugged in through the [SessionRegistry] and [Relayer] traits.

// External crates macros.
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// Public modules.
pub mod base;
pub mod channel;
pub mod checks;
pub mod error;
pub mod qos;
pub mod relay;
pub mod selector;
pub mod session;

pub use checks::CheckJob;
pub use error::{Error, ErrorKind, Result};
pub use qos::{PublicQosNode, QosNode, TimeoutReason};
pub use relay::{Relayer, RelayRequest, RelayResponse};
pub use selector::{NodeSelectorConfig, NodeSelectorService};
pub use session::SessionRegistry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
