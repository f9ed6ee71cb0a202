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

//! Node selector service.
//!
//! The service owns the check jobs and runs them on a dedicated worker
//! thread, while answering node selection queries directly from the caller
//! thread using the same shared QoS records.
//!
//! The worker can be driven via message passing (see [Message]).

pub mod message;
pub mod service;
pub mod worker;

pub use message::{Message, SelectorRequestReceiver, SelectorRequestSender};
pub use service::{NodeSelectorConfig, NodeSelectorService};
pub use worker::SelectorWorker;
