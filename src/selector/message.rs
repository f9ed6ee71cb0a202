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

//! Messages accepted by the selector worker.

use crate::channel;

/// Selector worker control messages.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Message {
    /// Stop the worker loop.
    Stop,
    /// Run a scheduling pass now, without waiting for the next tick.
    RunJobsRequest,
    /// Names of the jobs that were due and have been performed.
    RunJobsResponse { jobs: Vec<String> },
}

/// Selector request sender alias.
pub type SelectorRequestSender = channel::RequestSender<Message, Message>;

/// Selector request receiver alias.
pub type SelectorRequestReceiver = channel::RequestReceiver<Message, Message>;

/// Selector response sender alias.
pub type SelectorResponseSender = channel::ResponseSender<Message>;
