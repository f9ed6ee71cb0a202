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

//! Periodic QoS check jobs.
//!
//! A check job is handed the current roster by the node selector scheduler
//! and, when due, probes the nodes and updates their QoS records. Jobs never
//! report failures to the scheduler: every node level error ends up in the
//! node timeout state.
//!
//! Available checks:
//! - height: marks nodes lagging behind the session tip as out of sync.
//! - data_integrity: cross validates block hashes among the session nodes.

pub mod data_integrity;
pub mod height;

pub use data_integrity::{DataIntegrityCheck, DataIntegrityConfig};
pub use height::{HeightCheck, HeightCheckConfig};

use crate::{
    base::pick_random,
    channel::{bounded_channel, Receiver},
    qos::{QosNode, TimeoutReason},
    relay::{Payload, RelayRequest, RelayResponse, Relayer},
    ErrorKind, Error, Result,
};
use async_std::task::{self, JoinHandle};
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Penalty for a node failing to answer (or answering garbage) to a probe.
pub const NODE_RESPONSE_PENALTY: Duration = Duration::from_secs(5 * 60);

/// Penalty for a node that exhausted its session relays.
pub const MAXIMUM_RELAYS_PENALTY: Duration = Duration::from_secs(60 * 60);

/// Unit of periodic work over a set of QoS nodes.
///
/// New checks are plugged into the node selector by implementing this trait.
pub trait CheckJob: Send {
    /// Stable job identifier.
    fn name(&self) -> &'static str;

    /// Cooldown gate. A job that never completed a round is always due.
    fn should_run(&self, now: SystemTime) -> bool;

    /// Replace the working node set for the next round.
    fn set_nodes(&mut self, nodes: Vec<Arc<QosNode>>);

    /// Run one round, updating the nodes records.
    fn perform(&mut self);
}

/// Outcome of a relay sent to a specific node.
pub(crate) struct NodeRelayResponse {
    pub node: Arc<QosNode>,
    pub relay: Result<RelayResponse>,
}

/// Spawn one relay task per node. Every task resolves to the node response.
///
/// The relayer is blocking, each relay runs on the async-std blocking pool
/// so that a hung node never stalls the others.
pub(crate) fn spawn_relays<R: Relayer>(
    relayer: &Arc<R>,
    chain: &str,
    nodes: &[Arc<QosNode>],
    payload: &str,
) -> Vec<JoinHandle<NodeRelayResponse>> {
    nodes
        .iter()
        .map(|node| {
            let relayer = relayer.clone();
            let node = node.clone();
            let request = RelayRequest {
                payload: Payload::json_rpc(payload.to_owned()),
                chain: chain.to_owned(),
                selected_node_pub_key: Some(node.public_key().to_owned()),
            };
            task::spawn(async move {
                let relay = task::spawn_blocking(move || relayer.send_relay(&request)).await;
                NodeRelayResponse { node, relay }
            })
        })
        .collect()
}

/// Same as `spawn_relays`, but funnels the responses through a channel as
/// soon as they are available.
///
/// The channel capacity matches the dispatched count, so no relay task ever
/// blocks on a slow consumer. The channel is closed once every dispatched
/// relay has been delivered.
pub(crate) fn send_relays_async<R: Relayer>(
    relayer: &Arc<R>,
    chain: &str,
    nodes: &[Arc<QosNode>],
    payload: &str,
) -> Receiver<NodeRelayResponse> {
    let (tx_chan, rx_chan) = bounded_channel(nodes.len());
    for handle in spawn_relays(relayer, chain, nodes, payload) {
        let tx_chan = tx_chan.clone();
        task::spawn(async move {
            let response = handle.await;
            if tx_chan.send(response).await.is_err() {
                warn!("[checks] relay response dropped, receiver gone");
            }
        });
    }
    rx_chan
}

/// Default punishment for a node that failed a probe.
pub(crate) fn punish_node(node: &QosNode, err: Error) {
    let (reason, penalty) = match err.kind {
        ErrorKind::MaximumRelays => (TimeoutReason::MaximumRelays, MAXIMUM_RELAYS_PENALTY),
        _ => (TimeoutReason::NodeResponseTimeout, NODE_RESPONSE_PENALTY),
    };
    debug!(
        "[checks] punishing node {} ({}): {}",
        node.service_url(),
        reason,
        err.to_string_full()
    );
    node.set_timeout_until(SystemTime::now() + penalty, reason, Some(err));
}

/// Partition the roster by chain identifier.
pub(crate) fn group_by_chain(
    nodes: impl IntoIterator<Item = Arc<QosNode>>,
) -> BTreeMap<String, Vec<Arc<QosNode>>> {
    let mut groups: BTreeMap<String, Vec<Arc<QosNode>>> = BTreeMap::new();
    for node in nodes {
        groups.entry(node.chain().to_owned()).or_default().push(node);
    }
    groups
}

/// Random healthy node of the set.
pub(crate) fn find_random_healthy_node(nodes: &[Arc<QosNode>]) -> Option<Arc<QosNode>> {
    let healthy: Vec<&Arc<QosNode>> = nodes.iter().filter(|node| node.is_healthy()).collect();
    pick_random(&healthy).map(|node| Arc::clone(*node))
}

/// Elapsed time since `past`, `None` if `past` is in the future.
pub(crate) fn elapsed_since(now: SystemTime, past: SystemTime) -> Option<Duration> {
    now.duration_since(past).ok()
}
