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

//! Cross-node data integrity check.
//!
//! There is no external source of truth: a random healthy node of the session
//! provides the reference height, then the eligible nodes are asked for the
//! hash of a block slightly behind that height. The most reported hash wins
//! and every node disagreeing with it is put in timeout.
//!
//! Only EVM chains are checked.

use super::{
    elapsed_since, find_random_healthy_node, group_by_chain, punish_node, send_relays_async,
    CheckJob,
};
use crate::{
    qos::{QosNode, TimeoutReason},
    relay::Relayer,
    Error, ErrorKind, Result,
};
use async_std::task;
use futures::StreamExt;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Timeout applied to nodes not matching the majority block hash.
pub const DATA_INTEGRITY_PENALTY: Duration = Duration::from_secs(15 * 60);

/// Minimum time between two probes of the same node.
pub const DATA_INTEGRITY_NODE_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// How often the job runs.
pub const DATA_INTEGRITY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Distance from the reference height of the probed block.
pub const DATA_INTEGRITY_HEIGHT_LOOKBACK: u64 = 25;

/// Data integrity check configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIntegrityConfig {
    /// Time between two completed rounds.
    pub interval: Duration,
    /// Minimum time between two probes of the same node.
    pub node_check_interval: Duration,
    /// Probed block distance from the reference node height.
    pub height_lookback: u64,
    /// Timeout applied to divergent nodes.
    pub penalty: Duration,
}

impl Default for DataIntegrityConfig {
    fn default() -> Self {
        DataIntegrityConfig {
            interval: DATA_INTEGRITY_CHECK_INTERVAL,
            node_check_interval: DATA_INTEGRITY_NODE_CHECK_INTERVAL,
            height_lookback: DATA_INTEGRITY_HEIGHT_LOOKBACK,
            penalty: DATA_INTEGRITY_PENALTY,
        }
    }
}

#[derive(Deserialize)]
struct BlockByNumberResponse {
    result: Option<BlockHeader>,
}

#[derive(Deserialize)]
struct BlockHeader {
    hash: Option<String>,
}

/// `eth_getBlockByNumber` payload, transactions hashes only.
pub fn block_by_number_payload(height: u64) -> String {
    format!(
        r#"{{"jsonrpc":"2.0","method":"eth_getBlockByNumber","params":["0x{:x}", false],"id":1}}"#,
        height
    )
}

/// Extract the (lowercase) block hash from a `eth_getBlockByNumber` response.
pub fn parse_block_hash(response: &str) -> Result<String> {
    let response: BlockByNumberResponse = serde_json::from_str(response)?;
    let hash = response
        .result
        .and_then(|block| block.hash)
        .ok_or_else(|| Error::new_ext(ErrorKind::MalformedData, "missing block hash"))?;
    let digits = hash
        .strip_prefix("0x")
        .ok_or_else(|| Error::new_ext(ErrorKind::MalformedData, "missing hex prefix"))?;
    if digits.is_empty() {
        return Err(Error::new_ext(ErrorKind::MalformedData, "empty block hash"));
    }
    hex::decode(digits).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))?;
    Ok(hash.to_ascii_lowercase())
}

/// Hash with the highest number of occurrences.
///
/// On a tie the lowest hash wins, so that the outcome never depends on the
/// order the responses arrived in.
pub fn find_majority_block_hash(counts: &HashMap<String, usize>) -> Option<&str> {
    counts
        .iter()
        .max_by(|(hash_a, count_a), (hash_b, count_b)| {
            count_a.cmp(count_b).then_with(|| hash_b.cmp(hash_a))
        })
        .map(|(hash, _)| hash.as_str())
}

/// Data integrity check job.
pub struct DataIntegrityCheck<R: Relayer> {
    config: DataIntegrityConfig,
    relayer: Arc<R>,
    nodes: Vec<Arc<QosNode>>,
    next_check_time: Option<SystemTime>,
}

impl<R: Relayer> DataIntegrityCheck<R> {
    pub fn new(config: DataIntegrityConfig, relayer: Arc<R>) -> Self {
        DataIntegrityCheck {
            config,
            relayer,
            nodes: vec![],
            next_check_time: None,
        }
    }

    /// Earliest time of the next round, `None` if no round completed yet.
    pub fn next_check_time(&self) -> Option<SystemTime> {
        self.next_check_time
    }

    /// Healthy nodes not checked within the node check interval.
    fn eligible_nodes(&self, nodes: &[Arc<QosNode>], now: SystemTime) -> Vec<Arc<QosNode>> {
        nodes
            .iter()
            .filter(|node| {
                let due = match node.last_data_integrity_check_time() {
                    None => true,
                    Some(last) => elapsed_since(now, last)
                        .map(|elapsed| elapsed >= self.config.node_check_interval)
                        .unwrap_or(false),
                };
                due && node.is_healthy_at(now)
            })
            .cloned()
            .collect()
    }

    /// Run a round over the nodes of a single chain.
    /// Returns false if the round has been aborted for lack of a trusted node.
    async fn check_chain(&self, chain: &str, nodes: &[Arc<QosNode>]) -> bool {
        let source_of_truth = match find_random_healthy_node(nodes) {
            Some(node) => node,
            None => {
                warn!(
                    "[integrity-check] cannot find source of truth for chain {}",
                    chain
                );
                return false;
            }
        };

        let height = source_of_truth
            .last_known_height()
            .saturating_sub(self.config.height_lookback);
        let eligible = self.eligible_nodes(nodes, SystemTime::now());
        debug!(
            "[integrity-check] chain {}: probing {} nodes at height {}",
            chain,
            eligible.len(),
            height
        );

        let payload = block_by_number_payload(height);
        let mut rx_chan = send_relays_async(&self.relayer, chain, &eligible, &payload);

        let mut hash_counts: HashMap<String, usize> = HashMap::new();
        let mut node_hashes: Vec<(Arc<QosNode>, String)> = vec![];
        while let Some(rsp) = rx_chan.next().await {
            let hash = rsp.relay.and_then(|relay| parse_block_hash(&relay.response));
            match hash {
                Ok(hash) => {
                    rsp.node.set_last_data_integrity_check_time(SystemTime::now());
                    *hash_counts.entry(hash.clone()).or_default() += 1;
                    node_hashes.push((rsp.node, hash));
                }
                Err(err) => punish_node(&rsp.node, err),
            }
        }

        let majority_hash = match find_majority_block_hash(&hash_counts) {
            Some(hash) => hash,
            None => return true,
        };

        let now = SystemTime::now();
        for (node, hash) in node_hashes {
            if hash != majority_hash {
                error!(
                    "[integrity-check] punishing node {}: block {} hash {}, majority {}",
                    node.service_url(),
                    height,
                    hash,
                    majority_hash
                );
                node.set_timeout_until(
                    now + self.config.penalty,
                    TimeoutReason::DataIntegrity,
                    Some(Error::new_ext(
                        ErrorKind::BrokenIntegrity,
                        format!("block {} hash {}", height, hash),
                    )),
                );
            }
        }
        true
    }
}

impl<R: Relayer> CheckJob for DataIntegrityCheck<R> {
    fn name(&self) -> &'static str {
        "evm_data_integrity_check"
    }

    fn should_run(&self, now: SystemTime) -> bool {
        match self.next_check_time {
            None => true,
            Some(next) => now > next,
        }
    }

    fn set_nodes(&mut self, nodes: Vec<Arc<QosNode>>) {
        self.nodes = nodes;
    }

    fn perform(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        let groups = group_by_chain(nodes.into_iter().filter(|node| node.is_evm_chain()));

        let completed = task::block_on(async {
            let mut completed = false;
            for (chain, nodes) in groups.iter() {
                completed |= self.check_chain(chain, nodes).await;
            }
            completed
        });

        // Without a trusted node the round is retried at the next tick.
        if completed {
            self.next_check_time = Some(SystemTime::now() + self.config.interval);
        }
    }
}
