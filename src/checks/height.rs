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

//! Chain height check.
//!
//! Every node of a session is asked for its current chain height. Nodes whose
//! last known height lags more than a threshold behind the highest height
//! observed in the round are flagged as out of sync and put in timeout.
//!
//! A node whose probe fails in a round is still judged against its previous
//! observation: a transient failure does not desync a node, while a node
//! that never answers again eventually falls behind the threshold.

use super::{elapsed_since, group_by_chain, spawn_relays, CheckJob, NodeRelayResponse};
use crate::{
    qos::{ChainFamily, QosNode, TimeoutReason},
    relay::Relayer,
    Error, ErrorKind, Result,
};
use async_std::task;
use futures::future::join_all;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

/// How often the check runs.
pub const HEIGHT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Max blocks a node may lag behind the highest observed height.
pub const DEFAULT_HEIGHT_THRESHOLD: u64 = 100;

/// Timeout applied to out of sync nodes.
pub const OUT_OF_SYNC_PENALTY: Duration = Duration::from_secs(5 * 60);

const EVM_HEIGHT_PAYLOAD: &str = r#"{"jsonrpc":"2.0","method":"eth_blockNumber","params":[],"id":1}"#;
const SOLANA_HEIGHT_PAYLOAD: &str = r#"{"jsonrpc":"2.0","method":"getSlot","params":[],"id":1}"#;

/// Height check configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightCheckConfig {
    /// Minimum time between two rounds.
    pub interval: Duration,
    /// Max tolerated lag in blocks.
    pub threshold: u64,
    /// Timeout applied to lagging nodes.
    pub penalty: Duration,
}

impl Default for HeightCheckConfig {
    fn default() -> Self {
        HeightCheckConfig {
            interval: HEIGHT_CHECK_INTERVAL,
            threshold: DEFAULT_HEIGHT_THRESHOLD,
            penalty: OUT_OF_SYNC_PENALTY,
        }
    }
}

#[derive(Deserialize)]
struct HeightResponse {
    result: serde_json::Value,
}

/// JSON-RPC payload asking a node for its chain height.
pub fn height_payload(family: ChainFamily) -> &'static str {
    match family {
        ChainFamily::Evm => EVM_HEIGHT_PAYLOAD,
        ChainFamily::Solana => SOLANA_HEIGHT_PAYLOAD,
    }
}

/// Extract the height from a JSON-RPC response.
/// Both `0x` prefixed hex strings (EVM) and plain numbers (Solana) are accepted.
pub fn parse_height_response(response: &str) -> Result<u64> {
    let response: HeightResponse = serde_json::from_str(response)?;
    match response.result {
        serde_json::Value::String(ref hex) => {
            let digits = hex
                .strip_prefix("0x")
                .ok_or_else(|| Error::new_ext(ErrorKind::MalformedData, "missing hex prefix"))?;
            u64::from_str_radix(digits, 16)
                .map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
        }
        serde_json::Value::Number(ref number) => number
            .as_u64()
            .ok_or_else(|| Error::new_ext(ErrorKind::MalformedData, "invalid height")),
        _ => Err(Error::new_ext(
            ErrorKind::MalformedData,
            "unexpected height result",
        )),
    }
}

/// Height check job.
pub struct HeightCheck<R: Relayer> {
    config: HeightCheckConfig,
    relayer: Arc<R>,
    nodes: Vec<Arc<QosNode>>,
    last_checked: Option<SystemTime>,
}

impl<R: Relayer> HeightCheck<R> {
    pub fn new(config: HeightCheckConfig, relayer: Arc<R>) -> Self {
        HeightCheck {
            config,
            relayer,
            nodes: vec![],
            last_checked: None,
        }
    }

    /// Completion time of the last round.
    pub fn last_checked(&self) -> Option<SystemTime> {
        self.last_checked
    }

    async fn check_chain(&self, chain: &str, nodes: &[Arc<QosNode>]) {
        let family = match nodes.first() {
            Some(node) => node.chain_family(),
            None => return,
        };
        let handles = spawn_relays(&self.relayer, chain, nodes, height_payload(family));

        // Wait every node before taking any decision.
        let responses: Vec<NodeRelayResponse> = join_all(handles).await;

        let now = SystemTime::now();
        let mut highest_height: Option<u64> = None;
        for rsp in responses {
            let height = rsp
                .relay
                .and_then(|relay| parse_height_response(&relay.response));
            match height {
                Ok(height) => {
                    rsp.node.record_height(height, now);
                    highest_height = Some(highest_height.map_or(height, |h| h.max(height)));
                }
                Err(err) => {
                    debug!(
                        "[height-check] node {} height probe failed: {}",
                        rsp.node.service_url(),
                        err.to_string_full()
                    );
                }
            }
        }

        let highest_height = match highest_height {
            Some(height) => height,
            None => {
                warn!(
                    "[height-check] no node answered for chain {}, sync state left unchanged",
                    chain
                );
                return;
            }
        };

        for node in nodes {
            self.judge_node(node, highest_height, now);
        }
    }

    fn judge_node(&self, node: &QosNode, highest_height: u64, now: SystemTime) {
        // A node never observed is judged from height zero.
        let observed = node.last_height_check_time().is_some();
        let node_height = node.last_known_height();
        let lag = highest_height.saturating_sub(node_height);
        if lag > self.config.threshold {
            info!(
                "[height-check] node {} out of sync: height {} ({} blocks behind {})",
                node.service_url(),
                node_height,
                lag,
                highest_height
            );
            node.set_synced(false);
            node.set_timeout_until(
                now + self.config.penalty,
                TimeoutReason::OutOfSync,
                Some(Error::new_ext(
                    ErrorKind::Other,
                    format!(
                        "height {} is {} blocks behind {}",
                        node_height, lag, highest_height
                    ),
                )),
            );
        } else {
            // Without an observation the node cannot be trusted yet.
            node.set_synced(observed);
        }
    }
}

impl<R: Relayer> CheckJob for HeightCheck<R> {
    fn name(&self) -> &'static str {
        "height_check"
    }

    fn should_run(&self, now: SystemTime) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => elapsed_since(now, last)
                .map(|elapsed| elapsed > self.config.interval)
                .unwrap_or(false),
        }
    }

    fn set_nodes(&mut self, nodes: Vec<Arc<QosNode>>) {
        self.nodes = nodes;
    }

    fn perform(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        let groups = group_by_chain(nodes);
        task::block_on(async {
            for (chain, nodes) in groups.iter() {
                self.check_chain(chain, nodes).await;
            }
        });
        self.last_checked = Some(SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::simple_channel,
        checks::tests::create_relayer_mock,
        qos::node::tests::{create_healthy_node, create_test_node},
        relay::{MockRelayer, RelayResponse},
    };
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    fn height_json(height: u64) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":"0x{:x}"}}"#, height)
    }

    fn create_check(heights: HashMap<&'static str, u64>) -> HeightCheck<MockRelayer> {
        let relayer = create_relayer_mock(move |target| match heights.get(target) {
            Some(height) => Ok(height_json(*height)),
            None => Err(Error::new_ext(ErrorKind::BadNetwork, "unreachable")),
        });
        HeightCheck::new(HeightCheckConfig::default(), Arc::new(relayer))
    }

    fn create_nodes(keys: &[&str], chain: &str) -> Vec<Arc<QosNode>> {
        keys.iter()
            .map(|key| Arc::new(create_test_node(key, chain)))
            .collect()
    }

    #[test]
    fn parse_evm_height() {
        assert_eq!(parse_height_response(&height_json(0x1b4)).unwrap(), 0x1b4);
    }

    #[test]
    fn parse_solana_height() {
        let height = parse_height_response(r#"{"jsonrpc":"2.0","result":1234,"id":1}"#).unwrap();

        assert_eq!(height, 1234);
    }

    #[test]
    fn parse_bad_height() {
        for rsp in [
            r#"{"result":"1b4"}"#,
            r#"{"result":"0xzz"}"#,
            r#"{"result":null}"#,
            r#"{"error":{"code":-32000}}"#,
            "<html>bad gateway</html>",
        ] {
            let err = parse_height_response(rsp).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedData);
        }
    }

    #[test]
    fn payload_by_family() {
        assert!(height_payload(ChainFamily::Evm).contains("eth_blockNumber"));
        assert!(height_payload(ChainFamily::Solana).contains("getSlot"));
    }

    #[test]
    fn nodes_within_threshold_are_synced() {
        let mut check = create_check(HashMap::from([("a", 100), ("b", 100), ("c", 50)]));
        let nodes = create_nodes(&["a", "b", "c"], "0021");

        check.set_nodes(nodes.clone());
        check.perform();

        for node in nodes.iter() {
            assert!(node.is_synced());
            assert!(node.is_healthy());
            assert!(node.timeout_reason().is_none());
            assert!(node.last_height_check_time().is_some());
        }
        assert_eq!(nodes[2].last_known_height(), 50);
    }

    #[test]
    fn lagging_node_is_out_of_sync() {
        let mut check = create_check(HashMap::from([("a", 1000), ("b", 10)]));
        let nodes = create_nodes(&["a", "b"], "0021");
        let before = SystemTime::now();

        check.set_nodes(nodes.clone());
        check.perform();

        assert!(nodes[0].is_synced());
        assert!(nodes[0].is_healthy());
        assert!(!nodes[1].is_synced());
        assert!(!nodes[1].is_healthy());
        assert_eq!(nodes[1].timeout_reason(), Some(TimeoutReason::OutOfSync));
        assert!(nodes[1].timeout_until().unwrap() >= before + OUT_OF_SYNC_PENALTY);
        assert!(nodes[1].timeout_until().unwrap() > SystemTime::now());
        assert!(nodes[1].last_known_error_str().contains("990 blocks behind"));
    }

    #[test]
    fn lag_equal_to_threshold_is_tolerated() {
        let mut check = create_check(HashMap::from([("a", 200), ("b", 100)]));
        let nodes = create_nodes(&["a", "b"], "0021");

        check.set_nodes(nodes.clone());
        check.perform();

        assert!(nodes[1].is_synced());
    }

    #[test]
    fn failed_probe_judged_on_stale_height_within_threshold() {
        let mut check = create_check(HashMap::from([("a", 1050), ("b", 1000)]));
        let stale = Arc::new(create_healthy_node("stale", "0021", 990));
        let mut nodes = create_nodes(&["a", "b"], "0021");
        nodes.push(stale.clone());

        check.set_nodes(nodes);
        check.perform();

        assert!(stale.is_synced());
        assert!(stale.is_healthy());
        assert_eq!(stale.last_known_height(), 990);
    }

    #[test]
    fn failed_probe_judged_on_stale_height_far_behind() {
        let mut check = create_check(HashMap::from([("a", 5000)]));
        let stale = Arc::new(create_healthy_node("stale", "0021", 3000));
        let nodes = vec![create_nodes(&["a"], "0021").remove(0), stale.clone()];

        check.set_nodes(nodes);
        check.perform();

        assert!(!stale.is_synced());
        assert_eq!(stale.timeout_reason(), Some(TimeoutReason::OutOfSync));
    }

    #[test]
    fn never_observed_node_stays_unsynced() {
        let mut check = create_check(HashMap::from([("a", 20)]));
        let nodes = create_nodes(&["a", "mute"], "0021");

        check.set_nodes(nodes.clone());
        check.perform();

        assert!(nodes[0].is_synced());
        assert!(!nodes[1].is_synced());
        assert!(nodes[1].timeout_reason().is_none());
    }

    #[test]
    fn never_observed_node_far_behind_is_out_of_sync() {
        let mut check = create_check(HashMap::from([("a", 5000)]));
        let nodes = create_nodes(&["a", "mute"], "0021");
        let before = SystemTime::now();

        check.set_nodes(nodes.clone());
        check.perform();

        let mute = &nodes[1];
        assert!(!mute.is_synced());
        assert_eq!(mute.timeout_reason(), Some(TimeoutReason::OutOfSync));
        assert!(mute.timeout_until().unwrap() >= before + OUT_OF_SYNC_PENALTY);
        assert!(mute.last_known_error_str().contains("5000 blocks behind 5000"));
        assert!(mute.last_height_check_time().is_none());
    }

    #[test]
    fn round_waits_for_slow_node_before_judging() {
        let (release_tx_chan, release_rx_chan) = simple_channel::<()>();
        let answered = Arc::new(AtomicUsize::new(0));
        let fast_answered = answered.clone();
        let relayer = create_relayer_mock(move |target| match target {
            "slow" => {
                let _ = release_rx_chan.recv_sync();
                Ok(height_json(1000))
            }
            "a" => {
                fast_answered.fetch_add(1, Ordering::SeqCst);
                Ok(height_json(1000))
            }
            _ => {
                fast_answered.fetch_add(1, Ordering::SeqCst);
                Ok(height_json(10))
            }
        });
        let mut check = HeightCheck::new(HeightCheckConfig::default(), Arc::new(relayer));
        let lagging = Arc::new(create_healthy_node("b", "0021", 10));
        let mut nodes = create_nodes(&["a", "slow"], "0021");
        nodes.push(lagging.clone());

        check.set_nodes(nodes.clone());
        let handle = std::thread::spawn(move || check.perform());

        let deadline = Instant::now() + Duration::from_secs(5);
        while answered.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(answered.load(Ordering::SeqCst), 2);
        assert!(nodes[0].last_height_check_time().is_none());
        assert!(lagging.is_synced());
        assert!(lagging.timeout_reason().is_none());

        release_tx_chan.send_sync(()).unwrap();
        handle.join().unwrap();

        assert!(nodes[0].is_synced());
        assert!(nodes[1].is_synced());
        assert!(!lagging.is_synced());
        assert_eq!(lagging.timeout_reason(), Some(TimeoutReason::OutOfSync));
    }

    #[test]
    fn silent_round_leaves_state_unchanged() {
        let mut check = create_check(HashMap::new());
        let node = Arc::new(create_healthy_node("n", "0021", 10));

        check.set_nodes(vec![node.clone()]);
        check.perform();

        assert!(node.is_synced());
        assert!(check.last_checked().is_some());
    }

    #[test]
    fn chains_are_judged_separately() {
        let mut check = create_check(HashMap::from([("eth", 15_000_000), ("poly", 40_000)]));
        let mut nodes = create_nodes(&["eth"], "0021");
        nodes.extend(create_nodes(&["poly"], "0009"));

        check.set_nodes(nodes.clone());
        check.perform();

        assert!(nodes[0].is_synced());
        assert!(nodes[1].is_synced());
    }

    #[test]
    fn solana_nodes_use_slot_probe() {
        let mut relayer = MockRelayer::new();
        relayer
            .expect_send_relay()
            .withf(|req| req.payload.data.contains("getSlot") && req.chain == "0006")
            .times(2)
            .returning(|_| {
                Ok(RelayResponse {
                    response: r#"{"jsonrpc":"2.0","result":777,"id":1}"#.to_string(),
                })
            });
        let mut check = HeightCheck::new(HeightCheckConfig::default(), Arc::new(relayer));
        let nodes = create_nodes(&["s1", "s2"], "0006");

        check.set_nodes(nodes.clone());
        check.perform();

        assert!(nodes.iter().all(|node| node.is_synced()));
        assert_eq!(nodes[0].last_known_height(), 777);
    }

    #[test]
    fn cooldown() {
        let mut check = create_check(HashMap::new());
        let now = SystemTime::now();
        assert!(check.should_run(now));

        check.set_nodes(vec![]);
        check.perform();

        let last = check.last_checked().unwrap();
        assert!(!check.should_run(last));
        assert!(!check.should_run(last + HEIGHT_CHECK_INTERVAL));
        assert!(check.should_run(last + HEIGHT_CHECK_INTERVAL + Duration::from_secs(1)));
    }

    #[test]
    fn nodes_are_not_retained_after_round() {
        let mut check = create_check(HashMap::from([("a", 1)]));
        let node = Arc::new(create_test_node("a", "0021"));

        check.set_nodes(vec![node.clone()]);
        check.perform();

        assert_eq!(Arc::strong_count(&node), 1);
    }
}
