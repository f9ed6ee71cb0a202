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

use super::{
    message::{Message, SelectorRequestSender},
    worker::SelectorWorker,
};
use crate::{
    base::pick_random,
    channel::confirmed_channel,
    checks::{CheckJob, DataIntegrityCheck, DataIntegrityConfig, HeightCheck, HeightCheckConfig},
    qos::{PublicQosNode, QosNode},
    relay::Relayer,
    session::SessionRegistry,
};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// Default scheduling tick.
pub const JOB_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Node selector service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelectorConfig {
    /// Scheduler tick. Jobs are checked for due-ness at every tick.
    pub job_check_interval: Duration,
    /// Height check parameters.
    pub height_check: HeightCheckConfig,
    /// Data integrity check parameters.
    pub data_integrity_check: DataIntegrityConfig,
}

impl Default for NodeSelectorConfig {
    fn default() -> Self {
        NodeSelectorConfig {
            job_check_interval: JOB_CHECK_INTERVAL,
            height_check: HeightCheckConfig::default(),
            data_integrity_check: DataIntegrityConfig::default(),
        }
    }
}

/// Node selector service data.
pub struct NodeSelectorService<S: SessionRegistry> {
    /// Worker object.
    worker: Option<SelectorWorker<S>>,
    /// Worker thread handler.
    handler: Option<JoinHandle<SelectorWorker<S>>>,
    /// To send messages to worker.
    tx_chan: SelectorRequestSender,
    /// Roster provider, shared with the worker.
    registry: Arc<S>,
    /// To check if the worker thread is still alive.
    canary: Arc<()>,
}

impl<S: SessionRegistry> NodeSelectorService<S> {
    /// Create a new selector service running the height and the data
    /// integrity checks.
    pub fn new<R: Relayer>(config: NodeSelectorConfig, registry: Arc<S>, relayer: Arc<R>) -> Self {
        let jobs: Vec<Box<dyn CheckJob>> = vec![
            Box::new(HeightCheck::new(config.height_check, relayer.clone())),
            Box::new(DataIntegrityCheck::new(config.data_integrity_check, relayer)),
        ];
        Self::with_jobs(config.job_check_interval, registry, jobs)
    }

    /// Create a new selector service running a custom set of jobs.
    pub fn with_jobs(tick: Duration, registry: Arc<S>, jobs: Vec<Box<dyn CheckJob>>) -> Self {
        let (tx_chan, rx_chan) = confirmed_channel::<Message, Message>();
        let worker = SelectorWorker::new(tick, registry.clone(), jobs, rx_chan);

        NodeSelectorService {
            worker: Some(worker),
            handler: None,
            tx_chan,
            registry,
            canary: Arc::new(()),
        }
    }

    /// Start the scheduling loop.
    pub fn start(&mut self) {
        debug!("Starting node selector service");
        let mut worker = match self.worker.take() {
            Some(worker) => worker,
            None => {
                warn!("service was already running");
                return;
            }
        };

        let mut canary = Arc::clone(&self.canary);
        let handle = thread::spawn(move || {
            let _ = Arc::get_mut(&mut canary);
            worker.run_sync();
            worker
        });
        self.handler = Some(handle);
    }

    /// Stop the scheduling loop.
    /// A round in progress is completed before the worker exits.
    pub fn stop(&mut self) {
        debug!("Stopping node selector service");
        match self.handler.take() {
            Some(handle) => {
                // A worker already stopped through a request channel would
                // find this message at the next start.
                if self.is_running() {
                    if let Err(err) = self.tx_chan.send_sync(Message::Stop) {
                        error!("Error stopping node selector thread: {:?}", err);
                    }
                }
                match handle.join() {
                    Ok(worker) => self.worker = Some(worker),
                    Err(_) => error!("node selector thread panicked"),
                }
            }
            None => {
                debug!("service was not running");
            }
        };
    }

    /// Check if service is running.
    pub fn is_running(&self) -> bool {
        // Hack to intercept crashed subthreads.
        Arc::strong_count(&self.canary) == 2 && self.worker.is_none()
    }

    /// Get a clone of the worker input channel.
    pub fn request_channel(&self) -> SelectorRequestSender {
        self.tx_chan.clone()
    }

    /// Pick a random healthy node serving `chain`.
    ///
    /// `None` both when the chain is unknown and when no node of the chain is
    /// healthy; query the registry to tell the two apart.
    pub fn find_node(&self, chain: &str) -> Option<Arc<QosNode>> {
        let nodes = self.registry.get_nodes_by_chain(chain)?;
        let healthy: Vec<Arc<QosNode>> = nodes.into_iter().filter(|node| node.is_healthy()).collect();
        pick_random(&healthy).cloned()
    }

    /// QoS snapshot of every node known to the registry.
    pub fn qos_nodes(&self) -> Vec<PublicQosNode> {
        self.registry
            .get_nodes()
            .iter()
            .map(|node| PublicQosNode::from(node.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        qos::node::tests::{create_healthy_node, create_test_node},
        relay::MockRelayer,
        selector::worker::tests::{create_registry_mock, CountingJob},
        session::MockSessionRegistry,
    };
    use std::{collections::HashSet, sync::atomic::Ordering};

    const LONG_TICK: Duration = Duration::from_secs(3600);

    fn create_selector(nodes: Vec<Arc<QosNode>>) -> NodeSelectorService<MockSessionRegistry> {
        let mut registry = MockSessionRegistry::new();
        let by_chain = nodes.clone();
        registry
            .expect_get_nodes_by_chain()
            .returning(move |chain| match chain {
                "0021" => Some(by_chain.clone()),
                _ => None,
            });
        registry
            .expect_get_nodes()
            .returning(move || nodes.clone());
        NodeSelectorService::with_jobs(LONG_TICK, Arc::new(registry), vec![])
    }

    #[test]
    fn unknown_chain() {
        let selector = create_selector(vec![Arc::new(create_healthy_node("a", "0021", 1))]);

        assert!(selector.find_node("0040").is_none());
    }

    #[test]
    fn known_chain_without_healthy_nodes() {
        let sick = Arc::new(create_healthy_node("b", "0021", 1));
        sick.set_synced(false);
        let selector = create_selector(vec![Arc::new(create_test_node("a", "0021")), sick]);

        assert!(selector.find_node("0021").is_none());
    }

    #[test]
    fn known_chain_empty_roster() {
        let selector = create_selector(vec![]);

        assert!(selector.find_node("0021").is_none());
    }

    #[test]
    fn only_healthy_nodes_are_selected() {
        let quarantined = Arc::new(create_healthy_node("quarantined", "0021", 1));
        quarantined.set_timeout_until(
            std::time::SystemTime::now() + Duration::from_secs(600),
            crate::qos::TimeoutReason::DataIntegrity,
            None,
        );
        let selector = create_selector(vec![
            Arc::new(create_healthy_node("h1", "0021", 1)),
            Arc::new(create_test_node("unsynced", "0021")),
            quarantined,
            Arc::new(create_healthy_node("h2", "0021", 1)),
        ]);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let node = selector.find_node("0021").unwrap();
            assert!(node.is_healthy());
            seen.insert(node.public_key().to_owned());
        }

        let expected: HashSet<String> = ["h1", "h2"].iter().map(|k| k.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn qos_nodes_projection() {
        let selector = create_selector(vec![
            Arc::new(create_healthy_node("h1", "0021", 12)),
            Arc::new(create_test_node("n2", "0021")),
        ]);

        let nodes = selector.qos_nodes();

        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_healthy);
        assert_eq!(nodes[0].last_known_height, 12);
        assert!(!nodes[1].is_healthy);
    }

    #[test]
    fn start_stop() {
        let mut svc =
            NodeSelectorService::with_jobs(LONG_TICK, Arc::new(create_registry_mock(0)), vec![]);

        svc.start();
        assert!(svc.is_running());

        svc.stop();
        assert!(!svc.is_running());
    }

    #[test]
    fn stopped_subthread() {
        let mut svc =
            NodeSelectorService::with_jobs(LONG_TICK, Arc::new(create_registry_mock(0)), vec![]);

        svc.start();
        assert!(svc.is_running());

        svc.tx_chan.send_sync(Message::Stop).unwrap();
        std::thread::sleep(Duration::from_millis(500));

        assert!(!svc.is_running());
        svc.stop();
    }

    #[test]
    fn run_jobs_on_request() {
        let due = CountingJob::new("due", true);
        let idle = CountingJob::new("idle", false);
        let runs = due.runs.clone();
        let roster = due.last_roster.clone();
        let mut svc = NodeSelectorService::with_jobs(
            LONG_TICK,
            Arc::new(create_registry_mock(4)),
            vec![Box::new(due), Box::new(idle)],
        );
        svc.start();

        let res_chan = svc
            .request_channel()
            .send_sync(Message::RunJobsRequest)
            .unwrap();
        let res = res_chan.recv_sync().unwrap();
        svc.stop();

        assert_eq!(
            res,
            Message::RunJobsResponse {
                jobs: vec!["due".to_string()]
            }
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(roster.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn default_jobs_are_registered() {
        let svc = NodeSelectorService::new(
            NodeSelectorConfig::default(),
            Arc::new(create_registry_mock(0)),
            Arc::new(MockRelayer::new()),
        );

        let names = svc.worker.as_ref().unwrap().job_names();

        assert_eq!(names, vec!["height_check", "evm_data_integrity_check"]);
    }

    #[test]
    fn default_config() {
        let config = NodeSelectorConfig::default();

        assert_eq!(config.job_check_interval, Duration::from_secs(1));
        assert_eq!(config.height_check.interval, Duration::from_secs(60));
        assert_eq!(config.height_check.threshold, 100);
        assert_eq!(config.data_integrity_check.interval, Duration::from_secs(1));
        assert_eq!(
            config.data_integrity_check.node_check_interval,
            Duration::from_secs(600)
        );
        assert_eq!(config.data_integrity_check.height_lookback, 25);
        assert_eq!(
            config.data_integrity_check.penalty,
            Duration::from_secs(900)
        );
    }

    #[test]
    fn restart_after_external_stop() {
        let job = CountingJob::new("tick", true);
        let runs = job.runs.clone();
        let mut svc = NodeSelectorService::with_jobs(
            Duration::from_millis(20),
            Arc::new(create_registry_mock(1)),
            vec![Box::new(job)],
        );

        svc.start();
        svc.request_channel().send_sync(Message::Stop).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while svc.is_running() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!svc.is_running());
        svc.stop();

        runs.store(0, Ordering::SeqCst);
        svc.start();
        std::thread::sleep(Duration::from_millis(300));

        assert!(svc.is_running());
        assert!(runs.load(Ordering::SeqCst) > 0);
        svc.stop();
        assert!(!svc.is_running());
    }
}
