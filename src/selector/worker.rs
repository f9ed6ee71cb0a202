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

use super::message::{Message, SelectorRequestReceiver, SelectorResponseSender};
use crate::{channel::ChannelError, checks::CheckJob, session::SessionRegistry};
use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

/// Periodic check jobs scheduler.
pub struct SelectorWorker<S: SessionRegistry> {
    /// Scheduling tick.
    tick: Duration,
    /// Roster provider.
    registry: Arc<S>,
    /// Registered check jobs, run in order.
    jobs: Vec<Box<dyn CheckJob>>,
    /// Control requests receiver.
    rx_chan: SelectorRequestReceiver,
}

impl<S: SessionRegistry> SelectorWorker<S> {
    pub fn new(
        tick: Duration,
        registry: Arc<S>,
        jobs: Vec<Box<dyn CheckJob>>,
        rx_chan: SelectorRequestReceiver,
    ) -> Self {
        SelectorWorker {
            tick,
            registry,
            jobs,
            rx_chan,
        }
    }

    /// Names of the registered jobs.
    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// One scheduling pass.
    ///
    /// The roster is fetched once and handed to every due job. Jobs run one
    /// after the other. Returns the names of the jobs that have been run.
    pub fn run_jobs(&mut self) -> Vec<String> {
        let nodes = self.registry.get_nodes();
        let mut performed = vec![];
        for job in self.jobs.iter_mut() {
            if !job.should_run(SystemTime::now()) {
                continue;
            }
            info!("[selector] running job {} ({} nodes)", job.name(), nodes.len());
            job.set_nodes(nodes.clone());
            job.perform();
            performed.push(job.name().to_owned());
        }
        performed
    }

    fn handle_message(&mut self, req: Message, res_chan: SelectorResponseSender) {
        match req {
            Message::RunJobsRequest => {
                let jobs = self.run_jobs();
                if res_chan
                    .send_sync(Message::RunJobsResponse { jobs })
                    .is_err()
                {
                    warn!("[selector] run jobs response send error");
                }
            }
            other => warn!("[selector] unexpected message: {:?}", other),
        }
    }

    /// Worker loop, ticking every `tick` until a `Stop` message is received
    /// or every request sender has been dropped.
    ///
    /// Ticks missed because of long rounds are skipped, not queued.
    pub fn run_sync(&mut self) {
        debug!("[selector] worker up, jobs: {:?}", self.job_names());
        let mut next_tick = Instant::now() + self.tick;
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match self.rx_chan.recv_timeout_sync(timeout) {
                Ok((Message::Stop, _)) => break,
                Ok((req, res_chan)) => self.handle_message(req, res_chan),
                Err(ChannelError::RecvTimeout) => {
                    self.run_jobs();
                    next_tick += self.tick;
                    let now = Instant::now();
                    if next_tick <= now {
                        next_tick = now + self.tick;
                    }
                }
                Err(err) => {
                    warn!("[selector] control channel error ({}), exiting", err);
                    break;
                }
            }
        }
        debug!("[selector] worker down");
    }
}
