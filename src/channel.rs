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

//! Thin wrappers over async-std channels.
//!
//! Two flavours are provided:
//! - plain [Sender]/[Receiver] pairs, used to funnel probe results from the
//!   per-node relay tasks back to the check that dispatched them;
//! - confirmed channels ([RequestSender]/[RequestReceiver]), where every
//!   request carries the [Sender] to be used for the reply. These drive the
//!   selector service control plane.

use async_std::{
    channel::{
        self as async_channel, Receiver as AsyncReceiver, Sender as AsyncSender, TryRecvError,
    },
    task,
};
use std::{fmt::Display, pin::Pin, time::Duration};

/// Upper bound to outstanding channel elements.
const CHANNEL_BOUND: usize = 1000;

/// Polling step used by the timed receive.
const RECV_POLL_STEP: Duration = Duration::from_millis(10);

/// Errors which can be triggered by a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Error during send. Broken channel.
    SendError,
    /// Error during receive. Broken channel.
    RecvError,
    /// Timeout during receive.
    RecvTimeout,
}

impl std::error::Error for ChannelError {}

impl Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ChannelError::SendError => "channel send error",
            ChannelError::RecvError => "channel recv error",
            ChannelError::RecvTimeout => "channel recv timeout",
        };
        write!(f, "{}", msg)
    }
}

/// Creates a simple mpmc channel.
pub fn simple_channel<T>() -> (Sender<T>, Receiver<T>) {
    bounded_channel(CHANNEL_BOUND)
}

/// Creates a mpmc channel holding at most `capacity` outstanding elements.
///
/// A zero capacity is bumped to one, async-std does not allow rendezvous
/// channels.
pub fn bounded_channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (sender, receiver) = async_channel::bounded::<T>(capacity.max(1));
    (Sender(sender), Receiver(receiver))
}

/// Channel sender side.
#[derive(Debug)]
pub struct Sender<T>(AsyncSender<T>);

// Derive would require `T: Clone`.
impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender(self.0.clone())
    }
}

impl<T> Sender<T> {
    /// Push an element into the channel.
    pub async fn send(&self, value: T) -> Result<(), ChannelError> {
        self.0
            .send(value)
            .await
            .map_err(|_| ChannelError::SendError)
    }

    /// Push an element into the channel, synchronous wrapper.
    pub fn send_sync(&self, value: T) -> Result<(), ChannelError> {
        task::block_on(self.send(value))
    }
}

/// Channel receiver side.
pub struct Receiver<T>(AsyncReceiver<T>);

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver(self.0.clone())
    }
}

impl<T> Receiver<T> {
    /// Wait for the next element.
    /// Fails once the channel is empty and every sender has been dropped.
    pub async fn recv(&self) -> Result<T, ChannelError> {
        self.0.recv().await.map_err(|_| ChannelError::RecvError)
    }

    /// Wait for the next element, synchronous wrapper.
    pub fn recv_sync(&self) -> Result<T, ChannelError> {
        task::block_on(self.recv())
    }

}

async fn recv_timeout<T>(chan: &AsyncReceiver<T>, timeout: Duration) -> Result<T, ChannelError> {
    let mut timeout = timeout;
    loop {
        match chan.try_recv() {
            Ok(res) => return Ok(res),
            Err(TryRecvError::Empty) if timeout > Duration::ZERO => {
                let step = RECV_POLL_STEP.min(timeout);
                task::sleep(step).await;
                timeout = timeout.saturating_sub(step);
            }
            Err(TryRecvError::Empty) => return Err(ChannelError::RecvTimeout),
            Err(TryRecvError::Closed) => return Err(ChannelError::RecvError),
        }
    }
}

/// Create a [RequestSender] and a [RequestReceiver] with a channel between them.
///
/// The [RequestSender] can be cloned to be able to do requests to the same
/// [RequestReceiver] from multiple threads.
pub fn confirmed_channel<Req, Res>() -> (RequestSender<Req, Res>, RequestReceiver<Req, Res>) {
    let (request_sender, request_receiver) =
        async_channel::bounded::<(Req, Sender<Res>)>(CHANNEL_BOUND);
    (
        RequestSender(request_sender),
        RequestReceiver(request_receiver),
    )
}

/// [RequestSender] has a connection to a [RequestReceiver] to which it can
/// send requests. Every request returns the [Receiver] of its reply.
pub struct RequestSender<Req, Res>(AsyncSender<(Req, Sender<Res>)>);

impl<Req, Res> Clone for RequestSender<Req, Res> {
    fn clone(&self) -> Self {
        RequestSender(self.0.clone())
    }
}

impl<Req, Res> RequestSender<Req, Res> {
    /// Send request to the connected [RequestReceiver].
    pub async fn send(&self, request: Req) -> Result<Receiver<Res>, ChannelError> {
        let (response_sender, response_receiver) = simple_channel();
        self.0
            .send((request, response_sender))
            .await
            .map_err(|_| ChannelError::SendError)
            .map(|_| response_receiver)
    }

    /// Send request, synchronous wrapper.
    pub fn send_sync(&self, request: Req) -> Result<Receiver<Res>, ChannelError> {
        task::block_on(self.send(request))
    }
}

/// A [RequestReceiver] listens to requests. Requests are a tuple of a message
/// and the [Sender] to be used to reply.
pub struct RequestReceiver<Req, Res>(AsyncReceiver<(Req, Sender<Res>)>);

impl<Req, Res> RequestReceiver<Req, Res> {
    /// Wait for the next request at most for `timeout`.
    pub async fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<(Req, Sender<Res>), ChannelError> {
        recv_timeout(&self.0, timeout).await
    }

    /// Wait for the next request with timeout, synchronous wrapper.
    pub fn recv_timeout_sync(&self, timeout: Duration) -> Result<(Req, Sender<Res>), ChannelError> {
        task::block_on(self.recv_timeout(timeout))
    }
}

/// Type alias for the reply side of a confirmed channel.
pub type ResponseSender<Res> = Sender<Res>;

impl<T> futures::Stream for Receiver<T> {
    type Item = T;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let pin = Pin::new(&mut self.0);
        pin.poll_next(cx)
    }
}
