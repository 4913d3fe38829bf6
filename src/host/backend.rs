// src/host/backend.rs

//! Pluggable driver-host backend abstraction.
//!
//! The runtime talks to a `DriverHostBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production delivery path an implementation detail of the embedder.
//!
//! - [`ChannelHostBackend`] is the production implementation: it forwards
//!   suspend requests over an mpsc channel to whatever owns the driver-host
//!   connections.
//! - Tests can provide their own backend that, for example, records which
//!   devices were suspended and directly emits `SuspendDone` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::TaskError;
use crate::task::suspend::SuspendRequest;

/// Trait abstracting how suspend messages reach driver hosts.
///
/// An `Err` return means the message could not even be dispatched; no
/// completion will ever follow for it, and the runtime reports the failure
/// back to the core itself.
pub trait DriverHostBackend: Send {
    fn send_suspend(
        &mut self,
        request: SuspendRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), TaskError>> + Send + '_>>;
}

/// Production backend: forwards suspend requests over an mpsc channel.
///
/// The receiving side is owned by the embedder, which delivers each request
/// to the right driver host and answers with a
/// [`crate::coordinator::CoordinatorEvent::SuspendDone`] on the runtime's
/// event channel.
pub struct ChannelHostBackend {
    tx: mpsc::Sender<SuspendRequest>,
}

impl ChannelHostBackend {
    pub fn new(tx: mpsc::Sender<SuspendRequest>) -> Self {
        Self { tx }
    }
}

impl DriverHostBackend for ChannelHostBackend {
    fn send_suspend(
        &mut self,
        request: SuspendRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), TaskError>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move { tx.send(request).await.map_err(|_| TaskError::Dispatch) })
    }
}
