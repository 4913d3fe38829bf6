use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use devcoord::coordinator::CoordinatorEvent;
use devcoord::errors::TaskError;
use devcoord::host::DriverHostBackend;
use devcoord::task::SuspendRequest;

/// A fake driver-host backend that:
/// - records which devices a suspend was delivered to, in delivery order
/// - immediately reports `SuspendDone` for each request.
///
/// Devices can be scripted to fail (the host reports a driver error) or to
/// be rejected (the dispatch itself fails synchronously and nothing is
/// delivered or completed by the backend).
pub struct FakeHostBackend {
    event_tx: mpsc::Sender<CoordinatorEvent>,
    delivered: Arc<Mutex<Vec<String>>>,
    failures: HashMap<String, i32>,
    rejected: HashSet<String>,
}

impl FakeHostBackend {
    pub fn new(event_tx: mpsc::Sender<CoordinatorEvent>, delivered: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            event_tx,
            delivered,
            failures: HashMap::new(),
            rejected: HashSet::new(),
        }
    }

    /// Deliver suspends for this device but have the host report `code`.
    pub fn fail_device(mut self, name: &str, code: i32) -> Self {
        self.failures.insert(name.to_string(), code);
        self
    }

    /// Refuse to dispatch suspends for this device at all.
    pub fn reject_device(mut self, name: &str) -> Self {
        self.rejected.insert(name.to_string());
        self
    }
}

impl DriverHostBackend for FakeHostBackend {
    fn send_suspend(
        &mut self,
        request: SuspendRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + '_>> {
        if self.rejected.contains(&request.device_name) {
            return Box::pin(async { Err(TaskError::Dispatch) });
        }

        let tx = self.event_tx.clone();
        let delivered = Arc::clone(&self.delivered);
        let outcome = match self.failures.get(&request.device_name) {
            Some(code) => Err(TaskError::Driver(*code)),
            None => Ok(()),
        };

        Box::pin(async move {
            {
                let mut guard = delivered.lock().unwrap();
                guard.push(request.device_name.clone());
            }

            tx.send(CoordinatorEvent::SuspendDone {
                task: request.task,
                status: outcome,
            })
            .await
            .map_err(|_| TaskError::Dispatch)?;
            Ok(())
        })
    }
}
