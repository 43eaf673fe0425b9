//! The single-threaded context on which every callback runs.
//!
//! Pool workers never call listeners directly. They post closures to a
//! [`Delivery`]; the caller drains them from the paired [`DeliveryLoop`] on
//! its own thread, so listeners and targets see a serial order of events.

use tokio::sync::mpsc;
use tracing::trace;

type DeliveryJob = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of the delivery context. Cheap to clone.
#[derive(Clone)]
pub struct Delivery {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl Delivery {
    /// Creates a delivery context and the loop that drains it.
    #[must_use]
    pub fn channel() -> (Self, DeliveryLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DeliveryLoop { rx })
    }

    /// Queues `job` to run on the delivery context.
    ///
    /// Dropped silently once the loop is gone.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            trace!("Delivery loop closed, dropping callback");
        }
    }
}

/// Receiving side of the delivery context, owned by the caller.
pub struct DeliveryLoop {
    rx: mpsc::UnboundedReceiver<DeliveryJob>,
}

impl std::fmt::Debug for DeliveryLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryLoop")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl DeliveryLoop {
    /// Runs every job already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits for the next job and runs it. Returns false once every
    /// [`Delivery`] has been dropped and the queue is empty.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until every [`Delivery`] has been dropped.
    pub async fn run(mut self) {
        while self.next().await {}
    }
}
