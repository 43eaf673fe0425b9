//! Deduplication of concurrent fetches for the same cache slot.
//!
//! The first request to ask for a slot becomes its owner and runs the fetch.
//! Requests arriving while the fetch is running join it and are notified
//! with the owner's outcome. A fetch always runs to completion once started,
//! even if every joined request is canceled, so the slot still gets filled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::application::requests::RequestState;
use crate::domain::entities::{Progress, ResourceUri};
use crate::domain::errors::LoadResult;
use crate::domain::ports::TransportPort;
use crate::infrastructure::cache::{DiskCache, SlotPin};

/// A finished fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The filled slot.
    pub slot: PathBuf,
    /// False when the slot already held a valid entry and nothing was fetched.
    pub fresh: bool,
}

/// Receives the events of a fetch a request is joined to.
pub(crate) trait FlightListener: Send + Sync {
    fn on_progress(&self, progress: Progress);
    /// `pin` holds the filled slot for this listener on success.
    fn on_finished(&self, outcome: &LoadResult<FetchOutcome>, pin: Option<SlotPin>);
}

/// A request joined to a fetch.
#[derive(Clone)]
pub(crate) struct Joiner {
    state: Arc<RequestState>,
    listener: Arc<dyn FlightListener>,
}

impl Joiner {
    pub(crate) fn new(state: Arc<RequestState>, listener: Arc<dyn FlightListener>) -> Self {
        Self { state, listener }
    }

    fn progress(&self, progress: Progress) {
        if !self.state.is_canceled() {
            self.listener.on_progress(progress);
        }
    }
}

/// Whether a request started the fetch or joined an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    /// This request ran the fetch.
    Owner,
    /// This request was attached to a fetch already in flight.
    Joined,
}

#[derive(Default)]
struct Members {
    joiners: Vec<Joiner>,
    last_progress: Option<Progress>,
}

struct Flight {
    members: Mutex<Members>,
}

impl Flight {
    fn new(owner: Joiner) -> Self {
        Self {
            members: Mutex::new(Members {
                joiners: vec![owner],
                last_progress: None,
            }),
        }
    }

    fn broadcast_progress(&self, progress: Progress) {
        let joiners = {
            let mut members = self.members.lock();
            members.last_progress = Some(progress);
            members.joiners.clone()
        };
        for joiner in &joiners {
            joiner.progress(progress);
        }
    }
}

/// Tracks fetches in flight by slot.
pub struct DownloadRegistry {
    flights: Mutex<HashMap<PathBuf, Arc<Flight>>>,
    transport: Arc<dyn TransportPort>,
    disk: Arc<DiskCache>,
}

impl std::fmt::Debug for DownloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRegistry")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl DownloadRegistry {
    /// Creates a registry fetching through `transport` into `disk`.
    #[must_use]
    pub fn new(transport: Arc<dyn TransportPort>, disk: Arc<DiskCache>) -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            transport,
            disk,
        }
    }

    /// Returns true while a fetch for `slot` is registered or still writing.
    #[must_use]
    pub fn is_in_flight(&self, slot: &Path) -> bool {
        self.flights.lock().contains_key(slot)
            || self.transport.is_writing(&DiskCache::partial_path(slot))
    }

    /// Number of fetches in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    /// Fetches `uri` into `slot`, or joins the fetch already running for it.
    ///
    /// The owner awaits the whole fetch and then notifies every joiner that
    /// is not canceled, in the order they joined. A joiner returns at once.
    pub(crate) async fn fetch(
        &self,
        uri: &ResourceUri,
        slot: PathBuf,
        validity: Option<Duration>,
        joiner: Joiner,
    ) -> JoinRole {
        let flight = match self.join(&slot, joiner) {
            (flight, JoinRole::Owner) => flight,
            (_, JoinRole::Joined) => {
                debug!(uri = %uri, "Joined download in flight");
                return JoinRole::Joined;
            }
        };

        let pin = self.disk.pin(&slot);
        let result = self.run(uri, &slot, validity, &flight).await;
        self.finish(&slot, &flight, &result, pin);
        JoinRole::Owner
    }

    /// Attaches `joiner` to the fetch running for `slot`, if there is one.
    /// Never starts a fetch; hands the joiner back when nothing is in flight.
    pub(crate) fn try_join(&self, slot: &Path, joiner: Joiner) -> Result<(), Joiner> {
        let flights = self.flights.lock();
        match flights.get(slot) {
            Some(existing) => {
                Self::attach(existing, joiner);
                Ok(())
            }
            None => Err(joiner),
        }
    }

    fn join(&self, slot: &Path, joiner: Joiner) -> (Arc<Flight>, JoinRole) {
        let mut flights = self.flights.lock();
        if let Some(existing) = flights.get(slot) {
            // Attached under the map lock so `finish` cannot drain the flight first.
            Self::attach(existing, joiner);
            return (Arc::clone(existing), JoinRole::Joined);
        }

        let flight = Arc::new(Flight::new(joiner));
        flights.insert(slot.to_path_buf(), Arc::clone(&flight));
        (flight, JoinRole::Owner)
    }

    fn attach(flight: &Flight, joiner: Joiner) {
        let mut members = flight.members.lock();
        // Replayed under the lock so a concurrent broadcast cannot overtake it.
        if let Some(progress) = members.last_progress {
            joiner.progress(progress);
        }
        members.joiners.push(joiner);
    }

    async fn run(
        &self,
        uri: &ResourceUri,
        slot: &Path,
        validity: Option<Duration>,
        flight: &Arc<Flight>,
    ) -> LoadResult<FetchOutcome> {
        if self.disk.exists(slot, validity).await {
            trace!(uri = %uri, "Slot already valid, skipping fetch");
            self.disk.touch(slot);
            return Ok(FetchOutcome {
                slot: slot.to_path_buf(),
                fresh: false,
            });
        }

        let partial = self.disk.begin_write(slot).await;
        let sink = {
            let flight = Arc::clone(flight);
            move |progress: Progress| flight.broadcast_progress(progress)
        };
        match self.transport.fetch(uri, &partial, &sink).await {
            Ok(_) => {
                let size = self.disk.commit(slot).await?;
                debug!(uri = %uri, bytes = size, "Fetched into disk cache");
                Ok(FetchOutcome {
                    slot: slot.to_path_buf(),
                    fresh: true,
                })
            }
            Err(e) => {
                warn!(uri = %uri, error = %e, "Fetch failed");
                self.disk.abort(slot).await;
                Err(e)
            }
        }
    }

    /// Hands every live joiner its own pin on the slot before the flight's
    /// pin is released, then notifies them in join order.
    fn finish(
        &self,
        slot: &Path,
        flight: &Arc<Flight>,
        result: &LoadResult<FetchOutcome>,
        pin: SlotPin,
    ) {
        self.flights.lock().remove(slot);
        let joiners = std::mem::take(&mut flight.members.lock().joiners);
        let live: Vec<(Joiner, Option<SlotPin>)> = joiners
            .into_iter()
            .filter(|joiner| {
                let canceled = joiner.state.is_canceled();
                if canceled {
                    trace!(request = %joiner.state.id(), "Skipping canceled joiner");
                }
                !canceled
            })
            .map(|joiner| {
                let pin = result.is_ok().then(|| self.disk.pin(slot));
                (joiner, pin)
            })
            .collect();
        drop(pin);

        for (joiner, pin) in live {
            joiner.listener.on_finished(result, pin);
        }
    }
}
