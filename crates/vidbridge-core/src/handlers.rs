//! State change handler registry
//!
//! One slot per [`HandlerKey`], each holding at most one waiter. An action
//! reserves a slot before it triggers a backend call and awaits the
//! returned [`PendingTransition`]; the adapter's event listener fulfils the
//! slot when the matching native event fires.
//!
//! Backends only offer one native listener per event, so registering over
//! an occupied slot overwrites it: the conflict is logged and the previous
//! waiter settles with [`Error::HandlerSuperseded`].

use crate::types::{ActionId, HandlerKey, PlaybackStatus};
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// What a waiter receives when its slot is consumed
pub type HandlerOutcome = Result<PlaybackStatus>;

struct Reservation {
    owner: ActionId,
    serial: u64,
    waiter: oneshot::Sender<HandlerOutcome>,
}

#[derive(Default)]
struct Slots {
    reservations: HashMap<HandlerKey, Reservation>,
    next_serial: u64,
}

/// Shared handle to an adapter's handler slots
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve `key` for `owner`, overwriting any existing reservation
    pub fn set_handler(&self, key: HandlerKey, owner: ActionId) -> PendingTransition {
        let (waiter, receiver) = oneshot::channel();

        let (serial, previous) = {
            let mut slots = self.lock();
            slots.next_serial += 1;
            let serial = slots.next_serial;
            let previous = slots.reservations.insert(key, Reservation { owner, serial, waiter });
            (serial, previous)
        };

        if let Some(previous) = previous {
            let conflict = Error::StateChangeHandlerReserved {
                key: key.to_string(),
                owner: previous.owner,
                requested_by: owner,
            };
            error!(action = %owner, %key, error = %conflict, "State change handler overwritten");
            let _ = previous.waiter.send(Err(Error::HandlerSuperseded {
                key: key.to_string(),
            }));
        } else {
            debug!(action = %owner, %key, "State change handler reserved");
        }

        PendingTransition {
            key,
            owner,
            serial,
            receiver,
            registry: self.clone(),
        }
    }

    /// Consume the reservation for `key` and deliver `outcome` to its waiter.
    ///
    /// Fulfilling an unreserved key is logged and otherwise ignored.
    pub fn fulfill_handler(&self, key: HandlerKey, outcome: HandlerOutcome) -> bool {
        if self.notify(key, outcome) {
            true
        } else {
            error!(%key, "Fulfilled a state change handler that was not reserved");
            false
        }
    }

    /// Deliver `outcome` to the waiter on `key` if there is one.
    ///
    /// Used by event listeners, where most events have nobody waiting.
    pub fn notify(&self, key: HandlerKey, outcome: HandlerOutcome) -> bool {
        let reservation = self.lock().reservations.remove(&key);
        match reservation {
            Some(reservation) => {
                debug!(action = %reservation.owner, %key, ok = outcome.is_ok(), "State change handler fulfilled");
                let _ = reservation.waiter.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Settle every waiter with `error`
    pub fn reject_all(&self, error: &Error) -> usize {
        let drained: Vec<(HandlerKey, Reservation)> = self.lock().reservations.drain().collect();
        let count = drained.len();
        for (key, reservation) in drained {
            debug!(action = %reservation.owner, %key, %error, "State change handler rejected");
            let _ = reservation.waiter.send(Err(error.clone()));
        }
        count
    }

    pub fn is_reserved(&self, key: HandlerKey) -> bool {
        self.lock().reservations.contains_key(&key)
    }

    /// Owner of the reservation on `key`
    pub fn owner(&self, key: HandlerKey) -> Option<ActionId> {
        self.lock().reservations.get(&key).map(|r| r.owner)
    }

    pub fn len(&self) -> usize {
        self.lock().reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: HandlerKey, serial: u64) {
        let mut slots = self.lock();
        if slots.reservations.get(&key).map(|r| r.serial) == Some(serial) {
            if let Some(reservation) = slots.reservations.remove(&key) {
                debug!(action = %reservation.owner, %key, "State change handler released");
            }
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.lock().reservations.keys().map(|k| k.to_string()).collect();
        f.debug_struct("HandlerRegistry").field("reserved", &keys).finish()
    }
}

/// A reserved slot waiting for its transition.
///
/// Dropping it before the slot is consumed releases the slot, provided no
/// newer registration has taken it over.
pub struct PendingTransition {
    key: HandlerKey,
    owner: ActionId,
    serial: u64,
    receiver: oneshot::Receiver<HandlerOutcome>,
    registry: HandlerRegistry,
}

impl PendingTransition {
    pub fn key(&self) -> HandlerKey {
        self.key
    }

    pub fn owner(&self) -> ActionId {
        self.owner
    }
}

impl Future for PendingTransition {
    type Output = HandlerOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Destroyed),
        })
    }
}

impl Drop for PendingTransition {
    fn drop(&mut self) {
        self.registry.release(self.key, self.serial);
    }
}
