//! Booking-status collaborator and per-desk booking request guard

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::model::{BookingStatus, EntityId};

/// Supplies booking status per desk for a date (`YYYY-MM-DD`).
///
/// Desks missing from the returned map are free.
pub trait BookingStatusSource {
    fn statuses(&self, date: &str, desk_ids: &[u64]) -> HashMap<u64, BookingStatus>;
}

impl BookingStatusSource for HashMap<u64, BookingStatus> {
    fn statuses(&self, _date: &str, desk_ids: &[u64]) -> HashMap<u64, BookingStatus> {
        desk_ids
            .iter()
            .filter_map(|id| self.get(id).map(|status| (*id, *status)))
            .collect()
    }
}

/// Desks with a booking request in flight
#[derive(Debug, Clone, Default)]
pub struct BookingGuard {
    in_flight: Rc<RefCell<BTreeSet<EntityId>>>,
}

impl BookingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the desk for one booking request; None while another request
    /// for it is outstanding
    pub fn try_begin(&self, desk: EntityId) -> Option<BookingTicket> {
        if !self.in_flight.borrow_mut().insert(desk) {
            debug!(%desk, "booking request already in flight");
            return None;
        }
        Some(BookingTicket {
            desk,
            in_flight: Rc::clone(&self.in_flight),
        })
    }

    pub fn is_pending(&self, desk: EntityId) -> bool {
        self.in_flight.borrow().contains(&desk)
    }
}

/// Claim on a desk's booking slot, released on drop
#[derive(Debug)]
pub struct BookingTicket {
    desk: EntityId,
    in_flight: Rc<RefCell<BTreeSet<EntityId>>>,
}

impl BookingTicket {
    pub fn desk(&self) -> EntityId {
        self.desk
    }
}

impl Drop for BookingTicket {
    fn drop(&mut self) {
        self.in_flight.borrow_mut().remove(&self.desk);
    }
}
