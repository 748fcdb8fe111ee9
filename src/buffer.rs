//! Pending edit buffer: the local journal of uncommitted creates, updates and deletes
//!
//! Entries are keyed by entity id. Drafts get monotonically increasing temp
//! ids; edits to a draft are folded into its create payload instead of being
//! journalled as separate remote calls.
//!
//! ## Lifecycle
//!
//! 1. `create` / `update` / `delete` record edits as the user works
//! 2. `take_batch` moves everything out for a flush; temp ids of the batch's
//!    creates are remembered as *in flight*
//! 3. `resolve_in_flight` maps in-flight temp ids onto the ids the server
//!    assigned, re-journalling any updates made to them while the flush ran

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use tracing::{debug, warn};

use crate::error::EditError;
use crate::model::{EntityId, EntityKind};

/// Partial payload that can be merged with a newer partial payload
pub trait PatchMerge: Clone + Debug + Default + PartialEq {
    /// Fold `newer` into `self`; fields set in `newer` win
    fn merge(&mut self, newer: Self);

    fn is_empty(&self) -> bool;

    /// No NaN or infinite coordinates
    fn is_finite(&self) -> bool;
}

/// Full payload of a journalled entity kind
pub trait Journaled: Clone + Debug {
    type Patch: PatchMerge;

    const KIND: EntityKind;

    fn apply(&mut self, patch: &Self::Patch);

    /// No NaN or infinite coordinates
    fn is_finite(&self) -> bool;
}

/// Everything taken out of a buffer for one flush
#[derive(Debug, Clone, PartialEq)]
pub struct BufferBatch<P: Journaled> {
    /// Temp id and payload, in creation order
    pub creates: Vec<(u64, P)>,
    /// Remote id and merged patch
    pub updates: Vec<(u64, P::Patch)>,
    pub deletes: Vec<u64>,
}

impl<P: Journaled> BufferBatch<P> {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of entries (not remote calls) in the batch
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Optimistic edit journal for one entity kind
#[derive(Debug, Clone)]
pub struct PendingEditBuffer<P: Journaled> {
    next_temp: u64,
    creates: BTreeMap<u64, P>,
    updates: BTreeMap<u64, P::Patch>,
    deletes: BTreeSet<u64>,
    /// Temp ids whose create is part of an outstanding flush
    in_flight: BTreeSet<u64>,
    /// Updates made to in-flight temp ids, waiting for their server id
    deferred: BTreeMap<u64, P::Patch>,
}

impl<P: Journaled> Default for PendingEditBuffer<P> {
    fn default() -> Self {
        Self {
            next_temp: 1,
            creates: BTreeMap::new(),
            updates: BTreeMap::new(),
            deletes: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            deferred: BTreeMap::new(),
        }
    }
}

impl<P: Journaled> PendingEditBuffer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entity and return its temp id
    pub fn create(&mut self, payload: P) -> Result<EntityId, EditError> {
        if !payload.is_finite() {
            warn!(kind = %P::KIND, "skipping create with non-finite coordinates");
            return Err(EditError::InvalidCoordinates { kind: P::KIND });
        }
        let temp = self.next_temp;
        self.next_temp += 1;
        self.creates.insert(temp, payload);
        debug!(kind = %P::KIND, temp, "journalled create");
        Ok(EntityId::Temp(temp))
    }

    /// Record a partial update.
    ///
    /// Drafts absorb the patch into their create payload. Updates to an id
    /// already scheduled for deletion are ignored.
    pub fn update(&mut self, id: EntityId, patch: P::Patch) -> Result<(), EditError> {
        if !patch.is_finite() {
            warn!(kind = %P::KIND, %id, "skipping update with non-finite coordinates");
            return Err(EditError::InvalidCoordinates { kind: P::KIND });
        }
        if patch.is_empty() {
            return Ok(());
        }

        match id {
            EntityId::Temp(temp) => {
                if let Some(payload) = self.creates.get_mut(&temp) {
                    payload.apply(&patch);
                } else if self.in_flight.contains(&temp) {
                    self.deferred.entry(temp).or_default().merge(patch);
                } else {
                    return Err(EditError::unknown(P::KIND, id));
                }
            }
            EntityId::Remote(remote) => {
                if self.deletes.contains(&remote) {
                    debug!(kind = %P::KIND, remote, "update ignored, entity scheduled for deletion");
                    return Ok(());
                }
                self.updates.entry(remote).or_default().merge(patch);
            }
        }
        Ok(())
    }

    /// Record a deletion. Drafts are simply forgotten.
    pub fn delete(&mut self, id: EntityId) -> Result<(), EditError> {
        match id {
            EntityId::Temp(temp) => {
                if self.creates.remove(&temp).is_none() {
                    return Err(EditError::unknown(P::KIND, id));
                }
            }
            EntityId::Remote(remote) => {
                self.updates.remove(&remote);
                self.deletes.insert(remote);
            }
        }
        debug!(kind = %P::KIND, %id, "journalled delete");
        Ok(())
    }

    /// Current create payload of a draft
    pub fn pending_create(&self, temp: u64) -> Option<&P> {
        self.creates.get(&temp)
    }

    /// Create payloads not yet sent, for rewriting references after a flush
    pub fn pending_creates_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.creates.values_mut()
    }

    /// Current merged patch for a persisted entity
    pub fn pending_update(&self, remote: u64) -> Option<&P::Patch> {
        self.updates.get(&remote)
    }

    pub fn is_deleted(&self, remote: u64) -> bool {
        self.deletes.contains(&remote)
    }

    /// Number of journalled entries awaiting a flush
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Move all journalled entries out for a flush
    pub fn take_batch(&mut self) -> BufferBatch<P> {
        let creates: Vec<(u64, P)> = std::mem::take(&mut self.creates).into_iter().collect();
        self.in_flight.extend(creates.iter().map(|(temp, _)| *temp));
        BufferBatch {
            creates,
            updates: std::mem::take(&mut self.updates).into_iter().collect(),
            deletes: std::mem::take(&mut self.deletes).into_iter().collect(),
        }
    }

    /// Map in-flight temp ids to server ids once a flush completes.
    ///
    /// Updates made to a draft while its create was in flight move onto the
    /// new server id. Temp ids missing from `assigned` were never created
    /// remotely and their deferred updates are dropped.
    pub fn resolve_in_flight(&mut self, assigned: &BTreeMap<u64, u64>) {
        for (temp, patch) in std::mem::take(&mut self.deferred) {
            match assigned.get(&temp) {
                Some(remote) => self.updates.entry(*remote).or_default().merge(patch),
                None => warn!(kind = %P::KIND, temp, "dropping update for draft that was never created"),
            }
        }
        self.in_flight.clear();
    }

    /// Forget every journalled entry (after reloading authoritative state)
    pub fn clear(&mut self) {
        self.creates.clear();
        self.updates.clear();
        self.deletes.clear();
        self.in_flight.clear();
        self.deferred.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeskPatch, DeskPayload};

    fn payload(x: f64) -> DeskPayload {
        DeskPayload {
            space_id: EntityId::Remote(1),
            x,
            y: 0.0,
            width: 100.0,
            height: 50.0,
            rotation: 0.0,
            label: String::new(),
        }
    }

    fn at_x(x: f64) -> DeskPatch {
        DeskPatch {
            x: Some(x),
            ..Default::default()
        }
    }

    #[test]
    fn test_temp_ids_increase() {
        let mut buffer = PendingEditBuffer::new();
        let a = buffer.create(payload(0.0)).unwrap();
        let b = buffer.create(payload(1.0)).unwrap();
        assert_eq!(a, EntityId::Temp(1));
        assert_eq!(b, EntityId::Temp(2));
    }

    #[test]
    fn test_update_of_draft_merges_into_create() {
        let mut buffer = PendingEditBuffer::new();
        let id = buffer.create(payload(0.0)).unwrap();
        buffer.update(id, at_x(42.0)).unwrap();
        assert_eq!(buffer.pending_create(1).unwrap().x, 42.0);
        let batch = buffer.take_batch();
        assert!(batch.updates.is_empty());
        assert_eq!(batch.creates.len(), 1);
    }

    #[test]
    fn test_create_update_delete_leaves_nothing() {
        let mut buffer = PendingEditBuffer::new();
        let id = buffer.create(payload(0.0)).unwrap();
        buffer.update(id, at_x(5.0)).unwrap();
        buffer.delete(id).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.take_batch().is_empty());
    }

    #[test]
    fn test_delete_drops_pending_update_and_blocks_new_ones() {
        let mut buffer: PendingEditBuffer<DeskPayload> = PendingEditBuffer::new();
        buffer.update(EntityId::Remote(9), at_x(1.0)).unwrap();
        buffer.delete(EntityId::Remote(9)).unwrap();
        buffer.update(EntityId::Remote(9), at_x(2.0)).unwrap();
        assert!(buffer.pending_update(9).is_none());
        assert!(buffer.is_deleted(9));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_non_finite_create_rejected() {
        let mut buffer = PendingEditBuffer::new();
        let err = buffer.create(payload(f64::NAN)).unwrap_err();
        assert_eq!(
            err,
            EditError::InvalidCoordinates {
                kind: EntityKind::Desk
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unknown_draft_update_rejected() {
        let mut buffer: PendingEditBuffer<DeskPayload> = PendingEditBuffer::new();
        assert!(buffer.update(EntityId::Temp(77), at_x(1.0)).is_err());
    }

    #[test]
    fn test_updates_during_flight_move_to_server_id() {
        let mut buffer = PendingEditBuffer::new();
        let id = buffer.create(payload(0.0)).unwrap();
        let _batch = buffer.take_batch();
        buffer.update(id, at_x(9.0)).unwrap();
        assert!(buffer.has_in_flight());

        let assigned = BTreeMap::from([(1, 500)]);
        buffer.resolve_in_flight(&assigned);
        assert_eq!(buffer.pending_update(500), Some(&at_x(9.0)));
        assert!(!buffer.has_in_flight());
    }
}
