//! The storage collaborator: bulk create, per-entity update, bulk delete, fetch
//!
//! The same four calls serve spaces and desks; the `kind` argument selects
//! the collection and must agree with the payload variant.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::buffer::Journaled;
use crate::model::{DeskPatch, DeskPayload, EntityId, EntityKind, SpacePatch, SpacePayload};

/// Full payload of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Space(SpacePayload),
    Desk(DeskPayload),
}

impl Payload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Payload::Space(_) => EntityKind::Space,
            Payload::Desk(_) => EntityKind::Desk,
        }
    }
}

/// Partial update of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Space(SpacePatch),
    Desk(DeskPatch),
}

impl Patch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Patch::Space(_) => EntityKind::Space,
            Patch::Desk(_) => EntityKind::Desk,
        }
    }
}

/// An entity as the storage collaborator returns it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub id: u64,
    pub payload: Payload,
}

/// Errors raised by a storage implementation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("expected a {expected} payload, got {found}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    #[error("parent {parent} has not been created yet")]
    UnresolvedParent { parent: EntityId },

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Remote persistence for spaces and desks.
///
/// `fetch_entities` takes the parent id: the floor for spaces, the space
/// for desks.
#[allow(async_fn_in_trait)]
pub trait Storage {
    async fn create_entities(
        &self,
        kind: EntityKind,
        payloads: Vec<Payload>,
    ) -> Result<Vec<u64>, StorageError>;

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: u64,
        patch: Patch,
    ) -> Result<StoredEntity, StorageError>;

    async fn delete_entities(&self, kind: EntityKind, ids: Vec<u64>) -> Result<(), StorageError>;

    async fn fetch_entities(
        &self,
        kind: EntityKind,
        parent_id: u64,
    ) -> Result<Vec<StoredEntity>, StorageError>;
}

/// A call received by [`MemoryStorage`], for assertions in tests
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Create { kind: EntityKind, count: usize },
    Update { kind: EntityKind, id: u64, patch: Patch },
    Delete { kind: EntityKind, ids: Vec<u64> },
    Fetch { kind: EntityKind, parent_id: u64 },
}

impl StorageCall {
    /// Calls that change remote state
    pub fn is_write(&self) -> bool {
        !matches!(self, StorageCall::Fetch { .. })
    }
}

/// In-process storage with a call log and failure injection.
///
/// Ids are assigned from a single counter shared by both kinds.
#[derive(Debug)]
pub struct MemoryStorage {
    next_id: Cell<u64>,
    entities: RefCell<BTreeMap<(EntityKind, u64), Payload>>,
    calls: RefCell<Vec<StorageCall>>,
    fail_at: Cell<Option<usize>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            next_id: Cell::new(1),
            entities: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
            fail_at: Cell::new(None),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity directly, bypassing the call log
    pub fn seed(&self, payload: Payload) -> u64 {
        let id = self.allocate_id();
        self.entities
            .borrow_mut()
            .insert((payload.kind(), id), payload);
        id
    }

    /// Make the `nth` (0-based) call from now on fail with `Unavailable`
    pub fn fail_on_call(&self, nth: usize) {
        self.fail_at.set(Some(self.calls.borrow().len() + nth));
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.borrow().clone()
    }

    pub fn write_calls(&self) -> Vec<StorageCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
        self.fail_at.set(None);
    }

    pub fn get(&self, kind: EntityKind, id: u64) -> Option<Payload> {
        self.entities.borrow().get(&(kind, id)).cloned()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities
            .borrow()
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Log the call and fail it if it is the injected failure
    fn record(&self, call: StorageCall) -> Result<(), StorageError> {
        let index = self.calls.borrow().len();
        debug!(?call, "storage call");
        self.calls.borrow_mut().push(call);
        if self.fail_at.get() == Some(index) {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn check_parent(&self, payload: &Payload) -> Result<(), StorageError> {
        if let Payload::Desk(desk) = payload {
            match desk.space_id {
                EntityId::Temp(_) => {
                    return Err(StorageError::UnresolvedParent {
                        parent: desk.space_id,
                    })
                }
                EntityId::Remote(space) => {
                    if !self.entities.borrow().contains_key(&(EntityKind::Space, space)) {
                        return Err(StorageError::NotFound {
                            kind: EntityKind::Space,
                            id: space,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    async fn create_entities(
        &self,
        kind: EntityKind,
        payloads: Vec<Payload>,
    ) -> Result<Vec<u64>, StorageError> {
        self.record(StorageCall::Create {
            kind,
            count: payloads.len(),
        })?;
        for payload in &payloads {
            if payload.kind() != kind {
                return Err(StorageError::KindMismatch {
                    expected: kind,
                    found: payload.kind(),
                });
            }
            self.check_parent(payload)?;
        }

        let mut ids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let id = self.allocate_id();
            self.entities.borrow_mut().insert((kind, id), payload);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_entity(
        &self,
        kind: EntityKind,
        id: u64,
        patch: Patch,
    ) -> Result<StoredEntity, StorageError> {
        self.record(StorageCall::Update {
            kind,
            id,
            patch: patch.clone(),
        })?;
        let mut entities = self.entities.borrow_mut();
        let stored = entities
            .get_mut(&(kind, id))
            .ok_or(StorageError::NotFound { kind, id })?;

        match (stored, patch) {
            (Payload::Space(space), Patch::Space(p)) => space.apply(&p),
            (Payload::Desk(desk), Patch::Desk(p)) => desk.apply(&p),
            (_, patch) => {
                return Err(StorageError::KindMismatch {
                    expected: kind,
                    found: patch.kind(),
                })
            }
        }

        let payload = entities
            .get(&(kind, id))
            .cloned()
            .ok_or(StorageError::NotFound { kind, id })?;
        Ok(StoredEntity { id, payload })
    }

    async fn delete_entities(&self, kind: EntityKind, ids: Vec<u64>) -> Result<(), StorageError> {
        self.record(StorageCall::Delete {
            kind,
            ids: ids.clone(),
        })?;
        let mut entities = self.entities.borrow_mut();
        for id in ids {
            entities.remove(&(kind, id));
        }
        Ok(())
    }

    async fn fetch_entities(
        &self,
        kind: EntityKind,
        parent_id: u64,
    ) -> Result<Vec<StoredEntity>, StorageError> {
        self.record(StorageCall::Fetch { kind, parent_id })?;
        let entities = self.entities.borrow();
        Ok(entities
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .filter(|(_, payload)| match payload {
                Payload::Space(space) => space.floor_id == parent_id,
                Payload::Desk(desk) => desk.space_id == EntityId::Remote(parent_id),
            })
            .map(|((_, id), payload)| StoredEntity {
                id: *id,
                payload: payload.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::SpaceKind;

    fn space(floor_id: u64) -> Payload {
        Payload::Space(SpacePayload {
            floor_id,
            name: "Open area".to_string(),
            kind: SpaceKind::Coworking,
            color: "#88c".to_string(),
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
            ],
        })
    }

    #[test]
    fn test_create_and_fetch_by_parent() {
        let storage = MemoryStorage::new();
        let ids = pollster::block_on(
            storage.create_entities(EntityKind::Space, vec![space(1), space(2)]),
        )
        .unwrap();
        assert_eq!(ids.len(), 2);

        let on_floor_1 =
            pollster::block_on(storage.fetch_entities(EntityKind::Space, 1)).unwrap();
        assert_eq!(on_floor_1.len(), 1);
        assert_eq!(on_floor_1[0].id, ids[0]);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let storage = MemoryStorage::new();
        let err = pollster::block_on(storage.create_entities(EntityKind::Desk, vec![space(1)]))
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::KindMismatch {
                expected: EntityKind::Desk,
                found: EntityKind::Space
            }
        );
    }

    #[test]
    fn test_injected_failure_hits_the_nth_call() {
        let storage = MemoryStorage::new();
        storage.fail_on_call(1);
        assert!(pollster::block_on(storage.fetch_entities(EntityKind::Space, 1)).is_ok());
        assert!(pollster::block_on(storage.fetch_entities(EntityKind::Space, 1)).is_err());
        assert!(pollster::block_on(storage.fetch_entities(EntityKind::Space, 1)).is_ok());
    }

    #[test]
    fn test_desk_with_temp_parent_rejected() {
        let storage = MemoryStorage::new();
        let desk = Payload::Desk(DeskPayload {
            space_id: EntityId::Temp(1),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            rotation: 0.0,
            label: String::new(),
        });
        let err = pollster::block_on(storage.create_entities(EntityKind::Desk, vec![desk]))
            .unwrap_err();
        assert!(matches!(err, StorageError::UnresolvedParent { .. }));
    }
}
