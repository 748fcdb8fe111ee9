//! Session scenarios: saving, failures, reloads and editing while a save runs

use std::collections::HashMap;

use floorplan_editor::storage::{Patch, Payload, StorageCall};
use floorplan_editor::{
    BookingStatus, DeskPatch, DeskPayload, EditError, EditorConfig, EntityId, EntityKind,
    EntityRef, FlushPhase, HeadlessScene, LayoutSession, MemoryStorage, Modifiers, Point,
    SaveError, SceneSurface, SpaceKind, SpacePatch, SpacePayload, Viewport,
};
use pretty_assertions::assert_eq;

fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

/// Space 1 (0..1000 x 0..600) with desk 2 at (200, 300) and desk 3 at (600, 300)
fn session() -> LayoutSession<MemoryStorage> {
    let storage = MemoryStorage::new();
    let space = storage.seed(Payload::Space(SpacePayload {
        floor_id: 1,
        name: "Open area".to_string(),
        kind: SpaceKind::Coworking,
        color: "#dde".to_string(),
        points: rectangle(0.0, 0.0, 1000.0, 600.0),
    }));
    for (x, label) in [(200.0, "A1"), (600.0, "A2")] {
        storage.seed(Payload::Desk(DeskPayload {
            space_id: EntityId::Remote(space),
            x,
            y: 300.0,
            width: 200.0,
            height: 100.0,
            rotation: 0.0,
            label: label.to_string(),
        }));
    }
    let mut session =
        pollster::block_on(LayoutSession::open(storage, 1, EditorConfig::default())).unwrap();
    session.enter_edit_mode().unwrap();
    session.set_floor_plan_loaded(true);
    session
}

fn click(session: &mut LayoutSession<MemoryStorage>, point: Point, modifiers: Modifiers) {
    session.pointer_down(point, modifiers).unwrap();
    session.pointer_up().unwrap();
}

fn desk_payload(storage: &MemoryStorage, id: u64) -> DeskPayload {
    match storage.get(EntityKind::Desk, id) {
        Some(Payload::Desk(payload)) => payload,
        other => panic!("expected desk {}, got {:?}", id, other),
    }
}

#[test]
fn lasso_space_and_its_desk_are_created_together() {
    let mut session = session();
    session.start_lasso().unwrap();
    for point in rectangle(1100.0, 0.0, 1500.0, 400.0) {
        session.lasso_click(point, false).unwrap();
    }
    session.finish_lasso().unwrap();
    let space = session
        .commit_space_draft("Focus room", SpaceKind::Coworking, "#abc")
        .unwrap();
    let desk = session.add_desk(space, None, None).unwrap();
    assert_eq!(session.desk(desk).unwrap().space_id, space);

    let receipt = pollster::block_on(session.save()).unwrap();

    let storage = session.storage();
    assert_eq!(
        storage.write_calls(),
        vec![
            StorageCall::Create {
                kind: EntityKind::Space,
                count: 1
            },
            StorageCall::Create {
                kind: EntityKind::Desk,
                count: 1
            },
        ]
    );
    let new_space = EntityId::Remote(receipt.space_ids[&1]);
    let new_desk = receipt.desk_ids[&1];
    assert_eq!(desk_payload(&storage, new_desk).space_id, new_space);
    assert_eq!(
        session.desk(EntityId::Remote(new_desk)).unwrap().space_id,
        new_space
    );
    assert!(session.selection().contains(EntityId::Remote(new_desk)));
    assert!(session.space(space).is_none());
    assert_eq!(session.pending_edits(), 0);
}

#[test]
fn overlapping_lasso_is_discarded() {
    let mut session = session();
    session.start_lasso().unwrap();
    for point in rectangle(900.0, 100.0, 1200.0, 300.0) {
        session.lasso_click(point, false).unwrap();
    }
    let err = session.finish_lasso().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"space overlaps existing spaces: Open area");
    assert!(session.editor().is_idle());
    assert_eq!(session.finish_lasso(), Err(EditError::NotDrawing));
}

#[test]
fn lasso_needs_a_loaded_floor_plan_and_edit_mode() {
    let mut session = session();
    session.set_floor_plan_loaded(false);
    assert_eq!(session.start_lasso(), Err(EditError::FloorPlanMissing));

    session.set_floor_plan_loaded(true);
    session.leave_edit_mode().unwrap();
    assert_eq!(session.start_lasso(), Err(EditError::EditModeRequired));
}

#[test]
fn edits_made_during_a_save_are_kept_for_the_next_one() {
    let mut session = session();
    let space = EntityId::Remote(1);
    let desk = session
        .add_desk(space, Some(Point::new(500.0, 500.0)), None)
        .unwrap();

    let batch = session.begin_flush().unwrap();
    assert_eq!(
        session.add_desk(space, None, None),
        Err(EditError::FlushInProgress)
    );
    session.move_selection_by(Point::new(10.0, 0.0)).unwrap();

    let storage = session.storage();
    let outcome = pollster::block_on(batch.send(storage.as_ref()));
    let receipt = session.complete_flush(outcome).unwrap();
    let remote = receipt.desk_ids[&1];
    assert!(session.desk(desk).is_none());
    assert_eq!(desk_payload(&storage, remote).x, 500.0);

    storage.clear_calls();
    pollster::block_on(session.save()).unwrap();
    assert_eq!(
        storage.write_calls(),
        vec![StorageCall::Update {
            kind: EntityKind::Desk,
            id: remote,
            patch: Patch::Desk(DeskPatch {
                x: Some(510.0),
                y: Some(500.0),
                ..Default::default()
            }),
        }]
    );
    assert_eq!(
        session.desk(EntityId::Remote(remote)).unwrap().center,
        Point::new(510.0, 500.0)
    );
}

#[test]
fn failed_save_makes_the_session_stale_until_reload() {
    let mut session = session();
    let created = session
        .add_desk(EntityId::Remote(1), Some(Point::new(500.0, 500.0)), None)
        .unwrap();
    session.rename_desk(EntityId::Remote(2), "Corner").unwrap();

    let storage = session.storage();
    storage.fail_on_call(1);
    let err = pollster::block_on(session.save()).unwrap_err();
    let flush = match err {
        SaveError::Flush(flush) => flush,
        other => panic!("expected a flush failure, got {:?}", other),
    };
    assert_eq!(flush.phase, FlushPhase::Update(EntityKind::Desk));
    assert_eq!(flush.applied, 1);
    insta::assert_snapshot!(flush.to_string(), @"save failed during update desks after 1 remote operation(s)");

    // The create that went through is merged
    assert!(session.desk(created).is_none());
    assert!(session.desk(EntityId::Remote(4)).is_some());
    assert!(session.is_stale());
    assert_eq!(
        session.rename_desk(EntityId::Remote(3), "Window"),
        Err(EditError::StaleState)
    );

    pollster::block_on(session.reload()).unwrap();
    assert!(!session.is_stale());
    assert_eq!(session.pending_edits(), 0);
    assert_eq!(session.desks().len(), 3);
    assert_eq!(session.desk(EntityId::Remote(2)).unwrap().label, "A1");
}

#[test]
fn leaving_edit_mode_requires_a_clean_buffer() {
    let mut session = session();
    session.rename_desk(EntityId::Remote(3), "Window").unwrap();
    assert_eq!(
        session.leave_edit_mode(),
        Err(EditError::UnsavedEdits { count: 1 })
    );
    pollster::block_on(session.save()).unwrap();
    session.leave_edit_mode().unwrap();
    assert_eq!(
        session.rename_desk(EntityId::Remote(3), "Door"),
        Err(EditError::EditModeRequired)
    );
}

#[test]
fn leaving_edit_mode_reverts_an_unfinished_vertex_edit() {
    let mut session = session();
    session.select_space(EntityId::Remote(1)).unwrap();
    session.drag_vertex(1, Point::new(400.0, 0.0)).unwrap();

    session.leave_edit_mode().unwrap();
    assert_eq!(session.pending_edits(), 0);
    assert!(session.editor().is_idle());
    assert_eq!(
        session.space(EntityId::Remote(1)).unwrap().points,
        rectangle(0.0, 0.0, 1000.0, 600.0)
    );
}

#[test]
fn leaving_edit_mode_reverts_an_unfinished_drag() {
    let mut session = session();
    session
        .pointer_down(Point::new(200.0, 300.0), Modifiers::NONE)
        .unwrap();
    session.pointer_move(Point::new(500.0, 300.0), Modifiers::NONE);
    assert_ne!(
        session.desk(EntityId::Remote(2)).unwrap().center,
        Point::new(200.0, 300.0)
    );

    session.leave_edit_mode().unwrap();
    assert_eq!(session.pending_edits(), 0);
    assert!(session.editor().is_idle());
    assert_eq!(
        session.desk(EntityId::Remote(2)).unwrap().center,
        Point::new(200.0, 300.0)
    );
    assert!(session.pointer_up().unwrap().is_empty());
}

#[test]
fn deleting_a_space_deletes_its_desks_first() {
    let mut session = session();
    session.delete_space(EntityId::Remote(1)).unwrap();
    assert!(session.desks().is_empty());

    pollster::block_on(session.save()).unwrap();
    assert_eq!(
        session.storage().write_calls(),
        vec![
            StorageCall::Delete {
                kind: EntityKind::Desk,
                ids: vec![2, 3]
            },
            StorageCall::Delete {
                kind: EntityKind::Space,
                ids: vec![1]
            },
        ]
    );
}

#[test]
fn shrinking_a_space_moves_desks_back_inside() {
    let mut session = session();
    let space = EntityId::Remote(1);
    session.select_space(space).unwrap();
    session.drag_vertex(1, Point::new(650.0, 0.0)).unwrap();
    session.drag_vertex(2, Point::new(650.0, 600.0)).unwrap();
    session.commit_space_edit().unwrap();

    assert_eq!(
        session.desk(EntityId::Remote(3)).unwrap().center,
        Point::new(550.0, 300.0)
    );
    assert!(session.violations().is_empty());

    pollster::block_on(session.save()).unwrap();
    assert_eq!(
        session.storage().write_calls(),
        vec![
            StorageCall::Update {
                kind: EntityKind::Space,
                id: 1,
                patch: Patch::Space(SpacePatch {
                    points: Some(rectangle(0.0, 0.0, 650.0, 600.0)),
                    ..Default::default()
                }),
            },
            StorageCall::Update {
                kind: EntityKind::Desk,
                id: 3,
                patch: Patch::Desk(DeskPatch::position(Point::new(550.0, 300.0))),
            },
        ]
    );
}

#[test]
fn vertex_insert_and_delete_follow_the_edge_tolerance() {
    let mut session = session();
    session.select_space(EntityId::Remote(1)).unwrap();

    assert_eq!(
        session.insert_vertex_at(Point::new(500.0, 30.0)),
        Err(EditError::NotOnEdge)
    );
    let index = session.insert_vertex_at(Point::new(500.0, 3.0)).unwrap();
    assert_eq!(index, 1);
    assert_eq!(session.space(EntityId::Remote(1)).unwrap().points.len(), 5);

    session.delete_vertex(index).unwrap();
    session.delete_vertex(0).unwrap();
    assert_eq!(
        session.delete_vertex(0),
        Err(EditError::InsufficientVertices { count: 2 })
    );

    session.cancel_space_edit();
    assert_eq!(
        session.space(EntityId::Remote(1)).unwrap().points,
        rectangle(0.0, 0.0, 1000.0, 600.0)
    );
}

#[test]
fn vertex_handles_scale_with_zoom() {
    let mut session = session();
    let near_corner = Point::new(1010.0, 0.0);
    assert_eq!(
        session.delete_vertex_at(near_corner),
        Err(EditError::NotDrawing)
    );

    session.select_space(EntityId::Remote(1)).unwrap();
    assert_eq!(session.vertex_at(Point::new(1004.0, 0.0)), Some(1));
    assert_eq!(session.vertex_at(near_corner), None);
    assert_eq!(
        session.delete_vertex_at(near_corner),
        Err(EditError::NotOnVertex)
    );

    session.set_zoom(0.25);
    assert_eq!(session.vertex_at(near_corner), Some(1));
    assert_eq!(
        session.delete_vertex_at(near_corner),
        Ok(Point::new(1000.0, 0.0))
    );
    assert_eq!(
        session.space(EntityId::Remote(1)).unwrap().points,
        vec![
            Point::new(0.0, 0.0),
            Point::new(1000.0, 600.0),
            Point::new(0.0, 600.0),
        ]
    );
}

#[test]
fn translating_a_space_checks_neighbours_and_carries_desks_along() {
    let mut session = session();
    session.start_lasso().unwrap();
    for point in rectangle(1100.0, 0.0, 1500.0, 400.0) {
        session.lasso_click(point, false).unwrap();
    }
    session.finish_lasso().unwrap();
    session
        .commit_space_draft("Side room", SpaceKind::Meeting, "#efe")
        .unwrap();
    pollster::block_on(session.save()).unwrap();
    let storage = session.storage();
    storage.clear_calls();

    let space = EntityId::Remote(1);
    session.select_space(space).unwrap();
    session.translate_space(Point::new(150.0, 0.0)).unwrap();
    let err = session.commit_space_edit().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"space overlaps existing spaces: Side room");
    session.cancel_space_edit();
    assert_eq!(
        session.space(space).unwrap().points,
        rectangle(0.0, 0.0, 1000.0, 600.0)
    );

    session.select_space(space).unwrap();
    session.translate_space(Point::new(0.0, 260.0)).unwrap();
    session.commit_space_edit().unwrap();
    assert_eq!(
        session.desk(EntityId::Remote(2)).unwrap().center,
        Point::new(200.0, 310.0)
    );
    assert_eq!(
        session.desk(EntityId::Remote(3)).unwrap().center,
        Point::new(600.0, 310.0)
    );
    assert!(session.violations().is_empty());

    pollster::block_on(session.save()).unwrap();
    assert_eq!(
        storage.write_calls(),
        vec![
            StorageCall::Update {
                kind: EntityKind::Space,
                id: 1,
                patch: Patch::Space(SpacePatch {
                    points: Some(rectangle(0.0, 260.0, 1000.0, 860.0)),
                    ..Default::default()
                }),
            },
            StorageCall::Update {
                kind: EntityKind::Desk,
                id: 2,
                patch: Patch::Desk(DeskPatch::position(Point::new(200.0, 310.0))),
            },
            StorageCall::Update {
                kind: EntityKind::Desk,
                id: 3,
                patch: Patch::Desk(DeskPatch::position(Point::new(600.0, 310.0))),
            },
        ]
    );
}

#[test]
fn group_drag_commits_every_member() {
    let mut session = session();
    click(&mut session, Point::new(200.0, 300.0), Modifiers::NONE);
    click(&mut session, Point::new(600.0, 300.0), Modifiers::multi_select());
    assert_eq!(session.selection().len(), 2);

    session
        .pointer_down(Point::new(200.0, 300.0), Modifiers::NONE)
        .unwrap();
    session.pointer_move(Point::new(200.0, 400.0), Modifiers::NONE);
    session.pointer_up().unwrap();

    pollster::block_on(session.save()).unwrap();
    let moved_down = Patch::Desk(DeskPatch {
        y: Some(400.0),
        ..Default::default()
    });
    assert_eq!(
        session.storage().write_calls(),
        vec![
            StorageCall::Update {
                kind: EntityKind::Desk,
                id: 2,
                patch: moved_down.clone(),
            },
            StorageCall::Update {
                kind: EntityKind::Desk,
                id: 3,
                patch: moved_down,
            },
        ]
    );
}

#[test]
fn pasted_copies_land_clear_of_every_desk() {
    let mut session = session();
    click(&mut session, Point::new(200.0, 300.0), Modifiers::NONE);
    assert_eq!(session.copy_selection(), 1);

    let pasted = session.paste().unwrap();
    assert_eq!(pasted.len(), 1);
    assert!(pasted[0].is_temp());
    assert_eq!(session.selection().ids(), pasted);
    assert_eq!(session.desk(pasted[0]).unwrap().label, "A1");
    assert!(session.violations().is_empty());
    assert_eq!(session.desk_edits().len(), 1);
}

#[test]
fn nudging_a_selection_across_two_spaces_keeps_each_desk_in_its_own() {
    let mut session = session();
    session.start_lasso().unwrap();
    for point in rectangle(1100.0, 0.0, 1500.0, 400.0) {
        session.lasso_click(point, false).unwrap();
    }
    session.finish_lasso().unwrap();
    let annex = session
        .commit_space_draft("Annex", SpaceKind::Coworking, "#eef")
        .unwrap();
    let flush_left = session
        .add_desk(annex, Some(Point::new(1200.0, 200.0)), Some((200.0, 100.0)))
        .unwrap();
    assert_eq!(
        session.desk(flush_left).unwrap().center,
        Point::new(1200.0, 200.0)
    );
    click(&mut session, Point::new(600.0, 300.0), Modifiers::multi_select());
    assert_eq!(session.selection().len(), 2);

    session.move_selection_by(Point::new(-50.0, 50.0)).unwrap();

    let moved = session.desk(flush_left).unwrap();
    assert!(moved.center.x >= 1200.0, "annex desk left its space: {:?}", moved.center);
    assert_ne!(
        session.desk(EntityId::Remote(3)).unwrap().center,
        Point::new(600.0, 300.0)
    );
    assert!(session.violations().is_empty());
}

#[test]
fn desks_only_go_into_coworking_spaces() {
    let mut session = session();
    session.start_lasso().unwrap();
    for point in rectangle(1100.0, 0.0, 1400.0, 300.0) {
        session.lasso_click(point, false).unwrap();
    }
    session.finish_lasso().unwrap();
    let meeting = session
        .commit_space_draft("Board room", SpaceKind::Meeting, "#fed")
        .unwrap();
    assert_eq!(
        session.add_desk(meeting, None, None),
        Err(EditError::WrongSpaceKind { id: meeting })
    );
}

#[test]
fn scene_follows_the_session() {
    let mut session = session();
    let mut scene = HeadlessScene::new(Viewport::new(Point::new(10.0, 10.0), 0.5));
    session.sync_scene(&mut scene);
    assert_eq!(scene.len(), 3);
    assert_eq!(
        scene.hit_test(Point::new(110.0, 160.0)),
        Some(EntityRef::Desk(EntityId::Remote(2)))
    );

    click(&mut session, Point::new(600.0, 300.0), Modifiers::NONE);
    session.delete_selected_desks().unwrap();
    session.sync_scene(&mut scene);
    assert_eq!(scene.len(), 2);
    assert!(scene.node(EntityRef::Desk(EntityId::Remote(3))).is_none());
}

#[test]
fn booking_statuses_reset_missing_desks_to_free() {
    let mut session = session();
    let statuses = HashMap::from([(2, BookingStatus::Booked)]);
    session.apply_booking_statuses(&statuses, "2024-05-02");
    assert_eq!(
        session.desk(EntityId::Remote(2)).unwrap().booking_status,
        BookingStatus::Booked
    );
    assert_eq!(
        session.desk(EntityId::Remote(3)).unwrap().booking_status,
        BookingStatus::Free
    );

    session.apply_booking_statuses(&HashMap::<u64, BookingStatus>::new(), "2024-05-03");
    assert_eq!(
        session.desk(EntityId::Remote(2)).unwrap().booking_status,
        BookingStatus::Free
    );
}
