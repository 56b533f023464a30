//! End-to-end scenarios: bindings built through a provider against the
//! mock client, driven by simulated remote activity.
//!
//! The scenarios mirror how the real client behaves over a live
//! connection: presence accumulates key-wise, others churn on joins and
//! disconnects, storage loads exactly once, batches coalesce into
//! single history entries, and every binding republishes only when its
//! projection actually changes.

use std::cell::Cell;
use std::rc::Rc;

use liveroom::prelude::*;
use liveroom_core::NotReadyKind;
use liveroom_harness::{MockClient, RoomSimulator, object};
use serde_json::json;

fn setup() -> (Rc<MockClient>, RoomProvider) {
    let client = Rc::new(MockClient::new());
    let context = RoomContext::new(client.clone() as Rc<dyn Client>);
    let provider = context.provide(
        RoomOptions::new("room")
            .with_presence(object(json!({"x": 1})))
            .with_storage(json!({"obj": {"a": 0, "nested": ["foo", "bar"]}})),
    );
    (client, provider)
}

fn sim(client: &MockClient) -> RoomSimulator {
    client.simulate("room")
}

// ─── Presence ────────────────────────────────────────────────────────────

#[test]
fn initial_presence_is_readable_immediately() {
    let (_client, provider) = setup();
    let (me, _updater) = provider.my_presence().unwrap();
    assert_eq!(Json::Object(me.get()), json!({"x": 1}));
}

#[test]
fn presence_updates_accumulate_and_read_back_immediately() {
    let (_client, provider) = setup();
    let (me, updater) = provider.my_presence().unwrap();

    let x = me.get()["x"].as_i64().unwrap();
    updater.set(object(json!({"x": x + 1})), PresenceOptions::default());
    assert_eq!(Json::Object(me.get()), json!({"x": 2}));

    let x = me.get()["x"].as_i64().unwrap();
    updater.set(object(json!({"x": x + 1})), PresenceOptions::default());
    assert_eq!(Json::Object(me.get()), json!({"x": 3}));
}

#[test]
fn presence_patch_extends_rather_than_replaces() {
    let (_client, provider) = setup();
    let (me, updater) = provider.my_presence().unwrap();

    updater.set(object(json!({"y": 0})), PresenceOptions::default());
    assert_eq!(Json::Object(me.get()), json!({"x": 1, "y": 0}));
}

// ─── Others ──────────────────────────────────────────────────────────────

#[test]
fn others_track_joins_presence_updates_and_abnormal_close() {
    let (client, provider) = setup();
    let others = provider.others().unwrap();
    assert!(others.get().is_empty());

    let sim = sim(&client);
    sim.user_joins(1, json!({"x": 2}));
    assert_eq!(
        others.get().as_slice(),
        &[User::new(ConnectionId::new(1), object(json!({"x": 2})))]
    );
    assert!(!others.get().as_slice()[0].is_read_only);

    sim.update_remote_presence(1, json!({"y": 0}));
    assert_eq!(
        others.get().as_slice(),
        &[User::new(ConnectionId::new(1), object(json!({"x": 2, "y": 0})))]
    );

    sim.abnormal_close();
    assert!(others.get().is_empty());
}

#[test]
fn connection_id_projection_ignores_presence_churn() {
    let (client, provider) = setup();
    let ids = provider.others_connection_ids().unwrap();

    let sim = sim(&client);
    sim.user_joins(1, json!({"x": 0}));
    sim.user_joins(2, json!({"x": 0}));
    assert_eq!(ids.get(), vec![ConnectionId::new(1), ConnectionId::new(2)]);
    assert_eq!(ids.version(), 2);

    // A presence update notifies the others topic, but the id list is
    // unchanged, so nothing republishes.
    sim.update_remote_presence(1, json!({"x": 5}));
    assert_eq!(ids.version(), 2);

    sim.user_leaves(1);
    assert_eq!(ids.get(), vec![ConnectionId::new(2)]);
    assert_eq!(ids.version(), 3);
}

#[test]
fn mapped_projection_republishes_only_when_a_pair_changes() {
    let (client, provider) = setup();
    let xs = provider
        .others_mapped(|user| user.presence["x"].clone())
        .unwrap();

    let sim = sim(&client);
    sim.user_joins(1, json!({"x": 1, "y": 1}));
    assert_eq!(xs.get(), vec![(ConnectionId::new(1), json!(1))]);
    let published = xs.version();

    // Only `y` changes; the mapped pairs are equal, so no publication.
    sim.update_remote_presence(1, json!({"y": 2}));
    assert_eq!(xs.version(), published);

    sim.update_remote_presence(1, json!({"x": 3}));
    assert_eq!(xs.get(), vec![(ConnectionId::new(1), json!(3))]);
    assert_eq!(xs.version(), published + 1);
}

#[test]
fn shallow_equality_suppresses_rebuilt_array_republication() {
    let (client, provider) = setup();
    let cursors = provider
        .select_others_with(
            |others| {
                Json::Array(
                    others
                        .iter()
                        .map(|user| user.presence["x"].clone())
                        .collect(),
                )
            },
            shallow,
        )
        .unwrap();

    let sim = sim(&client);
    sim.user_joins(1, json!({"x": 1, "y": 1}));
    let published = cursors.version();

    sim.update_remote_presence(1, json!({"y": 9}));
    assert_eq!(cursors.version(), published);

    sim.update_remote_presence(1, json!({"x": 2}));
    assert_eq!(cursors.version(), published + 1);
    assert_eq!(cursors.get(), json!([2]));
}

#[test]
fn indexed_binding_fails_until_the_participant_appears() {
    let (client, provider) = setup();
    let other = provider
        .other(ConnectionId::new(1), |user| user.presence.clone())
        .unwrap();

    assert_eq!(
        other.get(),
        Err(RoomError::NotFound {
            connection_id: ConnectionId::new(1)
        })
    );

    let sim = sim(&client);
    sim.user_joins(1, json!({"x": 2}));
    assert_eq!(other.get(), Ok(object(json!({"x": 2}))));

    sim.abnormal_close();
    assert!(other.get().is_err());
}

#[test]
fn released_binding_ignores_further_room_activity() {
    let (client, provider) = setup();
    let others = provider.others().unwrap();

    others.release();
    others.release();

    sim(&client).user_joins(1, json!({"x": 2}));
    assert!(others.get().is_empty());
    assert_eq!(others.version(), 0);
}

// ─── Self ────────────────────────────────────────────────────────────────

#[test]
fn me_is_absent_until_connected() {
    let (client, provider) = setup();
    let me = provider.me().unwrap();
    assert!(me.get().is_none());

    sim(&client).connect();
    let user = me.get().unwrap();
    assert_eq!(Json::Object(user.presence), json!({"x": 1}));
}

#[test]
fn select_me_projects_presence_once_connected() {
    let (client, provider) = setup();
    let x = provider.select_me(|user| user.presence["x"].clone()).unwrap();
    assert_eq!(x.get(), None);

    sim(&client).connect();
    assert_eq!(x.get(), Some(json!(1)));
}

// ─── Storage ─────────────────────────────────────────────────────────────

#[test]
fn storage_is_absent_before_load_then_holds_the_selection() {
    let (client, provider) = setup();
    let obj = provider.storage(|root| root["obj"].clone()).unwrap();
    assert_eq!(obj.get(), None);

    sim(&client).load_storage();
    assert_eq!(obj.get(), Some(json!({"a": 0, "nested": ["foo", "bar"]})));
}

#[test]
fn storage_reads_never_rerun_the_selector() {
    let (client, provider) = setup();
    let evaluations = Rc::new(Cell::new(0u32));
    let evaluations2 = Rc::clone(&evaluations);

    let obj = provider
        .storage(move |root| {
            evaluations2.set(evaluations2.get() + 1);
            root["obj"].clone()
        })
        .unwrap();

    // Pre-load the wrapped selector short-circuits to absent.
    assert_eq!(evaluations.get(), 0);

    sim(&client).load_storage();
    assert_eq!(evaluations.get(), 1);

    let first = obj.get();
    let second = obj.get();
    assert_eq!(first, second);
    assert_eq!(evaluations.get(), 1);
}

#[test]
fn storage_selectors_run_arbitrary_expressions() {
    let (client, provider) = setup();
    let shouted = provider
        .storage(|root| root["obj"].to_string().to_uppercase())
        .unwrap();

    sim(&client).load_storage();
    assert_eq!(
        shouted.get(),
        Some(r#"{"A":0,"NESTED":["FOO","BAR"]}"#.to_string())
    );
}

#[test]
fn mutable_root_loads_exactly_once_with_a_stable_handle() {
    let (client, provider) = setup();
    let root = provider.mutable_root().unwrap();
    assert!(root.get().is_none());
    assert!(!root.is_loaded());

    let sim = sim(&client);
    sim.load_storage();
    let first = root.get().unwrap();
    let second = root.get().unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(root.version(), 1);

    // A second load signal must not republish or resubscribe.
    sim.load_storage();
    assert_eq!(root.version(), 1);
    assert!(root.get().unwrap().ptr_eq(&first));
}

// ─── Mutations and history ───────────────────────────────────────────────

#[test]
fn mutation_context_fails_fast_before_readiness() {
    let (client, provider) = setup();

    let storage = provider.mutation(|ctx| ctx.storage()).unwrap();
    assert_eq!(
        storage.unwrap_err(),
        RoomError::NotReady {
            what: NotReadyKind::Storage
        }
    );

    let me = provider.mutation(|ctx| ctx.me()).unwrap();
    assert_eq!(
        me.unwrap_err(),
        RoomError::NotReady {
            what: NotReadyKind::Me
        }
    );

    let others = provider.mutation(|ctx| ctx.others()).unwrap();
    assert_eq!(
        others.unwrap_err(),
        RoomError::NotReady {
            what: NotReadyKind::Others
        }
    );

    sim(&client).connect();
    let others = provider.mutation(|ctx| ctx.others()).unwrap();
    assert!(others.unwrap().is_empty());
}

#[test]
fn can_undo_and_can_redo_walk_the_history() {
    let (client, provider) = setup();
    let can_undo = provider.can_undo().unwrap();
    let can_redo = provider.can_redo().unwrap();
    assert!(!can_undo.get());
    assert!(!can_redo.get());

    sim(&client).load_storage();
    assert!(!can_undo.get());
    assert!(!can_redo.get());

    let counter = Cell::new(0i64);
    let mutate_once = || {
        counter.set(counter.get() + 1);
        let value = counter.get();
        provider
            .mutation(|ctx| {
                let obj = ctx.storage()?.get("obj").unwrap().as_object().unwrap();
                obj.set("a", value);
                Ok::<(), RoomError>(())
            })
            .unwrap()
            .unwrap();
    };

    mutate_once();
    assert!(can_undo.get());
    assert!(!can_redo.get());

    provider.undo().unwrap();
    assert!(!can_undo.get());
    assert!(can_redo.get());

    mutate_once();
    mutate_once();
    mutate_once();
    assert!(can_undo.get());
    assert!(!can_redo.get());

    provider.undo().unwrap();
    provider.undo().unwrap();
    assert!(can_undo.get());
    assert!(can_redo.get());

    provider.undo().unwrap();
    assert!(!can_undo.get());
    assert!(can_redo.get());
}

#[test]
fn each_mutation_is_one_history_entry() {
    let (client, provider) = setup();
    let sim = sim(&client);
    sim.load_storage();
    let room = client.room("room").unwrap();

    for i in 1..=3i64 {
        provider
            .mutation(|ctx| {
                let obj = ctx.storage()?.get("obj").unwrap().as_object().unwrap();
                obj.set("a", i);
                Ok::<(), RoomError>(())
            })
            .unwrap()
            .unwrap();
    }
    assert_eq!(room.history_depth(), 3);

    // Each entry is undoable individually.
    let history = provider.history().unwrap();
    let obj = provider.storage(|root| root["obj"]["a"].clone()).unwrap();
    assert_eq!(obj.get(), Some(json!(3)));
    history.undo();
    assert_eq!(obj.get(), Some(json!(2)));
    history.undo();
    assert_eq!(obj.get(), Some(json!(1)));
    history.undo();
    assert_eq!(obj.get(), Some(json!(0)));
    assert!(!history.can_undo());
    assert!(history.can_redo());
}

#[test]
fn one_mutation_with_many_writes_is_one_history_entry() {
    let (client, provider) = setup();
    sim(&client).load_storage();
    let room = client.room("room").unwrap();

    provider
        .mutation(|ctx| {
            let obj = ctx.storage()?.get("obj").unwrap().as_object().unwrap();
            obj.set("a", 1);
            obj.set("b", 2);
            obj.set("c", 3);
            Ok::<(), RoomError>(())
        })
        .unwrap()
        .unwrap();

    assert_eq!(room.history_depth(), 1);
    provider.undo().unwrap();

    let obj = provider.storage(|root| root["obj"].clone()).unwrap();
    assert_eq!(obj.get(), Some(json!({"a": 0, "nested": ["foo", "bar"]})));
}

#[test]
fn nested_batches_publish_once() {
    let (client, provider) = setup();
    sim(&client).load_storage();
    let room = client.room("room").unwrap();

    let selection = provider.storage(|root| root["obj"].clone()).unwrap();
    let published = selection.version();

    provider
        .batch(|| {
            let root = room.storage_root().unwrap();
            let live_obj = root.get("obj").unwrap().as_object().unwrap();
            live_obj.set("a", 1);
            provider
                .batch(|| {
                    live_obj.set("b", 2);
                })
                .unwrap();
            // Inner batch closed, outer still open: nothing published.
            assert_eq!(selection.version(), published);
        })
        .unwrap();

    assert_eq!(selection.version(), published + 1);
    assert_eq!(room.history_depth(), 1);
}

#[test]
fn mutation_can_update_presence_into_history() {
    let (client, provider) = setup();
    sim(&client).load_storage();
    let (me, _updater) = provider.my_presence().unwrap();

    provider
        .mutation(|ctx| {
            ctx.set_presence(object(json!({"x": 10})), PresenceOptions::history());
        })
        .unwrap();
    assert_eq!(Json::Object(me.get()), json!({"x": 10}));

    provider.undo().unwrap();
    assert_eq!(Json::Object(me.get()), json!({"x": 1}));
}

// ─── Events ──────────────────────────────────────────────────────────────

#[test]
fn broadcasts_go_out_and_remote_events_come_in() {
    let (client, provider) = setup();
    let sim = sim(&client);
    sim.connect();

    let received = Rc::new(std::cell::RefCell::new(Vec::new()));
    let received2 = Rc::clone(&received);
    let _sub = provider
        .on_event(move |event| received2.borrow_mut().push(event.clone()))
        .unwrap();

    provider
        .broadcast(json!({"type": "EMOJI", "value": "🎉"}), BroadcastOptions::default())
        .unwrap();
    assert_eq!(sim.sent_events(), vec![json!({"type": "EMOJI", "value": "🎉"})]);
    // The sender does not receive its own broadcast.
    assert!(received.borrow().is_empty());

    sim.emit_event(2, json!({"type": "PING"}));
    assert_eq!(received.borrow().len(), 1);
    assert_eq!(received.borrow()[0].connection_id, ConnectionId::new(2));
    assert_eq!(received.borrow()[0].event, json!({"type": "PING"}));
}

#[test]
fn error_listener_observes_abnormal_close() {
    let (client, provider) = setup();
    let codes = Rc::new(std::cell::RefCell::new(Vec::new()));
    let codes2 = Rc::clone(&codes);
    let _sub = provider
        .on_error(move |error| codes2.borrow_mut().push(error.code))
        .unwrap();

    sim(&client).abnormal_close();
    assert_eq!(*codes.borrow(), vec![Some(1006)]);
}

// ─── Provider lifecycle ──────────────────────────────────────────────────

#[test]
fn bindings_fail_with_missing_context_after_leave() {
    let (_client, provider) = setup();
    provider.leave();
    provider.leave(); // idempotent

    assert!(matches!(provider.others(), Err(RoomError::MissingContext)));
    assert!(matches!(
        provider.my_presence(),
        Err(RoomError::MissingContext)
    ));
    assert!(matches!(
        provider.mutation(|_| ()),
        Err(RoomError::MissingContext)
    ));
}

#[test]
fn dropping_the_provider_leaves_the_room() {
    let (client, provider) = setup();
    assert!(client.has_room("room"));
    drop(provider);
    assert!(!client.has_room("room"));
}

#[test]
#[should_panic(expected = "already active")]
fn two_providers_for_the_same_room_id_are_forbidden() {
    let client = Rc::new(MockClient::new());
    let context = RoomContext::new(client as Rc<dyn Client>);
    let _first = context.provide(RoomOptions::new("room"));
    let _second = context.provide(RoomOptions::new("room"));
}

#[test]
fn providers_for_different_room_ids_coexist() {
    let client = Rc::new(MockClient::new());
    let context = RoomContext::new(client.clone() as Rc<dyn Client>);
    let a = context.provide(RoomOptions::new("alpha"));
    let b = context.provide(RoomOptions::new("beta"));
    assert!(client.has_room("alpha"));
    assert!(client.has_room("beta"));

    // Leaving one frees its id for a fresh provider.
    a.leave();
    let _again = context.provide(RoomOptions::new("alpha"));
    drop(b);
}
