mod common;

use std::sync::Arc;

use common::{Call, RecordingGateway, task};
use planner_core::{SyncSummary, TaskStore};
use planner_shared::{TASK_ID_PREFIX, TaskFilter, UiEvent};

#[tokio::test]
async fn add_toggle_edit_remove_scenario() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::new(Arc::clone(&gateway));
    assert!(store.load().await);
    assert!(store.tasks().is_empty());

    let eat = store.add("Eat");
    assert!(eat.id.starts_with(TASK_ID_PREFIX));
    assert_eq!(store.tasks(), [task(&eat.id, "Eat", false)]);

    let toggled = store.toggle_completed(&eat.id).expect("task exists");
    assert!(toggled.completed);
    assert_eq!(store.tasks(), [task(&eat.id, "Eat", true)]);

    let edited = store.edit(&eat.id, "Eat breakfast").expect("task exists");
    assert_eq!(edited, task(&eat.id, "Eat breakfast", true));
    assert_eq!(store.tasks(), [edited.clone()]);

    let removed = store.remove(&eat.id).expect("task exists");
    assert_eq!(removed, edited);
    assert!(store.tasks().is_empty());

    let summary = store.flush().await;
    assert_eq!(
        summary,
        SyncSummary {
            confirmed: 4,
            failed: 0
        }
    );

    let writes = gateway.write_calls();
    assert_eq!(writes.len(), 4);
    assert!(writes.contains(&Call::Create(task(&eat.id, "Eat", false))));
    assert!(writes.contains(&Call::Update(task(&eat.id, "Eat", true))));
    assert!(writes.contains(&Call::Update(task(&eat.id, "Eat breakfast", true))));
    assert!(writes.contains(&Call::Delete(eat.id.clone())));
    assert!(gateway.remote().is_empty());
}

#[tokio::test]
async fn filters_select_without_reordering() {
    let a = task("todo-a", "A", false);
    let b = task("todo-b", "B", true);
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::with_tasks(gateway, vec![a.clone(), b.clone()]);

    assert_eq!(store.filter(), TaskFilter::All);
    assert_eq!(store.visible_tasks(), vec![&a, &b]);

    store.set_filter(TaskFilter::Active);
    assert_eq!(store.visible_tasks(), vec![&a]);

    store.set_filter(TaskFilter::Completed);
    assert_eq!(store.visible_tasks(), vec![&b]);

    store.set_filter(TaskFilter::All);
    assert_eq!(store.visible_tasks(), vec![&a, &b]);
}

#[tokio::test]
async fn visible_tasks_follow_later_mutations() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::new(gateway);
    store.set_filter(TaskFilter::Active);

    let first = store.add("first");
    let second = store.add("second");
    assert_eq!(store.visible_tasks().len(), 2);

    store.toggle_completed(&first.id);
    let visible: Vec<_> = store.visible_tasks().into_iter().map(|t| t.id.clone()).collect();
    assert_eq!(visible, vec![second.id.clone()]);

    store.set_filter(TaskFilter::Completed);
    let visible: Vec<_> = store.visible_tasks().into_iter().map(|t| t.id.clone()).collect();
    assert_eq!(visible, vec![first.id]);
}

#[tokio::test]
async fn toggle_twice_restores_and_sends_each_new_value() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::with_tasks(
        Arc::clone(&gateway),
        vec![task("todo-1", "Sleep", false)],
    );

    store.toggle_completed("todo-1");
    store.toggle_completed("todo-1");
    assert_eq!(store.tasks(), [task("todo-1", "Sleep", false)]);

    store.flush().await;
    let writes = gateway.write_calls();
    assert_eq!(writes.len(), 2);
    assert!(writes.contains(&Call::Update(task("todo-1", "Sleep", true))));
    assert!(writes.contains(&Call::Update(task("todo-1", "Sleep", false))));
}

#[tokio::test]
async fn edit_sends_unchanged_completion() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::with_tasks(
        Arc::clone(&gateway),
        vec![task("todo-1", "Repeat", false)],
    );

    store.edit("todo-1", "Repeat daily");
    store.flush().await;

    assert_eq!(
        gateway.write_calls(),
        vec![Call::Update(task("todo-1", "Repeat daily", false))]
    );
}

#[tokio::test]
async fn unknown_ids_are_local_noops_without_remote_calls() {
    let gateway = Arc::new(RecordingGateway::default());
    let original = vec![task("todo-1", "Eat", false)];
    let mut store = TaskStore::with_tasks(Arc::clone(&gateway), original.clone());
    let updates = store.subscribe();

    assert!(store.toggle_completed("todo-missing").is_none());
    assert!(store.edit("todo-missing", "x").is_none());
    assert!(store.remove("todo-missing").is_none());

    assert_eq!(store.tasks(), original.as_slice());
    assert_eq!(store.pending_syncs(), 0);
    assert!(!updates.has_changed().expect("store alive"));
    assert_eq!(store.flush().await, SyncSummary::default());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn removed_id_cannot_be_mutated_again() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::new(Arc::clone(&gateway));
    let keep = store.add("keep");
    let gone = store.add("gone");

    store.remove(&gone.id);
    let after_remove = store.tasks().to_vec();

    assert!(store.toggle_completed(&gone.id).is_none());
    assert!(store.edit(&gone.id, "back").is_none());
    assert!(store.remove(&gone.id).is_none());
    assert_eq!(store.tasks(), after_remove.as_slice());
    assert_eq!(store.tasks(), [keep]);

    let summary = store.flush().await;
    assert_eq!(summary.confirmed, 3);
    let deletes = gateway
        .write_calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Delete(_)))
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn load_replaces_local_list() {
    let remote = vec![task("todo-a", "A", false), task("todo-b", "B", true)];
    let gateway = Arc::new(RecordingGateway::with_remote(remote.clone()));
    let mut store = TaskStore::with_tasks(
        Arc::clone(&gateway),
        vec![task("todo-local", "stale", false)],
    );
    let mut updates = store.subscribe();

    assert!(store.load().await);
    assert_eq!(store.tasks(), remote.as_slice());
    assert!(updates.has_changed().expect("store alive"));
    assert_eq!(*updates.borrow_and_update(), remote);
    assert_eq!(gateway.calls(), vec![Call::List]);
}

#[tokio::test]
async fn failed_load_keeps_previous_list() {
    let gateway = Arc::new(RecordingGateway::failing_list());
    let mut store = TaskStore::with_tasks(gateway, vec![task("todo-1", "Eat", false)]);

    assert!(!store.load().await);
    assert_eq!(store.tasks(), [task("todo-1", "Eat", false)]);

    let gateway = Arc::new(RecordingGateway::failing_list());
    let mut empty = TaskStore::new(gateway);
    assert!(!empty.load().await);
    assert!(empty.tasks().is_empty());
}

#[tokio::test]
async fn duplicate_ids_are_collapsed() {
    let gateway = Arc::new(RecordingGateway::with_remote(vec![
        task("todo-1", "first", false),
        task("todo-1", "second", true),
        task("todo-2", "other", false),
    ]));
    let mut store = TaskStore::with_tasks(
        Arc::clone(&gateway),
        vec![task("todo-9", "x", false), task("todo-9", "y", false)],
    );
    assert_eq!(store.tasks(), [task("todo-9", "x", false)]);

    store.load().await;
    assert_eq!(
        store.tasks(),
        [task("todo-1", "first", false), task("todo-2", "other", false)]
    );
}

#[tokio::test]
async fn remote_failures_never_roll_back() {
    let gateway = Arc::new(RecordingGateway::failing_writes());
    let mut store = TaskStore::with_tasks(
        Arc::clone(&gateway),
        vec![task("todo-1", "Eat", false), task("todo-2", "Sleep", false)],
    );

    let added = store.add("Repeat");
    store.toggle_completed("todo-1");
    store.remove("todo-2");

    let summary = store.flush().await;
    assert_eq!(
        summary,
        SyncSummary {
            confirmed: 0,
            failed: 3
        }
    );
    assert_eq!(
        store.tasks(),
        [task("todo-1", "Eat", true), task(&added.id, "Repeat", false)]
    );
    assert_eq!(gateway.write_calls().len(), 3);
}

#[tokio::test]
async fn local_state_is_visible_before_remote_acknowledgment() {
    let (gateway, gate) = RecordingGateway::gated();
    let gateway = Arc::new(gateway);
    let mut store = TaskStore::new(Arc::clone(&gateway));
    let updates = store.subscribe();

    let added = store.add("Eat");
    assert_eq!(store.tasks(), [added.clone()]);
    assert_eq!(*updates.borrow(), vec![added.clone()]);

    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(gateway.write_calls(), vec![Call::Create(added.clone())]);
    assert!(gateway.remote().is_empty());
    assert_eq!(store.pending_syncs(), 1);

    // A second mutation is accepted while the first write is still open.
    let toggled = store.toggle_completed(&added.id).expect("task exists");
    assert!(toggled.completed);
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(store.pending_syncs(), 2);
    assert_eq!(
        gateway.write_calls(),
        vec![Call::Create(added.clone()), Call::Update(toggled.clone())]
    );

    gate.add_permits(1);
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(gateway.remote(), vec![added]);
    assert_eq!(store.pending_syncs(), 1);

    gate.add_permits(1);
    let summary = store.flush().await;
    assert_eq!(summary.confirmed, 2);
    assert_eq!(store.pending_syncs(), 0);
    assert_eq!(gateway.remote(), vec![toggled]);
}

#[tokio::test]
async fn ui_events_route_to_operations() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::new(Arc::clone(&gateway));

    assert!(store.apply(UiEvent::Add {
        name: String::new()
    }));
    let id = store.tasks()[0].id.clone();
    assert_eq!(store.tasks()[0].name, "");

    assert!(store.apply(UiEvent::Toggle { id: id.clone() }));
    assert!(store.apply(UiEvent::Edit {
        id: id.clone(),
        name: "Named".to_string()
    }));
    assert!(store.apply(UiEvent::SetFilter {
        filter: TaskFilter::Completed
    }));
    assert_eq!(store.visible_tasks(), vec![&task(&id, "Named", true)]);

    assert!(!store.apply(UiEvent::Toggle {
        id: "todo-unknown".to_string()
    }));
    assert!(store.apply(UiEvent::Delete { id: id.clone() }));
    assert!(!store.apply(UiEvent::Delete { id }));
    assert!(store.tasks().is_empty());

    assert_eq!(store.flush().await.confirmed, 4);
}

#[tokio::test]
async fn subscribers_see_every_published_list() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut store = TaskStore::new(gateway);
    let mut updates = store.subscribe();
    assert!(updates.borrow_and_update().is_empty());

    let added = store.add("Eat");
    assert!(updates.has_changed().expect("store alive"));
    assert_eq!(*updates.borrow_and_update(), vec![added.clone()]);

    store.set_filter(TaskFilter::Completed);
    assert!(!updates.has_changed().expect("store alive"));

    store.remove(&added.id);
    assert!(updates.has_changed().expect("store alive"));
    assert!(updates.borrow_and_update().is_empty());

    store.flush().await;
}
