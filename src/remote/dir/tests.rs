use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use super::{generate_document_id, DirectoryGateway};
use crate::domain::{ChecklistItem, TaskStatus};
use crate::remote::{FieldUpdate, RemoteError, RemoteTaskGateway, Subscription};
use crate::testing::{at, remote_task, unique_dir};

#[test]
fn create_assigns_hex_ids_and_snapshot_is_newest_first() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);

    let older = gateway
        .create(&remote_task("Older", at(1_000)))
        .expect("create older");
    let newer = gateway
        .create(&remote_task("Newer", at(5_000)))
        .expect("create newer");
    assert_eq!(older.len(), 20);
    assert!(older.chars().all(|ch| ch.is_ascii_hexdigit()));
    assert_ne!(older, newer);

    let snapshot = gateway.snapshot().expect("snapshot");
    let ids = snapshot
        .iter()
        .map(|task| task.id.clone().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![newer, older]);
    assert_eq!(snapshot[0].title, "Newer");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn update_merges_named_fields_only() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    let mut task = remote_task("Pump", at(1_000));
    task.location = Some("Hall A".to_string());
    task.signature_url = Some("file:///old.png".to_string());
    let id = gateway.create(&task).expect("create");

    gateway
        .update_fields(
            &id,
            &[
                FieldUpdate::Status(TaskStatus::InProgress),
                FieldUpdate::SignatureUrl(None),
                FieldUpdate::Checklist(vec![ChecklistItem::new("Drain tank")]),
            ],
        )
        .expect("update");

    let stored = gateway.snapshot().expect("snapshot").remove(0);
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert_eq!(stored.signature_url, None);
    assert_eq!(stored.location.as_deref(), Some("Hall A"));
    assert_eq!(stored.checklist[0].text, "Drain tank");

    let raw = std::fs::read_to_string(root.join(format!("{id}.json"))).expect("document");
    assert!(raw.contains("\"status\": \"inProgress\""));
    assert!(!raw.contains("signatureStorageURL"));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn update_of_missing_document_is_a_write_error() {
    let gateway = DirectoryGateway::new(unique_dir("remote"));
    let err = gateway
        .update_fields("abc123", &[FieldUpdate::Status(TaskStatus::ToDo)])
        .expect_err("missing document should fail");
    assert!(matches!(err, RemoteError::Write(_)));
}

#[test]
fn delete_is_idempotent() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    let id = gateway
        .create(&remote_task("Pump", at(1_000)))
        .expect("create");

    gateway.delete(&id).expect("delete");
    gateway.delete(&id).expect("second delete is a no-op");
    assert!(gateway.snapshot().expect("snapshot").is_empty());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn rejects_ids_that_are_not_plain_names() {
    let gateway = DirectoryGateway::new(unique_dir("remote"));
    assert!(gateway.delete("../escape").is_err());
    assert!(gateway.update_fields("", &[]).is_err());
}

#[test]
fn subscribers_get_initial_snapshot_and_every_change_until_unsubscribed() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    gateway
        .create(&remote_task("Existing", at(1_000)))
        .expect("create existing");

    let (tx, rx) = mpsc::channel();
    let mut subscription = gateway
        .subscribe(Box::new(move |batch| {
            let _ = tx.send(batch.len());
        }))
        .expect("subscribe");

    assert_eq!(rx.try_recv().ok(), Some(1));
    let id = gateway
        .create(&remote_task("Second", at(2_000)))
        .expect("create second");
    assert_eq!(rx.try_recv().ok(), Some(2));

    subscription.unsubscribe();
    subscription.unsubscribe();
    gateway.delete(&id).expect("delete");
    assert!(rx.try_recv().is_err());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn listener_can_unsubscribe_from_inside_its_callback() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let own_slot = Arc::clone(&slot);
    let own_calls = Arc::clone(&calls);
    let subscription = gateway
        .subscribe(Box::new(move |_batch| {
            own_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(mut own) = own_slot.lock().expect("slot lock").take() {
                own.unsubscribe();
            }
        }))
        .expect("subscribe");
    *slot.lock().expect("slot lock") = Some(subscription);

    gateway
        .create(&remote_task("First", at(1_000)))
        .expect("create first");
    gateway
        .create(&remote_task("Second", at(2_000)))
        .expect("create second");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn subscribing_while_another_thread_writes_misses_nothing() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    let (tx, rx) = mpsc::channel();

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for index in 0..20 {
                gateway
                    .create(&remote_task(&format!("Task {index}"), at(1_000 + index)))
                    .expect("concurrent create");
            }
        });
        let subscription = gateway
            .subscribe(Box::new(move |batch| {
                let _ = tx.send(batch.len());
            }))
            .expect("subscribe");
        writer.join().expect("writer thread");
        drop(subscription);
    });

    assert_eq!(rx.try_iter().last(), Some(20));
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn snapshot_skips_undecodable_documents() {
    let root = unique_dir("remote");
    let gateway = DirectoryGateway::new(&root);
    gateway
        .create(&remote_task("Valid", at(1_000)))
        .expect("create");
    std::fs::write(root.join("broken.json"), "{not json").expect("write broken");
    std::fs::write(root.join("notes.txt"), "ignored").expect("write other");

    let snapshot = gateway.snapshot().expect("snapshot");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title, "Valid");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn legacy_status_labels_are_read_and_written_back_canonically() {
    let root = unique_dir("remote");
    std::fs::create_dir_all(&root).expect("root");
    std::fs::write(
        root.join("legacy01.json"),
        r#"{
  "title": "Old task",
  "description": "Written by an older client",
  "status": "Kontrol",
  "assignedTo": "ayse",
  "createdAt": "2025-10-20T08:00:00Z",
  "slaDate": "2025-10-22T08:00:00Z",
  "mediaURLs": ["file:///m.jpg"]
}"#,
    )
    .expect("write legacy");
    let gateway = DirectoryGateway::new(&root);

    let snapshot = gateway.snapshot().expect("snapshot");
    assert_eq!(snapshot[0].status, TaskStatus::InReview);
    assert_eq!(snapshot[0].id.as_deref(), Some("legacy01"));

    gateway
        .update_fields("legacy01", &[FieldUpdate::Status(TaskStatus::Completed)])
        .expect("update");
    let raw = std::fs::read_to_string(root.join("legacy01.json")).expect("document");
    assert!(raw.contains("\"status\": \"completed\""));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn generated_ids_reroll_on_collision() {
    let mut attempts = 0;
    let id = generate_document_id(|_| {
        attempts += 1;
        attempts < 3
    });
    assert_eq!(attempts, 3);
    assert_eq!(id.len(), 20);
}
