//! RemoteSyncClient against the in-memory store

use chrono::NaiveDate;
use mesa_client::{Collection, MemoryStore, RemoteSyncClient};
use serde_json::json;
use shared::message::SyncOp;
use shared::models::{EventBudget, EventTask, Reservation, ReservationStatus};
use shared::types::EntityId;
use std::sync::Arc;

fn reservation() -> Reservation {
    Reservation {
        id: EntityId::local(),
        customer_name: "Ana".to_string(),
        phone: "611222333".to_string(),
        people: 3,
        date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        time: "20:30".to_string(),
        table_id: Some(EntityId::from(4)),
        notes: None,
        status: ReservationStatus::Confirmed,
        tags: Default::default(),
        created_at: None,
    }
}

#[tokio::test]
async fn test_create_replaces_local_id() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));

    let stored = client
        .create(Collection::Reservations, &reservation())
        .await
        .unwrap();

    assert!(!stored.id.is_local());
    assert!(stored.created_at.is_some());

    let rows = memory.rows(Collection::Reservations);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["customer_name"], "Ana");
    assert!(rows[0]["tags"].is_string());
}

#[tokio::test]
async fn test_patch_touches_only_given_fields() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));
    let stored = client
        .create(Collection::Reservations, &reservation())
        .await
        .unwrap();

    let patch = json!({ "people": 5, "tags": ["vip"] });
    let updated: Reservation = client
        .patch(
            Collection::Reservations,
            &stored.id,
            patch.as_object().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(updated.people, 5);
    assert!(updated.tags.contains("vip"));
    assert_eq!(updated.customer_name, "Ana");
}

#[tokio::test]
async fn test_fetch_skips_undecodable_rows() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));
    client
        .create(Collection::Reservations, &reservation())
        .await
        .unwrap();
    // missing required columns
    memory.seed(
        Collection::Reservations,
        json!({ "customer_name": "Roto" }).as_object().cloned().unwrap(),
    );

    let all: Vec<Reservation> = client.fetch_all(Collection::Reservations).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].customer_name, "Ana");
}

#[tokio::test]
async fn test_legacy_event_row() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));
    memory.seed(
        Collection::Agenda,
        json!({
            "name": "Comunión",
            "date": "2026-05-10",
            "guests": 40,
            "tasks": "[{\"id\":\"1\",\"text\":\"Tarta\",\"completed\":true}]",
            "selected_menus": "no es json",
            "client_nif": null
        })
        .as_object()
        .cloned()
        .unwrap(),
    );

    let events: Vec<EventBudget> = client.fetch_all(Collection::Agenda).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].tasks,
        vec![EventTask {
            id: "1".to_string(),
            text: "Tarta".to_string(),
            completed: true
        }]
    );
    assert!(events[0].selected_menus.is_empty());
    assert_eq!(events[0].client_nif, "");
}

#[tokio::test]
async fn test_failed_insert_surfaces_error() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));
    memory.fail_next(SyncOp::Insert);

    let result = client.create(Collection::Reservations, &reservation()).await;
    assert!(result.is_err());
    assert!(memory.rows(Collection::Reservations).is_empty());
}

#[tokio::test]
async fn test_write_once_field_keeps_first_value() {
    let memory = MemoryStore::new();
    let client = RemoteSyncClient::new(Arc::new(memory.clone()));
    let seeded = memory.seed(
        Collection::Agenda,
        json!({ "name": "Bautizo", "date": "2026-06-14", "guests": 30 })
            .as_object()
            .cloned()
            .unwrap(),
    );
    let id = EntityId::from(seeded["id"].as_i64().unwrap());

    let first: Option<EventBudget> = client
        .patch_if_unset(
            Collection::Agenda,
            &id,
            "invoiceNumber",
            json!({ "invoiceNumber": 1000 }).as_object().unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.unwrap().invoice_number, Some(1000));

    let second: Option<EventBudget> = client
        .patch_if_unset(
            Collection::Agenda,
            &id,
            "invoiceNumber",
            json!({ "invoiceNumber": 1001 }).as_object().unwrap(),
        )
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(memory.rows(Collection::Agenda)[0]["invoice_number"], 1000);
}
