//! 宴会预算测试
//!
//! 金额计算、定金流转、发票号分配

mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::*;
use mesa_client::{ClientResult, Collection, InvoiceCounter, MemoryInvoiceCounter, MemoryStore, RemoteStore};
use mesa_engine::{EntityStore, PrintJob, StoreError, StoreOptions};
use serde_json::json;
use shared::message::SyncOp;
use shared::models::{
    DepositMovement, DepositStatus, EventBudget, EventBudgetCreate, EventBudgetUpdate, EventMenuCreate,
    EventMenuUpdate, EventStatus,
};
use shared::order::MergePolicy;
use shared::types::EntityId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn wedding() -> EventBudgetCreate {
    EventBudgetCreate {
        name: "Boda Etxeberria".into(),
        date: NaiveDate::from_ymd_opt(2026, 11, 21),
        guests: 10,
        tax_rate: 0.10,
        has_vat: true,
        deposit_amount: 300.0,
        client_nif: "12345678Z".into(),
        ..Default::default()
    }
}

async fn saved_event(t: &Terminal, input: EventBudgetCreate) -> EventBudget {
    t.store.create_event(input).unwrap().wait().await.unwrap()
}

#[tokio::test]
async fn test_venue_only_total() {
    let t = terminal();
    let event = saved_event(
        &t,
        EventBudgetCreate {
            is_venue_only: true,
            venue_price: 200.0,
            ..wedding()
        },
    )
    .await;
    assert_eq!(event.total, 220.0);
    assert!(!event.id.is_local());
    assert_eq!(event.status, EventStatus::Draft);

    let without_vat = t
        .store
        .update_event(
            &event.id,
            EventBudgetUpdate {
                has_vat: Some(false),
                ..Default::default()
            },
        )
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(without_vat.total, 200.0);
}

#[tokio::test]
async fn test_menu_total_and_frozen_price() {
    let t = terminal();
    let menu = t
        .store
        .create_event_menu(EventMenuCreate {
            name: "Menú Txuleta".into(),
            price_per_person: 55.0,
            description: None,
        })
        .unwrap()
        .wait()
        .await
        .unwrap();
    let event = saved_event(&t, wedding()).await;

    let selected = t.store.select_event_menu(&event.id, &menu.id, 10).unwrap().wait().await.unwrap();
    assert_eq!(selected.selected_menus[0].unit_price, 55.0);
    assert_eq!(selected.total, 605.0);

    // later catalog changes do not reach the event
    t.store
        .update_event_menu(
            &menu.id,
            EventMenuUpdate {
                price_per_person: Some(60.0),
                ..Default::default()
            },
        )
        .unwrap()
        .wait()
        .await
        .unwrap();
    let resized = t.store.select_event_menu(&event.id, &menu.id, 12).unwrap().wait().await.unwrap();
    assert_eq!(resized.selected_menus[0].unit_price, 55.0);
    assert_eq!(resized.total, 726.0);

    let cleared = t.store.select_event_menu(&event.id, &menu.id, 0).unwrap().wait().await.unwrap();
    assert!(cleared.selected_menus.is_empty());
    assert_eq!(cleared.total, 0.0);

    // remote row agrees
    let rows = t.remote.rows(Collection::Agenda);
    assert_eq!(rows[0]["total"], 0.0);
}

#[tokio::test]
async fn test_unsaved_or_inactive_menu_rejected() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;

    let pending = t
        .store
        .create_event_menu(EventMenuCreate {
            name: "Menú Infantil".into(),
            price_per_person: 20.0,
            description: None,
        })
        .unwrap();
    let local_id = pending.local().id.clone();
    assert!(matches!(
        t.store.select_event_menu(&event.id, &local_id, 5),
        Err(StoreError::Validation(_))
    ));
    let menu = pending.wait().await.unwrap();

    t.store
        .update_event_menu(
            &menu.id,
            EventMenuUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert!(matches!(
        t.store.select_event_menu(&event.id, &menu.id, 5),
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_event_validation() {
    let t = terminal();
    assert!(matches!(
        t.store.create_event(EventBudgetCreate {
            date: None,
            ..wedding()
        }),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        t.store.create_event(EventBudgetCreate {
            venue_price: -5.0,
            ..wedding()
        }),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        t.store.create_event(EventBudgetCreate {
            name: "  ".into(),
            ..wedding()
        }),
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_status_can_be_set_directly() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;
    let paid = t.store.set_event_status(&event.id, EventStatus::Paid).unwrap().wait().await.unwrap();
    assert_eq!(paid.status, EventStatus::Paid);
    let back = t.store.set_event_status(&event.id, EventStatus::Draft).unwrap().wait().await.unwrap();
    assert_eq!(back.status, EventStatus::Draft);
}

#[tokio::test]
async fn test_deposit_flow_prints_receipts() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;

    assert!(matches!(
        t.store.set_deposit_status(&event.id, DepositStatus::Returned),
        Err(StoreError::DepositTransition { .. })
    ));
    t.store.set_deposit_status(&event.id, DepositStatus::Paid).unwrap().wait().await.unwrap();
    assert!(matches!(
        t.store.set_deposit_status(&event.id, DepositStatus::Paid),
        Err(StoreError::DepositTransition { .. })
    ));
    let returned = t
        .store
        .set_deposit_status(&event.id, DepositStatus::Returned)
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(returned.deposit_status, DepositStatus::Returned);
    assert!(matches!(
        t.store.set_deposit_status(&event.id, DepositStatus::Pending),
        Err(StoreError::DepositTransition { .. })
    ));

    let printer = t.printer.clone();
    eventually(|| printer.jobs().len() == 2).await;
    let movements: Vec<DepositMovement> = t
        .printer
        .jobs()
        .into_iter()
        .filter_map(|job| match job {
            PrintJob::Deposit { receipt, .. } => {
                assert_eq!(receipt.amount, 300.0);
                Some(receipt.movement)
            }
            PrintJob::Event(_) => None,
        })
        .collect();
    assert_eq!(movements, vec![DepositMovement::Received, DepositMovement::Returned]);
}

#[tokio::test]
async fn test_tasks() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;
    let with_task = t.store.add_event_task(&event.id, "Confirmar flores").unwrap().wait().await.unwrap();
    let task_id = with_task.tasks[0].id.clone();

    let toggled = t.store.toggle_event_task(&event.id, &task_id).unwrap().wait().await.unwrap();
    assert!(toggled.tasks[0].completed);
    t.store.remove_event_task(&event.id, &task_id).unwrap().wait().await.unwrap();
    assert!(t.store.event(&event.id).unwrap().tasks.is_empty());

    assert!(matches!(
        t.store.toggle_event_task(&event.id, &task_id),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(t.store.add_event_task(&event.id, " "), Err(StoreError::Validation(_))));
}

#[tokio::test]
async fn test_invoice_number_drawn_once_under_concurrency() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;

    let (a, b, c) = tokio::join!(
        t.store.assign_invoice_number(&event.id),
        t.store.assign_invoice_number(&event.id),
        t.store.print_event_invoice(&event.id),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert_eq!(a, 1000);
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(t.counter.calls(), 1);
    assert_eq!(t.store.event(&event.id).unwrap().invoice_number, Some(1000));

    let printer = t.printer.clone();
    eventually(|| printer.jobs().iter().any(|j| matches!(j, PrintJob::Event(_)))).await;

    // a second event gets the next number
    let other = saved_event(&t, wedding()).await;
    assert_eq!(t.store.assign_invoice_number(&other.id).await.unwrap(), 1001);
}

#[tokio::test]
async fn test_invoice_counter_failure_leaves_event_untouched() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;
    t.counter.set_failing(true);

    let err = t.store.assign_invoice_number(&event.id).await.unwrap_err();
    assert!(matches!(err, StoreError::InvoiceAssignment(_)));
    assert_eq!(t.store.event(&event.id).unwrap().invoice_number, None);

    t.counter.set_failing(false);
    assert_eq!(t.store.assign_invoice_number(&event.id).await.unwrap(), 1000);
}

#[tokio::test]
async fn test_invoice_number_not_redrawn_by_stale_terminal() {
    let remote = MemoryStore::new();
    let counter = Arc::new(MemoryInvoiceCounter::starting_at(1000));
    let a = terminal_sharing(remote.clone(), "barra", MergePolicy::MergeMatching, counter.clone());
    let b = terminal_sharing(remote.clone(), "oficina", MergePolicy::MergeMatching, counter.clone());

    let event = saved_event(&a, wedding()).await;
    b.store.load_all().await.unwrap();
    assert_eq!(b.store.event(&event.id).unwrap().invoice_number, None);

    assert_eq!(a.store.assign_invoice_number(&event.id).await.unwrap(), 1000);
    // b has no listener and still caches the event without a number
    assert_eq!(b.store.assign_invoice_number(&event.id).await.unwrap(), 1000);

    assert_eq!(counter.calls(), 1);
    assert_eq!(remote.rows(Collection::Agenda)[0]["invoice_number"], 1000);
    assert_eq!(b.store.event(&event.id).unwrap().invoice_number, Some(1000));
}

#[tokio::test]
async fn test_unstored_invoice_number_is_reused() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;
    t.remote.fail_next_on(SyncOp::Update, Collection::Agenda);

    let err = t.store.assign_invoice_number(&event.id).await.unwrap_err();
    assert!(matches!(err, StoreError::InvoiceAssignment(_)));
    assert_eq!(t.store.event(&event.id).unwrap().invoice_number, None);
    assert!(t.remote.rows(Collection::Agenda)[0]["invoice_number"].is_null());

    // the same number is stored on the next attempt
    assert_eq!(t.store.assign_invoice_number(&event.id).await.unwrap(), 1000);
    assert_eq!(t.counter.calls(), 1);
    assert_eq!(t.remote.rows(Collection::Agenda)[0]["invoice_number"], 1000);
}

/// Another terminal stores its number while this one is drawing
#[derive(Debug)]
struct RacingCounter {
    remote: MemoryStore,
    event_id: EntityId,
    calls: AtomicUsize,
}

#[async_trait]
impl InvoiceCounter for RacingCounter {
    async fn next_invoice_number(&self) -> ClientResult<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let patch = json!({ "invoice_number": 1000 }).as_object().cloned().unwrap();
        self.remote.update(Collection::Agenda, &self.event_id, patch).await?;
        Ok(1001)
    }
}

#[tokio::test]
async fn test_invoice_number_lost_race_adopts_remote_number() {
    let remote = MemoryStore::new();
    let seed = terminal_on(remote.clone(), "barra", MergePolicy::MergeMatching);
    let event = saved_event(&seed, wedding()).await;

    let counter = Arc::new(RacingCounter {
        remote: remote.clone(),
        event_id: event.id.clone(),
        calls: AtomicUsize::new(0),
    });
    let store = EntityStore::new(Arc::new(remote.clone()), counter.clone(), StoreOptions::default());
    store.load_all().await.unwrap();

    assert_eq!(store.assign_invoice_number(&event.id).await.unwrap(), 1000);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.rows(Collection::Agenda)[0]["invoice_number"], 1000);
    assert_eq!(store.event(&event.id).unwrap().invoice_number, Some(1000));

    // settled: no further draw
    assert_eq!(store.assign_invoice_number(&event.id).await.unwrap(), 1000);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_event_and_menu() {
    let t = terminal();
    let event = saved_event(&t, wedding()).await;
    t.store.delete_event(&event.id).unwrap().wait().await.unwrap();
    assert!(t.store.events().is_empty());
    assert!(t.remote.rows(Collection::Agenda).is_empty());

    let menu = t
        .store
        .create_event_menu(EventMenuCreate {
            name: "Menú Degustación".into(),
            price_per_person: 75.0,
            description: Some("7 pases".into()),
        })
        .unwrap()
        .wait()
        .await
        .unwrap();
    t.store.delete_event_menu(&menu.id).unwrap().wait().await.unwrap();
    assert!(t.store.event_menus().is_empty());
}
