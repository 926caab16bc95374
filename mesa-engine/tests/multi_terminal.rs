//! 多终端并发测试
//!
//! Several terminals share one backend, each running its own sync listener.
//! Commands from different terminals interleave; nothing may be lost.

mod common;

use common::*;
use futures::future::join_all;
use mesa_client::{Collection, MemoryStore};
use mesa_engine::SyncListener;
use rand::Rng;
use shared::models::ReservationCreate;
use shared::order::MergePolicy;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SENDS_PER_TERMINAL: usize = 20;

const PRODUCTS: &[(&str, f64)] = &[
    ("Caña", 2.5),
    ("Patatas bravas", 6.8),
    ("Pulpo a feira", 18.0),
    ("Croquetas", 8.5),
    ("Tortilla", 9.0),
    ("Café solo", 1.4),
];

fn listen(t: &Terminal, shutdown: &CancellationToken) -> JoinHandle<()> {
    tokio::spawn(SyncListener::new(t.store.clone(), shutdown.child_token()).run())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reservation_reaches_other_terminal() {
    let remote = MemoryStore::new();
    let a = terminal_on(remote.clone(), "barra", MergePolicy::MergeMatching);
    let b = terminal_on(remote.clone(), "sala", MergePolicy::MergeMatching);
    let shutdown = CancellationToken::new();
    let listeners = vec![listen(&a, &shutdown), listen(&b, &shutdown)];

    let created = a
        .store
        .create_reservation(ReservationCreate {
            customer_name: "Familia Ortega".into(),
            phone: String::new(),
            people: 8,
            date: shared::util::today(),
            time: "14:30".into(),
            table_id: Some(table(2)),
            notes: Some("trona".into()),
            tags: Default::default(),
        })
        .unwrap()
        .wait()
        .await
        .unwrap();

    let store = b.store.clone();
    let id = created.id.clone();
    eventually(move || store.reservation(&id).is_some()).await;
    assert_eq!(b.store.reservation(&created.id), Some(created.clone()));

    // deletes propagate as well
    b.store.delete_reservation(&created.id).unwrap().wait().await.unwrap();
    let store = a.store.clone();
    eventually(move || store.reservations().is_empty()).await;

    shutdown.cancel();
    join_all(listeners).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_lose_nothing() {
    let remote = MemoryStore::new();
    remote.set_latency(Duration::from_millis(1));
    let terminals = vec![
        terminal_on(remote.clone(), "barra", MergePolicy::MergeMatching),
        terminal_on(remote.clone(), "sala", MergePolicy::MergeMatching),
        terminal_on(remote.clone(), "terraza", MergePolicy::AlwaysNewLine),
    ];
    let shutdown = CancellationToken::new();
    let listeners: Vec<_> = terminals.iter().map(|t| listen(t, &shutdown)).collect();

    let workers: Vec<JoinHandle<usize>> = terminals
        .iter()
        .enumerate()
        .map(|(index, t)| {
            let store = t.store.clone();
            // each terminal serves its own table
            let mesa = table(index as i64 + 1);
            tokio::spawn(async move {
                let mut items = 0;
                for _ in 0..SENDS_PER_TERMINAL {
                    let count = rand::thread_rng().gen_range(1..=4);
                    for _ in 0..count {
                        let pick = rand::thread_rng().gen_range(0..PRODUCTS.len());
                        let (name, price) = PRODUCTS[pick];
                        store.add_item(&mesa, &product(pick as i64 + 1, name, price), None).unwrap();
                        items += 1;
                    }
                    store.send_order(&mesa, None).unwrap().wait().await.unwrap();
                }
                items
            })
        })
        .collect();

    let mut total_items = 0;
    for worker in join_all(workers).await {
        total_items += worker.unwrap();
    }

    let expected = SENDS_PER_TERMINAL * terminals.len();
    assert_eq!(remote.rows(Collection::KitchenTickets).len(), expected);

    for t in &terminals {
        let store = t.store.clone();
        eventually(move || {
            let tickets = store.kitchen_tickets();
            tickets.len() == expected && tickets.iter().all(|t| !t.id.is_local())
        })
        .await;
        let units: i32 = t.store.kitchen_tickets().iter().map(|k| k.item_count()).sum();
        assert_eq!(units as usize, total_items);
        assert!(t.store.pending_ops().is_empty());
    }

    shutdown.cancel();
    join_all(listeners).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_terminals_order_for_the_same_table() {
    let remote = MemoryStore::new();
    remote.set_latency(Duration::from_millis(1));
    let a = terminal_on(remote.clone(), "barra", MergePolicy::MergeMatching);
    let b = terminal_on(remote.clone(), "sala", MergePolicy::MergeMatching);
    let shutdown = CancellationToken::new();
    let listeners = vec![listen(&a, &shutdown), listen(&b, &shutdown)];
    let mesa = table(1);

    a.store.add_item(&mesa, &product(1, "Caña", 2.5), None).unwrap();
    b.store.add_item(&mesa, &product(2, "Patatas bravas", 6.8), None).unwrap();
    let (sent_a, sent_b) = tokio::join!(
        a.store.send_order(&mesa, None).unwrap().wait(),
        b.store.send_order(&mesa, None).unwrap().wait(),
    );
    let (sent_a, sent_b) = (sent_a.unwrap(), sent_b.unwrap());
    assert_ne!(sent_a.id, sent_b.id);

    for t in [&a, &b] {
        let store = t.store.clone();
        eventually(move || {
            let tickets = store.tickets_for_table(&table(1));
            tickets.len() == 2 && tickets.iter().all(|k| !k.id.is_local())
        })
        .await;
        let units: i32 = t.store.tickets_for_table(&mesa).iter().map(|k| k.item_count()).sum();
        assert_eq!(units, 2);

        let bill = t.store.request_bill(&mesa).unwrap();
        assert_eq!(bill.lines.len(), 2);
        assert!((t.store.bill_total(&mesa) - 9.3).abs() < 1e-9);
    }

    shutdown.cancel();
    join_all(listeners).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_signals_are_harmless() {
    let remote = MemoryStore::new();
    let t = terminal_on(remote.clone(), "barra", MergePolicy::MergeMatching);
    let shutdown = CancellationToken::new();
    let listener = listen(&t, &shutdown);

    t.store.add_item(&table(1), &product(1, "Caña", 2.5), None).unwrap();
    let ticket = t.store.send_order(&table(1), None).unwrap().wait().await.unwrap();
    for _ in 0..10 {
        remote.notify(Collection::KitchenTickets);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(t.store.kitchen_tickets(), vec![ticket]);
    shutdown.cancel();
    listener.await.unwrap();
}
