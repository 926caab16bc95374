//! 桌台生命周期测试

mod common;

use common::*;
use mesa_client::Collection;
use mesa_engine::{ElapsedTicker, StoreError};
use shared::models::{DiningTableCreate, ReservationCreate, TableStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_zones_follow_layout_order() {
    let t = terminal();
    let zones = t.store.zones();
    let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
    assert_eq!(names, vec!["Sala", "Terraza", "Barra"]);
    assert_eq!(zones[0].table_ids, vec![table(1), table(2)]);

    let added = t
        .store
        .add_table(DiningTableCreate {
            name: " 3 ".into(),
            zone: "".into(),
        })
        .unwrap();
    assert_eq!(added.name, "3");
    assert_eq!(added.zone, "Sala");
    assert_eq!(t.store.zones()[0].table_ids.len(), 3);
    assert_eq!(t.store.table_status(&added.id).unwrap(), TableStatus::Free);
}

#[tokio::test]
async fn test_rename_and_validation() {
    let t = terminal();
    assert_eq!(t.store.rename_table(&table(3), "Terraza 1").unwrap().name, "Terraza 1");
    assert!(matches!(t.store.rename_table(&table(3), "  "), Err(StoreError::Validation(_))));
    assert!(matches!(
        t.store.add_table(DiningTableCreate {
            name: "".into(),
            zone: "Sala".into(),
        }),
        Err(StoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_manual_reservation_flag() {
    let t = terminal();
    let mesa = table(2);
    t.store.set_manual_reserved(&mesa, true).unwrap();
    assert_eq!(t.store.table_status(&mesa).unwrap(), TableStatus::Reserved);

    // occupancy wins over the flag
    t.store.add_item(&mesa, &product(1, "Caña", 2.5), None).unwrap();
    assert_eq!(t.store.table_status(&mesa).unwrap(), TableStatus::Occupied);
}

#[tokio::test]
async fn test_confirmed_reservation_reserves_table_for_its_date() {
    let t = terminal();
    let today = shared::util::today();
    t.store
        .create_reservation(ReservationCreate {
            customer_name: "Marta".into(),
            phone: String::new(),
            people: 4,
            date: today,
            time: "22:00".into(),
            table_id: Some(table(3)),
            notes: None,
            tags: Default::default(),
        })
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(t.store.table_status(&table(3)).unwrap(), TableStatus::Reserved);
    let tomorrow = today.succ_opt().unwrap();
    assert_eq!(t.store.table_status_on(&table(3), tomorrow).unwrap(), TableStatus::Free);
}

#[tokio::test]
async fn test_busy_table_cannot_be_deleted_until_closed() {
    let t = terminal();
    let mesa = table(1);
    t.store.add_item(&mesa, &product(1, "Caña", 2.5), None).unwrap();
    t.store.send_order(&mesa, None).unwrap().wait().await.unwrap();
    t.store.add_item(&mesa, &product(2, "Bravas", 6.8), None).unwrap();
    t.store.request_bill(&mesa).unwrap();
    t.store.set_manual_reserved(&mesa, true).unwrap();

    assert!(matches!(t.store.delete_table(&mesa), Err(StoreError::TableBusy(_))));

    let closure = t.store.close_table(&mesa).unwrap();
    assert_eq!(closure.tickets.len(), 1);
    assert_eq!(t.store.table_status(&mesa).unwrap(), TableStatus::Free);
    assert!(t.store.draft(&mesa).unwrap().is_empty());
    assert!(t.store.bill(&mesa).is_none());
    assert!(!t.store.table(&mesa).unwrap().is_manually_reserved);

    closure.wait().await.unwrap();
    assert!(t.remote.rows(Collection::KitchenTickets).is_empty());

    t.store.delete_table(&mesa).unwrap();
    assert!(t.store.table(&mesa).is_none());
    assert!(matches!(t.store.delete_table(&mesa), Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_close_free_table_is_noop() {
    let t = terminal();
    let closure = t.store.close_table(&table(4)).unwrap();
    assert!(closure.tickets.is_empty());
    closure.wait().await.unwrap();
    assert!(matches!(t.store.close_table(&table(42)), Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_table_view_summarizes_table() {
    let t = terminal();
    let mesa = table(1);
    t.store.add_item(&mesa, &product(5, "Pulpo", 18.0), None).unwrap();
    t.store.send_order(&mesa, None).unwrap().wait().await.unwrap();
    t.store.add_item(&mesa, &product(1, "Caña", 2.5), None).unwrap();

    let view = t.store.table_view(&mesa).unwrap();
    assert_eq!(view.status, TableStatus::Occupied);
    assert_eq!(view.draft_items, 1);
    assert_eq!(view.draft_total, 2.5);
    assert_eq!(view.ticket_count, 1);
    assert!(view.occupied_since.is_some());
    assert_eq!(t.store.table_views().len(), 4);
}

#[tokio::test]
async fn test_ticker_publishes_on_change() {
    let t = terminal();
    let shutdown = CancellationToken::new();
    let (ticker, mut views) = ElapsedTicker::new(t.store.clone(), Duration::from_secs(3600), shutdown.clone());
    let handle = tokio::spawn(ticker.run());

    // let the ticker subscribe
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    t.store.add_item(&table(2), &product(1, "Caña", 2.5), None).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            views.changed().await.unwrap();
            if views.borrow()[1].status == TableStatus::Occupied {
                break;
            }
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    handle.await.unwrap();
}
