//! Borrow/return scenarios driven straight through the engine

use bibliotheca_server::{
    clock::Clock,
    models::{BorrowingFilter, BorrowingStatus},
    repository::Store,
    AppError,
};
use chrono::Duration;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

use crate::common::spawn_app;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_borrows_never_oversell() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 3).await;
    let member = app.seed_member("Lauren").await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let engine = app.state.services.engine.clone();
            tokio::spawn(async move { engine.borrow(book.id, member.id, 14).await })
        })
        .collect();

    let mut borrowed = 0;
    let mut out_of_stock = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::OutOfStock(id)) => {
                assert_eq!(id, book.id);
                out_of_stock += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((borrowed, out_of_stock), (3, 17));
    let book = app.store.get_book(book.id).await.unwrap().unwrap();
    assert_eq!(book.copies_available, 0);
    assert_eq!(
        app.store
            .list_borrowings(&BorrowingFilter::open_for_book(book.id))
            .await
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_returns_close_exactly_once() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 2).await;
    let member = app.seed_member("Lauren").await;
    let engine = app.state.services.engine.clone();
    let borrowing = engine.borrow(book.id, member.id, 7).await.unwrap().borrowing;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.return_borrowing(borrowing.id, Decimal::ONE).await })
        })
        .collect();

    let mut closed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => closed += 1,
            Err(AppError::AlreadyReturned(id)) => assert_eq!(id, borrowing.id),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(closed, 1);
    let book = app.store.get_book(book.id).await.unwrap().unwrap();
    assert_eq!(book.copies_available, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_traffic_keeps_counts_within_bounds() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 4).await;
    let member = app.seed_member("Lauren").await;
    let engine = app.state.services.engine.clone();

    for round in 0..10 {
        let borrows: Vec<_> = (0..6)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.borrow(book.id, member.id, 7).await })
            })
            .collect();
        for task in borrows {
            let _ = task.await.unwrap();
        }

        let open = app
            .store
            .list_borrowings(&BorrowingFilter::open_for_book(book.id))
            .await
            .unwrap();
        let returns: Vec<_> = open
            .iter()
            .take(round % 4 + 1)
            .map(|b| {
                let engine = engine.clone();
                let id = b.id;
                tokio::spawn(async move { engine.return_borrowing(id, Decimal::ONE).await })
            })
            .collect();
        for task in returns {
            task.await.unwrap().unwrap();
        }

        let current = app.store.get_book(book.id).await.unwrap().unwrap();
        let still_open = app.store.count_open_borrowings(book.id).await.unwrap();
        assert!(current.copies_available >= 0);
        assert!(current.copies_available <= current.copies_total);
        assert_eq!(
            i64::from(current.copies_available),
            i64::from(current.copies_total) - still_open
        );
    }
}

#[tokio::test]
async fn empty_shelf_never_creates_a_borrowing() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 0).await;
    let member = app.seed_member("Lauren").await;

    let err = app
        .state
        .services
        .engine
        .borrow(book.id, member.id, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OutOfStock(_)));
    assert!(app
        .store
        .list_borrowings(&BorrowingFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn single_copy_lifecycle_with_late_return() {
    let app = spawn_app();
    let engine = app.state.services.engine.clone();
    let book = app.seed_book("0306406152", 1).await;
    let member = app.seed_member("Lauren").await;
    let start = app.clock.now();

    let first = assert_ok!(engine.borrow(book.id, member.id, 14).await);
    assert_eq!(first.book.copies_available, 0);
    assert_eq!(first.borrowing.due_at, start + Duration::days(14));

    let err = assert_err!(engine.borrow(book.id, member.id, 14).await);
    assert!(matches!(err, AppError::OutOfStock(_)));

    app.clock.advance(Duration::days(20));
    let returned = assert_ok!(engine.return_borrowing(first.borrowing.id, Decimal::ONE).await);
    assert_eq!(returned.borrowing.fine, Some(Decimal::from(6)));
    assert_eq!(returned.borrowing.returned_at, Some(start + Duration::days(20)));
    assert_eq!(returned.book.copies_available, 1);

    let closed = app
        .state
        .services
        .ledger
        .list(&BorrowingFilter {
            status: Some(BorrowingStatus::Closed),
            member_id: Some(member.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0], returned.borrowing);
}
