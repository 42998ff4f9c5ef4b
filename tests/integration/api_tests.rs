use axum::http::{Method, StatusCode};
use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::common::spawn_app;

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("decimal string")
}

#[tokio::test]
async fn health_and_readiness() {
    let app = spawn_app();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = app.send(Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn single_copy_borrow_and_late_return() {
    let app = spawn_app();

    let (status, book) = app
        .send(
            Method::POST,
            "/api/v1/books",
            Some(json!({
                "title": "Kindred",
                "author": "Octavia E. Butler",
                "isbn": "978-0-8070-8369-7",
                "copies_total": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["copies_available"], 1);
    let book_id = book["id"].as_i64().unwrap();

    let (status, member) = app
        .send(
            Method::POST,
            "/api/v1/members",
            Some(json!({
                "name": "Dana Franklin",
                "email": "dana@example.org",
                "phone": "+1 555 010 2030"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let member_id = member["id"].as_i64().unwrap();

    let (status, borrowed) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{book_id}/borrow"),
            Some(json!({ "member_id": member_id, "due_days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(borrowed["book"]["copies_available"], 0);
    assert!(borrowed["borrowing"]["returned_at"].is_null());
    let borrowing_id = borrowed["borrowing"]["id"].as_i64().unwrap();

    let (status, err) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{book_id}/borrow"),
            Some(json!({ "member_id": member_id, "due_days": 14 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "OutOfStock");

    app.clock.advance(Duration::days(20));

    let (status, listed) = app
        .send(Method::GET, "/api/v1/borrowings?status=open", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let open = listed["borrowings"].as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["is_overdue"], true);
    assert_eq!(decimal(&open[0]["accrued_fine"]), Decimal::from(6));

    let (status, returned) = app
        .send(
            Method::POST,
            &format!("/api/v1/borrowings/{borrowing_id}/return"),
            Some(json!({ "fine_per_day": "1.0" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&returned["borrowing"]["fine"]), Decimal::from(6));
    assert_eq!(returned["book"]["copies_available"], 1);

    let (status, err) = app
        .send(
            Method::POST,
            &format!("/api/v1/borrowings/{borrowing_id}/return"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "AlreadyReturned");
}

#[tokio::test]
async fn return_without_body_uses_default_rate() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 2).await;
    let member = app.seed_member("Lauren").await;

    let (status, borrowed) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/borrow", book.id),
            Some(json!({ "member_id": member.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let borrowing_id = borrowed["borrowing"]["id"].as_i64().unwrap();

    // default period is a week; two days past due at the default rate
    app.clock.advance(Duration::days(9));
    let (status, returned) = app
        .send(
            Method::POST,
            &format!("/api/v1/borrowings/{borrowing_id}/return"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&returned["borrowing"]["fine"]), Decimal::from(2));
    assert_eq!(returned["book"]["copies_available"], 2);
}

#[tokio::test]
async fn on_time_return_is_free() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 1).await;
    let member = app.seed_member("Lauren").await;

    let (_, borrowed) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/borrow", book.id),
            Some(json!({ "member_id": member.id, "due_days": 10 })),
        )
        .await;
    let borrowing_id = borrowed["borrowing"]["id"].as_i64().unwrap();

    app.clock.advance(Duration::days(3));
    let (status, returned) = app
        .send(
            Method::POST,
            &format!("/api/v1/borrowings/{borrowing_id}/return"),
            Some(json!({ "fine_per_day": "2.5" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&returned["borrowing"]["fine"]), Decimal::ZERO);
}

#[tokio::test]
async fn borrow_rejects_bad_period_and_unknown_ids() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 1).await;
    let member = app.seed_member("Lauren").await;
    let uri = format!("/api/v1/books/{}/borrow", book.id);

    for days in [0, 61] {
        let (status, err) = app
            .send(Method::POST, &uri, Some(json!({ "member_id": member.id, "due_days": days })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "InvalidPeriod");
    }

    let (status, _) = app
        .send(Method::POST, &uri, Some(json!({ "member_id": 999 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/books/999/borrow",
            Some(json!({ "member_id": member.id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, fetched) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(fetched["copies_available"], 1);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let app = spawn_app();

    let (status, err) = app
        .send(
            Method::POST,
            "/api/v1/books",
            Some(json!({
                "title": "",
                "author": "Anon",
                "isbn": "12345",
                "copies_total": -1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "BadValue");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/members",
            Some(json!({ "name": "X", "email": "nope", "phone": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.seed_book("0306406152", 1).await;
    let (status, err) = app
        .send(
            Method::POST,
            "/api/v1/books",
            Some(json!({
                "title": "Duplicate",
                "author": "Anon",
                "isbn": "0306406152",
                "copies_total": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "Duplicate");
}

#[tokio::test]
async fn book_edits_reconcile_copies() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 3).await;
    let member = app.seed_member("Lauren").await;
    let uri = format!("/api/v1/books/{}", book.id);

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                &format!("{uri}/borrow"),
                Some(json!({ "member_id": member.id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(json!({ "copies_available": 3 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = app
        .send(Method::PUT, &format!("{uri}/copies"), Some(json!({ "copies_total": 1 })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "InvalidAdjustment");

    let (status, edited) = app
        .send(
            Method::PATCH,
            &uri,
            Some(json!({ "title": "Parable of the Talents", "copies_total": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["title"], "Parable of the Talents");
    assert_eq!(edited["copies_total"], 5);
    assert_eq!(edited["copies_available"], 3);

    let (status, adjusted) = app
        .send(Method::PUT, &format!("{uri}/copies"), Some(json!({ "copies_total": 2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjusted["copies_available"], 0);
}

#[tokio::test]
async fn deletes_are_blocked_by_open_borrowings() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 1).await;
    let member = app.seed_member("Lauren").await;

    let (_, borrowed) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/borrow", book.id),
            Some(json!({ "member_id": member.id })),
        )
        .await;
    let borrowing_id = borrowed["borrowing"]["id"].as_i64().unwrap();

    let (status, err) = app
        .send(Method::DELETE, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "BookInUse");

    let (status, err) = app
        .send(Method::DELETE, &format!("/api/v1/members/{}", member.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "MemberInUse");

    app.send(
        Method::POST,
        &format!("/api/v1/borrowings/{borrowing_id}/return"),
        None,
    )
    .await;

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/members/{}", member.id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, kept) = app
        .send(Method::GET, &format!("/api/v1/borrowings/{borrowing_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!kept["returned_at"].is_null());
}

#[tokio::test]
async fn listings_paginate_and_filter() {
    let app = spawn_app();
    let isbns = ["0306406152", "0140449132", "0451524934", "0679783261", "0553283685"];
    let mut books = Vec::new();
    for isbn in isbns {
        books.push(app.seed_book(isbn, 1).await);
    }
    let alice = app.seed_member("Alice").await;
    let bob = app.seed_member("Bob").await;

    let (status, page) = app
        .send(Method::GET, "/api/v1/books?page=2&per_page=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 5);
    assert_eq!(page["page"], 2);
    let ids: Vec<i64> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![i64::from(books[2].id), i64::from(books[3].id)]);

    for uri in [
        "/api/v1/books?page=9223372036854775807",
        "/api/v1/members?page=9223372036854775807&per_page=50",
    ] {
        let (status, err) = app.send(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "BadValue");
    }

    for (book, member) in [(&books[0], &alice), (&books[1], &bob), (&books[2], &alice)] {
        app.send(
            Method::POST,
            &format!("/api/v1/books/{}/borrow", book.id),
            Some(json!({ "member_id": member.id })),
        )
        .await;
        app.clock.advance(Duration::hours(1));
    }

    let (_, listed) = app
        .send(
            Method::GET,
            &format!("/api/v1/borrowings?member_id={}", alice.id),
            None,
        )
        .await;
    let book_ids: Vec<i64> = listed["borrowings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["book_id"].as_i64().unwrap())
        .collect();
    assert_eq!(book_ids, vec![i64::from(books[0].id), i64::from(books[2].id)]);

    let (_, listed) = app
        .send(
            Method::GET,
            &format!("/api/v1/borrowings?status=closed&book_id={}", books[1].id),
            None,
        )
        .await;
    assert!(listed["borrowings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_return_body_leaves_borrowing_open() {
    let app = spawn_app();
    let book = app.seed_book("0306406152", 1).await;
    let member = app.seed_member("Lauren").await;

    let (_, borrowed) = app
        .send(
            Method::POST,
            &format!("/api/v1/books/{}/borrow", book.id),
            Some(json!({ "member_id": member.id, "due_days": 1 })),
        )
        .await;
    let borrowing_id = borrowed["borrowing"]["id"].as_i64().unwrap();
    let return_uri = format!("/api/v1/borrowings/{borrowing_id}/return");

    app.clock.advance(Duration::days(5));
    for body in [
        json!({ "fine_per_day": "not-a-number" }),
        json!({ "fine_per_day": "79228162514264337593543950335" }),
    ] {
        let (status, err) = app.send(Method::POST, &return_uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "BadValue");
    }

    let (_, kept) = app
        .send(Method::GET, &format!("/api/v1/borrowings/{borrowing_id}"), None)
        .await;
    assert!(kept["returned_at"].is_null());
    let (_, fetched) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book.id), None)
        .await;
    assert_eq!(fetched["copies_available"], 0);

    let (status, returned) = app
        .send(Method::POST, &return_uri, Some(json!({ "fine_per_day": "0.5" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&returned["borrowing"]["fine"]), Decimal::from(2));
}
