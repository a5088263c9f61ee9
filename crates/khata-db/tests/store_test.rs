//! Store integration tests: write scoping, change events, and the
//! cross-entity transaction flows (receipts, credits, inventory, chat).

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use khata_core::{
    aggregates, chat, Conversation, ConversationKind, CoreError, Credit, Customer, InventoryEntry,
    Message, Payment, PaymentKind, PaymentMethod, Product, Receipt, ReceiptItem, RecordStamp,
    Settlement,
};
use khata_db::{
    ChangeOp, Database, DbConfig, Entity, MessageQuery, ReceiptQuery, StoreError,
};
use tokio::sync::broadcast::error::TryRecvError;

// =============================================================================
// Fixtures
// =============================================================================

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn customer(name: &str, mobile: &str) -> Customer {
    let stamp = RecordStamp::mint();
    Customer {
        id: stamp.id,
        name: name.to_string(),
        mobile: mobile.to_string(),
        note: None,
        is_active: true,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn product(name: &str, sku: &str, price_cents: i64, stock: i64) -> Product {
    let stamp = RecordStamp::mint();
    Product {
        id: stamp.id,
        name: name.to_string(),
        sku: sku.to_string(),
        price_cents,
        quantity_on_hand: stock,
        is_active: true,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn receipt(customer_id: Option<&str>, paid_cents: i64, issued_on: NaiveDate) -> Receipt {
    let stamp = RecordStamp::mint();
    Receipt {
        id: stamp.id,
        customer_id: customer_id.map(str::to_string),
        // Deliberately wrong: the store must recompute from items
        total_cents: 1,
        paid_cents,
        tax_cents: 0,
        credit_cents: 0,
        is_cancelled: false,
        issued_on,
        note: None,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn item(p: &Product, quantity: i64) -> ReceiptItem {
    let stamp = RecordStamp::mint();
    ReceiptItem {
        id: stamp.id,
        receipt_id: String::new(), // bound to the receipt by create()
        product_id: p.id.clone(),
        name_snapshot: p.name.clone(),
        sku_snapshot: p.sku.clone(),
        price_cents: p.price_cents,
        quantity,
        total_cents: 0, // recomputed by the store
        created_at: stamp.at,
    }
}

fn credit(customer_id: Option<&str>, total_cents: i64, due_on: NaiveDate) -> Credit {
    let stamp = RecordStamp::mint();
    Credit {
        id: stamp.id,
        customer_id: customer_id.map(str::to_string),
        receipt_id: None,
        total_cents,
        paid_cents: 0,
        due_on,
        note: None,
        created_at: stamp.at,
        updated_at: stamp.at,
    }
}

fn repayment(credit_id: &str, customer_id: Option<&str>, amount_cents: i64) -> Payment {
    let stamp = RecordStamp::mint();
    Payment {
        id: stamp.id,
        customer_id: customer_id.map(str::to_string),
        receipt_id: None,
        credit_id: Some(credit_id.to_string()),
        amount_cents,
        method: PaymentMethod::Cash,
        kind: PaymentKind::Repayment,
        note: None,
        created_at: stamp.at,
    }
}

fn counter_payment(receipt_id: &str, amount_cents: i64) -> Payment {
    let stamp = RecordStamp::mint();
    Payment {
        id: stamp.id,
        customer_id: None,
        receipt_id: Some(receipt_id.to_string()),
        credit_id: None,
        amount_cents,
        method: PaymentMethod::Wallet,
        kind: PaymentKind::Receipt,
        note: None,
        created_at: stamp.at,
    }
}

fn inventory_entry(product_id: &str, delta: i64) -> InventoryEntry {
    let stamp = RecordStamp::mint();
    InventoryEntry {
        id: stamp.id,
        product_id: product_id.to_string(),
        quantity_delta: delta,
        unit_cost_cents: None,
        note: None,
        created_at: stamp.at,
    }
}

fn message(id: &str, channel: &str, author: &str, body: &str, sent_at: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        channel: channel.to_string(),
        author: author.to_string(),
        body: body.to_string(),
        sent_at,
        delivery_token: Some(chat::encode_delivery_token(sent_at)),
        is_read: false,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Write scoping & change events
// =============================================================================

#[tokio::test]
async fn test_customer_insert_commit_and_read_back() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    w.commit().await.unwrap();

    let found = db.customers().get_by_id(&ali.id).await.unwrap().unwrap();
    assert_eq!(found.name, "Ali Raza");
    assert!(found.is_active);

    let hits = db.customers().search("ali", 10).await.unwrap();
    assert_eq!(hits.len(), 1);

    let misses = db.customers().search("zubair", 10).await.unwrap();
    assert!(misses.is_empty());
}

#[tokio::test]
async fn test_change_events_fire_only_after_commit() {
    let db = test_db().await;
    let mut rx = db.subscribe();

    let ali = customer("Ali Raza", "+923001112222");
    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();

    // Staged but not committed: the bus is silent
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    w.commit().await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.entity, Entity::Customer);
    assert_eq!(event.entity_id, ali.id);
    assert_eq!(event.op, ChangeOp::Created);
}

#[tokio::test]
async fn test_dropped_writer_rolls_back_and_publishes_nothing() {
    let db = test_db().await;
    let mut rx = db.subscribe();

    let ali = customer("Ali Raza", "+923001112222");
    {
        let mut w = db.writer().await.unwrap();
        db.customers().insert(&mut w, &ali).await.unwrap();
        // dropped without commit
    }

    assert!(db.customers().get_by_id(&ali.id).await.unwrap().is_none());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_duplicate_mobile_rejected() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");
    let dup = customer("Other Ali", "+923001112222");

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    let err = db.customers().insert(&mut w, &dup).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
    w.rollback().await.unwrap();
}

#[tokio::test]
async fn test_soft_delete_hides_from_listings() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    db.customers().soft_delete(&mut w, &ali.id).await.unwrap();
    w.commit().await.unwrap();

    // Row survives for history, listings skip it
    let found = db.customers().get_by_id(&ali.id).await.unwrap().unwrap();
    assert!(!found.is_active);
    assert!(db.customers().list_active().await.unwrap().is_empty());
    assert_eq!(db.customers().count().await.unwrap(), 0);
}

// =============================================================================
// Receipts
// =============================================================================

#[tokio::test]
async fn test_receipt_create_recomputes_totals_and_moves_stock() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");
    let sugar = product("Sugar 1kg", "SUGAR-1KG", 18_000, 10);
    let chai = product("Tapal Danedar 950g", "TAPAL-950", 55_000, 4);

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    db.products().insert(&mut w, &sugar).await.unwrap();
    db.products().insert(&mut w, &chai).await.unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    let stored = db
        .receipts()
        .create(
            &mut w,
            &receipt(Some(&ali.id), 50_000, day(2024, 3, 1)),
            &[item(&sugar, 2), item(&chai, 1)],
        )
        .await
        .unwrap();
    w.commit().await.unwrap();

    // 2 × 18000 + 1 × 55000; the fixture's bogus total was ignored
    assert_eq!(stored.total_cents, 91_000);

    let fetched = db.receipts().get_by_id(&stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.total_cents, 91_000);
    assert_eq!(fetched.paid_cents, 50_000);

    let items = db.receipts().items(&stored.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(aggregates::items_total(&items).cents(), fetched.total_cents);

    // Counter tender became a payment row; settlement derives Partial
    let payments = db.receipts().payments(&stored.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount_cents, 50_000);
    assert_eq!(payments[0].kind, PaymentKind::Receipt);
    assert_eq!(
        aggregates::settlement(&fetched, &payments),
        Settlement::Partial
    );

    // Stock decremented per line
    let sugar_after = db.products().get_by_id(&sugar.id).await.unwrap().unwrap();
    let chai_after = db.products().get_by_id(&chai.id).await.unwrap().unwrap();
    assert_eq!(sugar_after.quantity_on_hand, 8);
    assert_eq!(chai_after.quantity_on_hand, 3);
}

#[tokio::test]
async fn test_receipt_create_insufficient_stock_leaves_no_trace() {
    let db = test_db().await;
    let chai = product("Tapal Danedar 950g", "TAPAL-950", 55_000, 4);

    let mut w = db.writer().await.unwrap();
    db.products().insert(&mut w, &chai).await.unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    let err = db
        .receipts()
        .create(&mut w, &receipt(None, 0, day(2024, 3, 1)), &[item(&chai, 5)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(CoreError::InsufficientStock {
            available: 4,
            requested: 5,
            ..
        })
    ));
    w.rollback().await.unwrap();

    // Nothing landed: no receipt, stock untouched
    let all = db
        .receipts()
        .query(&ReceiptQuery::new().include_cancelled())
        .await
        .unwrap();
    assert!(all.is_empty());
    let chai_after = db.products().get_by_id(&chai.id).await.unwrap().unwrap();
    assert_eq!(chai_after.quantity_on_hand, 4);
}

#[tokio::test]
async fn test_cancel_restores_stock_and_wins_settlement() {
    let db = test_db().await;
    let sugar = product("Sugar 1kg", "SUGAR-1KG", 18_000, 10);

    let mut w = db.writer().await.unwrap();
    db.products().insert(&mut w, &sugar).await.unwrap();
    w.commit().await.unwrap();

    // Fully paid receipt
    let mut w = db.writer().await.unwrap();
    let stored = db
        .receipts()
        .create(&mut w, &receipt(None, 36_000, day(2024, 3, 1)), &[item(&sugar, 2)])
        .await
        .unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    db.receipts().cancel(&mut w, &stored.id).await.unwrap();
    w.commit().await.unwrap();

    let fetched = db.receipts().get_by_id(&stored.id).await.unwrap().unwrap();
    assert!(fetched.is_cancelled);

    // Cancelled wins over fully-paid
    let payments = db.receipts().payments(&stored.id).await.unwrap();
    assert_eq!(
        aggregates::settlement(&fetched, &payments),
        Settlement::Cancelled
    );

    // Stock restored
    let sugar_after = db.products().get_by_id(&sugar.id).await.unwrap().unwrap();
    assert_eq!(sugar_after.quantity_on_hand, 10);

    // Re-cancel is rejected
    let mut w = db.writer().await.unwrap();
    let err = db.receipts().cancel(&mut w, &stored.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(CoreError::ReceiptCancelled(_))
    ));
    w.rollback().await.unwrap();
}

#[tokio::test]
async fn test_add_payment_bumps_paid_and_rejects_cancelled() {
    let db = test_db().await;
    let sugar = product("Sugar 1kg", "SUGAR-1KG", 18_000, 10);

    let mut w = db.writer().await.unwrap();
    db.products().insert(&mut w, &sugar).await.unwrap();
    w.commit().await.unwrap();

    // Unpaid receipt, settled later over two payments
    let mut w = db.writer().await.unwrap();
    let stored = db
        .receipts()
        .create(&mut w, &receipt(None, 0, day(2024, 3, 1)), &[item(&sugar, 2)])
        .await
        .unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    db.receipts()
        .add_payment(&mut w, &counter_payment(&stored.id, 16_000))
        .await
        .unwrap();
    db.receipts()
        .add_payment(&mut w, &counter_payment(&stored.id, 20_000))
        .await
        .unwrap();
    w.commit().await.unwrap();

    let fetched = db.receipts().get_by_id(&stored.id).await.unwrap().unwrap();
    assert_eq!(fetched.paid_cents, 36_000);

    let payments = db.receipts().payments(&stored.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(aggregates::settlement(&fetched, &payments), Settlement::Paid);

    // Cancelled receipts take no further payments
    let mut w = db.writer().await.unwrap();
    db.receipts().cancel(&mut w, &stored.id).await.unwrap();
    w.commit().await.unwrap();

    let mut w = db.writer().await.unwrap();
    let err = db
        .receipts()
        .add_payment(&mut w, &counter_payment(&stored.id, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(CoreError::ReceiptCancelled(_))
    ));
    w.rollback().await.unwrap();
}

#[tokio::test]
async fn test_receipt_query_filters_by_day_and_customer() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");
    let soap = product("Soap Bar", "SOAP-STD", 10_000, 100);

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    db.products().insert(&mut w, &soap).await.unwrap();
    w.commit().await.unwrap();

    let march_1 = day(2024, 3, 1);
    let march_2 = day(2024, 3, 2);

    let mut w = db.writer().await.unwrap();
    let r1 = db
        .receipts()
        .create(&mut w, &receipt(Some(&ali.id), 0, march_1), &[item(&soap, 1)])
        .await
        .unwrap();
    let r2 = db
        .receipts()
        .create(&mut w, &receipt(Some(&ali.id), 0, march_2), &[item(&soap, 1)])
        .await
        .unwrap();
    let r3 = db
        .receipts()
        .create(&mut w, &receipt(None, 0, march_1), &[item(&soap, 1)])
        .await
        .unwrap();
    let r4 = db
        .receipts()
        .create(&mut w, &receipt(Some(&ali.id), 0, march_1), &[item(&soap, 1)])
        .await
        .unwrap();
    db.receipts().cancel(&mut w, &r4.id).await.unwrap();
    w.commit().await.unwrap();

    // Day filter excludes other days and cancelled receipts
    let on_first = db
        .receipts()
        .query(&ReceiptQuery::new().on(march_1))
        .await
        .unwrap();
    let ids: Vec<&str> = on_first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(on_first.len(), 2);
    assert!(ids.contains(&r1.id.as_str()));
    assert!(ids.contains(&r3.id.as_str()));

    // Daily sales derive from the same rows
    assert_eq!(aggregates::total_sales_on(&on_first, march_1).cents(), 20_000);

    // Customer filter (non-cancelled)
    let alis = db
        .receipts()
        .query(&ReceiptQuery::new().for_customer(&ali.id))
        .await
        .unwrap();
    assert_eq!(alis.len(), 2);

    // Ledger view keeps the cancelled one
    let ledger = db.receipts().receipts_for_customer(&ali.id).await.unwrap();
    assert_eq!(ledger.len(), 3);

    // Inclusive range, newest day first
    let range = db
        .receipts()
        .query(&ReceiptQuery::new().between(march_1, march_2))
        .await
        .unwrap();
    let range_ids: Vec<&str> = range.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(range.len(), 3);
    assert_eq!(range[0].id, r2.id);
    assert!(!range_ids.contains(&r4.id.as_str()));
}

// =============================================================================
// Credits & reminders
// =============================================================================

#[tokio::test]
async fn test_repayment_guard_and_balance() {
    let db = test_db().await;
    let ali = customer("Ali Raza", "+923001112222");
    let ledger = credit(Some(&ali.id), 41_000, day(2024, 3, 15));

    let mut w = db.writer().await.unwrap();
    db.customers().insert(&mut w, &ali).await.unwrap();
    db.credits().open(&mut w, &ledger).await.unwrap();
    w.commit().await.unwrap();

    // Within balance
    let mut w = db.writer().await.unwrap();
    db.credits()
        .record_repayment(&mut w, &repayment(&ledger.id, Some(&ali.id), 20_000))
        .await
        .unwrap();
    w.commit().await.unwrap();

    let after = db.credits().get_by_id(&ledger.id).await.unwrap().unwrap();
    assert_eq!(after.paid_cents, 20_000);
    assert_eq!(after.amount_left().cents(), 21_000);

    // Overshoot rejected before any clamp can hide it
    let mut w = db.writer().await.unwrap();
    let err = db
        .credits()
        .record_repayment(&mut w, &repayment(&ledger.id, Some(&ali.id), 30_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(CoreError::RepaymentExceedsBalance {
            balance_cents: 21_000,
            amount_cents: 30_000,
            ..
        })
    ));
    w.rollback().await.unwrap();

    // Exact balance settles the khata
    let mut w = db.writer().await.unwrap();
    db.credits()
        .record_repayment(&mut w, &repayment(&ledger.id, Some(&ali.id), 21_000))
        .await
        .unwrap();
    w.commit().await.unwrap();

    let settled = db.credits().get_by_id(&ledger.id).await.unwrap().unwrap();
    assert!(settled.is_settled());
    assert_eq!(db.credits().repayments(&ledger.id).await.unwrap().len(), 2);

    // Settled credits drop out of the outstanding view
    assert!(db
        .credits()
        .outstanding_for_customer(&ali.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_due_within_horizon() {
    let db = test_db().await;
    let near = credit(None, 10_000, day(2024, 3, 10));
    let far = credit(None, 10_000, day(2024, 4, 20));
    let overdue = credit(None, 10_000, day(2024, 2, 1));

    let mut w = db.writer().await.unwrap();
    db.credits().open(&mut w, &near).await.unwrap();
    db.credits().open(&mut w, &far).await.unwrap();
    db.credits().open(&mut w, &overdue).await.unwrap();
    w.commit().await.unwrap();

    let due = db.credits().due_within(day(2024, 3, 15)).await.unwrap();
    let ids: Vec<&str> = due.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(due.len(), 2);
    // Past due first (ordered by due_on)
    assert_eq!(ids, vec![overdue.id.as_str(), near.id.as_str()]);
}

#[tokio::test]
async fn test_reminder_marks_once_per_day() {
    let db = test_db().await;
    let ledger = credit(None, 10_000, day(2024, 3, 10));

    let mut w = db.writer().await.unwrap();
    db.credits().open(&mut w, &ledger).await.unwrap();
    w.commit().await.unwrap();

    let today = day(2024, 3, 20);

    let mut w = db.writer().await.unwrap();
    let first = db
        .credits()
        .try_mark_reminded(&mut w, &ledger.id, today)
        .await
        .unwrap();
    w.commit().await.unwrap();
    assert!(first);

    let mut w = db.writer().await.unwrap();
    let second = db
        .credits()
        .try_mark_reminded(&mut w, &ledger.id, today)
        .await
        .unwrap();
    w.commit().await.unwrap();
    assert!(!second);

    assert!(db.credits().was_reminded(&ledger.id, today).await.unwrap());

    // A new day is a fresh mark
    let mut w = db.writer().await.unwrap();
    let next_day = db
        .credits()
        .try_mark_reminded(&mut w, &ledger.id, day(2024, 3, 21))
        .await
        .unwrap();
    w.commit().await.unwrap();
    assert!(next_day);
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn test_inventory_entries_apply_delta_exactly_once() {
    let db = test_db().await;
    let sugar = product("Sugar 1kg", "SUGAR-1KG", 18_000, 10);

    let mut w = db.writer().await.unwrap();
    db.products().insert(&mut w, &sugar).await.unwrap();
    w.commit().await.unwrap();

    // Two restocks of 5: 10 + 5 + 5 = 20
    let mut w = db.writer().await.unwrap();
    db.products()
        .record_inventory_entry(&mut w, &inventory_entry(&sugar.id, 5))
        .await
        .unwrap();
    db.products()
        .record_inventory_entry(&mut w, &inventory_entry(&sugar.id, 5))
        .await
        .unwrap();
    w.commit().await.unwrap();

    let after = db.products().get_by_id(&sugar.id).await.unwrap().unwrap();
    assert_eq!(after.quantity_on_hand, 20);

    // Negative correction
    let mut w = db.writer().await.unwrap();
    db.products()
        .record_inventory_entry(&mut w, &inventory_entry(&sugar.id, -3))
        .await
        .unwrap();
    w.commit().await.unwrap();

    let corrected = db.products().get_by_id(&sugar.id).await.unwrap().unwrap();
    assert_eq!(corrected.quantity_on_hand, 17);

    let entries = db.products().entries_for_product(&sugar.id).await.unwrap();
    assert_eq!(entries.len(), 3);

    // The entry log replays to the same stock level
    let deltas: Vec<i64> = entries.iter().map(|e| e.quantity_delta).collect();
    assert_eq!(aggregates::replay_stock(10, &deltas), 17);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_messages_idempotent_and_newest_first() {
    let db = test_db().await;
    let channel = "dm.923001112222";

    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let convo = Conversation {
        id: RecordStamp::mint().id,
        channel: channel.to_string(),
        kind: ConversationKind::Direct,
        subject: None,
        member_ids: vec!["me".to_string(), "them".to_string()],
        last_activity_at: t0,
        created_at: t0,
    };

    let mut w = db.writer().await.unwrap();
    db.chat().upsert_conversation(&mut w, &convo).await.unwrap();
    w.commit().await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let t3 = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();

    // Arrival order T3, T1, T2: delivery is racy
    let mut w = db.writer().await.unwrap();
    assert!(db
        .chat()
        .insert_message(&mut w, &message("m3", channel, "them", "salaam", t3))
        .await
        .unwrap());
    assert!(db
        .chat()
        .insert_message(&mut w, &message("m1", channel, "them", "order ready?", t1))
        .await
        .unwrap());
    assert!(db
        .chat()
        .insert_message(&mut w, &message("m2", channel, "me", "yes, ready", t2))
        .await
        .unwrap());

    // Redelivery of m1 changes nothing
    assert!(!db
        .chat()
        .insert_message(&mut w, &message("m1", channel, "them", "DIFFERENT BODY", t1))
        .await
        .unwrap());
    w.commit().await.unwrap();

    // Rendered newest-first by broker time, not arrival order
    let page = db
        .chat()
        .messages(&MessageQuery::channel(channel))
        .await
        .unwrap();
    let ids: Vec<&str> = page.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m3", "m2", "m1"]);
    assert_eq!(page[2].body, "order ready?");

    // Conversation list ordering advanced to the newest message
    let refreshed = db
        .chat()
        .conversation_by_channel(channel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.last_activity_at, t3);
    assert_eq!(refreshed.member_ids.len(), 2);

    // Unread excludes own messages; mark_read flips the rest
    assert_eq!(db.chat().unread_count(channel, "me").await.unwrap(), 2);

    let mut w = db.writer().await.unwrap();
    let flipped = db.chat().mark_read(&mut w, channel, "me").await.unwrap();
    w.commit().await.unwrap();
    assert_eq!(flipped, 2);
    assert_eq!(db.chat().unread_count(channel, "me").await.unwrap(), 0);
}

#[tokio::test]
async fn test_message_paging_before() {
    let db = test_db().await;
    let channel = "dm.923009998877";

    let mut w = db.writer().await.unwrap();
    for hour in 9..14 {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        let id = format!("m{hour}");
        db.chat()
            .insert_message(&mut w, &message(&id, channel, "them", "hi", at))
            .await
            .unwrap();
    }
    w.commit().await.unwrap();

    let newest_two = db
        .chat()
        .messages(&MessageQuery::channel(channel).limit(2))
        .await
        .unwrap();
    assert_eq!(newest_two.len(), 2);
    assert_eq!(newest_two[0].id, "m13");
    assert_eq!(newest_two[1].id, "m12");

    // Next page: strictly before the oldest loaded
    let older = db
        .chat()
        .messages(
            &MessageQuery::channel(channel)
                .before(newest_two[1].sent_at)
                .limit(2),
        )
        .await
        .unwrap();
    assert_eq!(older[0].id, "m11");
    assert_eq!(older[1].id, "m10");
}

#[tokio::test]
async fn test_contact_upsert_by_mobile() {
    let db = test_db().await;
    let stamp = RecordStamp::mint();
    let contact = khata_core::Contact {
        id: stamp.id.clone(),
        display_name: "Karachi Wholesale".to_string(),
        mobile: "+922133334444".to_string(),
        channel_id: "dm.922133334444".to_string(),
        created_at: stamp.at,
        updated_at: stamp.at,
    };

    let mut w = db.writer().await.unwrap();
    db.chat().upsert_contact(&mut w, &contact).await.unwrap();
    w.commit().await.unwrap();

    // Same mobile, new display name: refreshes in place
    let renamed = khata_core::Contact {
        display_name: "KW Traders".to_string(),
        ..contact.clone()
    };
    let mut w = db.writer().await.unwrap();
    db.chat().upsert_contact(&mut w, &renamed).await.unwrap();
    w.commit().await.unwrap();

    let contacts = db.chat().contacts().await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].display_name, "KW Traders");

    let by_mobile = db
        .chat()
        .contact_by_mobile("+922133334444")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_mobile.id, contact.id);
}

#[tokio::test]
async fn test_upsert_events_carry_stored_ids() {
    let db = test_db().await;

    let stamp = RecordStamp::mint();
    let contact = khata_core::Contact {
        id: stamp.id.clone(),
        display_name: "Razia Begum".to_string(),
        mobile: "+923215556677".to_string(),
        channel_id: "dm.923215556677".to_string(),
        created_at: stamp.at,
        updated_at: stamp.at,
    };
    let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
    let convo = Conversation {
        id: RecordStamp::mint().id,
        channel: "grp.mohalla".to_string(),
        kind: ConversationKind::Group,
        subject: Some("Mohalla group".to_string()),
        member_ids: vec!["me".to_string(), "them".to_string()],
        last_activity_at: t0,
        created_at: t0,
    };

    let mut w = db.writer().await.unwrap();
    db.chat().upsert_contact(&mut w, &contact).await.unwrap();
    db.chat().upsert_conversation(&mut w, &convo).await.unwrap();
    w.commit().await.unwrap();

    // Refresh both under fresh record ids, as a backend sync would
    let mut rx = db.subscribe();
    let refreshed_contact = khata_core::Contact {
        id: RecordStamp::mint().id,
        display_name: "Razia Apa".to_string(),
        ..contact.clone()
    };
    let refreshed_convo = Conversation {
        id: RecordStamp::mint().id,
        subject: Some("Mohalla committee".to_string()),
        ..convo.clone()
    };
    let mut w = db.writer().await.unwrap();
    db.chat()
        .upsert_contact(&mut w, &refreshed_contact)
        .await
        .unwrap();
    db.chat()
        .upsert_conversation(&mut w, &refreshed_convo)
        .await
        .unwrap();
    w.commit().await.unwrap();

    // The rows kept their original ids; the events carry those stored
    // ids, not the callers' never-persisted ones
    let contact_event = rx.recv().await.unwrap();
    assert_eq!(contact_event.entity, Entity::Contact);
    assert_eq!(contact_event.entity_id, contact.id);
    assert_eq!(contact_event.op, ChangeOp::Updated);

    let convo_event = rx.recv().await.unwrap();
    assert_eq!(convo_event.entity, Entity::Conversation);
    assert_eq!(convo_event.entity_id, convo.id);
    assert_eq!(convo_event.op, ChangeOp::Updated);

    let by_mobile = db
        .chat()
        .contact_by_mobile(&contact.mobile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_mobile.id, contact.id);
    assert_eq!(by_mobile.display_name, "Razia Apa");

    let by_channel = db
        .chat()
        .conversation_by_channel(&convo.channel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_channel.id, convo.id);
    assert_eq!(by_channel.subject.as_deref(), Some("Mohalla committee"));
}
