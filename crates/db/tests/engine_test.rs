//! Posting engine tests over the in-memory store.
//!
//! These exercise whole operations end to end: numbering, period locks,
//! ledger lines, balances, cost layers, voids, cost revisions, retries and
//! cancellation.

#![allow(clippy::too_many_lines)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_core::document::{
    CheckVoucher, CheckVoucherKind, CollectionReceipt, DocumentBody, DocumentStatus, DocumentType, NewDocument, Party,
    PaymentApplication, ReceivingReport, SalesInvoice, VatTreatment,
};
use tally_core::fiscal::Module;
use tally_core::ledger::{SubAccount, SubAccountType};
use tally_core::posting::PostingError;
use tally_db::store::{DocumentStore, Store, UnitOfWork};
use tally_db::{ExecutionStrategy, MemoryStore, PostingEngine};
use tally_shared::types::{CompanyId, DocumentId, UserId};
use tokio_util::sync::CancellationToken;

const INVENTORY: &str = "101040100";
const COGS: &str = "501010100";
const AR_TRADE: &str = "101020100";
const AP_TRADE: &str = "202010100";
const CASH_IN_BANK: &str = "101010100";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn company() -> CompanyId {
    CompanyId::new("C01")
}

fn engine() -> PostingEngine<MemoryStore> {
    PostingEngine::new(MemoryStore::new()).with_strategy(ExecutionStrategy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    })
}

fn receiving_report(quantity: Decimal, unit_cost: Decimal) -> DocumentBody {
    DocumentBody::ReceivingReport(ReceivingReport {
        supplier: Party::new("SUP-001", "Petron Corporation"),
        product_code: "PET001".to_string(),
        quantity,
        unit_cost,
        vat: VatTreatment::Exempt,
        purchase_order_id: None,
    })
}

fn sales_invoice(quantity: Decimal, unit_price: Decimal) -> DocumentBody {
    DocumentBody::SalesInvoice(SalesInvoice {
        customer: Party::new("CUST-001", "Acme Trading"),
        product_code: "PET001".to_string(),
        quantity,
        unit_price,
        vat: VatTreatment::Exempt,
        delivery_receipt_id: None,
    })
}

async fn draft(
    engine: &PostingEngine<MemoryStore>,
    on: NaiveDate,
    body: DocumentBody,
) -> DocumentId {
    engine
        .create_document(
            NewDocument {
                company_id: company(),
                transaction_date: on,
                body,
                created_by: UserId::new(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .id
}

async fn post(engine: &PostingEngine<MemoryStore>, id: DocumentId) -> String {
    engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap()
        .document_no
}

async fn balance_ending(
    engine: &PostingEngine<MemoryStore>,
    account_no: &str,
    month: u32,
) -> Decimal {
    engine
        .get_account_balance(&company(), account_no, 2024, month)
        .await
        .unwrap()
        .totals
        .ending_balance
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_receiving_report_posts_inventory_and_payable() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(1000), dec!(50.00))).await;

    let receipt = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.document_no, "RR-000001");
    assert_eq!(receipt.document_type, DocumentType::ReceivingReport);
    assert_eq!(receipt.totals.debit, dec!(50000.00));
    assert_eq!(receipt.totals.credit, dec!(50000.00));
    assert_eq!(receipt.attempts, 1);

    let inventory = receipt
        .lines
        .iter()
        .find(|l| l.account_no == INVENTORY)
        .unwrap();
    assert_eq!(inventory.debit, dec!(50000.00));
    let payable = receipt
        .lines
        .iter()
        .find(|l| l.account_no == AP_TRADE)
        .unwrap();
    assert_eq!(payable.credit, dec!(50000.00));
    assert_eq!(payable.sub_account.as_ref().unwrap().id, "SUP-001");

    let balance = engine
        .get_account_balance(&company(), INVENTORY, 2024, 4)
        .await
        .unwrap();
    assert_eq!(balance.totals.debit_total, dec!(50000.00));
    assert_eq!(balance.totals.ending_balance, dec!(50000.00));
    assert_eq!(balance_ending(&engine, AP_TRADE, 4).await, dec!(50000.00));

    let supplier = SubAccount::new(SubAccountType::Supplier, "SUP-001", "Petron Corporation");
    let sub = engine
        .get_sub_account_balance(&company(), AP_TRADE, &supplier, 2024, 4)
        .await
        .unwrap();
    assert_eq!(sub.totals.credit_total, dec!(50000.00));

    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].running.balance, dec!(1000));
    assert_eq!(chain[0].running.average_cost, dec!(50));

    let document = engine.get_document(&company(), id).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Posted);
    assert_eq!(document.document_no.as_deref(), Some("RR-000001"));

    let audit = engine.store().audit_trail().await;
    assert!(audit
        .iter()
        .any(|a| a.activity == "Posted receiving_report RR-000001"));
}

#[tokio::test]
async fn test_sale_consumes_average_cost() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(1000), dec!(50))).await;
    post(&engine, rr).await;
    let si = draft(&engine, date(2024, 4, 10), sales_invoice(dec!(400), dec!(80))).await;

    let receipt = engine
        .post_document(&company(), si, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.document_no, "SI-000001");
    let cogs = receipt.lines.iter().find(|l| l.account_no == COGS).unwrap();
    assert_eq!(cogs.debit, dec!(20000));
    assert_eq!(balance_ending(&engine, INVENTORY, 4).await, dec!(30000));
    assert_eq!(balance_ending(&engine, AR_TRADE, 4).await, dec!(32000));
}

#[tokio::test]
async fn test_balance_carries_into_quiet_month() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(10), dec!(100))).await;
    post(&engine, rr).await;

    let june = engine
        .get_account_balance(&company(), INVENTORY, 2024, 6)
        .await
        .unwrap();
    assert_eq!(june.totals.beginning_balance, dec!(1000));
    assert_eq!(june.totals.debit_total, Decimal::ZERO);
    assert_eq!(june.totals.ending_balance, dec!(1000));
}

// ============================================================================
// Numbering
// ============================================================================

#[tokio::test]
async fn test_concurrent_number_issue_is_unique() {
    let engine = Arc::new(engine());

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .generate_document_number(
                        &company(),
                        DocumentType::SalesInvoice,
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();

    let numbers: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let unique: HashSet<_> = numbers.iter().collect();
    assert_eq!(unique.len(), 25);
    assert!(numbers.contains(&"SI-000001".to_string()));
    assert!(numbers.contains(&"SI-000025".to_string()));
}

#[tokio::test]
async fn test_concurrent_posts_get_distinct_numbers() {
    let engine = Arc::new(engine());
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(draft(&engine, date(2024, 4, 3), receiving_report(dec!(5), dec!(20))).await);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { post(&engine, id).await })
        })
        .collect();
    let numbers: HashSet<String> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(numbers.len(), 10);
    assert_eq!(balance_ending(&engine, INVENTORY, 4).await, dec!(1000));
}

#[tokio::test]
async fn test_number_taken_by_imported_document_is_skipped() {
    let engine = engine();
    let store = engine.store().clone();

    // A document carrying RR-000001 from outside the counter.
    let imported = tally_core::document::Document {
        document_no: Some("RR-000001".to_string()),
        ..tally_core::document::Document::new(
            NewDocument {
                company_id: company(),
                transaction_date: date(2024, 4, 1),
                body: receiving_report(dec!(1), dec!(1)),
                created_by: UserId::new(),
            },
            chrono::Utc::now(),
        )
    };
    let mut unit = store.begin().await.unwrap();
    unit.insert_document(&imported).await.unwrap();
    unit.commit().await.unwrap();

    let number = engine
        .generate_document_number(&company(), DocumentType::ReceivingReport, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(number, "RR-000002");
}

#[tokio::test]
async fn test_sequences_are_per_company_and_type() {
    let engine = engine();
    let cancel = CancellationToken::new();
    let other = CompanyId::new("C02");

    let si = engine
        .generate_document_number(&company(), DocumentType::SalesInvoice, &cancel)
        .await
        .unwrap();
    let rr = engine
        .generate_document_number(&company(), DocumentType::ReceivingReport, &cancel)
        .await
        .unwrap();
    let other_si = engine
        .generate_document_number(&other, DocumentType::SalesInvoice, &cancel)
        .await
        .unwrap();

    assert_eq!(si, "SI-000001");
    assert_eq!(rr, "RR-000001");
    assert_eq!(other_si, "SI-000001");
}

// ============================================================================
// Period close
// ============================================================================

#[tokio::test]
async fn test_closed_month_rejects_posting() {
    let engine = engine();
    let march = draft(&engine, date(2024, 3, 15), receiving_report(dec!(10), dec!(50))).await;
    let april = draft(&engine, date(2024, 4, 2), receiving_report(dec!(10), dec!(50))).await;

    engine
        .close_period(&company(), Module::Ap, 2024, 3, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .post_document(&company(), march, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PostingError::PeriodClosed {
            module: Module::Ap,
            year: 2024,
            month: 3
        }
    ));

    post(&engine, april).await;
    assert!(engine
        .is_period_closed(&company(), Module::Ap, date(2024, 3, 31))
        .await
        .unwrap());
    assert!(!engine
        .is_period_closed(&company(), Module::Ap, date(2024, 4, 1))
        .await
        .unwrap());
    assert!(!engine
        .is_period_closed(&company(), Module::Ar, date(2024, 3, 31))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_general_ledger_close_locks_every_module() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 3, 5), receiving_report(dec!(10), dec!(50))).await;
    post(&engine, rr).await;

    engine
        .close_period(&company(), Module::Gl, 2024, 3, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(engine
        .is_period_closed(&company(), Module::Ar, date(2024, 3, 10))
        .await
        .unwrap());
    let march = engine
        .get_account_balance(&company(), INVENTORY, 2024, 3)
        .await
        .unwrap();
    assert!(march.totals.is_closed);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let engine = engine();
    let cancel = CancellationToken::new();
    let first = engine
        .close_period(&company(), Module::Ar, 2024, 2, UserId::new(), &cancel)
        .await
        .unwrap();
    let second = engine
        .close_period(&company(), Module::Ar, 2024, 2, UserId::new(), &cancel)
        .await
        .unwrap();

    assert!(first.is_posted);
    assert_eq!(first, second);
    let closes = engine
        .store()
        .audit_trail()
        .await
        .into_iter()
        .filter(|a| a.activity.starts_with("Closed"))
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_invalid_month_is_rejected() {
    let engine = engine();
    let err = engine
        .close_period(&company(), Module::Ap, 2024, 13, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::InvalidPeriod(_)));
}

// ============================================================================
// Status transitions
// ============================================================================

#[tokio::test]
async fn test_second_post_is_rejected_without_new_lines() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    post(&engine, id).await;
    let lines_before = engine.store().ledger().await.len();

    let err = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PostingError::AlreadyPosted { .. }));
    assert_eq!(engine.store().ledger().await.len(), lines_before);
}

#[tokio::test]
async fn test_canceled_document_cannot_post() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    engine
        .cancel_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::InvalidStatus { .. }));
}

#[tokio::test]
async fn test_update_only_while_pending() {
    let engine = engine();
    let cancel = CancellationToken::new();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;

    let updated = engine
        .update_document(
            &company(),
            id,
            date(2024, 4, 6),
            receiving_report(dec!(12), dec!(50)),
            UserId::new(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(updated.transaction_date, date(2024, 4, 6));

    post(&engine, id).await;
    let err = engine
        .update_document(
            &company(),
            id,
            date(2024, 4, 7),
            receiving_report(dec!(1), dec!(1)),
            UserId::new(),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::InvalidStatus { .. }));
}

#[tokio::test]
async fn test_document_of_other_company_is_not_found() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;

    let err = engine
        .post_document(&CompanyId::new("C02"), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::DocumentNotFound(_)));
}

// ============================================================================
// Settlements
// ============================================================================

#[tokio::test]
async fn test_collection_settles_invoice() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, rr).await;
    let si = draft(&engine, date(2024, 4, 2), sales_invoice(dec!(10), dec!(100))).await;
    post(&engine, si).await;

    let cr = draft(
        &engine,
        date(2024, 4, 20),
        DocumentBody::CollectionReceipt(CollectionReceipt {
            customer: Party::new("CUST-001", "Acme Trading"),
            bank: Party::new("BDO-01", "BDO Checking"),
            applications: vec![PaymentApplication {
                document_id: si,
                amount: dec!(400),
            }],
            withholding: false,
        }),
    )
    .await;
    post(&engine, cr).await;

    let invoice = engine.get_document(&company(), si).await.unwrap();
    assert_eq!(invoice.amount_paid, dec!(400));
    assert_eq!(invoice.outstanding_amount(), dec!(600));
    assert_eq!(balance_ending(&engine, AR_TRADE, 4).await, dec!(600));
    assert_eq!(balance_ending(&engine, CASH_IN_BANK, 4).await, dec!(400));

    // A settled invoice cannot be voided until its collection is.
    let err = engine
        .void_document(&company(), si, UserId::new(), date(2024, 4, 25), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::InvalidDocument(_)));

    engine
        .void_document(&company(), cr, UserId::new(), date(2024, 4, 25), &CancellationToken::new())
        .await
        .unwrap();
    let invoice = engine.get_document(&company(), si).await.unwrap();
    assert_eq!(invoice.amount_paid, Decimal::ZERO);
}

// ============================================================================
// Voids and cost corrections
// ============================================================================

#[tokio::test]
async fn test_void_reverses_lines_and_cost_layer() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(1000), dec!(50))).await;
    post(&engine, rr).await;

    let receipt = engine
        .void_document(&company(), rr, UserId::new(), date(2024, 4, 30), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.document_no, "RR-000001");
    assert_eq!(receipt.lines.len(), 2);
    assert!(receipt.lines.iter().all(|l| l.date == date(2024, 4, 30)));
    assert_eq!(balance_ending(&engine, INVENTORY, 4).await, Decimal::ZERO);
    assert_eq!(balance_ending(&engine, AP_TRADE, 4).await, Decimal::ZERO);

    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert!(chain[0].is_voided);
    assert_eq!(chain[0].running.balance, Decimal::ZERO);

    let document = engine.get_document(&company(), rr).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Voided);
    // Original lines stay; the reversals are appended under the same
    // document.
    let lines = engine.ledger_lines_for(&company(), rr).await.unwrap();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines.iter().filter(|l| l.date == date(2024, 4, 1)).count(), 2);
    assert_eq!(engine.store().ledger().await.len(), 4);
}

#[tokio::test]
async fn test_void_in_closed_month_is_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 3, 1), receiving_report(dec!(10), dec!(50))).await;
    post(&engine, rr).await;
    engine
        .close_period(&company(), Module::Ap, 2024, 3, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .void_document(&company(), rr, UserId::new(), date(2024, 3, 31), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::PeriodClosed { .. }));

    engine
        .void_document(&company(), rr, UserId::new(), date(2024, 4, 1), &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_revised_purchase_cost_flows_into_later_sale() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(1000), dec!(50))).await;
    post(&engine, rr).await;
    let si = draft(&engine, date(2024, 4, 10), sales_invoice(dec!(400), dec!(80))).await;
    post(&engine, si).await;

    let correction = engine
        .revise_purchase_cost(&company(), rr, dec!(55), UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    // Inventory/AP for the purchase, COGS/inventory for the sale.
    assert_eq!(correction.lines.len(), 4);
    let adjustment = correction
        .lines
        .iter()
        .find(|l| l.account_no == COGS)
        .unwrap();
    assert_eq!(adjustment.debit, dec!(2000));
    assert_eq!(adjustment.date, date(2024, 4, 10));
    assert_eq!(adjustment.reference_document_id, si);

    assert_eq!(balance_ending(&engine, INVENTORY, 4).await, dec!(33000));
    assert_eq!(balance_ending(&engine, AP_TRADE, 4).await, dec!(55000));
    assert_eq!(balance_ending(&engine, COGS, 4).await, dec!(22000));

    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain[1].total, dec!(22000));
    assert_eq!(chain[1].running.average_cost, dec!(55));

    // A replay with nothing changed posts nothing.
    let again = engine
        .recalculate_inventory_cost(
            &company(),
            "PET001",
            date(2024, 4, 1),
            UserId::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(again.lines.is_empty());
    assert!(again.cost_entries.is_empty());
}

#[tokio::test]
async fn test_voiding_purchase_adjusts_downstream_sale() {
    let engine = engine();
    let first = draft(&engine, date(2024, 4, 1), receiving_report(dec!(100), dec!(40))).await;
    post(&engine, first).await;
    let second = draft(&engine, date(2024, 4, 2), receiving_report(dec!(100), dec!(60))).await;
    post(&engine, second).await;
    let si = draft(&engine, date(2024, 4, 5), sales_invoice(dec!(50), dec!(90))).await;
    post(&engine, si).await;
    // Average 50, so the sale consumed 2500.
    assert_eq!(balance_ending(&engine, COGS, 4).await, dec!(2500));

    let receipt = engine
        .void_document(&company(), second, UserId::new(), date(2024, 4, 20), &CancellationToken::new())
        .await
        .unwrap();

    // Without the second purchase the sale consumes 50 at 40.
    assert_eq!(balance_ending(&engine, COGS, 4).await, dec!(2000));
    assert_eq!(balance_ending(&engine, INVENTORY, 4).await, dec!(2000));
    assert!(receipt.lines.iter().any(|l| l.account_no == COGS && l.credit == dec!(500)));
}

#[tokio::test]
async fn test_revision_in_closed_sale_month_is_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 3, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, rr).await;
    let si = draft(&engine, date(2024, 4, 5), sales_invoice(dec!(10), dec!(90))).await;
    post(&engine, si).await;
    engine
        .close_period(&company(), Module::Ar, 2024, 4, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .revise_purchase_cost(&company(), rr, dec!(60), UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::PeriodClosed { module: Module::Ar, .. }));

    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain[0].total, dec!(5000));
}

#[tokio::test]
async fn test_downward_revision_below_amount_paid_is_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(100), dec!(10))).await;
    post(&engine, rr).await;
    let cv = draft(
        &engine,
        date(2024, 4, 15),
        DocumentBody::CheckVoucher(CheckVoucher {
            bank: Party::new("BDO-01", "BDO Checking"),
            payee: Party::new("SUP-001", "Petron Corporation"),
            kind: CheckVoucherKind::Trade {
                applications: vec![PaymentApplication {
                    document_id: rr,
                    amount: dec!(1000),
                }],
                withholding: false,
            },
        }),
    )
    .await;
    post(&engine, cv).await;

    let err = engine
        .revise_purchase_cost(&company(), rr, dec!(5), UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PostingError::InvalidDocument(_)));

    let document = engine.get_document(&company(), rr).await.unwrap();
    assert_eq!(document.outstanding_amount(), Decimal::ZERO);
    assert_eq!(balance_ending(&engine, AP_TRADE, 4).await, Decimal::ZERO);
    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain[0].total, dec!(1000));
}

// ============================================================================
// Inventory period lock
// ============================================================================

async fn close_inventory(engine: &PostingEngine<MemoryStore>, month: u32) {
    engine
        .close_period(
            &company(),
            Module::Inventory,
            2024,
            month,
            UserId::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

fn closed_inventory_month(err: &PostingError) -> Option<u32> {
    match err {
        PostingError::PeriodClosed {
            module: Module::Inventory,
            month,
            ..
        } => Some(*month),
        _ => None,
    }
}

#[tokio::test]
async fn test_purchase_dated_in_closed_inventory_month_is_rejected() {
    let engine = engine();
    close_inventory(&engine, 3).await;
    let rr = draft(&engine, date(2024, 3, 10), receiving_report(dec!(10), dec!(50))).await;

    let err = engine
        .post_document(&company(), rr, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(closed_inventory_month(&err), Some(3));
    assert!(engine.cost_layer(&company(), "PET001").await.unwrap().is_empty());
    assert!(engine.store().ledger().await.is_empty());
}

#[tokio::test]
async fn test_backdated_purchase_cannot_reprice_closed_inventory_month() {
    let engine = engine();
    let first = draft(&engine, date(2024, 2, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, first).await;
    let si = draft(&engine, date(2024, 3, 5), sales_invoice(dec!(10), dec!(90))).await;
    post(&engine, si).await;
    close_inventory(&engine, 3).await;

    let backdated = draft(&engine, date(2024, 2, 20), receiving_report(dec!(100), dec!(70))).await;
    let err = engine
        .post_document(&company(), backdated, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(closed_inventory_month(&err), Some(3));
    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain.len(), 2);
    let sale = chain.iter().find(|e| e.source_document_id == si).unwrap();
    assert_eq!(sale.total, dec!(500));
}

#[tokio::test]
async fn test_void_cannot_replay_closed_inventory_month() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 2, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, rr).await;
    close_inventory(&engine, 2).await;

    let err = engine
        .void_document(&company(), rr, UserId::new(), date(2024, 4, 1), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(closed_inventory_month(&err), Some(2));
    let document = engine.get_document(&company(), rr).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Posted);
}

#[tokio::test]
async fn test_revision_in_closed_inventory_month_is_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 3, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, rr).await;
    close_inventory(&engine, 3).await;

    let err = engine
        .revise_purchase_cost(&company(), rr, dec!(55), UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(closed_inventory_month(&err), Some(3));
    let chain = engine.cost_layer(&company(), "PET001").await.unwrap();
    assert_eq!(chain[0].total, dec!(5000));
}

#[tokio::test]
async fn test_recalculation_from_closed_inventory_month_is_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(100), dec!(50))).await;
    post(&engine, rr).await;
    close_inventory(&engine, 3).await;
    let cancel = CancellationToken::new();

    let err = engine
        .recalculate_inventory_cost(&company(), "PET001", date(2024, 3, 1), UserId::new(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(closed_inventory_month(&err), Some(3));

    let correction = engine
        .recalculate_inventory_cost(&company(), "PET001", date(2024, 4, 1), UserId::new(), &cancel)
        .await
        .unwrap();
    assert!(correction.lines.is_empty());
}

#[tokio::test]
async fn test_oversold_sale_is_flagged_not_rejected() {
    let engine = engine();
    let rr = draft(&engine, date(2024, 4, 1), receiving_report(dec!(10), dec!(50))).await;
    post(&engine, rr).await;
    let si = draft(&engine, date(2024, 4, 2), sales_invoice(dec!(15), dec!(90))).await;

    let receipt = engine
        .post_document(&company(), si, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.warnings.len(), 1);
    assert_eq!(receipt.warnings[0].resulting_balance, dec!(-5));
    assert!(receipt.cost_entry.unwrap().needs_review);
}

// ============================================================================
// Retries and cancellation
// ============================================================================

#[tokio::test]
async fn test_transient_commit_failure_is_retried() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    engine.store().fail_next_commits(2);

    let receipt = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.attempts, 3);
    assert_eq!(receipt.document_no, "RR-000001");
    assert_eq!(engine.store().ledger().await.len(), 2);
}

#[tokio::test]
async fn test_number_collision_on_write_is_reissued() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    engine.store().fail_next_number_writes(1);

    let receipt = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.document_no, "RR-000001");
    assert_eq!(engine.store().ledger().await.len(), 2);
    let document = engine.get_document(&company(), id).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Posted);
}

#[tokio::test]
async fn test_retries_exhausted_leave_nothing_behind() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    engine.store().fail_next_commits(3);

    let err = engine
        .post_document(&company(), id, UserId::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(engine.store().ledger().await.is_empty());
    let document = engine.get_document(&company(), id).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Pending);
    assert!(document.document_no.is_none());
}

#[tokio::test]
async fn test_cancelled_post_rolls_back() {
    let engine = engine();
    let id = draft(&engine, date(2024, 4, 5), receiving_report(dec!(10), dec!(50))).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .post_document(&company(), id, UserId::new(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PostingError::Cancelled));
    assert!(engine.store().ledger().await.is_empty());
    let number = engine
        .generate_document_number(&company(), DocumentType::ReceivingReport, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(number, "RR-000001");
}
