mod common;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{FlakyStore, reopen, test_service};
use tally::application::{AppError, LedgerEvent, LedgerOptions, LedgerService};
use tally::storage::{DEFAULT_STORAGE_KEY, JsonFileStore, MemoryStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_roundtrip_through_sqlite() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service.add_transaction(10050, "Salary", true)?;
    service.add_transaction(1999, "Groceries & more", false)?;
    service.add_transaction(1, "Rounding", false)?;
    service.flush().await?;

    let reopened = reopen(&temp).await?;
    assert_eq!(reopened.transactions(), service.transactions());
    assert_eq!(reopened.balance(), 10050 - 1999 - 1);
    Ok(())
}

#[tokio::test]
async fn test_roundtrip_through_json_files() -> Result<()> {
    let temp = TempDir::new()?;
    let mut service = LedgerService::open(JsonFileStore::new(temp.path())).await?;
    service.add_transaction(2500, "Gift", true)?;
    service.flush().await?;

    assert!(temp.path().join("transactions.json").exists());
    let reopened = LedgerService::open(JsonFileStore::new(temp.path())).await?;
    assert_eq!(reopened.transactions(), service.transactions());
    Ok(())
}

#[tokio::test]
async fn test_wire_format() -> Result<()> {
    let store = FlakyStore::new();
    let mut service = LedgerService::open(store.clone()).await?;
    let tx = service.add_transaction(1250, "Salary", true)?;
    service.flush().await?;

    let payload = store.stored(DEFAULT_STORAGE_KEY).unwrap();
    let records: serde_json::Value = serde_json::from_str(&payload)?;
    let record = &records[0];

    assert_eq!(record["id"], tx.id.as_str());
    assert_eq!(record["amount"], 12.5);
    assert_eq!(record["category"], "Salary");
    assert_eq!(record["isIncome"], true);
    let date = record["date"].as_str().unwrap();
    assert!(date.ends_with('Z'));
    assert_eq!(DateTime::parse_from_rfc3339(date)?.with_timezone(&Utc), tx.date);
    Ok(())
}

#[tokio::test]
async fn test_invalid_dates_are_replaced_on_load() -> Result<()> {
    let payload = r#"[
        {"id":"1700000000000","amount":100,"category":"Salary","isIncome":true,"date":"2023-11-14T22:13:20.000Z"},
        {"id":"1700000000001","amount":30,"category":"Food","isIncome":false,"date":"not a date"}
    ]"#;
    let before = Utc::now();
    let service =
        LedgerService::open(MemoryStore::with_value(DEFAULT_STORAGE_KEY, payload)).await?;
    let after = Utc::now();

    let transactions = service.transactions();
    assert_eq!(transactions.len(), 2);
    assert_eq!(
        transactions[0].date,
        DateTime::parse_from_rfc3339("2023-11-14T22:13:20Z")?.with_timezone(&Utc)
    );

    let fixed = &transactions[1];
    assert!(fixed.date >= before - Duration::milliseconds(1) && fixed.date <= after);
    assert_eq!(fixed.id, "1700000000001");
    assert_eq!(fixed.amount, 3000);
    assert_eq!(fixed.category, "Food");
    assert!(!fixed.is_income);
    assert_eq!(service.balance(), 7000);
    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_starts_empty() -> Result<()> {
    for payload in ["", "{oops", "{\"transactions\":[]}", "null"] {
        let service =
            LedgerService::open(MemoryStore::with_value(DEFAULT_STORAGE_KEY, payload)).await?;
        assert!(service.transactions().is_empty(), "payload {:?}", payload);
        assert_eq!(service.balance(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_custom_storage_key() -> Result<()> {
    let store = FlakyStore::new();
    let options = LedgerOptions {
        storage_key: "ledger-2024".to_string(),
        ..LedgerOptions::default()
    };
    let mut service = LedgerService::open_with(store.clone(), options).await?;
    service.add_transaction(100, "Tip", true)?;
    service.flush().await?;

    assert!(store.stored("ledger-2024").is_some());
    assert!(store.stored(DEFAULT_STORAGE_KEY).is_none());
    Ok(())
}

#[tokio::test]
async fn test_load_failure_is_reported() -> Result<()> {
    let store = FlakyStore::new();
    store.fail_loads(true);

    let result = LedgerService::open(store).await;
    assert!(matches!(result, Err(AppError::Persistence(_))));
    Ok(())
}

#[tokio::test]
async fn test_save_failure_keeps_memory_and_is_surfaced() -> Result<()> {
    let store = FlakyStore::new();
    let mut service = LedgerService::open(store.clone()).await?;
    let mut events = service.subscribe();

    store.fail_saves(true);
    service.add_transaction(5000, "Salary", true)?;

    let err = service.flush().await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
    assert!(err.to_string().contains("disk full"));

    // Memory keeps the mutation, storage does not have it
    assert_eq!(service.balance(), 5000);
    assert!(store.stored(DEFAULT_STORAGE_KEY).is_none());

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let LedgerEvent::PersistenceFailed { message } = event {
            assert!(message.contains("disk full"));
            saw_failure = true;
        }
    }
    assert!(saw_failure);

    // The failure is reported once
    service.flush().await?;
    Ok(())
}

#[tokio::test]
async fn test_next_successful_save_reconciles_storage() -> Result<()> {
    let store = FlakyStore::new();
    let mut service = LedgerService::open(store.clone()).await?;

    store.fail_saves(true);
    service.add_transaction(5000, "Salary", true)?;
    assert!(service.flush().await.is_err());

    store.fail_saves(false);
    service.add_transaction(1500, "Food", false)?;
    service.flush().await?;

    let reloaded = LedgerService::open(store.clone()).await?;
    assert_eq!(reloaded.transactions(), service.transactions());
    assert_eq!(reloaded.balance(), 3500);
    Ok(())
}

#[tokio::test]
async fn test_writes_are_applied_in_order() -> Result<()> {
    let store = FlakyStore::new();
    let mut service = LedgerService::open(store.clone()).await?;

    let mut last_id = String::new();
    for i in 1..=20 {
        last_id = service.add_transaction(i * 100, "Step", true)?.id;
    }
    service.delete_transaction(&last_id);
    service.flush().await?;

    let reloaded = LedgerService::open(store).await?;
    assert_eq!(reloaded.transactions().len(), 19);
    assert_eq!(reloaded.balance(), (1..=19).map(|i| i * 100).sum::<i64>());
    Ok(())
}
