mod common;

use anyhow::Result;
use common::{parse_date, recent, test_service};
use passbook::application::HistoryFilter;

/// Seed two accounts and five transfers on distinct, ascending dates.
async fn seed_history(service: &passbook::application::LedgerService) -> Result<()> {
    service.add_account("owner-1", "A0001").await?;
    service.add_account("owner-2", "A0002").await?;

    for (amount, date) in [
        (100, "2024-01-05"),
        (200, "2024-01-10"),
        (300, "2024-01-20"),
        (400, "2024-02-01"),
        (500, "2024-02-15"),
    ] {
        service
            .add_transaction("A0001", "A0002", amount, Some(parse_date(date)))
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_window_guard() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    // no count and no complete date range: an unbounded scan is refused
    let page = service
        .get_transactions("A0001", HistoryFilter::default())
        .await?;
    assert!(page.result.is_empty());
    assert_eq!(page.query.result_count, 0);
    assert_eq!(page.query.count, 0);
    assert_eq!(page.query.skip, 0);
    assert_eq!(page.query.from_date, None);
    assert_eq!(page.query.to_date, None);

    Ok(())
}

#[tokio::test]
async fn test_history_is_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let page = service.get_transactions("A0001", recent(100)).await?;
    // 5 debit legs plus the grant
    assert_eq!(page.query.result_count, 6);
    for pair in page.result.windows(2) {
        assert!(pair[0].date >= pair[1].date, "entries must be date-descending");
    }
    // the grant was recorded at registration time, so it outdates the
    // backdated transfers; the newest transfer leg follows it
    assert_eq!(page.result[0].amount, common::INITIAL_BALANCE);
    assert_eq!(page.result[1].amount, -500);

    Ok(())
}

#[tokio::test]
async fn test_count_limits_window_but_not_result_count() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let page = service.get_transactions("A0001", recent(2)).await?;
    assert_eq!(page.result.len(), 2);
    assert_eq!(page.query.result_count, 6);
    assert_eq!(page.query.count, 2);

    Ok(())
}

#[tokio::test]
async fn test_skip_offsets_the_window() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let full = service.get_transactions("A0001", recent(100)).await?;
    let page = service
        .get_transactions(
            "A0001",
            HistoryFilter {
                count: 2,
                skip: 2,
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(page.result.len(), 2);
    assert_eq!(page.result[..], full.result[2..4]);
    assert_eq!(page.query.skip, 2);

    Ok(())
}

#[tokio::test]
async fn test_pagination_reassembles_full_history() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let full = service.get_transactions("A0001", recent(100)).await?;

    let mut collected = Vec::new();
    let mut skip = 0;
    loop {
        let window = service
            .get_transactions(
                "A0001",
                HistoryFilter {
                    count: 2,
                    skip,
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(window.query.result_count, full.query.result_count);
        if window.result.is_empty() {
            break;
        }
        skip += window.result.len() as i64;
        collected.extend(window.result);
    }

    assert_eq!(collected, full.result);

    Ok(())
}

#[tokio::test]
async fn test_date_range_is_inclusive() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let page = service
        .get_transactions(
            "A0001",
            HistoryFilter {
                count: 0,
                skip: 0,
                from_date: Some(parse_date("2024-01-10")),
                to_date: Some(parse_date("2024-02-01")),
            },
        )
        .await?;

    // both boundary transfers are included, the ones outside are not
    let amounts: Vec<i64> = page.result.iter().map(|entry| entry.amount).collect();
    assert_eq!(amounts, vec![-400, -300, -200]);
    assert_eq!(page.query.result_count, 3);

    Ok(())
}

#[tokio::test]
async fn test_incomplete_date_range_does_not_filter() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    // from_date alone is ignored, even one that would exclude everything
    let page = service
        .get_transactions(
            "A0001",
            HistoryFilter {
                count: 100,
                skip: 0,
                from_date: Some(parse_date("2030-01-01")),
                to_date: None,
            },
        )
        .await?;

    assert_eq!(page.query.result_count, 6);
    assert_eq!(page.result.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_history_shows_only_own_perspective() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_account("owner-1", "A0001").await?;
    service.add_account("owner-2", "A0002").await?;
    service.add_transaction("A0001", "A0002", 50, None).await?;

    let sender = service.get_transactions("A0001", recent(10)).await?;
    let receiver = service.get_transactions("A0002", recent(10)).await?;

    // the sender sees the debit leg of the transfer, never the credit leg
    assert!(sender.result.iter().any(|entry| entry.amount == -50));
    assert!(!sender.result.iter().any(|entry| entry.amount == 50));

    assert!(receiver.result.iter().any(|entry| entry.amount == 50));
    assert!(!receiver.result.iter().any(|entry| entry.amount == -50));

    Ok(())
}

#[tokio::test]
async fn test_reads_are_idempotent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let first = service.get_transactions("A0001", recent(10)).await?;
    let second = service.get_transactions("A0001", recent(10)).await?;
    assert_eq!(first, second);

    let account_a = service.get_account("A0001").await?;
    let account_b = service.get_account("A0001").await?;
    assert_eq!(account_a, account_b);

    Ok(())
}

#[tokio::test]
async fn test_history_of_unknown_account_is_empty() -> Result<()> {
    let (service, _temp) = test_service().await?;
    seed_history(&service).await?;

    let page = service.get_transactions("A9999", recent(10)).await?;
    assert!(page.result.is_empty());
    assert_eq!(page.query.result_count, 0);

    Ok(())
}
