use super::*;
use page_checker::checker::exit_status;
use page_checker::CheckOutcome;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_mismatch_alerts_every_channel() -> anyhow::Result<()> {
    let channels = Channels::healthy();
    let checker = checker(StubFetcher::html(STOCK_PAGE), &channels);

    let report = checker.run(&stock_request("#stock-status", "Out of stock")).await?;

    assert_eq!(report.result.outcome, CheckOutcome::TextMismatch);
    assert_eq!(report.result.actual_text.as_deref(), Some("In stock"));

    let dispatch = report.dispatch.expect("mismatch should dispatch");
    assert_eq!(dispatch.attempted(), 3);
    assert_eq!(dispatch.succeeded(), 3);

    for channel in [&channels.sms, &channels.email, &channels.telegram] {
        let received = channel.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].expected, "Out of stock");
        assert_eq!(received[0].found.as_deref(), Some("In stock"));
    }
    Ok(())
}

#[tokio::test]
async fn test_match_sends_nothing() -> anyhow::Result<()> {
    let channels = Channels::healthy();
    let checker = checker(StubFetcher::html(STOCK_PAGE), &channels);

    let report = checker.run(&stock_request("#stock-status", "In stock")).await?;

    assert!(report.result.matched());
    assert!(report.dispatch.is_none());
    assert_eq!(channels.total_received(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_element_alert_differs_from_mismatch() -> anyhow::Result<()> {
    let channels = Channels::healthy();
    let checker = checker(StubFetcher::html(STOCK_PAGE), &channels);

    let report = checker.run(&stock_request("#missing", "In stock")).await?;
    assert_eq!(report.result.outcome, CheckOutcome::SelectorAbsent);
    assert!(report.result.actual_text.is_none());

    let absent = channels.telegram.received().remove(0);
    assert!(absent.text().contains("element not found"));

    let channels = Channels::healthy();
    let checker = super::checker(StubFetcher::html(STOCK_PAGE), &channels);
    checker.run(&stock_request("#stock-status", "Out of stock")).await?;

    let changed = channels.telegram.received().remove(0);
    assert!(!changed.text().contains("element not found"));
    assert_eq!(absent.headline(), changed.headline());
    assert_ne!(absent.summary(), changed.summary());
    Ok(())
}

#[tokio::test]
async fn test_fetch_timeout_aborts_without_alerts() {
    let channels = Channels::healthy();
    let request = page_checker::CheckRequest::new(
        "https://slow.example.com",
        "#stock-status",
        "In stock",
        Some(1),
    )
    .unwrap();
    let checker = checker(StubFetcher::new(StubResponse::Hang), &channels);

    let run = checker.run(&request).await;

    assert!(matches!(run, Err(page_checker::AppError::FetchTimeout { timeout_seconds: 1, .. })));
    assert_ne!(exit_status(&run), 0);
    assert_eq!(channels.total_received(), 0);
}

#[tokio::test]
async fn test_failing_channel_does_not_block_others() -> anyhow::Result<()> {
    let channels = Channels {
        email: RecordingNotifier::failing("email"),
        ..Channels::healthy()
    };
    let checker = checker(StubFetcher::html(STOCK_PAGE), &channels);

    let run = checker.run(&stock_request("#stock-status", "Out of stock")).await;
    assert_eq!(exit_status(&run), 0);

    let dispatch = run?.dispatch.expect("mismatch should dispatch");
    assert_eq!(dispatch.attempted(), 3);
    assert_eq!(dispatch.failed(), 1);
    assert!(!dispatch.channel("email").unwrap().succeeded());

    assert_eq!(channels.sms.received().len(), 1);
    assert_eq!(channels.email.received().len(), 1);
    assert_eq!(channels.telegram.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_selector_skips_browser() {
    let channels = Channels::healthy();
    let fetcher = StubFetcher::html(STOCK_PAGE);
    let calls = fetcher.calls();
    let checker = checker(fetcher, &channels);

    let run = checker.run(&stock_request("div >", "In stock")).await;

    assert!(matches!(run, Err(page_checker::AppError::InvalidSelector { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(channels.total_received(), 0);
}

#[tokio::test]
async fn test_navigation_error_aborts_without_alerts() {
    let channels = Channels::healthy();
    let fetcher = StubFetcher::new(StubResponse::Fail(|request| page_checker::AppError::Navigation {
        url: request.url().to_string(),
        message: "net::ERR_CONNECTION_REFUSED".to_string(),
    }));
    let calls = fetcher.calls();
    let checker = checker(fetcher, &channels);

    let run = checker.run(&stock_request("#stock-status", "In stock")).await;

    assert!(matches!(run, Err(page_checker::AppError::Navigation { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(channels.total_received(), 0);
}

#[tokio::test]
async fn test_whitespace_differences_are_not_alerts() -> anyhow::Result<()> {
    let page = "<p id=\"status\">\n   In\u{a0}\tstock \n</p>";
    let channels = Channels::healthy();
    let checker = checker(StubFetcher::html(page), &channels);

    let report = checker.run(&stock_request("#status", "  In stock")).await?;

    assert!(report.result.matched());
    assert_eq!(channels.total_received(), 0);
    Ok(())
}

#[tokio::test]
async fn test_first_matching_element_decides() -> anyhow::Result<()> {
    let page = r#"<ul><li class="price">$10</li><li class="price">$12</li></ul>"#;
    let channels = Channels::healthy();
    let checker = checker(StubFetcher::html(page), &channels);

    let report = checker.run(&stock_request(".price", "$10")).await?;
    assert!(report.result.matched());

    let report = checker.run(&stock_request(".price", "$12")).await?;
    assert_eq!(report.result.outcome, CheckOutcome::TextMismatch);
    Ok(())
}

#[tokio::test]
async fn test_one_fetch_per_run() -> anyhow::Result<()> {
    let channels = Channels::healthy();
    let fetcher = StubFetcher::html(STOCK_PAGE);
    let calls = fetcher.calls();
    let checker = checker(fetcher, &channels);

    checker.run(&stock_request("#stock-status", "Out of stock")).await?;
    checker.run(&stock_request("#stock-status", "In stock")).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}
