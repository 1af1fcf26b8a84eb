use super::*;
use page_checker::config::AppConfig;
use page_checker::plugins::notifiers::TelegramSettings;
use page_checker::plugins::notifiers::TelegramNotifier;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn telegram(server: &MockServer) -> TelegramNotifier {
    TelegramNotifier::new(TelegramSettings {
        bot_token: "123456:integration".to_string(),
        chat_id: "42".to_string(),
        api_base_url: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_mismatch_reaches_telegram_api() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123456:integration/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = PluginManager::new();
    manager.register_notifier(Box::new(telegram(&server)));
    let checker = PageChecker::new(Box::new(StubFetcher::html(STOCK_PAGE)), manager);

    let report = checker.run(&stock_request("#stock-status", "Out of stock")).await?;
    let dispatch = report.dispatch.expect("mismatch should dispatch");

    assert_eq!(dispatch.succeeded(), 1);
    let sent = dispatch.channel("telegram").unwrap().result.as_ref().unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("telegram-7"));
    Ok(())
}

#[tokio::test]
async fn test_telegram_outage_is_not_a_run_failure() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let recorder = RecordingNotifier::new("sms");
    let mut manager = PluginManager::new();
    manager.register_notifier(Box::new(telegram(&server)));
    manager.register_notifier(Box::new(recorder.clone()));
    let checker = PageChecker::new(Box::new(StubFetcher::html(STOCK_PAGE)), manager);

    let report = checker.run(&stock_request("#missing", "In stock")).await?;
    let dispatch = report.dispatch.expect("absent element should dispatch");

    assert_eq!(dispatch.failed(), 1);
    assert_eq!(recorder.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_manager_from_config_orders_channels() {
    let mut config = AppConfig::default();
    config.notifications.smtp.username = Some("alerts@example.com".to_string());
    config.notifications.smtp.password = Some("app-password".to_string());
    config.notifications.email.recipients = vec!["owner@example.com".to_string()];
    config.notifications.sms.recipients = vec!["5551234567:verizon".to_string()];
    config.notifications.telegram.bot_token = Some("123:abc".to_string());
    config.notifications.telegram.chat_id = Some("42".to_string());

    let manager = PluginManager::from_config(&config.notifications).unwrap();
    assert_eq!(manager.list_notifier_types(), vec!["sms", "email", "telegram"]);
}
