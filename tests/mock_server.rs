//! Telegram Bot API・フィード配信元のモックサーバー
//!
//! httpmockで外部通信を遮断し、本番用のHTTPクライアントと
//! Telegramクライアントを実際のHTTP越しに検証する。

use httpmock::prelude::*;
use httpmock::Mock;
use newsfeed_bot::infra::api::http::{HttpClient, ReqwestHttpClient};
use newsfeed_bot::infra::api::telegram::{OutputChannel, ParseMode, TelegramClient, UpdateSource};
use newsfeed_bot::types::InfraError;
use serde_json::json;

pub const BOT_TOKEN: &str = "123456:TEST";

/// Telegram Bot APIのモックサーバー
pub struct TelegramMockServer {
    server: MockServer,
}

impl TelegramMockServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start_async().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    /// このサーバーに向けたクライアントを作成
    pub fn client(&self) -> TelegramClient {
        TelegramClient::with_base_url(reqwest::Client::new(), BOT_TOKEN, self.base_url())
    }

    fn method_path(method: &str) -> String {
        format!("/bot{}/{}", BOT_TOKEN, method)
    }

    /// 指定チャンネルへのMarkdownV2送信成功をモック
    pub async fn mock_send_message_ok(&self, chat_id: i64) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(Self::method_path("sendMessage"))
                    .json_body_partial(json!({"chat_id": chat_id}).to_string());
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "ok": true,
                        "result": {"message_id": 1, "chat": {"id": chat_id}, "date": 0}
                    }));
            })
            .await
    }

    /// 送信エラー（Bot APIのエラー応答）をモック
    pub async fn mock_send_message_error(&self, status: u16, description: &str) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(POST).path(Self::method_path("sendMessage"));
                then.status(status)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "ok": false,
                        "error_code": status,
                        "description": description
                    }));
            })
            .await
    }

    /// 更新取得をモック
    pub async fn mock_get_updates(&self, updates: serde_json::Value) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(POST).path(Self::method_path("getUpdates"));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"ok": true, "result": updates}));
            })
            .await
    }
}

#[tokio::test]
async fn test_send_message_markdown_v2() {
    let server = TelegramMockServer::start().await;
    let mock = server
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path(TelegramMockServer::method_path("sendMessage"))
                .json_body_partial(
                    json!({"chat_id": -1001, "text": "*title*", "parse_mode": "MarkdownV2"}).to_string(),
                );
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"ok": true, "result": {"message_id": 5}}));
        })
        .await;

    server
        .client()
        .send_message(-1001, "*title*", Some(ParseMode::MarkdownV2))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_message_api_error() {
    let server = TelegramMockServer::start().await;
    server
        .mock_send_message_error(400, "Bad Request: can't parse entities")
        .await;

    let result = server.client().send_message(1, "*broken", Some(ParseMode::MarkdownV2)).await;

    match result {
        Err(InfraError::TelegramApi { method, description }) => {
            assert_eq!(method, "sendMessage");
            assert!(description.contains("can't parse entities"));
        }
        other => panic!("Telegram APIエラーになるべき: {:?}", other),
    }
}

#[tokio::test]
async fn test_get_updates() {
    let server = TelegramMockServer::start().await;
    server
        .mock_get_updates(json!([
            {"update_id": 100, "message": {"message_id": 1, "chat": {"id": 42}, "text": "/start",
              "entities": [{"type": "bot_command", "offset": 0, "length": 6}]}},
            {"update_id": 101, "channel_post": {"message_id": 2}}
        ]))
        .await;

    let updates = server.client().get_updates(0, 1).await.unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].update_id, 100);
    let message = updates[0].message.as_ref().unwrap();
    assert_eq!(message.chat.id, 42);
    assert_eq!(message.command(), Some("start"));
    assert!(updates[1].message.is_none());
}

#[tokio::test]
async fn test_reqwest_http_client() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rss.xml");
            then.status(200).body("<rss>ok</rss>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not found");
        })
        .await;

    let client = ReqwestHttpClient::new();

    let body = client.fetch_text(&server.url("/rss.xml"), 5).await.unwrap();
    assert_eq!(body, "<rss>ok</rss>");

    let missing = client.fetch_text(&server.url("/missing"), 5).await;
    assert!(missing.is_err(), "404はエラーになるべき");
}
