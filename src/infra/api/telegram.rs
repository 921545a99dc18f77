use crate::types::{InfraError, InfraResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// MarkdownV2でエスケープが必要な文字
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// 送信メッセージの書式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    MarkdownV2,
}

impl ParseMode {
    fn as_str(&self) -> &'static str {
        match self {
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// 出力チャンネルの抽象化トレイト
///
/// 配信処理とコマンド応答はこのトレイト経由でメッセージを送信する。
#[async_trait]
pub trait OutputChannel: Send + Sync {
    /// 指定チャットにテキストを送信する
    ///
    /// `parse_mode`を指定する場合、`text`はその書式向けにエスケープ済みであること。
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> InfraResult<()>;
}

/// 受信更新（コマンド）の取得元
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// `offset`以降の更新をロングポーリングで取得する
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> InfraResult<Vec<Update>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i64,
    pub length: i64,
}

impl Message {
    /// メッセージがbotコマンドかどうか（先頭にbot_commandエンティティがある）
    pub fn is_command(&self) -> bool {
        self.entities
            .iter()
            .any(|entity| entity.kind == "bot_command" && entity.offset == 0)
    }

    /// コマンド名を取得する（`/start@my_bot args` → `start`）
    pub fn command(&self) -> Option<&str> {
        if !self.is_command() {
            return None;
        }
        let text = self.text.as_deref()?;
        let head = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);
        (!name.is_empty()).then_some(name)
    }

    /// コマンド名以降の引数部分
    pub fn command_arguments(&self) -> &str {
        self.text
            .as_deref()
            .and_then(|text| text.split_once(char::is_whitespace))
            .map(|(_, rest)| rest.trim())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot APIクライアント
pub struct TelegramClient {
    client: Client,
    base_url: String,
    bot_token: String,
}

impl TelegramClient {
    /// 新しいTelegramクライアントを作成
    pub fn new(client: Client, bot_token: impl Into<String>) -> Self {
        Self::with_base_url(client, bot_token, TELEGRAM_API_BASE)
    }

    /// APIのベースURLを指定して作成（モックサーバー向け）
    pub fn with_base_url(
        client: Client,
        bot_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> InfraResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| InfraError::http(method, e))?;

        let status = response.status();
        let api_response: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| InfraError::http(method, e))?;

        if !status.is_success() || !api_response.ok {
            let description = api_response
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(InfraError::telegram_api(method, description));
        }

        api_response
            .result
            .ok_or_else(|| InfraError::telegram_api(method, "resultが空です"))
    }
}

#[async_trait]
impl OutputChannel for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> InfraResult<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode.as_str());
        }

        let _sent: serde_json::Value = self
            .call("sendMessage", body, Duration::from_secs(30))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> InfraResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        // ロングポーリング分の待ち時間に余裕を持たせる
        let timeout = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", body, timeout).await
    }
}

/// MarkdownV2の特殊文字をエスケープする
pub fn escape_markdown_v2(src: &str) -> String {
    let mut escaped = String::with_capacity(src.len());
    for c in src.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// テスト用のモック出力チャンネル
///
/// 送信されたメッセージを記録し、`set_failing`で送信失敗を再現できる。
#[derive(Default)]
pub struct MockOutputChannel {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

/// モックに記録された送信メッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

impl MockOutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 送信失敗を返すモックを作成
    pub fn new_failing() -> Self {
        let channel = Self::default();
        channel.set_failing(true);
        channel
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 送信に成功したメッセージの一覧
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OutputChannel for MockOutputChannel {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> InfraResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InfraError::telegram_api(
                "sendMessage",
                "モック送信エラー",
            ));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                chat_id,
                text: text.to_string(),
                parse_mode,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_message(text: &str) -> Message {
        Message {
            message_id: 1,
            chat: Chat { id: 42 },
            text: Some(text.to_string()),
            entities: vec![MessageEntity {
                kind: "bot_command".to_string(),
                offset: 0,
                length: text.split_whitespace().next().unwrap_or("").len() as i64,
            }],
        }
    }

    #[test]
    fn test_escape_markdown_v2() {
        assert_eq!(escape_markdown_v2("a_b*c"), "a\\_b\\*c");
        assert_eq!(
            escape_markdown_v2("https://example.com/a-b.html?x=1"),
            "https://example\\.com/a\\-b\\.html?x\\=1"
        );
        assert_eq!(escape_markdown_v2("日本語のタイトル"), "日本語のタイトル");
        assert_eq!(escape_markdown_v2("(1+1)!"), "\\(1\\+1\\)\\!");
    }

    #[test]
    fn test_command_parsing() {
        let start = command_message("/start");
        assert!(start.is_command());
        assert_eq!(start.command(), Some("start"));
        assert_eq!(start.command_arguments(), "");

        let with_bot = command_message("/sources@news_bot  all ");
        assert_eq!(with_bot.command(), Some("sources"));
        assert_eq!(with_bot.command_arguments(), "all");

        let plain = Message {
            message_id: 2,
            chat: Chat { id: 42 },
            text: Some("こんにちは".to_string()),
            entities: vec![],
        };
        assert!(!plain.is_command());
        assert_eq!(plain.command(), None);
    }

    #[test]
    fn test_update_deserialize() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 5, "chat": {"id": -100}, "text": "/start",
                  "entities": [{"type": "bot_command", "offset": 0, "length": 6}]}},
                {"update_id": 11, "edited_message": {}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(response.ok);
        let updates = response.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().command(), Some("start"));
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn test_mock_output_channel() {
        let channel = MockOutputChannel::new();
        channel
            .send_message(1, "*title*", Some(ParseMode::MarkdownV2))
            .await
            .unwrap();
        assert_eq!(channel.sent().len(), 1);

        channel.set_failing(true);
        assert!(channel.send_message(1, "x", None).await.is_err());
        assert_eq!(channel.sent().len(), 1, "失敗した送信は記録されない");
    }
}
