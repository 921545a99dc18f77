use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// HTTPクライアントの抽象化トレイト
///
/// このトレイトは、実際のHTTP通信とモック実装の両方を
/// 統一的に扱えるようにするためのインターフェースです。
/// フィードの取得と記事ページの取得の両方で使用します。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 指定されたURLからテキストを取得する
    ///
    /// # Arguments
    /// * `url` - 取得対象のURL
    /// * `timeout_secs` - タイムアウト時間（秒）
    async fn fetch_text(&self, url: &str, timeout_secs: u64) -> Result<String>;
}

/// `reqwest` を使用した本番用のHTTPクライアント実装
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// 新しいHTTPクライアントを作成
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// 既存の`reqwest::Client`を共有して作成
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn fetch_text(&self, url: &str, timeout_secs: u64) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .context(format!("HTTPリクエストの送信に失敗: {}", url))?
            .error_for_status()
            .context(format!("HTTPステータスが異常: {}", url))?;

        response
            .text()
            .await
            .context("レスポンステキストの取得に失敗")
    }
}

/// テスト用のモックHTTPクライアント
///
/// この実装はテスト時にDIされ、実際のHTTPリクエストを行わずに
/// 定義済みのレスポンスやエラーを返します。
/// URLごとの応答を`with_response`/`with_error`で登録でき、
/// 未登録のURLには既定の応答を返します。
pub struct MockHttpClient {
    /// モック時に返すレスポンス内容
    pub mock_response: String,
    /// モック時に返すステータス（成功/失敗の制御）
    pub should_succeed: bool,
    /// エラー時に返すメッセージ
    pub error_message: Option<String>,
    routes: HashMap<String, std::result::Result<String, String>>,
    requested: Mutex<Vec<String>>,
}

impl MockHttpClient {
    /// 成功レスポンスを返すモッククライアントを作成
    pub fn new_success(mock_response: &str) -> Self {
        Self {
            mock_response: mock_response.to_string(),
            should_succeed: true,
            error_message: None,
            routes: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// エラーレスポンスを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            mock_response: String::new(),
            should_succeed: false,
            error_message: Some(error_message.to_string()),
            routes: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// 指定URLに対する成功レスポンスを登録
    pub fn with_response(mut self, url: &str, body: &str) -> Self {
        self.routes.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    /// 指定URLに対するエラーを登録
    pub fn with_error(mut self, url: &str, error_message: &str) -> Self {
        self.routes
            .insert(url.to_string(), Err(error_message.to_string()));
        self
    }

    /// これまでにリクエストされたURLの一覧
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn fetch_text(&self, url: &str, _timeout_secs: u64) -> Result<String> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }

        if let Some(route) = self.routes.get(url) {
            return match route {
                Ok(body) => Ok(body.clone()),
                Err(message) => Err(anyhow::anyhow!("モックHTTPエラー: {}", message)),
            };
        }

        if self.should_succeed {
            // 成功時のモックレスポンス
            Ok(self.mock_response.clone())
        } else {
            // エラー時のレスポンス
            let error_msg = self
                .error_message
                .as_deref()
                .unwrap_or("Mock HTTP error");
            Err(anyhow::anyhow!("モックHTTPエラー: {}", error_msg))
        }
    }
}
