use crate::domain::article::{format_message, resolve_text, Article, ArticleStore};
use crate::infra::api::http::HttpClient;
use crate::infra::api::telegram::{OutputChannel, ParseMode};
use crate::infra::config::{lookup_start, AppConfig, TelegramSettings};
use crate::task::run_every;
use crate::task::shutdown::Shutdown;
use crate::types::{TaskError, TaskResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// 配信処理の設定
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub notification_interval: Duration,
    pub lookup_time_window: Duration,
    pub channel_id: i64,
    pub fetch_timeout_secs: u64,
    pub delivery_timeout: Duration,
}

impl NotifierSettings {
    pub fn from_config(config: &AppConfig, telegram: &TelegramSettings) -> Self {
        Self {
            notification_interval: config.notification_interval,
            lookup_time_window: config.lookup_time_window,
            channel_id: telegram.channel_id,
            fetch_timeout_secs: config.fetch_timeout_secs(),
            delivery_timeout: config.delivery_timeout,
        }
    }
}

/// 1回の配信サイクルの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 配信対象の記事が無かった
    Idle,
    /// 配信して投稿済みにした
    Delivered { article_id: i64 },
    /// 配信したが投稿済みにできなかった（次のサイクルで再送されうる）
    DeliveredUnmarked { article_id: i64 },
}

/// 未投稿記事を1件ずつ出力チャンネルへ配信する
pub struct Notifier {
    store: Arc<dyn ArticleStore>,
    output: Arc<dyn OutputChannel>,
    client: Arc<dyn HttpClient>,
    settings: NotifierSettings,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        output: Arc<dyn OutputChannel>,
        client: Arc<dyn HttpClient>,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            store,
            output,
            client,
            settings,
        }
    }

    /// 時間窓内で最も新しい未投稿記事を1件選んで配信する
    ///
    /// 本文の取得か送信に失敗した記事は未投稿のまま残り、次のサイクルで再び選ばれる。
    pub async fn select_and_send(&self, shutdown: &Shutdown) -> TaskResult<DeliveryOutcome> {
        if shutdown.is_triggered() {
            return Err(TaskError::Cancelled);
        }

        let since = lookup_start(Utc::now(), self.settings.lookup_time_window).ok_or_else(|| {
            TaskError::InvalidSettings(format!(
                "lookup_time_window: {:?}",
                self.settings.lookup_time_window
            ))
        })?;

        let articles = shutdown
            .run_until(self.store.all_not_posted(since, 1))
            .await
            .ok_or(TaskError::Cancelled)?
            .map_err(TaskError::Selection)?;
        let Some(article) = articles.into_iter().next() else {
            debug!("配信対象の記事はありません");
            return Ok(DeliveryOutcome::Idle);
        };

        let timeout = self.settings.delivery_timeout;
        let delivery = tokio::time::timeout(timeout, self.deliver(&article));
        match shutdown.run_until(delivery).await {
            None => return Err(TaskError::Cancelled),
            Some(Err(_elapsed)) => {
                return Err(TaskError::Timeout {
                    article_id: article.id,
                    timeout_secs: timeout.as_secs(),
                })
            }
            Some(Ok(result)) => result?,
        }

        // 送信後は停止シグナルに関わらず投稿済みにする
        match self.store.mark_as_posted(article.id).await {
            Ok(()) => {
                info!(article_id = article.id, link = %article.link, "記事を配信しました");
                Ok(DeliveryOutcome::Delivered {
                    article_id: article.id,
                })
            }
            Err(e) => {
                error!(
                    article_id = article.id,
                    link = %article.link,
                    error = %format!("{:#}", e),
                    "配信済みの記事を投稿済みにできませんでした。次のサイクルで再送される可能性があります"
                );
                Ok(DeliveryOutcome::DeliveredUnmarked {
                    article_id: article.id,
                })
            }
        }
    }

    async fn deliver(&self, article: &Article) -> TaskResult<()> {
        let text = resolve_text(article, self.client.as_ref(), self.settings.fetch_timeout_secs)
            .await
            .map_err(|reason| TaskError::TextResolution {
                link: article.link.clone(),
                reason,
            })?;
        let message = format_message(article, &text);

        self.output
            .send_message(self.settings.channel_id, &message, Some(ParseMode::MarkdownV2))
            .await
            .map_err(|source| TaskError::Send {
                article_id: article.id,
                source,
            })
    }

    /// 一定間隔で配信サイクルを実行する
    pub async fn run(&self, shutdown: &Shutdown) -> TaskResult<()> {
        run_every(
            "notify",
            self.settings.notification_interval,
            shutdown,
            move || async move { self.select_and_send(shutdown).await.map(|_| ()) },
        )
        .await
    }
}
