use crate::domain::article::{ArticleStore, NewArticle};
use crate::domain::filter::KeywordFilter;
use crate::domain::item::{FeedSource, ItemSource};
use crate::domain::source::SourceRegistry;
use crate::infra::api::http::HttpClient;
use crate::infra::config::AppConfig;
use crate::task::run_every;
use crate::task::shutdown::Shutdown;
use crate::types::{InsertResult, TaskError, TaskResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// 記事取得処理の設定
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub fetch_interval: Duration,
    pub filter_keywords: Vec<String>,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_secs: u64,
}

impl FetcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fetch_interval: config.fetch_interval,
            filter_keywords: config.filter_keywords.clone(),
            max_concurrent_fetches: config.max_concurrent_fetches,
            fetch_timeout_secs: config.fetch_timeout_secs(),
        }
    }
}

/// 1サイクル分の取得結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// 対象ソース数
    pub sources: usize,
    /// 取得または保存に失敗したソース数
    pub failed_sources: usize,
    /// 新規保存した記事数
    pub stored: usize,
    /// 重複のためスキップした記事数
    pub skipped_duplicate: usize,
    /// キーワードで除外した記事数
    pub filtered: usize,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ソース{}件（失敗{}件）: 新規{}件、重複スキップ{}件、除外{}件",
            self.sources, self.failed_sources, self.stored, self.skipped_duplicate, self.filtered
        )
    }
}

/// ソース1件分の処理結果
#[derive(Debug, Default)]
struct SourceOutcome {
    inserted: InsertResult,
    filtered: usize,
    failed: bool,
}

/// 登録済みソースから記事を取得して保存する
pub struct Fetcher {
    registry: Arc<dyn SourceRegistry>,
    store: Arc<dyn ArticleStore>,
    client: Arc<dyn HttpClient>,
    filter: Arc<KeywordFilter>,
    settings: FetcherSettings,
}

impl Fetcher {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        store: Arc<dyn ArticleStore>,
        client: Arc<dyn HttpClient>,
        settings: FetcherSettings,
    ) -> Self {
        let filter = Arc::new(KeywordFilter::new(&settings.filter_keywords));
        Self {
            registry,
            store,
            client,
            filter,
            settings,
        }
    }

    /// 全ソースを並行に取得し、除外されなかったアイテムを保存する
    ///
    /// ソース単位の失敗はログに残して他のソースの処理を続ける。
    /// ソース一覧を取得できない場合のみサイクル全体を失敗させる。
    pub async fn fetch(&self, shutdown: &Shutdown) -> TaskResult<FetchReport> {
        if shutdown.is_triggered() {
            return Err(TaskError::Cancelled);
        }

        let sources = shutdown
            .run_until(self.registry.sources())
            .await
            .ok_or(TaskError::Cancelled)?
            .map_err(TaskError::SourceList)?;

        let mut report = FetchReport {
            sources: sources.len(),
            ..FetchReport::default()
        };
        if sources.is_empty() {
            debug!("登録済みソースがありません");
            return Ok(report);
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches));
        let mut inserted = InsertResult::empty();
        let mut tasks = JoinSet::new();

        for source in &sources {
            let feed = FeedSource::from_model(
                source,
                Arc::clone(&self.client),
                self.settings.fetch_timeout_secs,
            );
            let store = Arc::clone(&self.store);
            let filter = Arc::clone(&self.filter);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return SourceOutcome {
                        failed: true,
                        ..SourceOutcome::default()
                    };
                };
                process_source(&feed, store.as_ref(), &filter).await
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tasks.abort_all();
                    info!("停止シグナルにより取得サイクルを中断");
                    return Err(TaskError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        inserted.merge(outcome.inserted);
                        report.filtered += outcome.filtered;
                        if outcome.failed {
                            report.failed_sources += 1;
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "ソース処理タスクが異常終了しました");
                        report.failed_sources += 1;
                    }
                    None => break,
                },
            }
        }

        report.stored = inserted.inserted;
        report.skipped_duplicate = inserted.skipped_duplicate;
        Ok(report)
    }

    /// 一定間隔で取得サイクルを実行する
    pub async fn run(&self, shutdown: &Shutdown) -> TaskResult<()> {
        run_every("fetch", self.settings.fetch_interval, shutdown, move || async move {
            let report = self.fetch(shutdown).await?;
            info!(
                sources = report.sources,
                failed = report.failed_sources,
                stored = report.stored,
                "取得サイクル完了: {}",
                report
            );
            Ok(())
        })
        .await
    }
}

/// ソース1件を取得・除外判定・保存する
///
/// 保存に失敗した時点でそのソースの残りのアイテムは処理しない。
/// それまでに保存した記事は残る（次のサイクルで重複として扱われる）。
async fn process_source(
    source: &dyn ItemSource,
    store: &dyn ArticleStore,
    filter: &KeywordFilter,
) -> SourceOutcome {
    let mut outcome = SourceOutcome::default();

    let items = match source.fetch().await {
        Ok(items) => items,
        Err(e) => {
            warn!(source = source.name(), error = %format!("{:#}", e), "フィードの取得に失敗");
            outcome.failed = true;
            return outcome;
        }
    };
    debug!(source = source.name(), items = items.len(), "フィードを取得");

    for item in &items {
        if filter.is_suppressed(item) {
            debug!(source = source.name(), title = %item.title, "キーワードにより除外");
            outcome.filtered += 1;
            continue;
        }

        let article = NewArticle::from_item(source.id(), item);
        match store.store(&article).await {
            Ok(inserted) => outcome.inserted.record(inserted),
            Err(e) => {
                error!(
                    source = source.name(),
                    link = %article.link,
                    error = %format!("{:#}", e),
                    "記事の保存に失敗。このソースの残りの記事は次のサイクルで処理します"
                );
                outcome.failed = true;
                break;
            }
        }
    }

    debug!(source = source.name(), "{}", outcome.inserted.display_with_domain("記事"));
    outcome
}
