use crate::{
    app::bot::Bot,
    domain::{
        article::PgArticleStore,
        source::{NewSource, PgSourceRepository, SourceRegistry, SourceRepository},
    },
    infra::{
        api::{
            http::{HttpClient, ReqwestHttpClient},
            telegram::TelegramClient,
        },
        config::AppConfig,
        db::setup_database,
    },
    task::{
        fetch::{FetchReport, Fetcher, FetcherSettings},
        notify::{DeliveryOutcome, Notifier, NotifierSettings},
        shutdown::{self, Shutdown, ShutdownTrigger},
    },
};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

/// 本番用の依存関係
struct Services {
    pool: PgPool,
    http: Arc<ReqwestHttpClient>,
    client: reqwest::Client,
}

impl Services {
    async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = setup_database(&config.database_dsn)
            .await
            .context("データベースの準備に失敗")?;
        let client = reqwest::Client::new();
        Ok(Self {
            pool,
            http: Arc::new(ReqwestHttpClient::with_client(client.clone())),
            client,
        })
    }

    fn fetcher(&self, config: &AppConfig) -> Fetcher {
        let sources = Arc::new(PgSourceRepository::new(self.pool.clone()));
        let articles = Arc::new(PgArticleStore::new(self.pool.clone()));
        let http: Arc<dyn HttpClient> = self.http.clone();
        Fetcher::new(sources, articles, http, FetcherSettings::from_config(config))
    }

    fn notifier(&self, config: &AppConfig, telegram: Arc<TelegramClient>) -> Result<Notifier> {
        let settings = config.telegram()?;
        let articles = Arc::new(PgArticleStore::new(self.pool.clone()));
        let http: Arc<dyn HttpClient> = self.http.clone();
        Ok(Notifier::new(
            articles,
            telegram,
            http,
            NotifierSettings::from_config(config, &settings),
        ))
    }

    fn telegram(&self, config: &AppConfig) -> Result<Arc<TelegramClient>> {
        let settings = config.telegram()?;
        Ok(Arc::new(TelegramClient::new(
            self.client.clone(),
            settings.bot_token,
        )))
    }
}

/// bot・記事取得・配信の3つのループを実行する
///
/// SIGINT/SIGTERMで全ループを停止する。
/// いずれかのループが異常終了した場合も他のループを止めてエラーを返す。
pub async fn run_bot_workflow(config: &AppConfig) -> Result<()> {
    // 接続より先に必須設定を検証する
    config.telegram()?;

    let services = Services::connect(config).await?;
    let telegram = services.telegram(config)?;
    let fetcher = services.fetcher(config);
    let notifier = services.notifier(config, telegram.clone())?;
    let bot = Bot::with_default_commands(telegram.clone(), telegram, config.command_timeout);

    let (trigger, shutdown) = shutdown::channel();
    let signal_trigger = trigger.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("停止シグナルを受信しました");
        signal_trigger.trigger();
    });

    info!("=== ニュースフィードbot開始 ===");
    let result = run_loops(&fetcher, &notifier, &bot, &trigger, &shutdown).await;
    services.pool.close().await;
    info!("=== ニュースフィードbot終了 ===");
    result
}

/// 3つのループを並行に実行し、すべての終了を待つ
pub async fn run_loops(
    fetcher: &Fetcher,
    notifier: &Notifier,
    bot: &Bot,
    trigger: &ShutdownTrigger,
    shutdown: &Shutdown,
) -> Result<()> {
    let fetch = async {
        let result = fetcher.run(shutdown).await;
        if let Err(e) = &result {
            error!(error = %e, "記事取得ループが異常終了。全ループを停止します");
            trigger.trigger();
        }
        result
    };
    let notify = async {
        let result = notifier.run(shutdown).await;
        if let Err(e) = &result {
            error!(error = %e, "配信ループが異常終了。全ループを停止します");
            trigger.trigger();
        }
        result
    };
    let commands = async {
        let result = bot.run(shutdown).await;
        if let Err(e) = &result {
            error!(error = %format!("{:#}", e), "botが異常終了。全ループを停止します");
            trigger.trigger();
        }
        result
    };

    let (fetch, notify, commands) = tokio::join!(fetch, notify, commands);
    fetch.context("記事取得ループが異常終了")?;
    notify.context("配信ループが異常終了")?;
    commands.context("botが異常終了")?;
    Ok(())
}

/// 取得サイクルを1回だけ実行する
pub async fn fetch_once(config: &AppConfig) -> Result<FetchReport> {
    let services = Services::connect(config).await?;
    let (_trigger, shutdown) = shutdown::channel();
    let report = services
        .fetcher(config)
        .fetch(&shutdown)
        .await
        .context("取得サイクルに失敗")?;
    info!("取得サイクル完了: {}", report);
    Ok(report)
}

/// 配信サイクルを1回だけ実行する
pub async fn notify_once(config: &AppConfig) -> Result<DeliveryOutcome> {
    config.telegram()?;
    let services = Services::connect(config).await?;
    let telegram = services.telegram(config)?;
    let (_trigger, shutdown) = shutdown::channel();
    let outcome = services
        .notifier(config, telegram)?
        .select_and_send(&shutdown)
        .await
        .context("配信サイクルに失敗")?;
    info!(outcome = ?outcome, "配信サイクル完了");
    Ok(outcome)
}

/// マイグレーションのみ実行する
pub async fn migrate(config: &AppConfig) -> Result<()> {
    let pool = setup_database(&config.database_dsn)
        .await
        .context("マイグレーションに失敗")?;
    pool.close().await;
    info!("マイグレーション完了");
    Ok(())
}

/// ソースの管理操作
#[derive(Debug, Clone)]
pub enum SourceCommand {
    Add { name: String, feed_url: String },
    List,
    Delete { id: i64 },
}

/// ソース管理コマンドを実行し、結果を表示する
pub async fn manage_sources(config: &AppConfig, command: SourceCommand) -> Result<()> {
    let pool = setup_database(&config.database_dsn)
        .await
        .context("データベースの準備に失敗")?;
    let repository = PgSourceRepository::new(pool.clone());
    let result = apply_source_command(&repository, command).await;
    pool.close().await;

    for line in result? {
        println!("{}", line);
    }
    Ok(())
}

/// ソース管理コマンドを適用し、表示する行を返す
pub async fn apply_source_command(
    repository: &dyn SourceRepository,
    command: SourceCommand,
) -> Result<Vec<String>> {
    match command {
        SourceCommand::Add { name, feed_url } => {
            let id = repository.add(&NewSource::new(name, feed_url)).await?;
            let source = repository
                .source_by_id(id)
                .await?
                .with_context(|| format!("登録したソースが見つかりません: id={}", id))?;
            Ok(vec![format!("ソースを登録しました: {}", source)])
        }
        SourceCommand::List => {
            let sources = repository.sources().await?;
            if sources.is_empty() {
                return Ok(vec!["登録済みのソースはありません".to_string()]);
            }
            Ok(sources.iter().map(ToString::to_string).collect())
        }
        SourceCommand::Delete { id } => {
            if repository.delete(id).await? {
                Ok(vec![format!("ソースを削除しました: id={}", id)])
            } else {
                anyhow::bail!("ソースが見つかりません: id={}", id)
            }
        }
    }
}

/// SIGINT/SIGTERMを待つ
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl-Cの監視に失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERMの監視に失敗");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
