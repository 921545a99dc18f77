use clap::{Parser, Subcommand};
use newsfeed_bot::app::workflow::{self, SourceCommand};
use newsfeed_bot::infra::config::AppConfig;
use tracing::error;

#[derive(Parser)]
#[command(name = "newsfeed-bot", version, about = "フィードを取得してTelegramへ配信するbot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// bot・記事取得・配信を実行する（既定）
    Run,
    /// 取得サイクルを1回だけ実行する
    FetchOnce,
    /// 配信サイクルを1回だけ実行する
    NotifyOnce,
    /// マイグレーションのみ実行する
    Migrate,
    /// ソースを管理する
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// ソースを登録する
    Add { name: String, feed_url: String },
    /// 登録済みのソースを表示する
    List,
    /// ソースを削除する（記事も削除される）
    Delete { id: i64 },
}

impl From<SourceAction> for SourceCommand {
    fn from(action: SourceAction) -> Self {
        match action {
            SourceAction::Add { name, feed_url } => SourceCommand::Add { name, feed_url },
            SourceAction::List => SourceCommand::List,
            SourceAction::Delete { id } => SourceCommand::Delete { id },
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => workflow::run_bot_workflow(&config).await,
        Command::FetchOnce => workflow::fetch_once(&config).await.map(|_| ()),
        Command::NotifyOnce => workflow::notify_once(&config).await.map(|_| ()),
        Command::Migrate => workflow::migrate(&config).await,
        Command::Source { action } => workflow::manage_sources(&config, action.into()).await,
    }
}
