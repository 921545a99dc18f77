use crate::infra::api::telegram::{Message, OutputChannel, Update, UpdateSource};
use crate::task::shutdown::Shutdown;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// ロングポーリングの待ち時間（秒）
pub const POLL_TIMEOUT_SECS: u64 = 60;

/// 更新取得に失敗したときの再試行までの待ち時間
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// ハンドラが失敗したときの返信
pub const INTERNAL_ERROR_REPLY: &str = "Internal error";

/// botコマンドのハンドラ
///
/// 返した文字列がそのまま送信元のチャットへ返信される。
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Result<String>;
}

/// `/start`コマンド
pub struct StartCommand;

#[async_trait]
impl CommandHandler for StartCommand {
    async fn handle(&self, _message: Message) -> Result<String> {
        Ok("Hello".to_string())
    }
}

/// コマンドを受け付けるbot
pub struct Bot {
    updates: Arc<dyn UpdateSource>,
    output: Arc<dyn OutputChannel>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    command_timeout: Duration,
}

impl Bot {
    pub fn new(
        updates: Arc<dyn UpdateSource>,
        output: Arc<dyn OutputChannel>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            updates,
            output,
            handlers: HashMap::new(),
            command_timeout,
        }
    }

    /// 組み込みコマンドを登録したbotを作成
    pub fn with_default_commands(
        updates: Arc<dyn UpdateSource>,
        output: Arc<dyn OutputChannel>,
        command_timeout: Duration,
    ) -> Self {
        Self::new(updates, output, command_timeout).register("start", Arc::new(StartCommand))
    }

    pub fn register(mut self, command: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(command.to_string(), handler);
        self
    }

    /// 停止が通知されるまで更新をロングポーリングで処理する
    pub async fn run(&self, shutdown: &Shutdown) -> Result<()> {
        info!(commands = ?self.handlers.keys().collect::<Vec<_>>(), "botを開始");
        let mut offset = 0;

        loop {
            let polled = shutdown
                .run_until(self.updates.get_updates(offset, POLL_TIMEOUT_SECS))
                .await;
            let updates = match polled {
                None => break,
                Some(Ok(updates)) => updates,
                Some(Err(e)) => {
                    warn!(error = %e, "更新の取得に失敗");
                    if shutdown.run_until(tokio::time::sleep(POLL_RETRY_DELAY)).await.is_none() {
                        break;
                    }
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.handle_update(update, shutdown).await;
            }
            if shutdown.is_triggered() {
                break;
            }
        }

        info!("botを停止しました");
        Ok(())
    }

    /// 更新1件を処理する
    ///
    /// ハンドラは個別のタスクで`command_timeout`を上限に実行する。
    /// エラー・パニック・タイムアウトはここで捕捉し、`Internal error`を返信する。
    /// 停止が通知された場合はハンドラを中断し、返信しない。
    pub async fn handle_update(&self, update: Update, shutdown: &Shutdown) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.command().map(str::to_string) else {
            return;
        };
        let Some(handler) = self.handlers.get(&command).cloned() else {
            debug!(command = %command, "未登録のコマンドを無視");
            return;
        };

        let chat_id = message.chat.id;
        let task = tokio::spawn(async move { handler.handle(message).await });
        let abort = task.abort_handle();

        let Some(joined) = shutdown
            .run_until(tokio::time::timeout(self.command_timeout, task))
            .await
        else {
            abort.abort();
            info!(command = %command, chat_id, "停止シグナルによりコマンドの処理を中断");
            return;
        };

        let reply = match joined {
            Ok(Ok(Ok(reply))) => reply,
            Ok(Ok(Err(e))) => {
                error!(command = %command, chat_id, error = %format!("{:#}", e), "コマンドの処理に失敗");
                INTERNAL_ERROR_REPLY.to_string()
            }
            Ok(Err(e)) => {
                error!(command = %command, chat_id, error = %e, "コマンドの処理中にパニックが発生");
                INTERNAL_ERROR_REPLY.to_string()
            }
            Err(_) => {
                abort.abort();
                error!(command = %command, chat_id, timeout = ?self.command_timeout, "コマンドの処理がタイムアウト");
                INTERNAL_ERROR_REPLY.to_string()
            }
        };

        if let Err(e) = self.output.send_message(chat_id, &reply, None).await {
            warn!(command = %command, chat_id, error = %e, "コマンドへの返信に失敗");
        }
    }
}
