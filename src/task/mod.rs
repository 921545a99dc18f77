//! 定期タスク
//!
//! - 記事取得サイクル（[`fetch::Fetcher`]）
//! - 配信サイクル（[`notify::Notifier`]）
//!
//! どちらも一定間隔で1サイクルずつ実行し、停止シグナルで終了する。

pub mod fetch;
pub mod notify;
pub mod shutdown;

use crate::types::TaskResult;
use shutdown::Shutdown;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// `cycle`を`period`ごとに実行する（初回は即時）
///
/// - 停止が通知されたら`Ok(())`で終了
/// - 一時的なエラーはログに残して次の周期で再試行
/// - それ以外のエラーはループを止めて呼び出し元へ返す
pub(crate) async fn run_every<F, Fut>(
    task_name: &str,
    period: Duration,
    shutdown: &Shutdown,
    mut cycle: F,
) -> TaskResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TaskResult<()>>,
{
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(task = task_name, period = ?period, "定期タスクを開始");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!(task = task_name, "定期タスクを停止しました");
                return Ok(());
            }
            _ = timer.tick() => {}
        }

        match cycle().await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                info!(task = task_name, "定期タスクを停止しました");
                return Ok(());
            }
            Err(e) if e.is_transient() => {
                warn!(task = task_name, error = %e, "サイクルが失敗しました。次の周期で再試行します");
            }
            Err(e) => {
                error!(task = task_name, error = %e, "サイクルが致命的なエラーで失敗しました");
                return Err(e);
            }
        }
    }
}
