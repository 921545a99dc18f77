use crate::types::InfraError;
use thiserror::Error;

/// 定期タスク（取得サイクル・配信サイクル）のエラー型
///
/// `is_transient` が真のエラーは次のtickで自動的に再試行され、
/// 偽のエラーは実行ループを停止させる。
#[derive(Error, Debug)]
pub enum TaskError {
    /// ソース一覧の取得に失敗（サイクル全体を中止）
    #[error("ソース一覧の取得に失敗: {0:#}")]
    SourceList(anyhow::Error),

    /// 未投稿記事の検索に失敗
    #[error("未投稿記事の検索に失敗: {0:#}")]
    Selection(anyhow::Error),

    /// 配信本文の取得に失敗
    #[error("記事本文の取得に失敗: {link} - {reason:#}")]
    TextResolution { link: String, reason: anyhow::Error },

    /// 出力チャンネルへの送信に失敗
    #[error("記事の送信に失敗: id={article_id} - {source}")]
    Send {
        article_id: i64,
        #[source]
        source: InfraError,
    },

    /// 配信サイクルが制限時間を超過
    #[error("配信が制限時間を超過: id={article_id} ({timeout_secs}秒)")]
    Timeout { article_id: i64, timeout_secs: u64 },

    /// 設定値から処理条件を組み立てられない
    #[error("処理条件が不正: {0}")]
    InvalidSettings(String),

    /// 停止シグナルによる中断
    #[error("停止シグナルにより中断")]
    Cancelled,
}

impl TaskError {
    /// 次のサイクルで再試行すれば回復しうるエラーかどうか
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TaskError::TextResolution { .. } | TaskError::Send { .. } | TaskError::Timeout { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

/// タスクエラーのResult型エイリアス
pub type TaskResult<T> = std::result::Result<T, TaskError>;
