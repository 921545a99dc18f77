//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - エラー型: 設定・インフラ・定期タスクのエラー
//! - データベース操作結果型: インサート結果の統一表現

pub mod config;
pub mod infra;
pub mod task;

// 便利な再エクスポート
pub use config::{ConfigError, ConfigResult};
pub use infra::{InfraError, InfraResult, InsertResult};
pub use task::{TaskError, TaskResult};
