//! ニュースフィードbot
//!
//! 登録したフィードを定期的に取得して記事を保存し、
//! 未投稿の記事を1件ずつTelegramチャンネルへ配信する。
//!
//! - [`types`]: 共通のエラー型・結果型
//! - [`infra`]: HTTP・Telegram・DB・設定などの外部との境界
//! - [`domain`]: ソース・アイテム・記事のモデルと規則
//! - [`task`]: 記事取得・配信の定期タスク
//! - [`app`]: botとプロセス全体の組み立て

pub mod app;
pub mod domain;
pub mod infra;
pub mod task;
pub mod types;
