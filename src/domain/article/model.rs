use crate::domain::item::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// 記事エンティティ（articlesテーブルと一致）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// 配信済みなら配信日時。一度設定されたら戻らない
    pub posted_at: Option<DateTime<Utc>>,
}

impl Article {
    /// 配信済みかどうかを判定
    pub fn is_posted(&self) -> bool {
        self.posted_at.is_some()
    }

    /// 空白のみの要約は要約なしとして扱う
    pub fn summary_text(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
    }
}

// 保存前の記事
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewArticle {
    /// 取得したアイテムから保存用の記事を作る
    pub fn from_item(source_id: i64, item: &Item) -> Self {
        Self {
            source_id,
            title: item.title.clone(),
            link: item.link.clone(),
            summary: Some(item.summary.trim())
                .filter(|summary| !summary.is_empty())
                .map(str::to_string),
            published_at: item.published_at,
        }
    }
}
