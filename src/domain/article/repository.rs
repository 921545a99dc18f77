use super::model::{Article, NewArticle};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// 記事の永続化
///
/// 各操作は単一の冪等な文として実行され、呼び出し間のロックは持たない。
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// 記事を保存する。自然キーが重複する場合は何もしない。
    /// 新規に保存された場合にtrueを返す
    async fn store(&self, article: &NewArticle) -> Result<bool>;

    /// `since`以降に公開された未投稿記事を公開日時の新しい順に最大`limit`件返す
    async fn all_not_posted(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Article>>;

    /// 記事を投稿済みにする。投稿済みの記事に対しては何もしない
    async fn mark_as_posted(&self, id: i64) -> Result<()>;
}

/// PostgreSQLによる記事ストア
#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn store(&self, article: &NewArticle) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (source_id, title, link, summary, published_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT articles_natural_key DO NOTHING
            "#,
        )
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.link)
        .bind(&article.summary)
        .bind(article.published_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("記事のデータベースへの挿入に失敗: {}", article.link))?;

        Ok(result.rows_affected() > 0)
    }

    async fn all_not_posted(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Article>> {
        sqlx::query_as::<_, Article>(
            r#"
            SELECT id, source_id, title, link, summary, published_at, created_at, posted_at
            FROM articles
            WHERE posted_at IS NULL
                AND published_at >= $1
            ORDER BY published_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("未投稿記事の取得に失敗")
    }

    async fn mark_as_posted(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET posted_at = COALESCE(posted_at, $1) WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("記事の投稿済み更新に失敗: id={}", id))?;

        Ok(())
    }
}
