use crate::domain::article::{Article, ArticleStore, NewArticle};
use crate::domain::source::{NewSource, Source, SourceRegistry, SourceRepository};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

/// メモリ上のストア
///
/// PostgreSQLと同じ規則（自然キーでの重複無視、投稿日時の単調性、
/// ソース削除時の記事のカスケード削除）で動作する。
/// DBを使わずに取得・配信処理を動かすために使い、障害の注入もできる。
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    sources: Vec<Source>,
    articles: Vec<Article>,
    next_source_id: i64,
    next_article_id: i64,
    fail_sources: bool,
    /// 残り何回storeに成功したら失敗し始めるか
    store_budget: Option<usize>,
    fail_mark: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("メモリストアのロックが破損しています"))
    }

    /// ソースを追加する（テスト・初期データ用）
    pub fn insert_source(&self, name: &str, feed_url: &str) -> Result<Source> {
        let mut state = self.lock()?;
        state.next_source_id += 1;
        let source = Source {
            id: state.next_source_id,
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            created_at: Utc::now(),
        };
        state.sources.push(source.clone());
        Ok(source)
    }

    /// 保存済みの全記事（ID順）
    pub fn articles(&self) -> Vec<Article> {
        self.lock()
            .map(|state| state.articles.clone())
            .unwrap_or_default()
    }

    /// ソース一覧の取得を失敗させる
    pub fn set_fail_sources(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_sources = fail;
        }
    }

    /// `successes`回成功した後のstoreをすべて失敗させる
    pub fn fail_store_after(&self, successes: usize) {
        if let Ok(mut state) = self.lock() {
            state.store_budget = Some(successes);
        }
    }

    /// 投稿済み更新を失敗させる
    pub fn set_fail_mark(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_mark = fail;
        }
    }
}

#[async_trait]
impl SourceRegistry for MemoryStore {
    async fn sources(&self) -> Result<Vec<Source>> {
        let state = self.lock()?;
        if state.fail_sources {
            return Err(anyhow!("ソース一覧の取得に失敗（注入された障害）"));
        }
        Ok(state.sources.clone())
    }
}

#[async_trait]
impl SourceRepository for MemoryStore {
    async fn source_by_id(&self, id: i64) -> Result<Option<Source>> {
        let state = self.lock()?;
        Ok(state.sources.iter().find(|source| source.id == id).cloned())
    }

    async fn add(&self, source: &NewSource) -> Result<i64> {
        let added = self.insert_source(&source.name, &source.feed_url)?;
        Ok(added.id)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let before = state.sources.len();
        state.sources.retain(|source| source.id != id);
        if state.sources.len() == before {
            return Ok(false);
        }
        state.articles.retain(|article| article.source_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn store(&self, article: &NewArticle) -> Result<bool> {
        let mut state = self.lock()?;
        match state.store_budget {
            Some(0) => return Err(anyhow!("記事の保存に失敗（注入された障害）: {}", article.link)),
            Some(remaining) => state.store_budget = Some(remaining - 1),
            None => {}
        }

        let duplicate = state.articles.iter().any(|stored| {
            stored.source_id == article.source_id
                && stored.link == article.link
                && stored.published_at == article.published_at
                && stored.title == article.title
        });
        if duplicate {
            return Ok(false);
        }

        state.next_article_id += 1;
        let id = state.next_article_id;
        state.articles.push(Article {
            id,
            source_id: article.source_id,
            title: article.title.clone(),
            link: article.link.clone(),
            summary: article.summary.clone(),
            published_at: article.published_at,
            created_at: Utc::now(),
            posted_at: None,
        });
        Ok(true)
    }

    async fn all_not_posted(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Article>> {
        let state = self.lock()?;
        let mut articles: Vec<Article> = state
            .articles
            .iter()
            .filter(|article| !article.is_posted() && article.published_at >= since)
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(articles)
    }

    async fn mark_as_posted(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        if state.fail_mark {
            return Err(anyhow!("投稿済み更新に失敗（注入された障害）: id={}", id));
        }
        if let Some(article) = state.articles.iter_mut().find(|article| article.id == id) {
            article.posted_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_article(source_id: i64, link: &str, published_at: DateTime<Utc>) -> NewArticle {
        NewArticle {
            source_id,
            title: "記事".to_string(),
            link: link.to_string(),
            summary: None,
            published_at,
        }
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let store = MemoryStore::new();
        let article = new_article(1, "https://example.com/a", Utc::now());

        assert!(store.store(&article).await.unwrap());
        assert!(!store.store(&article).await.unwrap());
        assert_eq!(store.articles().len(), 1);
    }

    #[tokio::test]
    async fn test_window_order_and_monotonic_mark() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .store(&new_article(1, "https://example.com/old", now - Duration::hours(2)))
            .await
            .unwrap();
        store
            .store(&new_article(1, "https://example.com/new", now - Duration::minutes(10)))
            .await
            .unwrap();
        store
            .store(&new_article(1, "https://example.com/mid", now - Duration::minutes(30)))
            .await
            .unwrap();

        let since = now - Duration::hours(1);
        let eligible = store.all_not_posted(since, 10).await.unwrap();
        let links: Vec<&str> = eligible.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://example.com/new", "https://example.com/mid"]);

        let newest = eligible[0].id;
        store.mark_as_posted(newest).await.unwrap();
        let posted_at = store.articles()[1].posted_at;
        assert!(posted_at.is_some());

        store.mark_as_posted(newest).await.unwrap();
        assert_eq!(store.articles()[1].posted_at, posted_at, "投稿日時は上書きしない");

        let remaining = store.all_not_posted(since, 1).await.unwrap();
        assert_eq!(remaining[0].link, "https://example.com/mid");
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.fail_store_after(1);
        assert!(store.store(&new_article(1, "https://example.com/1", Utc::now())).await.is_ok());
        assert!(store.store(&new_article(1, "https://example.com/2", Utc::now())).await.is_err());

        store.set_fail_sources(true);
        assert!(store.sources().await.is_err());

        store.set_fail_mark(true);
        assert!(store.mark_as_posted(1).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_source_cascades() {
        let store = MemoryStore::new();
        let id = store
            .add(&NewSource::new("tech", "https://tech.example.com/rss"))
            .await
            .unwrap();
        store
            .store(&new_article(id, "https://tech.example.com/a", Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.source_by_id(id).await.unwrap().unwrap().name, "tech");
        assert!(store.delete(id).await.unwrap());
        assert!(store.articles().is_empty());
        assert!(!store.delete(id).await.unwrap());
    }
}
