use crate::domain::source::Source;
use crate::infra::api::http::HttpClient;
use crate::infra::parser::{parse_channel_from_xml_str, parse_date};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rss::Channel;
use std::sync::Arc;
use tracing::debug;

/// フィードから取得した1件分のコンテンツ（永続化前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub categories: Vec<String>,
    pub link: String,
    /// UTCに正規化済みの公開日時
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub source_name: String,
}

/// アイテムの取得元
///
/// 取得処理はフィード形式を意識せず、このトレイト経由でアイテムを得る。
#[async_trait]
pub trait ItemSource: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<Item>>;
}

/// フィード種別ごとのアイテム取得元
pub enum FeedSource {
    Rss(RssSource),
}

impl FeedSource {
    /// 登録済みソースから取得元を組み立てる
    pub fn from_model(source: &Source, client: Arc<dyn HttpClient>, timeout_secs: u64) -> Self {
        FeedSource::Rss(RssSource {
            id: source.id,
            name: source.name.clone(),
            feed_url: source.feed_url.clone(),
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ItemSource for FeedSource {
    fn id(&self) -> i64 {
        match self {
            FeedSource::Rss(source) => source.id,
        }
    }

    fn name(&self) -> &str {
        match self {
            FeedSource::Rss(source) => &source.name,
        }
    }

    async fn fetch(&self) -> Result<Vec<Item>> {
        match self {
            FeedSource::Rss(source) => source.fetch().await,
        }
    }
}

/// RSSフィード
pub struct RssSource {
    id: i64,
    name: String,
    feed_url: String,
    client: Arc<dyn HttpClient>,
    timeout_secs: u64,
}

impl RssSource {
    async fn fetch(&self) -> Result<Vec<Item>> {
        let xml = self
            .client
            .fetch_text(&self.feed_url, self.timeout_secs)
            .await
            .with_context(|| format!("RSSフィードの取得に失敗: {}", self.feed_url))?;
        let channel = parse_channel_from_xml_str(&xml)
            .with_context(|| format!("RSSフィードの解析に失敗: {}", self.feed_url))?;

        Ok(items_from_channel(&channel, &self.name))
    }
}

/// RSSチャンネルからアイテムを抽出する
///
/// リンクか公開日時が無いitemは、重複判定のキーを作れないため読み飛ばす。
pub fn items_from_channel(channel: &Channel, source_name: &str) -> Vec<Item> {
    let mut items = Vec::new();

    for rss_item in channel.items() {
        let Some(link) = rss_item.link().map(str::trim).filter(|link| !link.is_empty()) else {
            debug!(source = source_name, title = ?rss_item.title(), "リンクの無いitemをスキップ");
            continue;
        };
        let Some(published_at) = rss_item.pub_date().and_then(|date| parse_date(date).ok()) else {
            debug!(source = source_name, link, "公開日時を解析できないitemをスキップ");
            continue;
        };

        items.push(Item {
            title: rss_item.title().unwrap_or("").trim().to_string(),
            categories: rss_item
                .categories()
                .iter()
                .map(|category| category.name().trim().to_string())
                .collect(),
            link: link.to_string(),
            published_at,
            summary: rss_item.description().unwrap_or("").trim().to_string(),
            source_name: source_name.to_string(),
        });
    }

    items
}
