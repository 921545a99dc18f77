use super::model::Article;
use crate::infra::api::http::HttpClient;
use crate::infra::api::telegram::escape_markdown_v2;
use crate::infra::parser::extract_readable_text;
use anyhow::{Context, Result};

/// 配信する本文を決める
///
/// 要約があればそのまま使い、無ければ記事ページを取得して本文を抽出する。
pub async fn resolve_text(
    article: &Article,
    client: &dyn HttpClient,
    timeout_secs: u64,
) -> Result<String> {
    if let Some(summary) = article.summary_text() {
        return Ok(summary.to_string());
    }

    let html = client
        .fetch_text(&article.link, timeout_secs)
        .await
        .with_context(|| format!("記事ページの取得に失敗: {}", article.link))?;
    extract_readable_text(&html).with_context(|| format!("記事本文の抽出に失敗: {}", article.link))
}

/// MarkdownV2形式の配信メッセージを組み立てる
///
/// `*タイトル*本文\n\nリンク`の形で、各要素はエスケープ済み。
pub fn format_message(article: &Article, text: &str) -> String {
    format!(
        "*{}*{}\n\n{}",
        escape_markdown_v2(&article.title),
        escape_markdown_v2(text),
        escape_markdown_v2(&article.link)
    )
}
