use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rss::Channel;
use scraper::{Html, Selector};
use std::io::BufRead;

/// 文字列を日付型に変換するヘルパー関数
///
/// `dateparser`クレートを利用して、様々な形式の日付文字列を解析し、
/// `DateTime<Utc>`型に変換する。
///
/// **この関数の意義**
/// `dateparser::parse`で行われないwith_timezoneでUTCへの変換を行なってる。
/// フィードごとにバラバラなタイムゾーンはここでUTCに正規化される。
///
/// # サポート形式の例
/// - "2025-01-15T10:00:00Z"
/// - "Sun, 10 Aug 2025 12:00:00 +0000"
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    // `dateparser`はタイムゾーンを持つ`DateTime`を返すため、UTCに変換する
    match dateparser::parse(date_str) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => Err(anyhow!("不正な日付形式: {}", date_str)),
    }
}

/// XML文字列からRSSチャンネルを解析する
pub fn parse_channel_from_xml_str(xml: &str) -> Result<Channel> {
    Channel::read_from(xml.as_bytes()).context("RSSのXML解析に失敗")
}

/// ReaderからRSSチャンネルを解析する
pub fn parse_channel_from_reader<R: BufRead>(reader: R) -> Result<Channel> {
    Channel::read_from(reader).context("RSSのXML解析に失敗")
}

/// HTMLから本文として読めるテキストを抽出する
///
/// 抽出の優先順位:
/// 1. `<article>`内の`<p>`
/// 2. ページ全体の`<p>`
/// 3. `<body>`全体のテキスト
///
/// 空白は1つに詰め、段落は空行で区切る。何も抽出できなければエラー。
pub fn extract_readable_text(html: &str) -> Result<String> {
    let document = Html::parse_document(html);

    for selector in ["article p", "p"] {
        let paragraphs = select_paragraphs(&document, selector)?;
        if !paragraphs.is_empty() {
            return Ok(paragraphs.join("\n\n"));
        }
    }

    let body_selector = parse_selector("body")?;
    let body_text = document
        .select(&body_selector)
        .next()
        .map(|body| collapse_whitespace(&body.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default();

    if body_text.is_empty() {
        return Err(anyhow!("HTMLから本文を抽出できませんでした"));
    }
    Ok(body_text)
}

fn select_paragraphs(document: &Html, selector: &str) -> Result<Vec<String>> {
    let selector = parse_selector(selector)?;
    Ok(document
        .select(&selector)
        .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| !text.is_empty())
        .collect())
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("CSSセレクタが不正: {} - {:?}", selector, e))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // `parse_date`関数の基本的なテスト
    #[test]
    fn test_parse_common_date_formats() {
        // ISO 8601 / RFC 3339
        let rfc3339 = "2025-08-10T12:30:00Z";
        let expected_rfc3339 = Utc.with_ymd_and_hms(2025, 8, 10, 12, 30, 0).unwrap();
        assert_eq!(parse_date(rfc3339).unwrap(), expected_rfc3339);

        // RFC 2822 (RSSで一般的)
        let rfc2822 = "Sun, 10 Aug 2025 12:30:00 +0000";
        assert_eq!(parse_date(rfc2822).unwrap(), expected_rfc3339);
    }

    // タイムゾーン付きの日付文字列はUTCに正規化される
    #[test]
    fn test_parse_with_timezones() {
        let expected_utc = Utc.with_ymd_and_hms(2025, 8, 10, 12, 30, 0).unwrap();
        assert_eq!(parse_date("2025-08-10T21:30:00+09:00").unwrap(), expected_utc);
        assert_eq!(parse_date("2025-08-10T04:30:00-08:00").unwrap(), expected_utc);

        // -0400 = UTC+4時間
        let cbs_date = "Sun, 27 Jul 2025 03:25:12 -0400";
        let expected_cbs = Utc.with_ymd_and_hms(2025, 7, 27, 7, 25, 12).unwrap();
        assert_eq!(parse_date(cbs_date).unwrap(), expected_cbs);
    }

    // 不正な日付形式のテスト
    #[test]
    fn test_parse_invalid_formats() {
        assert!(parse_date("invalid-date").is_err());
        assert!(parse_date("2025-13-40").is_err()); // 不正な月日
        assert!(parse_date("").is_err()); // 空文字列
    }

    #[test]
    fn test_parse_channel_from_xml_str() {
        let xml = r#"<rss version="2.0"><channel><title>T</title><link>http://example.com</link>
            <description>D</description>
            <item><title>A</title><link>http://example.com/a</link></item>
            </channel></rss>"#;
        let channel = parse_channel_from_xml_str(xml).unwrap();
        assert_eq!(channel.items().len(), 1);

        assert!(parse_channel_from_xml_str("<invalid>xml content</broken>").is_err());
    }

    #[test]
    fn test_extract_readable_text_prefers_article() {
        let html = r#"<html><body>
            <nav><p>メニュー</p></nav>
            <article>
                <h1>見出し</h1>
                <p>最初の   段落です。</p>
                <p>二番目の
                   段落です。</p>
            </article>
        </body></html>"#;
        let text = extract_readable_text(html).unwrap();
        assert_eq!(text, "最初の 段落です。\n\n二番目の 段落です。");
        assert!(!text.contains("メニュー"), "article外の段落は含めない");
    }

    #[test]
    fn test_extract_readable_text_fallbacks() {
        let paragraphs = "<html><body><div><p>本文A</p></div><p>本文B</p></body></html>";
        assert_eq!(extract_readable_text(paragraphs).unwrap(), "本文A\n\n本文B");

        let body_only = "<html><body><div>段落なし   の本文</div></body></html>";
        assert_eq!(extract_readable_text(body_only).unwrap(), "段落なし の本文");

        let empty = "<html><body>   </body></html>";
        assert!(extract_readable_text(empty).is_err());
    }
}
