use crate::domain::item::Item;

/// キーワードによる除外フィルタ
///
/// 大文字小文字を区別せず、以下のどちらかに該当するアイテムを除外する。
/// - キーワードがタイトルに部分文字列として含まれる
/// - キーワードがカテゴリのいずれかと完全一致する
///
/// タイトルは部分一致のため、`ad`は`Ladder`にも一致する。
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// アイテムを除外すべきならtrue
    pub fn is_suppressed(&self, item: &Item) -> bool {
        if self.keywords.is_empty() {
            return false;
        }

        let title = item.title.to_lowercase();
        let categories: Vec<String> = item
            .categories
            .iter()
            .map(|category| category.to_lowercase())
            .collect();

        self.keywords.iter().any(|keyword| {
            title.contains(keyword.as_str()) || categories.iter().any(|category| category == keyword)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, categories: &[&str]) -> Item {
        Item {
            title: title.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            link: "https://example.com/a".to_string(),
            published_at: Utc::now(),
            summary: String::new(),
            source_name: "test".to_string(),
        }
    }

    #[test]
    fn test_title_substring_match() {
        let filter = KeywordFilter::new(["ad"]);

        assert!(filter.is_suppressed(&item("Special Ad Offer", &[])));
        // 単語境界は見ない
        assert!(filter.is_suppressed(&item("Ladder", &[])));
        assert!(!filter.is_suppressed(&item("Rust released", &[])));
    }

    #[test]
    fn test_category_exact_match() {
        let filter = KeywordFilter::new(["AD"]);

        assert!(filter.is_suppressed(&item("Weekly digest", &["ad"])));
        assert!(filter.is_suppressed(&item("Weekly digest", &["news", "Ad"])));
        // カテゴリは完全一致のみ
        assert!(!filter.is_suppressed(&item("Weekly digest", &["advertising"])));
    }

    #[test]
    fn test_empty_keywords_suppress_nothing() {
        let filter = KeywordFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(!filter.is_suppressed(&item("Special Ad Offer", &["ad"])));

        let blank = KeywordFilter::new(["", "  "]);
        assert!(blank.is_empty());
        assert!(!blank.is_suppressed(&item("", &[])));
    }
}
