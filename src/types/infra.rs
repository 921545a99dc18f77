use thiserror::Error;

/// インフラストラクチャ層のエラー型
/// データベース、HTTP、Telegram APIなど外部との境界で発生するエラーを定義
#[derive(Error, Debug)]
pub enum InfraError {
    /// データベース接続エラー
    #[error("データベース接続エラー: {source}")]
    DatabaseConnection {
        #[source]
        source: sqlx::Error,
    },

    /// マイグレーションエラー
    #[error("データベースマイグレーションエラー: {source}")]
    Migration {
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// HTTP通信エラー
    #[error("HTTP通信エラー: {operation} - {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// Telegram APIがエラーを返した
    #[error("Telegram APIエラー: {method} - {description}")]
    TelegramApi { method: String, description: String },
}

impl InfraError {
    /// データベース接続エラーを作成
    pub fn database_connection(source: sqlx::Error) -> Self {
        Self::DatabaseConnection { source }
    }

    /// マイグレーションエラーを作成
    pub fn migration(source: sqlx::migrate::MigrateError) -> Self {
        Self::Migration { source }
    }

    /// HTTP通信エラーを作成
    pub fn http<O: Into<String>>(operation: O, source: reqwest::Error) -> Self {
        Self::Http {
            operation: operation.into(),
            source,
        }
    }

    /// Telegram APIエラーを作成
    pub fn telegram_api<M: Into<String>, D: Into<String>>(method: M, description: D) -> Self {
        Self::TelegramApi {
            method: method.into(),
            description: description.into(),
        }
    }
}

/// インフラエラーのResult型エイリアス
pub type InfraResult<T> = std::result::Result<T, InfraError>;

/// データベースインサート操作の結果を表す構造体
/// 新規挿入と重複スキップの件数を記録
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    /// 新規挿入された件数
    pub inserted: usize,
    /// 重複によりスキップされた件数
    pub skipped_duplicate: usize,
}

impl InsertResult {
    /// 新しい操作結果を作成
    pub fn new(inserted: usize, skipped: usize) -> Self {
        Self {
            inserted,
            skipped_duplicate: skipped,
        }
    }

    /// 空の結果（全て0）を作成
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// 1件分のインサート結果を加算する
    pub fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped_duplicate += 1;
        }
    }

    /// 別の結果を合算する
    pub fn merge(&mut self, other: InsertResult) {
        self.inserted += other.inserted;
        self.skipped_duplicate += other.skipped_duplicate;
    }

    /// ドメイン名を指定して表示用の文字列を生成
    pub fn display_with_domain(&self, domain_name: &str) -> String {
        format!(
            "{}処理完了: 新規{}件、重複スキップ{}件",
            domain_name, self.inserted, self.skipped_duplicate
        )
    }
}

impl Default for InsertResult {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_result_record_and_merge() {
        let mut first = InsertResult::empty();
        first.record(true);
        first.record(false);
        first.record(true);
        assert_eq!(first, InsertResult::new(2, 1));

        let mut total = InsertResult::new(1, 0);
        total.merge(first);
        assert_eq!(total.inserted, 3);
        assert_eq!(total.skipped_duplicate, 1);
        assert_eq!(
            total.display_with_domain("記事"),
            "記事処理完了: 新規3件、重複スキップ1件"
        );
    }
}
