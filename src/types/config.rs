use thiserror::Error;

/// 設定関連のエラー型
/// 環境変数、設定ファイル、設定値の検証など設定に関するエラーを定義
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 必須の設定値が見つからない
    #[error("必須の設定値が見つかりません: {name}")]
    MissingValue { name: String },

    /// 設定値が不正
    #[error("設定値が不正です: {name} - {reason}")]
    InvalidValue { name: String, reason: String },

    /// 設定ファイルを解析できない
    #[error("設定ファイルを解析できません: {path} - {reason}")]
    InvalidConfigFile { path: String, reason: String },
}

impl ConfigError {
    /// 必須値不足エラーを作成
    pub fn missing_value<N: Into<String>>(name: N) -> Self {
        Self::MissingValue { name: name.into() }
    }

    /// 不正な設定値エラーを作成
    pub fn invalid_value<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 設定ファイル解析エラーを作成
    pub fn invalid_config_file<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::InvalidConfigFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// 設定エラーのResult型エイリアス
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
