//! ドメイン層
//!
//! ソース・アイテム・記事のモデルと、その永続化・変換の規則を扱う。

pub mod article;
pub mod filter;
pub mod item;
pub mod source;
