pub mod model;
pub mod repository;
pub mod service;

// 公開APIの再エクスポート

// model.rsから
pub use model::{Article, NewArticle};

// repository.rsから
pub use repository::{ArticleStore, PgArticleStore};

// service.rsから
pub use service::{format_message, resolve_text};
