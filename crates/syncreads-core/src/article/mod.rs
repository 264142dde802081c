//! Turning a web article into a PDF document.

mod chrome;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use chrome::ChromeRenderer;

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),
    #[error("Failed to fetch article: {0}")]
    Fetch(String),
    #[error("Failed to render article: {0}")]
    Render(String),
}

/// A rendered article ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub pdf: Vec<u8>,
}

/// Produces a printable document for an article URL
#[async_trait]
pub trait ArticleRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<Document, ArticleError>;
}

#[async_trait]
impl<T: ArticleRenderer + ?Sized> ArticleRenderer for Arc<T> {
    async fn render(&self, url: &str) -> Result<Document, ArticleError> {
        (**self).render(url).await
    }
}

/// Drop the query string and fragment from an article URL
pub fn clear_url(raw: &str) -> Result<String, ArticleError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|err| ArticleError::InvalidUrl(format!("{raw}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ArticleError::InvalidUrl(format!(
            "{raw}: only http and https are supported"
        )));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}
