//! Headless Chrome article renderer.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use url::Url;

use super::{clear_url, ArticleError, ArticleRenderer, Document};
use crate::util::compact_text;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("Invalid regex"));

/// Prints pages to PDF with a local Chrome binary
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    client: reqwest::Client,
    chrome_bin: PathBuf,
    timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(chrome_bin: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ArticleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ArticleError::Fetch(err.to_string()))?;
        Ok(Self {
            client,
            chrome_bin: chrome_bin.into(),
            timeout,
        })
    }

    async fn fetch_title(&self, url: &Url) -> Result<String, ArticleError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| ArticleError::Fetch(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ArticleError::Fetch(format!(
                "{url} returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|err| ArticleError::Fetch(err.to_string()))?;
        Ok(extract_title(&html).unwrap_or_else(|| fallback_title(url)))
    }

    async fn print_to_pdf(&self, url: &Url, output: &Path) -> Result<Vec<u8>, ArticleError> {
        let mut command = Command::new(&self.chrome_bin);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(url.as_str())
            .kill_on_drop(true);

        let run = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                ArticleError::Render(format!("Chrome timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|err| {
                ArticleError::Render(format!(
                    "failed to start {}: {err}",
                    self.chrome_bin.display()
                ))
            })?;

        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            return Err(ArticleError::Render(format!(
                "Chrome exited with {}: {}",
                run.status,
                compact_text(&stderr)
            )));
        }

        let pdf = tokio::fs::read(output)
            .await
            .map_err(|err| ArticleError::Render(format!("no PDF written: {err}")))?;
        if pdf.is_empty() {
            return Err(ArticleError::Render("Chrome wrote an empty PDF".to_string()));
        }
        Ok(pdf)
    }
}

#[async_trait]
impl ArticleRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<Document, ArticleError> {
        let cleaned = clear_url(url)?;
        let url = Url::parse(&cleaned).map_err(|err| ArticleError::InvalidUrl(err.to_string()))?;

        let title = self.fetch_title(&url).await?;
        // Removed when dropped, including when the job is cancelled mid-print.
        let output = tempfile::Builder::new()
            .prefix("syncreads-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|err| ArticleError::Render(format!("no temp file for the PDF: {err}")))?;
        let pdf = self.print_to_pdf(&url, output.path()).await?;

        tracing::debug!(url = %url, "Rendered \"{title}\"");
        Ok(Document { title, pdf })
    }
}

fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let decoded = raw
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    let title = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

fn fallback_title(url: &Url) -> String {
    let host = url.host_str().unwrap_or("article");
    match url.path_segments().and_then(|mut segments| segments.next_back()) {
        Some(slug) if !slug.is_empty() => format!("{host} - {slug}"),
        _ => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn title_is_extracted_and_decoded() {
        let html = "<html><head><TITLE data-x=1>\n  Rust &amp; Friends\n</TITLE></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Rust & Friends"));
    }

    #[test]
    fn blank_title_is_none() {
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("<p>no title</p>"), None);
    }

    #[test]
    fn fallback_uses_host_and_slug() {
        let url = Url::parse("https://blog.example.com/posts/hello-world").unwrap();
        assert_eq!(fallback_title(&url), "blog.example.com - hello-world");
        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(fallback_title(&root), "example.com");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_binary_is_render_error() {
        let renderer =
            ChromeRenderer::new("/nonexistent/chrome", Duration::from_secs(5)).unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();
        let url = Url::parse("https://example.com/").unwrap();

        let result = renderer.print_to_pdf(&url, output.path()).await;
        assert!(matches!(result, Err(ArticleError::Render(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_render_leaves_no_pdf_behind() {
        let dir = tempfile::tempdir().unwrap();
        let chrome = dir.path().join("slow-chrome");
        std::fs::write(&chrome, "#!/bin/sh\nsleep 5\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&chrome, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let renderer = ChromeRenderer::new(&chrome, Duration::from_secs(10)).unwrap();
        let url = Url::parse("https://example.com/").unwrap();

        let output = tempfile::Builder::new()
            .prefix("syncreads-")
            .suffix(".pdf")
            .tempfile_in(dir.path())
            .unwrap();
        let path = output.path().to_path_buf();
        let print = async {
            let _pdf = renderer.print_to_pdf(&url, output.path()).await;
            drop(output);
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(50), print).await;

        assert!(timed_out.is_err());
        assert!(!path.exists());
    }
}
