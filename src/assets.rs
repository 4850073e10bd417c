use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;

use crate::render::ImageAssetResolver;

/// Resolves `data:` URIs and local file paths. Remote URLs are not fetched.
#[derive(Debug, Clone, Default)]
pub struct LocalAssetResolver {
    base_dir: Option<PathBuf>,
}

impl LocalAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths are resolved against `dir`.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve_path(&self, url: &str) -> Option<PathBuf> {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        if raw.is_empty() || raw.contains("://") {
            return None;
        }
        let path = Path::new(raw);
        Some(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }

    pub fn load_bytes(&self, url: &str) -> Option<Vec<u8>> {
        if let Some((_, data)) = parse_data_uri(url) {
            return Some(data);
        }
        let path = self.resolve_path(url.trim())?;
        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "image asset unreadable");
                None
            }
        }
    }
}

#[async_trait]
impl ImageAssetResolver for LocalAssetResolver {
    async fn to_embeddable(&self, url: &str) -> Option<String> {
        let bytes = self.load_bytes(url)?;
        Some(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Splits a `data:` URI into its mime type and decoded payload.
pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim().as_bytes())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

/// Accepts either a bare base64 payload or a full data URI.
pub(crate) fn decode_embeddable(payload: &str) -> Option<Vec<u8>> {
    if let Some((_, data)) = parse_data_uri(payload) {
        return Some(data);
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim().as_bytes())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_and_plain_data_uris() {
        let (mime, data) = parse_data_uri("data:image/PNG;base64,AQID").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, vec![1, 2, 3]);

        let (mime, data) = parse_data_uri("data:,hello").unwrap();
        assert_eq!(mime, "application/octet-stream");
        assert_eq!(data, b"hello");

        assert!(parse_data_uri("https://example.com/a.png").is_none());
        assert!(parse_data_uri("data:image/png;base64,@@@").is_none());
    }

    #[test]
    fn decode_accepts_bare_payloads() {
        assert_eq!(decode_embeddable("AQID"), Some(vec![1, 2, 3]));
        assert_eq!(decode_embeddable("data:image/png;base64,AQID"), Some(vec![1, 2, 3]));
        assert_eq!(decode_embeddable("not base64!"), None);
    }

    #[tokio::test]
    async fn resolves_data_uris_and_local_files() {
        let resolver = LocalAssetResolver::new();
        assert_eq!(
            resolver.to_embeddable("data:image/png;base64,AQID").await.as_deref(),
            Some("AQID")
        );

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.bin"), [9u8, 8, 7]).unwrap();
        let resolver = LocalAssetResolver::with_base_dir(dir.path());
        assert_eq!(resolver.to_embeddable("photo.bin").await.as_deref(), Some("CQgH"));
        assert_eq!(resolver.to_embeddable("missing.png").await, None);
        assert_eq!(resolver.to_embeddable("https://cdn.example/x.jpg").await, None);
    }
}
