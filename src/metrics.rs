use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockOutcome {
    Rendered,
    /// Rendered in windows; `degraded` of them became placeholders.
    Chunked { chunks: usize, degraded: usize },
    /// Rendered as a placeholder panel.
    Degraded { reason: String },
    Gallery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockMetrics {
    pub name: String,
    pub outcome: BlockOutcome,
    /// One-based page the block starts on.
    pub first_page: usize,
    pub last_page: usize,
    pub charts_embedded: usize,
    pub render_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GalleryStats {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    pub per_row: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportMetrics {
    pub page_count: usize,
    pub blocks: Vec<BlockMetrics>,
    /// Blocks with at least one placeholder, whole or per window.
    pub degraded_blocks: usize,
    pub clipped_mm: f64,
    pub gallery: Option<GalleryStats>,
    pub total_bytes: usize,
    pub render_ms: f64,
}

impl ReportMetrics {
    pub fn block(&self, name: &str) -> Option<&BlockMetrics> {
        self.blocks.iter().find(|block| block.name == name)
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|block| block.name.as_str()).collect()
    }
}
