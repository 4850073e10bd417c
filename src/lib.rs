mod assets;
mod block;
mod canvas;
mod charts;
mod chunking;
mod compositor;
mod debug;
mod doc_context;
mod error;
mod frame;
mod gallery;
mod inspect;
mod metrics;
mod options;
mod page_template;
mod pdf;
mod planner;
mod records;
mod render;
mod sections;
mod types;

pub use assets::LocalAssetResolver;
pub use block::{
    Bitmap, ChartSlot, ContentBlock, Direction, GallerySpec, HtmlBlock, RenderSpec, chart_marker,
};
pub use canvas::{Canvas, Command, Document, FONT_BOLD, FONT_REGULAR, Page};
pub use charts::{
    ChartKind, ChartRegistry, ChartSeries, ChartSpec, RasterChartRenderer, charts_registered,
    register_default_charts,
};
pub use chunking::{estimated_height, plan_windows, should_chunk, window_height_px};
pub use compositor::{
    AddOutcome, BreakReason, ClipRecord, Compositor, Layout, PageBreak, Placement, PlacementKind,
};
pub use doc_context::DocContext;
pub use error::{RenderError, ReportError};
pub use frame::Frame;
pub use inspect::{PdfInspectError, PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path};
pub use metrics::{BlockMetrics, BlockOutcome, GalleryStats, ReportMetrics};
pub use options::{Language, OutputFormat, ReportOptions, ReportOptionsBuilder, ReportType};
pub use page_template::PageGeometry;
pub use pdf::{PdfOptions, document_to_pdf};
pub use planner::{
    CALCULATION_METHODS, CERTIFICATION, ENVIRONMENTAL_FACTORS, EXECUTIVE_SUMMARY, HEADER,
    INVESTMENT_ANALYSIS, LEGAL_ANALYSIS, MARKET_ANALYSIS, METHODOLOGY, MORTGAGE_ANALYSIS,
    PRIVACY_NOTICE, PROPERTY_DETAILS, PROPERTY_IMAGES, QUALITY_RATING, SECTION_ORDER,
    gallery_per_row, plan_sections,
};
pub use records::{
    Appraisal, BreakdownItem, CalculationResults, Comparable, EnvironmentalFactors, FormData,
    InvestmentProjection, LegalStatus, MarketAnalysis, MortgageEligibility, Property,
    PropertyImage, QualityScores, ReportInput, TrendPoint,
};
pub use render::{
    BlockRenderer, ChartRenderer, ImageAssetResolver, LayoutExtent, RenderWindow,
    placeholder_bitmap,
};
pub use sections::escape_html;
pub use types::{Color, Margins, Mm, Rect, Size};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use debug::DebugLogger;
use serde_json::json;

/// Turns report records into PDF bytes. Holds the collaborators and the page
/// geometry; one instance can generate any number of reports.
pub struct ReportGenerator {
    geometry: PageGeometry,
    renderer: Arc<dyn BlockRenderer>,
    charts: Arc<dyn ChartRenderer>,
    assets: Arc<dyn ImageAssetResolver>,
    pdf_options: PdfOptions,
    debug: Option<Arc<DebugLogger>>,
}

pub struct ReportGeneratorBuilder {
    geometry: PageGeometry,
    renderer: Option<Arc<dyn BlockRenderer>>,
    charts: Option<Arc<dyn ChartRenderer>>,
    assets: Option<Arc<dyn ImageAssetResolver>>,
    document_title: Option<String>,
    reuse_xobjects: bool,
    debug_log: Option<PathBuf>,
}

impl Default for ReportGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            geometry: PageGeometry::default(),
            renderer: None,
            charts: None,
            assets: None,
            document_title: None,
            reuse_xobjects: true,
            debug_log: None,
        }
    }

    pub fn page_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn block_renderer(mut self, renderer: Arc<dyn BlockRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Defaults to [`RasterChartRenderer`].
    pub fn chart_renderer(mut self, charts: Arc<dyn ChartRenderer>) -> Self {
        self.charts = Some(charts);
        self
    }

    /// Defaults to [`LocalAssetResolver`] without a base directory.
    pub fn asset_resolver(mut self, assets: Arc<dyn ImageAssetResolver>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Overrides the `/Title` written to the PDF info dictionary. When unset
    /// the title is derived from the appraisal reference.
    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.document_title = Some(title.into());
        self
    }

    pub fn reuse_xobjects(mut self, enabled: bool) -> Self {
        self.reuse_xobjects = enabled;
        self
    }

    /// Writes JSONL layout events to `path` for every generated report.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ReportGenerator, ReportError> {
        self.geometry.validate()?;
        let Some(renderer) = self.renderer else {
            return Err(ReportError::InvalidConfiguration(
                "a block renderer is required".to_string(),
            ));
        };
        if let Some(title) = self.document_title.as_deref() {
            if title.trim().is_empty() {
                return Err(ReportError::InvalidConfiguration(
                    "document_title cannot be blank".to_string(),
                ));
            }
        }
        let debug = match self.debug_log {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        register_default_charts();

        Ok(ReportGenerator {
            geometry: self.geometry,
            renderer,
            charts: self
                .charts
                .unwrap_or_else(|| Arc::new(RasterChartRenderer)),
            assets: self
                .assets
                .unwrap_or_else(|| Arc::new(LocalAssetResolver::new())),
            pdf_options: PdfOptions {
                reuse_xobjects: self.reuse_xobjects,
                document_title: self.document_title,
                ..PdfOptions::default()
            },
            debug,
        })
    }
}

impl ReportGenerator {
    pub fn builder() -> ReportGeneratorBuilder {
        ReportGeneratorBuilder::new()
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub async fn generate_report(
        &self,
        input: &ReportInput,
        options: &ReportOptions,
    ) -> Result<Vec<u8>, ReportError> {
        let (bytes, _) = self.generate_report_with_metrics(input, options).await?;
        Ok(bytes)
    }

    /// Runs the whole pipeline: plan, render and compose each block in
    /// order, stamp footers, write the PDF. Only input validation and output
    /// I/O can fail; block-level problems end up as placeholders in the
    /// document and as `Degraded` entries in the metrics.
    pub async fn generate_report_with_metrics(
        &self,
        input: &ReportInput,
        options: &ReportOptions,
    ) -> Result<(Vec<u8>, ReportMetrics), ReportError> {
        input.validate()?;
        let started = Instant::now();
        register_default_charts();
        tracing::info!(
            appraisal = %input.appraisal.id,
            report_type = options.report_type.as_str(),
            "generating valuation report"
        );

        let blocks = plan_sections(input, options);
        let mut compositor = Compositor::new(self.geometry.clone()).with_debug(self.debug.clone());
        let mut metrics = ReportMetrics::default();

        for block in &blocks {
            let block_started = Instant::now();
            let (outcome, charts_embedded) = match &block.spec {
                RenderSpec::Gallery(spec) => {
                    let stats = gallery::layout_gallery(
                        &mut compositor,
                        &block.name,
                        spec,
                        self.assets.as_ref(),
                        self.renderer.as_ref(),
                        self.debug.as_deref(),
                    )
                    .await;
                    metrics.gallery = Some(stats);
                    (BlockOutcome::Gallery, 0)
                }
                RenderSpec::Html(html) => {
                    self.compose_html_block(&mut compositor, &block.name, html)
                        .await
                }
            };
            let degraded = match &outcome {
                BlockOutcome::Degraded { .. } => true,
                BlockOutcome::Chunked { degraded, .. } => *degraded > 0,
                _ => false,
            };
            if degraded {
                metrics.degraded_blocks += 1;
            }
            metrics.blocks.push(BlockMetrics {
                name: block.name.clone(),
                outcome,
                first_page: 0,
                last_page: 0,
                charts_embedded,
                render_ms: block_started.elapsed().as_secs_f64() * 1000.0,
            });
        }

        let (mut document, layout) = compositor.finish();
        for entry in &mut metrics.blocks {
            let pages = layout
                .placements_for(&entry.name)
                .map(|placement| placement.page_index + 1);
            let (first, last) = pages.fold((usize::MAX, 0), |(lo, hi), page| {
                (lo.min(page), hi.max(page))
            });
            if last > 0 {
                entry.first_page = first;
                entry.last_page = last;
            }
        }

        let reference = input.appraisal.display_reference();
        doc_context::stamp_page_footers(&mut document, &self.geometry, reference);

        let mut pdf_options = self.pdf_options.clone();
        if pdf_options.document_title.is_none() {
            pdf_options.document_title = Some(format!("Property Valuation Report {reference}"));
        }
        let bytes = pdf::document_to_pdf_with_logs(&document, &pdf_options, self.debug.clone())?;

        metrics.page_count = layout.page_count;
        metrics.clipped_mm = layout.clipped_total().to_f64();
        metrics.total_bytes = bytes.len();
        metrics.render_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.emit_debug_summary("generate_report");
        tracing::info!(
            pages = metrics.page_count,
            bytes = metrics.total_bytes,
            degraded = metrics.degraded_blocks,
            clipped_mm = metrics.clipped_mm,
            "valuation report generated"
        );
        Ok((bytes, metrics))
    }

    async fn compose_html_block(
        &self,
        compositor: &mut Compositor,
        name: &str,
        html: &HtmlBlock,
    ) -> (BlockOutcome, usize) {
        let (resolved, embedded) = render::resolve_charts(html, self.charts.as_ref()).await;
        let block = ContentBlock::html(name, resolved);

        let extent = match self.renderer.measure(&block).await {
            Ok(extent) => extent,
            Err(err) => {
                tracing::debug!(block = name, error = %err, "measurement failed; rendering whole");
                None
            }
        };
        if let Some(extent) = extent.filter(|extent| should_chunk(*extent, &self.geometry)) {
            if let Some((chunks, degraded)) = self.compose_chunks(compositor, &block, extent).await {
                return (BlockOutcome::Chunked { chunks, degraded }, embedded);
            }
        }

        let rendered = match self.renderer.render(&block).await {
            Ok(bitmap) => bitmap.validate().map(|()| bitmap),
            Err(err) => Err(err),
        };
        match rendered {
            Ok(bitmap) => {
                compositor.add_block(name, bitmap);
                (BlockOutcome::Rendered, embedded)
            }
            Err(err) => {
                self.degrade(compositor, name, None, &err);
                (
                    BlockOutcome::Degraded {
                        reason: err.to_string(),
                    },
                    embedded,
                )
            }
        }
    }

    /// Renders a tall block window by window and returns the window count
    /// and how many of them degraded. Returns `None` when the renderer cannot
    /// render windows, before anything was placed.
    async fn compose_chunks(
        &self,
        compositor: &mut Compositor,
        block: &ContentBlock,
        extent: LayoutExtent,
    ) -> Option<(usize, usize)> {
        let windows = plan_windows(extent, &self.geometry);
        let mut degraded = 0usize;
        for window in &windows {
            let rendered = match self.renderer.render_window(block, *window).await {
                Ok(bitmap) => bitmap.validate().map(|()| bitmap),
                Err(err) => Err(err),
            };
            match rendered {
                Ok(bitmap) => {
                    compositor.add_chunk(&block.name, window.index, bitmap);
                }
                Err(RenderError::Unsupported(_)) if window.index == 0 => {
                    tracing::debug!(block = %block.name, "renderer cannot render windows");
                    return None;
                }
                Err(err) => {
                    degraded += 1;
                    self.degrade(compositor, &block.name, Some(window.index), &err);
                }
            }
        }

        tracing::debug!(
            block = %block.name,
            chunks = windows.len(),
            degraded,
            height_px = extent.height_px,
            "block rendered in chunks"
        );
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "block.chunked",
                "block": block.name,
                "chunks": windows.len(),
                "degraded": degraded,
                "extent_px": [extent.width_px, extent.height_px],
                "window_px": window_height_px(extent, &self.geometry),
            }));
            logger.increment("block.chunked", 1);
        }
        Some((windows.len(), degraded))
    }

    fn degrade(
        &self,
        compositor: &mut Compositor,
        name: &str,
        chunk: Option<usize>,
        err: &RenderError,
    ) {
        tracing::warn!(block = name, chunk = ?chunk, error = %err, "block render failed; placeholder used");
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "block.degraded",
                "block": name,
                "chunk": chunk,
                "reason": err.to_string(),
            }));
            logger.increment("block.degraded", 1);
        }
        let caption = match chunk {
            Some(index) => format!("{name} (part {}): not available", index + 1),
            None => format!("{name}: not available"),
        };
        compositor.add_placeholder(name, &caption);
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }
}

/// Generates a report with the default page geometry and the built-in chart
/// and asset collaborators.
pub async fn generate_report(
    renderer: Arc<dyn BlockRenderer>,
    input: &ReportInput,
    options: &ReportOptions,
) -> Result<Vec<u8>, ReportError> {
    ReportGenerator::builder()
        .block_renderer(renderer)
        .build()?
        .generate_report(input, options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    // 180 px wide renders map one pixel to one millimetre of content width.
    const WIDTH_PX: u32 = 180;

    #[derive(Default)]
    struct StubRenderer {
        heights: HashMap<String, u32>,
        failing: HashSet<String>,
        extents: HashMap<String, LayoutExtent>,
        windows: bool,
        failing_window: Option<usize>,
        seen_html: Mutex<HashMap<String, String>>,
        rendered_windows: Mutex<Vec<RenderWindow>>,
    }

    impl StubRenderer {
        fn height(mut self, name: &str, px: u32) -> Self {
            self.heights.insert(name.to_string(), px);
            self
        }

        fn failing(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        fn tall(mut self, name: &str, height_px: u32, windows: bool) -> Self {
            self.extents.insert(
                name.to_string(),
                LayoutExtent {
                    width_px: WIDTH_PX,
                    height_px,
                },
            );
            self.heights.insert(name.to_string(), height_px);
            self.windows = windows;
            self
        }
    }

    fn blank(height_px: u32) -> Bitmap {
        Bitmap::from_image(&image::DynamicImage::new_rgb8(WIDTH_PX, height_px)).unwrap()
    }

    #[async_trait]
    impl BlockRenderer for StubRenderer {
        async fn measure(
            &self,
            block: &ContentBlock,
        ) -> Result<Option<LayoutExtent>, RenderError> {
            Ok(self.extents.get(&block.name).copied())
        }

        async fn render(&self, block: &ContentBlock) -> Result<Bitmap, RenderError> {
            if let Some(html) = block.as_html() {
                self.seen_html
                    .lock()
                    .unwrap()
                    .insert(block.name.clone(), html.html.clone());
            }
            if self.failing.contains(&block.name) {
                return Err(RenderError::failed("layout engine crashed"));
            }
            Ok(blank(self.heights.get(&block.name).copied().unwrap_or(100)))
        }

        async fn render_window(
            &self,
            _block: &ContentBlock,
            window: RenderWindow,
        ) -> Result<Bitmap, RenderError> {
            if !self.windows {
                return Err(RenderError::Unsupported("render_window"));
            }
            if self.failing_window == Some(window.index) {
                return Err(RenderError::failed("window timed out"));
            }
            self.rendered_windows.lock().unwrap().push(window);
            Ok(blank(window.height_px))
        }
    }

    fn png_data_uri() -> String {
        Bitmap::from_image(&image::DynamicImage::new_rgb8(40, 30))
            .unwrap()
            .to_data_uri()
    }

    fn full_input() -> ReportInput {
        let images = (0..3)
            .map(|i| PropertyImage {
                url: png_data_uri(),
                caption: Some(format!("View {i}")),
                is_primary: i == 0,
            })
            .collect();
        ReportInput {
            property: Property {
                id: "p-42".to_string(),
                title: Some("Villa in Al Olaya".to_string()),
                city: Some("Riyadh".to_string()),
                area_sqm: Some(420.0),
                images,
                ..Property::default()
            },
            appraisal: Appraisal {
                id: "a-42".to_string(),
                property_id: Some("p-42".to_string()),
                reference_number: Some("VR-2024-042".to_string()),
                market_value: Some(2_450_000.0),
                calculation_results: CalculationResults {
                    cost_approach: Some(2_300_000.0),
                    sales_comparison: Some(2_500_000.0),
                    income_approach: Some(2_400_000.0),
                    ..CalculationResults::default()
                },
                legal_status: Some(LegalStatus::default()),
                mortgage_eligibility: Some(MortgageEligibility::default()),
                privacy_notice: Some("Owner contact details were removed.".to_string()),
                ..Appraisal::default()
            },
            market: MarketAnalysis {
                trend: vec![
                    TrendPoint {
                        period: "2023".to_string(),
                        price_per_sqm: 5200.0,
                    },
                    TrendPoint {
                        period: "2024".to_string(),
                        price_per_sqm: 5600.0,
                    },
                ],
                ..MarketAnalysis::default()
            },
        }
    }

    fn generator(renderer: StubRenderer) -> (ReportGenerator, Arc<StubRenderer>) {
        let renderer = Arc::new(renderer);
        let generator = ReportGenerator::builder()
            .block_renderer(renderer.clone())
            .build()
            .unwrap();
        (generator, renderer)
    }

    #[tokio::test]
    async fn standard_report_end_to_end() {
        let (generator, renderer) = generator(StubRenderer::default());
        let (bytes, metrics) = generator
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(
            metrics.block_names(),
            vec![
                HEADER,
                EXECUTIVE_SUMMARY,
                PROPERTY_DETAILS,
                QUALITY_RATING,
                MARKET_ANALYSIS,
                PROPERTY_IMAGES,
                PRIVACY_NOTICE,
                CERTIFICATION,
            ]
        );
        assert_eq!(metrics.degraded_blocks, 0);
        let gallery = metrics.gallery.unwrap();
        assert_eq!((gallery.total, gallery.loaded, gallery.per_row), (3, 3, 2));

        let summary = metrics.block(EXECUTIVE_SUMMARY).unwrap();
        assert_eq!(summary.charts_embedded, 1);
        let seen = renderer.seen_html.lock().unwrap();
        let html = &seen[EXECUTIVE_SUMMARY];
        assert!(html.contains("data:image/png;base64,"));
        assert!(!html.contains("<!--chart:"));

        let mut previous = 0;
        for block in &metrics.blocks {
            assert!(block.first_page >= previous, "{} out of order", block.name);
            assert!(block.last_page >= block.first_page);
            previous = block.first_page;
        }

        let report = inspect_pdf_bytes(&bytes).unwrap();
        assert_eq!(report.page_count, metrics.page_count);
        assert_eq!(
            report.title.as_deref(),
            Some("Property Valuation Report VR-2024-042")
        );
        assert_eq!(metrics.total_bytes, bytes.len());
    }

    #[tokio::test]
    async fn standard_report_with_comparables_and_no_privacy_notice() {
        let (generator, _) = generator(StubRenderer::default());
        let mut input = full_input();
        input.appraisal.privacy_notice = None;
        input.market.comparables = vec![
            Comparable {
                address: Some("King Fahd Rd 12".to_string()),
                price: Some(2_380_000.0),
                area_sqm: Some(400.0),
                distance_km: Some(0.8),
            },
            Comparable {
                address: Some("Tahlia St 7".to_string()),
                price: Some(2_610_000.0),
                area_sqm: Some(450.0),
                distance_km: Some(1.4),
            },
        ];
        let (bytes, metrics) = generator
            .generate_report_with_metrics(&input, &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(
            metrics.block_names(),
            vec![
                HEADER,
                EXECUTIVE_SUMMARY,
                PROPERTY_DETAILS,
                QUALITY_RATING,
                MARKET_ANALYSIS,
                PROPERTY_IMAGES,
                CERTIFICATION,
            ]
        );
        let gallery = metrics.gallery.unwrap();
        assert_eq!((gallery.per_row, gallery.loaded, gallery.failed), (2, 3, 0));
        assert_eq!(inspect_pdf_bytes(&bytes).unwrap().page_count, metrics.page_count);
    }

    #[tokio::test]
    async fn arabic_gallery_text_survives_into_the_pdf() {
        let (generator, renderer) = generator(StubRenderer::default());
        let mut input = full_input();
        input.property.images[1].caption = Some("المطبخ".to_string());
        let options = ReportOptions::builder().language(Language::Ar).build();
        let (bytes, metrics) = generator
            .generate_report_with_metrics(&input, &options)
            .await
            .unwrap();

        assert_eq!(metrics.gallery.unwrap().loaded, 3);
        assert!(!bytes.contains(&b'?'));
        let seen = renderer.seen_html.lock().unwrap();
        assert!(seen[&format!("{PROPERTY_IMAGES} title")].contains("صور العقار"));
        assert!(seen[&format!("{PROPERTY_IMAGES} caption")].contains("المطبخ"));
    }

    #[tokio::test]
    async fn comprehensive_report_end_to_end() {
        let (generator, _) = generator(StubRenderer::default());
        let options = ReportOptions::builder()
            .report_type(ReportType::Comprehensive)
            .format(OutputFormat::Comprehensive)
            .language(Language::Both)
            .build();
        let (bytes, metrics) = generator
            .generate_report_with_metrics(&full_input(), &options)
            .await
            .unwrap();

        assert_eq!(metrics.blocks.len(), 13);
        assert!(metrics.block(PRIVACY_NOTICE).is_none());
        assert!(metrics.block(METHODOLOGY).is_some());
        assert_eq!(metrics.gallery.unwrap().per_row, 3);
        assert!(metrics.page_count >= 2);
        assert_eq!(inspect_pdf_bytes(&bytes).unwrap().page_count, metrics.page_count);
    }

    #[tokio::test]
    async fn failing_block_degrades_to_placeholder() {
        let (generator, _) = generator(StubRenderer::default().failing(MARKET_ANALYSIS));
        let (bytes, metrics) = generator
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(metrics.degraded_blocks, 1);
        let market = metrics.block(MARKET_ANALYSIS).unwrap();
        assert!(matches!(market.outcome, BlockOutcome::Degraded { .. }));
        assert!(market.first_page >= 1);
        for block in metrics.blocks.iter().filter(|b| b.name != MARKET_ANALYSIS) {
            assert!(!matches!(block.outcome, BlockOutcome::Degraded { .. }));
        }
        assert!(inspect_pdf_bytes(&bytes).is_ok());
    }

    #[tokio::test]
    async fn tall_blocks_render_in_windows() {
        let (generator, renderer) =
            generator(StubRenderer::default().tall(PROPERTY_DETAILS, 1200, true));
        let (_, metrics) = generator
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        let details = metrics.block(PROPERTY_DETAILS).unwrap();
        assert_eq!(
            details.outcome,
            BlockOutcome::Chunked {
                chunks: 5,
                degraded: 0
            }
        );
        let windows = renderer.rendered_windows.lock().unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows.iter().map(|w| w.height_px).sum::<u32>(), 1200);
        assert!(windows.iter().all(|w| w.height_px <= 262));
        assert_eq!(metrics.clipped_mm, 0.0);
        assert!(details.last_page > details.first_page);
    }

    #[tokio::test]
    async fn failed_window_counts_the_block_as_degraded() {
        let renderer = StubRenderer {
            failing_window: Some(1),
            ..StubRenderer::default().tall(PROPERTY_DETAILS, 1200, true)
        };
        let (generator, renderer) = generator(renderer);
        let (_, metrics) = generator
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(
            metrics.block(PROPERTY_DETAILS).unwrap().outcome,
            BlockOutcome::Chunked {
                chunks: 5,
                degraded: 1
            }
        );
        assert_eq!(metrics.degraded_blocks, 1);
        assert_eq!(renderer.rendered_windows.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn tall_block_without_window_support_renders_whole() {
        let (generator, renderer) =
            generator(StubRenderer::default().tall(PROPERTY_DETAILS, 1200, false));
        let (_, metrics) = generator
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(
            metrics.block(PROPERTY_DETAILS).unwrap().outcome,
            BlockOutcome::Rendered
        );
        assert!(renderer.rendered_windows.lock().unwrap().is_empty());
        assert!(metrics.clipped_mm > 0.0);
    }

    #[tokio::test]
    async fn chunked_and_whole_renders_cover_the_same_height() {
        // 300 mm splits into a 52 mm head and a 248 mm tail when placed whole.
        let (whole, _) = generator(StubRenderer::default().height(PROPERTY_DETAILS, 300));
        let (_, whole_metrics) = whole
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        let geometry = PageGeometry {
            chunk_threshold_pages: 1,
            ..PageGeometry::default()
        };
        let renderer = Arc::new(StubRenderer::default().tall(PROPERTY_DETAILS, 300, true));
        let chunked = ReportGenerator::builder()
            .page_geometry(geometry)
            .block_renderer(renderer.clone())
            .build()
            .unwrap();
        let (_, chunked_metrics) = chunked
            .generate_report_with_metrics(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        assert_eq!(whole_metrics.clipped_mm, 0.0);
        assert_eq!(chunked_metrics.clipped_mm, 0.0);
        let covered: u32 = renderer
            .rendered_windows
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.height_px)
            .sum();
        assert_eq!(covered, 300);
        assert!(matches!(
            chunked_metrics.block(PROPERTY_DETAILS).unwrap().outcome,
            BlockOutcome::Chunked {
                chunks: 2,
                degraded: 0
            }
        ));
        assert_eq!(
            whole_metrics.block_names(),
            chunked_metrics.block_names()
        );
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_rendering() {
        let (generator, renderer) = generator(StubRenderer::default());
        let mut input = full_input();
        input.appraisal.property_id = Some("someone-else".to_string());
        let err = generator
            .generate_report(&input, &ReportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput(_)));

        input.appraisal.property_id = None;
        input.property.id.clear();
        assert!(generator
            .generate_report(&input, &ReportOptions::default())
            .await
            .is_err());
        assert!(renderer.seen_html.lock().unwrap().is_empty());
    }

    #[test]
    fn builder_validates_configuration() {
        let err = ReportGenerator::builder().build().err().unwrap();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));

        let geometry = PageGeometry {
            margins: Margins::all(200.0),
            ..PageGeometry::default()
        };
        let err = ReportGenerator::builder()
            .page_geometry(geometry)
            .block_renderer(Arc::new(StubRenderer::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));

        let err = ReportGenerator::builder()
            .block_renderer(Arc::new(StubRenderer::default()))
            .document_title("  ")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));

        ReportGenerator::builder()
            .block_renderer(Arc::new(StubRenderer::default()))
            .build()
            .unwrap();
        assert!(charts_registered());
    }

    #[tokio::test]
    async fn debug_log_records_layout_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.jsonl");
        let generator = ReportGenerator::builder()
            .block_renderer(Arc::new(StubRenderer::default().failing(QUALITY_RATING)))
            .debug_log(&path)
            .build()
            .unwrap();
        generator
            .generate_report(&full_input(), &ReportOptions::default())
            .await
            .unwrap();

        let log = std::fs::read_to_string(&path).unwrap();
        let events: Vec<serde_json::Value> = log
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let has = |kind: &str| events.iter().any(|e| e["type"] == kind);
        assert!(has("block.degraded"));
        assert!(has("gallery.summary"));
        assert!(has("debug.summary"));
        let summary = events.iter().find(|e| e["type"] == "debug.summary").unwrap();
        assert_eq!(summary["context"], "generate_report");
    }

    #[tokio::test]
    async fn free_function_uses_default_collaborators() {
        let input = full_input();
        let bytes = generate_report(
            Arc::new(StubRenderer::default()),
            &input,
            &ReportOptions::default(),
        )
        .await
        .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
    }
}
