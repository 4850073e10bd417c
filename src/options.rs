use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    En,
    Ar,
    #[default]
    Both,
}

impl Language {
    pub fn includes_english(self) -> bool {
        matches!(self, Language::En | Language::Both)
    }

    pub fn includes_arabic(self) -> bool {
        matches!(self, Language::Ar | Language::Both)
    }

    /// `lang` attribute for the rendered fragment.
    pub fn html_lang(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
            Language::Both => "en",
        }
    }
}

/// Report tier. Drives section inclusion and the gallery density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Standard,
    Detailed,
    Comprehensive,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Standard => "standard",
            ReportType::Detailed => "detailed",
            ReportType::Comprehensive => "comprehensive",
        }
    }

    pub fn includes_analysis_sections(self) -> bool {
        matches!(self, ReportType::Detailed | ReportType::Comprehensive)
    }
}

/// Output format requested by the caller. Kept separate from [`ReportType`];
/// only the methodology section keys on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Summary,
    #[default]
    Standard,
    Comprehensive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    pub language: Language,
    pub report_type: ReportType,
    pub format: OutputFormat,
    pub include_legal_analysis: bool,
    pub include_mortgage_analysis: bool,
    pub include_market_comparables: bool,
    pub include_investment_projections: bool,
    pub include_images: bool,
    pub watermark: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptionsBuilder::new().build()
    }
}

impl ReportOptions {
    pub fn builder() -> ReportOptionsBuilder {
        ReportOptionsBuilder::new()
    }

    /// Watermark text, with blank values treated as absent.
    pub fn watermark_text(&self) -> Option<&str> {
        self.watermark
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptionsBuilder {
    language: Language,
    report_type: ReportType,
    format: OutputFormat,
    include_legal_analysis: bool,
    include_mortgage_analysis: bool,
    include_market_comparables: bool,
    include_investment_projections: bool,
    include_images: bool,
    watermark: Option<String>,
}

impl Default for ReportOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportOptionsBuilder {
    pub fn new() -> Self {
        Self {
            language: Language::Both,
            report_type: ReportType::Standard,
            format: OutputFormat::Standard,
            include_legal_analysis: true,
            include_mortgage_analysis: true,
            include_market_comparables: true,
            include_investment_projections: true,
            include_images: true,
            watermark: None,
        }
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn include_legal_analysis(mut self, enabled: bool) -> Self {
        self.include_legal_analysis = enabled;
        self
    }

    pub fn include_mortgage_analysis(mut self, enabled: bool) -> Self {
        self.include_mortgage_analysis = enabled;
        self
    }

    pub fn include_market_comparables(mut self, enabled: bool) -> Self {
        self.include_market_comparables = enabled;
        self
    }

    pub fn include_investment_projections(mut self, enabled: bool) -> Self {
        self.include_investment_projections = enabled;
        self
    }

    pub fn include_images(mut self, enabled: bool) -> Self {
        self.include_images = enabled;
        self
    }

    /// Sets every `include_*` toggle at once.
    pub fn include_all(self, enabled: bool) -> Self {
        self.include_legal_analysis(enabled)
            .include_mortgage_analysis(enabled)
            .include_market_comparables(enabled)
            .include_investment_projections(enabled)
            .include_images(enabled)
    }

    pub fn watermark(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.watermark = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn build(self) -> ReportOptions {
        ReportOptions {
            language: self.language,
            report_type: self.report_type,
            format: self.format,
            include_legal_analysis: self.include_legal_analysis,
            include_mortgage_analysis: self.include_mortgage_analysis,
            include_market_comparables: self.include_market_comparables,
            include_investment_projections: self.include_investment_projections,
            include_images: self.include_images,
            watermark: self.watermark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_in_one_place() {
        let options = ReportOptions::default();
        assert_eq!(options.language, Language::Both);
        assert_eq!(options.report_type, ReportType::Standard);
        assert_eq!(options.format, OutputFormat::Standard);
        assert!(options.include_images);
        assert!(options.include_market_comparables);
        assert!(options.watermark.is_none());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let options: ReportOptions = serde_json::from_str(
            r#"{"language":"ar","reportType":"ignored","report_type":"comprehensive","include_images":false}"#,
        )
        .unwrap();
        assert_eq!(options.language, Language::Ar);
        assert_eq!(options.report_type, ReportType::Comprehensive);
        assert!(!options.include_images);
        assert!(options.include_legal_analysis);
        assert_eq!(options.format, OutputFormat::Standard);
    }

    #[test]
    fn blank_watermark_is_dropped() {
        let options = ReportOptions::builder().watermark("   ").build();
        assert!(options.watermark.is_none());

        let options = ReportOptions::builder().watermark("DRAFT").build();
        assert_eq!(options.watermark_text(), Some("DRAFT"));

        let options = ReportOptions {
            watermark: Some(" ".to_string()),
            ..ReportOptions::default()
        };
        assert_eq!(options.watermark_text(), None);
    }

    #[test]
    fn include_all_toggles_every_flag() {
        let options = ReportOptions::builder().include_all(false).build();
        assert!(!options.include_legal_analysis);
        assert!(!options.include_mortgage_analysis);
        assert!(!options.include_market_comparables);
        assert!(!options.include_investment_projections);
        assert!(!options.include_images);
    }
}
