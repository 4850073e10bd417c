//! HTML fragments for each report section. Fragments are self-contained:
//! language attributes, escaped data and the watermark overlay are all
//! carried in the markup the block renderer receives.

use crate::block::{ChartSlot, Direction, HtmlBlock, chart_marker};
use crate::charts::{ChartKind, ChartSpec};
use crate::options::{Language, ReportOptions};
use crate::records::{
    Appraisal, EnvironmentalFactors, LegalStatus, MarketAnalysis, MortgageEligibility,
    ReportInput,
};

/// An English/Arabic label pair.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Label {
    pub en: &'static str,
    pub ar: &'static str,
}

const fn label(en: &'static str, ar: &'static str) -> Label {
    Label { en, ar }
}

impl Label {
    /// Unmarked text for the language, for places that draw without HTML.
    pub(crate) fn plain(self, language: Language) -> String {
        match language {
            Language::En => self.en.to_string(),
            Language::Ar => self.ar.to_string(),
            Language::Both => format!("{} / {}", self.en, self.ar),
        }
    }
}

const NOT_SPECIFIED: Label = label("Not specified", "غير محدد");
const YES: Label = label("Yes", "نعم");
const NO: Label = label("No", "لا");

pub(crate) const HEADER_TITLE: Label = label("Property Valuation Report", "تقرير تقييم عقاري");
pub(crate) const EXECUTIVE_SUMMARY: Label = label("Executive Summary", "الملخص التنفيذي");
pub(crate) const PROPERTY_DETAILS: Label = label("Property Details", "تفاصيل العقار");
pub(crate) const QUALITY_RATING: Label = label("Quality Rating", "تقييم الجودة");
pub(crate) const MARKET_ANALYSIS: Label = label("Market Analysis", "تحليل السوق");
pub(crate) const LEGAL_ANALYSIS: Label = label("Legal Analysis", "التحليل القانوني");
pub(crate) const INVESTMENT_ANALYSIS: Label = label("Investment Analysis", "تحليل الاستثمار");
pub(crate) const MORTGAGE_ANALYSIS: Label = label("Mortgage Analysis", "تحليل التمويل العقاري");
pub(crate) const CALCULATION_METHODS: Label = label("Calculation Methods", "طرق الحساب");
pub(crate) const ENVIRONMENTAL_FACTORS: Label = label("Environmental Factors", "العوامل البيئية");
pub(crate) const PROPERTY_IMAGES: Label = label("Property Images", "صور العقار");
pub(crate) const PRIVACY_NOTICE: Label = label("Privacy Notice", "إشعار الخصوصية");
pub(crate) const METHODOLOGY: Label = label("Methodology", "المنهجية");
pub(crate) const CERTIFICATION: Label = label("Certification", "الشهادة");

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Per-report rendering settings shared by every section builder.
pub(crate) struct SectionContext<'a> {
    pub input: &'a ReportInput,
    pub language: Language,
    pub watermark: Option<&'a str>,
}

impl<'a> SectionContext<'a> {
    pub fn new(input: &'a ReportInput, options: &'a ReportOptions) -> Self {
        Self {
            input,
            language: options.language,
            watermark: options.watermark_text(),
        }
    }

    fn direction(&self) -> Direction {
        match self.language {
            Language::Ar => Direction::Rtl,
            _ => Direction::Ltr,
        }
    }

    /// Label markup; `Both` renders English then Arabic.
    fn text(&self, label: Label) -> String {
        let en = format!("<span lang=\"en\">{}</span>", escape_html(label.en));
        let ar = format!(
            "<span lang=\"ar\" dir=\"rtl\">{}</span>",
            escape_html(label.ar)
        );
        match self.language {
            Language::En => en,
            Language::Ar => ar,
            Language::Both => format!("{en} <span class=\"sep\">/</span> {ar}"),
        }
    }

    fn not_specified(&self) -> String {
        format!("<span class=\"na\">{}</span>", self.text(NOT_SPECIFIED))
    }

    fn value_str(&self, value: Option<&str>) -> String {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => escape_html(v),
            None => self.not_specified(),
        }
    }

    fn value_num(&self, value: Option<f64>, decimals: usize, suffix: &str) -> String {
        match value.filter(|v| v.is_finite()) {
            Some(v) => format!("{}{}", group_thousands(v, decimals), escape_html(suffix)),
            None => self.not_specified(),
        }
    }

    fn value_money(&self, value: Option<f64>) -> String {
        let currency = format!(" {}", self.input.appraisal.currency_code());
        self.value_num(value, 0, &currency)
    }

    fn value_bool(&self, value: bool) -> String {
        self.text(if value { YES } else { NO })
    }

    fn row(&self, label: Label, value: String) -> String {
        format!("<tr><th>{}</th><td>{value}</td></tr>", self.text(label))
    }

    fn table(&self, rows: Vec<String>) -> String {
        format!("<table class=\"kv\">{}</table>", rows.concat())
    }

    fn paragraph(&self, text: Option<&str>) -> String {
        match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => format!("<p>{}</p>", escape_html(t)),
            None => String::new(),
        }
    }

    fn wrap(&self, class: &str, title: Label, body: String, charts: Vec<ChartSlot>) -> HtmlBlock {
        let direction = self.direction();
        let watermark = self
            .watermark
            .map(|text| {
                format!(
                    "<div class=\"watermark\" aria-hidden=\"true\">{}</div>",
                    escape_html(text)
                )
            })
            .unwrap_or_default();
        let html = format!(
            "<section class=\"report-section {class}\" lang=\"{}\" dir=\"{}\">{watermark}<h2>{}</h2>{body}</section>",
            self.language.html_lang(),
            direction.as_str(),
            self.text(title),
        );
        HtmlBlock {
            html,
            charts,
            direction,
            watermark: self.watermark.map(str::to_string),
        }
    }
}

/// Formats with comma thousands separators and a fixed number of decimals.
pub(crate) fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn chart_slot(id: &str, spec: ChartSpec) -> (String, ChartSlot) {
    (
        format!("<figure class=\"chart\">{}</figure>", chart_marker(id)),
        ChartSlot::new(id, spec),
    )
}

pub(crate) fn header(ctx: &SectionContext<'_>) -> HtmlBlock {
    let property = &ctx.input.property;
    let appraisal = &ctx.input.appraisal;
    let body = format!(
        "<div class=\"report-header\"><h1>{}</h1>{}</div>",
        ctx.value_str(property.title.as_deref()),
        ctx.table(vec![
            ctx.row(
                label("Reference", "المرجع"),
                escape_html(appraisal.display_reference())
            ),
            ctx.row(
                label("Appraisal date", "تاريخ التقييم"),
                ctx.value_str(appraisal.appraisal_date.as_deref())
            ),
            ctx.row(
                label("Appraiser", "المقيم"),
                ctx.value_str(appraisal.appraiser_name.as_deref())
            ),
        ])
    );
    ctx.wrap("header", HEADER_TITLE, body, Vec::new())
}

pub(crate) fn executive_summary(ctx: &SectionContext<'_>) -> HtmlBlock {
    let appraisal = &ctx.input.appraisal;
    let results = &appraisal.calculation_results;
    let value = appraisal.market_value.or(results.final_value);
    let mut body = ctx.table(vec![
        ctx.row(label("Market value", "القيمة السوقية"), ctx.value_money(value)),
        ctx.row(
            label("Confidence", "مستوى الثقة"),
            ctx.value_num(results.confidence, 0, "%"),
        ),
        ctx.row(
            label("Condition", "الحالة"),
            ctx.value_str(appraisal.form_data.condition.as_deref()),
        ),
    ]);

    let approaches = [
        ("Cost", results.cost_approach),
        ("Sales comparison", results.sales_comparison),
        ("Income", results.income_approach),
    ];
    let present: Vec<(&str, f64)> = approaches
        .iter()
        .filter_map(|(name, value)| value.map(|v| (*name, v)))
        .collect();
    let spec = ChartSpec::new(ChartKind::Bar, "Valuation approaches")
        .with_labels(present.iter().map(|(name, _)| *name))
        .with_series("Value", present.iter().map(|(_, v)| *v).collect());
    let (figure, slot) = chart_slot("valuation-approaches", spec);
    body.push_str(&figure);
    ctx.wrap("executive-summary", EXECUTIVE_SUMMARY, body, vec![slot])
}

pub(crate) fn property_details(ctx: &SectionContext<'_>) -> HtmlBlock {
    let property = &ctx.input.property;
    let count = |value: Option<u32>| ctx.value_num(value.map(f64::from), 0, "");
    let body = ctx.table(vec![
        ctx.row(label("Type", "النوع"), ctx.value_str(property.property_type.as_deref())),
        ctx.row(label("City", "المدينة"), ctx.value_str(property.city.as_deref())),
        ctx.row(label("District", "الحي"), ctx.value_str(property.district.as_deref())),
        ctx.row(label("Address", "العنوان"), ctx.value_str(property.address.as_deref())),
        ctx.row(label("Area", "المساحة"), ctx.value_num(property.area_sqm, 0, " m²")),
        ctx.row(label("Bedrooms", "غرف النوم"), count(property.bedrooms)),
        ctx.row(label("Bathrooms", "دورات المياه"), count(property.bathrooms)),
        ctx.row(label("Year built", "سنة البناء"), ctx.value_str(
            property.year_built.map(|y| y.to_string()).as_deref(),
        )),
    ]);
    ctx.wrap("property-details", PROPERTY_DETAILS, body, Vec::new())
}

const QUALITY_LABELS: [Label; 5] = [
    label("Location", "الموقع"),
    label("Construction", "البناء"),
    label("Finishing", "التشطيب"),
    label("Maintenance", "الصيانة"),
    label("Amenities", "المرافق"),
];

pub(crate) fn quality_rating(ctx: &SectionContext<'_>) -> HtmlBlock {
    let quality = &ctx.input.appraisal.form_data.quality;
    let entries = quality.entries();
    let mut rows: Vec<String> = entries
        .iter()
        .zip(QUALITY_LABELS)
        .map(|((_, score), label)| ctx.row(label, ctx.value_num(*score, 1, " / 10")))
        .collect();
    rows.push(ctx.row(
        label("Average", "المتوسط"),
        ctx.value_num(quality.average(), 1, " / 10"),
    ));
    let mut body = ctx.table(rows);

    let spec = ChartSpec::new(ChartKind::Radar, "Quality rating")
        .with_labels(QUALITY_LABELS.iter().map(|l| l.en))
        .with_sparse_series("Score", entries.iter().map(|(_, score)| *score).collect())
        .with_size(480, 480)
        .with_max_value(10.0);
    let (figure, slot) = chart_slot("quality-radar", spec);
    body.push_str(&figure);
    ctx.wrap("quality-rating", QUALITY_RATING, body, vec![slot])
}

pub(crate) fn market_analysis(ctx: &SectionContext<'_>) -> HtmlBlock {
    let market: &MarketAnalysis = &ctx.input.market;
    let mut body = ctx.table(vec![
        ctx.row(
            label("Average price per m²", "متوسط سعر المتر"),
            ctx.value_money(market.average_price_per_sqm),
        ),
        ctx.row(
            label("Demand", "الطلب"),
            ctx.value_str(market.demand_level.as_deref()),
        ),
        ctx.row(
            label("Average days on market", "متوسط أيام العرض"),
            ctx.value_num(market.average_days_on_market.map(f64::from), 0, ""),
        ),
    ]);

    let trend = ChartSpec::new(ChartKind::Line, "Price trend")
        .with_labels(market.trend.iter().map(|p| p.period.clone()))
        .with_series(
            "Price per m²",
            market.trend.iter().map(|p| p.price_per_sqm).collect(),
        );
    let (figure, trend_slot) = chart_slot("market-trend", trend);
    body.push_str(&figure);

    if market.comparables.is_empty() {
        body.push_str(&format!(
            "<p class=\"comparables-empty\">{}</p>",
            ctx.text(label("No comparable properties", "لا توجد عقارات مماثلة"))
        ));
    } else {
        let header = format!(
            "<tr><th>{}</th><th>{}</th><th>{}</th><th>{}</th></tr>",
            ctx.text(label("Address", "العنوان")),
            ctx.text(label("Price", "السعر")),
            ctx.text(label("Area", "المساحة")),
            ctx.text(label("Distance", "المسافة")),
        );
        let rows: String = market
            .comparables
            .iter()
            .map(|c| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    ctx.value_str(c.address.as_deref()),
                    ctx.value_money(c.price),
                    ctx.value_num(c.area_sqm, 0, " m²"),
                    ctx.value_num(c.distance_km, 1, " km"),
                )
            })
            .collect();
        body.push_str(&format!("<table class=\"comparables\">{header}{rows}</table>"));
    }

    let comparables = ChartSpec::new(ChartKind::Bar, "Comparable prices")
        .with_labels((1..=market.comparables.len()).map(|i| format!("#{i}")))
        .with_sparse_series("Price", market.comparables.iter().map(|c| c.price).collect());
    let (figure, comparables_slot) = chart_slot("market-comparables", comparables);
    body.push_str(&figure);
    ctx.wrap(
        "market-analysis",
        MARKET_ANALYSIS,
        body,
        vec![trend_slot, comparables_slot],
    )
}

pub(crate) fn legal_analysis(ctx: &SectionContext<'_>, legal: &LegalStatus) -> HtmlBlock {
    let encumbrances = if legal.encumbrances.is_empty() {
        ctx.text(label("None recorded", "لا يوجد"))
    } else {
        format!(
            "<ul>{}</ul>",
            legal
                .encumbrances
                .iter()
                .map(|e| format!("<li>{}</li>", escape_html(e)))
                .collect::<String>()
        )
    };
    let mut body = ctx.table(vec![
        ctx.row(
            label("Ownership", "نوع الملكية"),
            ctx.value_str(legal.ownership_type.as_deref()),
        ),
        ctx.row(
            label("Title deed", "رقم الصك"),
            ctx.value_str(legal.title_deed_number.as_deref()),
        ),
        ctx.row(label("Zoning", "التصنيف"), ctx.value_str(legal.zoning.as_deref())),
        ctx.row(label("Encumbrances", "القيود"), encumbrances),
    ]);
    body.push_str(&ctx.paragraph(legal.compliance_notes.as_deref()));
    ctx.wrap("legal-analysis", LEGAL_ANALYSIS, body, Vec::new())
}

pub(crate) fn investment_analysis(ctx: &SectionContext<'_>) -> HtmlBlock {
    let investment = ctx.input.appraisal.calculation_results.investment.clone();
    let investment = investment.unwrap_or_default();
    let mut body = ctx.table(vec![
        ctx.row(
            label("Rental yield", "العائد الإيجاري"),
            ctx.value_num(investment.rental_yield, 1, "%"),
        ),
        ctx.row(
            label("Annual income", "الدخل السنوي"),
            ctx.value_money(investment.annual_income),
        ),
        ctx.row(
            label("Appreciation rate", "معدل الارتفاع"),
            ctx.value_num(investment.appreciation_rate, 1, "%"),
        ),
        ctx.row(
            label("Five-year value", "القيمة بعد خمس سنوات"),
            ctx.value_money(investment.five_year_value),
        ),
    ]);
    let spec = ChartSpec::new(ChartKind::Doughnut, "Return breakdown")
        .with_labels(investment.breakdown.iter().map(|b| b.label.clone()))
        .with_series(
            "Share",
            investment.breakdown.iter().map(|b| b.value).collect(),
        )
        .with_size(480, 360);
    let (figure, slot) = chart_slot("investment-breakdown", spec);
    body.push_str(&figure);
    ctx.wrap("investment-analysis", INVESTMENT_ANALYSIS, body, vec![slot])
}

pub(crate) fn mortgage_analysis(
    ctx: &SectionContext<'_>,
    mortgage: &MortgageEligibility,
) -> HtmlBlock {
    let mut body = ctx.table(vec![
        ctx.row(label("Eligible", "مؤهل"), ctx.value_bool(mortgage.eligible)),
        ctx.row(
            label("Maximum LTV", "أقصى نسبة تمويل"),
            ctx.value_num(mortgage.max_ltv, 0, "%"),
        ),
        ctx.row(
            label("Recommended loan", "التمويل الموصى به"),
            ctx.value_money(mortgage.recommended_loan),
        ),
    ]);
    if !mortgage.notes.is_empty() {
        body.push_str(&format!(
            "<ul class=\"notes\">{}</ul>",
            mortgage
                .notes
                .iter()
                .map(|n| format!("<li>{}</li>", escape_html(n)))
                .collect::<String>()
        ));
    }
    ctx.wrap("mortgage-analysis", MORTGAGE_ANALYSIS, body, Vec::new())
}

pub(crate) fn calculation_methods(ctx: &SectionContext<'_>) -> HtmlBlock {
    let results = &ctx.input.appraisal.calculation_results;
    let body = ctx.table(vec![
        ctx.row(
            label("Cost approach", "أسلوب التكلفة"),
            ctx.value_money(results.cost_approach),
        ),
        ctx.row(
            label("Sales comparison approach", "أسلوب المقارنة"),
            ctx.value_money(results.sales_comparison),
        ),
        ctx.row(
            label("Income approach", "أسلوب الدخل"),
            ctx.value_money(results.income_approach),
        ),
        ctx.row(
            label("Reconciled value", "القيمة النهائية"),
            ctx.value_money(results.final_value),
        ),
    ]);
    ctx.wrap("calculation-methods", CALCULATION_METHODS, body, Vec::new())
}

pub(crate) fn environmental_factors(ctx: &SectionContext<'_>) -> HtmlBlock {
    let factors: EnvironmentalFactors = ctx
        .input
        .appraisal
        .form_data
        .environmental
        .clone()
        .unwrap_or_default();
    let mut body = ctx.table(vec![
        ctx.row(label("Flood risk", "خطر الفيضانات"), ctx.value_str(factors.flood_risk.as_deref())),
        ctx.row(label("Noise level", "مستوى الضوضاء"), ctx.value_str(factors.noise_level.as_deref())),
        ctx.row(label("Air quality", "جودة الهواء"), ctx.value_str(factors.air_quality.as_deref())),
        ctx.row(label("Green spaces", "المساحات الخضراء"), ctx.value_str(factors.green_spaces.as_deref())),
    ]);
    body.push_str(&ctx.paragraph(factors.notes.as_deref()));
    ctx.wrap("environmental-factors", ENVIRONMENTAL_FACTORS, body, Vec::new())
}

pub(crate) fn privacy_notice(ctx: &SectionContext<'_>, notice: &str) -> HtmlBlock {
    let body = format!("<p class=\"privacy\">{}</p>", escape_html(notice));
    ctx.wrap("privacy-notice", PRIVACY_NOTICE, body, Vec::new())
}

pub(crate) fn methodology(ctx: &SectionContext<'_>) -> HtmlBlock {
    let steps = [
        label(
            "Site inspection and verification of the property's physical characteristics.",
            "معاينة الموقع والتحقق من الخصائص المادية للعقار.",
        ),
        label(
            "Analysis of recent comparable transactions in the surrounding market.",
            "تحليل الصفقات المماثلة الحديثة في السوق المحيط.",
        ),
        label(
            "Application of the cost, sales comparison and income approaches where data allows.",
            "تطبيق أساليب التكلفة والمقارنة والدخل حسب توفر البيانات.",
        ),
        label(
            "Reconciliation of the indicated values into a single market value opinion.",
            "التوفيق بين القيم المستخلصة للوصول إلى رأي واحد في القيمة السوقية.",
        ),
    ];
    let body = format!(
        "<ol class=\"methodology\">{}</ol>",
        steps
            .iter()
            .map(|step| format!("<li>{}</li>", ctx.text(*step)))
            .collect::<String>()
    );
    ctx.wrap("methodology", METHODOLOGY, body, Vec::new())
}

pub(crate) fn certification(ctx: &SectionContext<'_>) -> HtmlBlock {
    let appraisal: &Appraisal = &ctx.input.appraisal;
    let statement = ctx.text(label(
        "I certify that this valuation was prepared impartially and to the best of my knowledge.",
        "أشهد بأن هذا التقييم أُعد بحياد وبحسب أفضل ما لدي من معرفة.",
    ));
    let body = format!(
        "<p class=\"statement\">{statement}</p>{}<div class=\"signature\"></div>",
        ctx.table(vec![
            ctx.row(
                label("Appraiser", "المقيم"),
                ctx.value_str(appraisal.appraiser_name.as_deref())
            ),
            ctx.row(
                label("License", "رقم الترخيص"),
                ctx.value_str(appraisal.appraiser_license.as_deref())
            ),
            ctx.row(
                label("Date", "التاريخ"),
                ctx.value_str(appraisal.appraisal_date.as_deref())
            ),
        ])
    );
    ctx.wrap("certification", CERTIFICATION, body, Vec::new())
}
