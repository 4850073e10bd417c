//! Decides which sections a report contains and in what order.

use crate::block::{ContentBlock, GallerySpec};
use crate::options::{OutputFormat, ReportOptions, ReportType};
use crate::records::ReportInput;
use crate::sections::{self, SectionContext};

pub const HEADER: &str = "Header";
pub const EXECUTIVE_SUMMARY: &str = "Executive Summary";
pub const PROPERTY_DETAILS: &str = "Property Details";
pub const QUALITY_RATING: &str = "Quality Rating";
pub const MARKET_ANALYSIS: &str = "Market Analysis";
pub const LEGAL_ANALYSIS: &str = "Legal Analysis";
pub const INVESTMENT_ANALYSIS: &str = "Investment Analysis";
pub const MORTGAGE_ANALYSIS: &str = "Mortgage Analysis";
pub const CALCULATION_METHODS: &str = "Calculation Methods";
pub const ENVIRONMENTAL_FACTORS: &str = "Environmental Factors";
pub const PROPERTY_IMAGES: &str = "Property Images";
pub const PRIVACY_NOTICE: &str = "Privacy Notice";
pub const METHODOLOGY: &str = "Methodology";
pub const CERTIFICATION: &str = "Certification";

/// Every section in document order. A plan is always a subsequence.
pub const SECTION_ORDER: [&str; 14] = [
    HEADER,
    EXECUTIVE_SUMMARY,
    PROPERTY_DETAILS,
    QUALITY_RATING,
    MARKET_ANALYSIS,
    LEGAL_ANALYSIS,
    INVESTMENT_ANALYSIS,
    MORTGAGE_ANALYSIS,
    CALCULATION_METHODS,
    ENVIRONMENTAL_FACTORS,
    PROPERTY_IMAGES,
    PRIVACY_NOTICE,
    METHODOLOGY,
    CERTIFICATION,
];

/// Images per gallery row for a report tier.
pub fn gallery_per_row(report_type: ReportType) -> usize {
    match report_type {
        ReportType::Standard => 2,
        ReportType::Detailed | ReportType::Comprehensive => 3,
    }
}

/// Builds the ordered block list for one report. Pure and infallible:
/// missing optional data only changes which sections appear.
pub fn plan_sections(input: &ReportInput, options: &ReportOptions) -> Vec<ContentBlock> {
    let ctx = SectionContext::new(input, options);
    let appraisal = &input.appraisal;
    let analysis = options.report_type.includes_analysis_sections();
    let comprehensive = options.report_type == ReportType::Comprehensive;

    let mut blocks = vec![
        ContentBlock::html(HEADER, sections::header(&ctx)),
        ContentBlock::html(EXECUTIVE_SUMMARY, sections::executive_summary(&ctx)),
        ContentBlock::html(PROPERTY_DETAILS, sections::property_details(&ctx)),
        ContentBlock::html(QUALITY_RATING, sections::quality_rating(&ctx)),
    ];

    if options.include_market_comparables {
        blocks.push(ContentBlock::html(
            MARKET_ANALYSIS,
            sections::market_analysis(&ctx),
        ));
    }
    if analysis && options.include_legal_analysis {
        if let Some(legal) = appraisal.legal_status.as_ref() {
            blocks.push(ContentBlock::html(
                LEGAL_ANALYSIS,
                sections::legal_analysis(&ctx, legal),
            ));
        }
    }
    if analysis && options.include_investment_projections {
        blocks.push(ContentBlock::html(
            INVESTMENT_ANALYSIS,
            sections::investment_analysis(&ctx),
        ));
    }
    if analysis && options.include_mortgage_analysis {
        if let Some(mortgage) = appraisal.mortgage_eligibility.as_ref() {
            blocks.push(ContentBlock::html(
                MORTGAGE_ANALYSIS,
                sections::mortgage_analysis(&ctx, mortgage),
            ));
        }
    }
    if comprehensive {
        blocks.push(ContentBlock::html(
            CALCULATION_METHODS,
            sections::calculation_methods(&ctx),
        ));
        blocks.push(ContentBlock::html(
            ENVIRONMENTAL_FACTORS,
            sections::environmental_factors(&ctx),
        ));
    }
    if options.include_images && !input.property.images.is_empty() {
        blocks.push(ContentBlock::gallery(
            PROPERTY_IMAGES,
            GallerySpec {
                title: sections::PROPERTY_IMAGES.plain(options.language),
                images: input.property.images.clone(),
                per_row: gallery_per_row(options.report_type),
            },
        ));
    }
    if !comprehensive {
        if let Some(notice) = appraisal.privacy_notice_text() {
            blocks.push(ContentBlock::html(
                PRIVACY_NOTICE,
                sections::privacy_notice(&ctx, notice),
            ));
        }
    }
    if options.format == OutputFormat::Comprehensive {
        blocks.push(ContentBlock::html(METHODOLOGY, sections::methodology(&ctx)));
    }
    blocks.push(ContentBlock::html(CERTIFICATION, sections::certification(&ctx)));

    tracing::debug!(
        sections = blocks.len(),
        report_type = options.report_type.as_str(),
        "planned report sections"
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RenderSpec;
    use crate::options::Language;
    use crate::records::{Appraisal, LegalStatus, MortgageEligibility, Property, PropertyImage};

    fn input(with_optional: bool) -> ReportInput {
        let mut input = ReportInput {
            property: Property {
                id: "p-1".to_string(),
                ..Property::default()
            },
            appraisal: Appraisal {
                id: "a-1".to_string(),
                ..Appraisal::default()
            },
            ..ReportInput::default()
        };
        if with_optional {
            input.property.images = vec![PropertyImage {
                url: "front.jpg".to_string(),
                caption: None,
                is_primary: true,
            }];
            input.appraisal.legal_status = Some(LegalStatus::default());
            input.appraisal.mortgage_eligibility = Some(MortgageEligibility::default());
            input.appraisal.privacy_notice = Some("Owner contact details removed.".to_string());
        }
        input
    }

    fn names(blocks: &[ContentBlock]) -> Vec<&str> {
        blocks.iter().map(|b| b.name.as_str()).collect()
    }

    fn is_subsequence_of_order(names: &[&str]) -> bool {
        let mut order = SECTION_ORDER.iter();
        names.iter().all(|name| order.any(|o| o == name))
    }

    #[test]
    fn standard_report_with_all_data() {
        let blocks = plan_sections(&input(true), &ReportOptions::default());
        assert_eq!(
            names(&blocks),
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
        let gallery = blocks.iter().find(|b| b.is_gallery()).unwrap();
        let RenderSpec::Gallery(spec) = &gallery.spec else {
            panic!("gallery block expected");
        };
        assert_eq!(spec.per_row, 2);
    }

    #[test]
    fn comprehensive_report_with_all_data() {
        let options = ReportOptions::builder()
            .report_type(ReportType::Comprehensive)
            .format(OutputFormat::Comprehensive)
            .build();
        let blocks = plan_sections(&input(true), &options);
        assert_eq!(
            names(&blocks),
            vec![
                HEADER,
                EXECUTIVE_SUMMARY,
                PROPERTY_DETAILS,
                QUALITY_RATING,
                MARKET_ANALYSIS,
                LEGAL_ANALYSIS,
                INVESTMENT_ANALYSIS,
                MORTGAGE_ANALYSIS,
                CALCULATION_METHODS,
                ENVIRONMENTAL_FACTORS,
                PROPERTY_IMAGES,
                METHODOLOGY,
                CERTIFICATION,
            ]
        );
    }

    #[test]
    fn methodology_follows_format_not_report_type() {
        let options = ReportOptions::builder()
            .report_type(ReportType::Standard)
            .format(OutputFormat::Comprehensive)
            .build();
        let blocks = plan_sections(&input(false), &options);
        assert!(names(&blocks).contains(&METHODOLOGY));

        let options = ReportOptions::builder()
            .report_type(ReportType::Comprehensive)
            .format(OutputFormat::Summary)
            .build();
        let blocks = plan_sections(&input(false), &options);
        assert!(!names(&blocks).contains(&METHODOLOGY));
    }

    #[test]
    fn missing_data_drops_dependent_sections() {
        let options = ReportOptions::builder()
            .report_type(ReportType::Detailed)
            .build();
        let blocks = plan_sections(&input(false), &options);
        assert_eq!(
            names(&blocks),
            vec![
                HEADER,
                EXECUTIVE_SUMMARY,
                PROPERTY_DETAILS,
                QUALITY_RATING,
                MARKET_ANALYSIS,
                INVESTMENT_ANALYSIS,
                CERTIFICATION,
            ]
        );
    }

    #[test]
    fn inclusion_table_over_every_option_combination() {
        let report_types = [
            ReportType::Standard,
            ReportType::Detailed,
            ReportType::Comprehensive,
        ];
        let formats = [
            OutputFormat::Summary,
            OutputFormat::Standard,
            OutputFormat::Comprehensive,
        ];
        for with_optional in [false, true] {
            let input = input(with_optional);
            for report_type in report_types {
                for format in formats {
                    for mask in 0u8..32 {
                        let options = ReportOptions::builder()
                            .language(Language::En)
                            .report_type(report_type)
                            .format(format)
                            .include_legal_analysis(mask & 1 != 0)
                            .include_mortgage_analysis(mask & 2 != 0)
                            .include_market_comparables(mask & 4 != 0)
                            .include_investment_projections(mask & 8 != 0)
                            .include_images(mask & 16 != 0)
                            .build();
                        let blocks = plan_sections(&input, &options);
                        let names = names(&blocks);
                        assert!(is_subsequence_of_order(&names), "{names:?}");

                        let analysis = report_type != ReportType::Standard;
                        let comprehensive = report_type == ReportType::Comprehensive;
                        let expect = |name: &str, included: bool| {
                            assert_eq!(
                                names.contains(&name),
                                included,
                                "{name} for {report_type:?}/{format:?}/{mask:05b}/{with_optional}"
                            );
                        };
                        expect(HEADER, true);
                        expect(EXECUTIVE_SUMMARY, true);
                        expect(PROPERTY_DETAILS, true);
                        expect(QUALITY_RATING, true);
                        expect(CERTIFICATION, true);
                        expect(MARKET_ANALYSIS, options.include_market_comparables);
                        expect(
                            LEGAL_ANALYSIS,
                            analysis && options.include_legal_analysis && with_optional,
                        );
                        expect(
                            INVESTMENT_ANALYSIS,
                            analysis && options.include_investment_projections,
                        );
                        expect(
                            MORTGAGE_ANALYSIS,
                            analysis && options.include_mortgage_analysis && with_optional,
                        );
                        expect(CALCULATION_METHODS, comprehensive);
                        expect(ENVIRONMENTAL_FACTORS, comprehensive);
                        expect(PROPERTY_IMAGES, options.include_images && with_optional);
                        expect(PRIVACY_NOTICE, !comprehensive && with_optional);
                        expect(METHODOLOGY, format == OutputFormat::Comprehensive);
                    }
                }
            }
        }
    }

    #[test]
    fn gallery_title_follows_language() {
        let title = |language| {
            let options = ReportOptions::builder().language(language).build();
            let blocks = plan_sections(&input(true), &options);
            match &blocks.iter().find(|b| b.is_gallery()).unwrap().spec {
                RenderSpec::Gallery(spec) => spec.title.clone(),
                RenderSpec::Html(_) => panic!("gallery block expected"),
            }
        };
        assert_eq!(title(Language::En), "Property Images");
        assert_eq!(title(Language::Ar), "صور العقار");
        assert_eq!(title(Language::Both), "Property Images / صور العقار");
    }

    #[test]
    fn planning_is_deterministic() {
        let options = ReportOptions::default();
        let first = plan_sections(&input(true), &options);
        let second = plan_sections(&input(true), &options);
        assert_eq!(first, second);
    }
}
