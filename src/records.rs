//! Plain data records handed in by the caller. Everything beyond the
//! identity fields is optional; sections render a "not specified"
//! placeholder for absent values.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Property {
    pub id: String,
    pub title: Option<String>,
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub area_sqm: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub year_built: Option<u32>,
    pub images: Vec<PropertyImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyImage {
    pub url: String,
    pub caption: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appraisal {
    pub id: String,
    pub property_id: Option<String>,
    pub reference_number: Option<String>,
    pub appraiser_name: Option<String>,
    pub appraiser_license: Option<String>,
    pub appraisal_date: Option<String>,
    pub market_value: Option<f64>,
    pub currency: Option<String>,
    pub form_data: FormData,
    pub calculation_results: CalculationResults,
    pub legal_status: Option<LegalStatus>,
    pub mortgage_eligibility: Option<MortgageEligibility>,
    /// Set by the upstream privacy filter when fields were redacted.
    pub privacy_notice: Option<String>,
}

impl Appraisal {
    pub fn currency_code(&self) -> &str {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("SAR")
    }

    pub fn privacy_notice_text(&self) -> Option<&str> {
        self.privacy_notice
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Reference shown in page footers: the reference number, else the id.
    pub fn display_reference(&self) -> &str {
        self.reference_number
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormData {
    pub condition: Option<String>,
    pub quality: QualityScores,
    pub environmental: Option<EnvironmentalFactors>,
    pub notes: Option<String>,
}

/// Scores on a 0–10 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityScores {
    pub location: Option<f64>,
    pub construction: Option<f64>,
    pub finishing: Option<f64>,
    pub maintenance: Option<f64>,
    pub amenities: Option<f64>,
}

impl QualityScores {
    /// `(key, score)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("location", self.location),
            ("construction", self.construction),
            ("finishing", self.finishing),
            ("maintenance", self.maintenance),
            ("amenities", self.amenities),
        ]
    }

    pub fn average(&self) -> Option<f64> {
        let values: Vec<f64> = self.entries().iter().filter_map(|(_, v)| *v).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentalFactors {
    pub flood_risk: Option<String>,
    pub noise_level: Option<String>,
    pub air_quality: Option<String>,
    pub green_spaces: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationResults {
    pub cost_approach: Option<f64>,
    pub sales_comparison: Option<f64>,
    pub income_approach: Option<f64>,
    pub final_value: Option<f64>,
    /// Confidence in percent.
    pub confidence: Option<f64>,
    pub investment: Option<InvestmentProjection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentProjection {
    pub rental_yield: Option<f64>,
    pub annual_income: Option<f64>,
    pub appreciation_rate: Option<f64>,
    pub five_year_value: Option<f64>,
    pub breakdown: Vec<BreakdownItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakdownItem {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalStatus {
    pub ownership_type: Option<String>,
    pub title_deed_number: Option<String>,
    pub zoning: Option<String>,
    pub encumbrances: Vec<String>,
    pub compliance_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortgageEligibility {
    pub eligible: bool,
    /// Loan-to-value ceiling in percent.
    pub max_ltv: Option<f64>,
    pub recommended_loan: Option<f64>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketAnalysis {
    pub average_price_per_sqm: Option<f64>,
    pub demand_level: Option<String>,
    pub average_days_on_market: Option<u32>,
    pub trend: Vec<TrendPoint>,
    pub comparables: Vec<Comparable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPoint {
    pub period: String,
    pub price_per_sqm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comparable {
    pub address: Option<String>,
    pub price: Option<f64>,
    pub area_sqm: Option<f64>,
    pub distance_km: Option<f64>,
}

/// Everything the planner reads for one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportInput {
    pub property: Property,
    pub appraisal: Appraisal,
    pub market: MarketAnalysis,
}

impl ReportInput {
    pub fn new(property: Property, appraisal: Appraisal, market: MarketAnalysis) -> Self {
        Self {
            property,
            appraisal,
            market,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Caller contract: property and appraisal identity must be present and
    /// consistent before any rendering starts.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.property.id.trim().is_empty() {
            return Err(ReportError::invalid_input("property id is empty"));
        }
        if self.appraisal.id.trim().is_empty() {
            return Err(ReportError::invalid_input("appraisal id is empty"));
        }
        if let Some(property_id) = self.appraisal.property_id.as_deref() {
            if !property_id.trim().is_empty() && property_id != self.property.id {
                return Err(ReportError::invalid_input(format!(
                    "appraisal {} belongs to property {}, not {}",
                    self.appraisal.id, property_id, self.property.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ReportInput {
        ReportInput::new(
            Property {
                id: "p-1".to_string(),
                ..Property::default()
            },
            Appraisal {
                id: "a-1".to_string(),
                property_id: Some("p-1".to_string()),
                ..Appraisal::default()
            },
            MarketAnalysis::default(),
        )
    }

    #[test]
    fn identity_is_required() {
        assert!(input().validate().is_ok());

        let mut missing = input();
        missing.property.id = "  ".to_string();
        let err = missing.validate().unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput(_)));

        let mut mismatch = input();
        mismatch.appraisal.property_id = Some("p-2".to_string());
        assert!(mismatch.validate().unwrap_err().to_string().contains("p-2"));
    }

    #[test]
    fn records_deserialize_with_missing_optionals() {
        let parsed = ReportInput::from_json(
            r#"{
                "property": {"id": "p-9", "images": [{"url": "a.png", "is_primary": true}]},
                "appraisal": {"id": "a-9", "legal_status": {"zoning": "R2"}, "unknown": 1},
                "market": {"comparables": [{"price": 950000}]}
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.property.images.len(), 1);
        assert!(parsed.property.images[0].is_primary);
        assert_eq!(
            parsed.appraisal.legal_status.as_ref().and_then(|l| l.zoning.as_deref()),
            Some("R2")
        );
        assert_eq!(parsed.appraisal.currency_code(), "SAR");
        assert_eq!(parsed.market.comparables[0].price, Some(950000.0));
    }

    #[test]
    fn quality_average_ignores_missing_scores() {
        let scores = QualityScores {
            location: Some(8.0),
            finishing: Some(6.0),
            ..QualityScores::default()
        };
        assert_eq!(scores.average(), Some(7.0));
        assert_eq!(QualityScores::default().average(), None);
    }

    #[test]
    fn display_reference_prefers_reference_number() {
        let mut appraisal = input().appraisal;
        assert_eq!(appraisal.display_reference(), "a-1");
        appraisal.reference_number = Some("VAL-2024-0042".to_string());
        assert_eq!(appraisal.display_reference(), "VAL-2024-0042");
    }
}
