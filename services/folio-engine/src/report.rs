//! Portfolio report generation.
//!
//! Renders the hand-off consumed by the commentary and presentation
//! collaborators: one row per holding (identifier, name, sector, weight)
//! plus the HHI, in one of:
//! - Markdown (human-readable)
//! - JSON (machine-readable)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::portfolio::{
    CategoryShortfall, ConcentrationReview, Origin, Portfolio, Sleeve,
};
use crate::profile::{MixType, RiskProfile};
use crate::screener::FilterStep;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = folio_common::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(folio_common::Error::InvalidInput(format!(
                "Unknown report format: {}",
                s
            ))),
        }
    }
}

// ============================================================================
// Report Rows
// ============================================================================

/// One holding as handed to downstream collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub name: String,
    pub sector: String,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleeve: Option<Sleeve>,
    pub origin: Origin,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    build_id: &'a str,
    risk_profile: RiskProfile,
    mix: MixType,
    generated_at: DateTime<Utc>,
    hhi: f64,
    rows: Vec<ReportRow>,
    shortfalls: &'a [CategoryShortfall],
    weighting_fallback: bool,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    dropped: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    concentration: Option<&'a ConcentrationReview>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    funnel: &'a [FilterStep],
}

// ============================================================================
// Portfolio Report
// ============================================================================

/// Report generator for a finished portfolio.
pub struct PortfolioReport {
    portfolio: Portfolio,
    review: Option<ConcentrationReview>,
    funnel: Vec<FilterStep>,
}

impl PortfolioReport {
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio,
            review: None,
            funnel: Vec::new(),
        }
    }

    /// Attach the advisory concentration review.
    pub fn with_review(mut self, review: ConcentrationReview) -> Self {
        self.review = Some(review);
        self
    }

    /// Attach the exclusion funnel that preceded the build.
    pub fn with_funnel(mut self, steps: Vec<FilterStep>) -> Self {
        self.funnel = steps;
        self
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.portfolio
            .holdings()
            .iter()
            .map(|h| ReportRow {
                id: h.asset.id.clone(),
                name: h.asset.name.clone(),
                sector: h.asset.sector_label().to_string(),
                weight: h.weight,
                sleeve: h.sleeve,
                origin: h.origin,
            })
            .collect()
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save report to file, adding the format's extension when missing.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let content = self.generate(format);

        let file_path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        std::fs::write(&file_path, content).context("Failed to write report file")?;
        tracing::info!(path = %file_path.display(), format = %format, "Report saved");

        Ok(file_path)
    }

    /// Generate markdown report.
    pub fn to_markdown(&self) -> String {
        let p = &self.portfolio;
        let mut md = String::new();

        md.push_str(&format!(
            "# Portfolio: {} / {}\n\n**Build ID**: {}\n**Generated**: {}\n\n",
            p.risk_profile(),
            p.mix(),
            p.build_id(),
            p.generated_at().format("%Y-%m-%d %H:%M:%S")
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Holdings**: {}\n", p.len()));
        md.push_str(&format!("- **HHI**: {:.4}\n", p.hhi()));
        if p.has_relaxed_holdings() {
            md.push_str("- **Note**: includes closest-fit holdings from a relaxed tier\n");
        }
        if p.weighting_fallback() {
            md.push_str("- **Note**: equal weights substituted for the configured strategy\n");
        }
        md.push('\n');

        md.push_str("## Holdings\n\n");
        md.push_str("| ID | Name | Sector | Weight | Sleeve | Match |\n");
        md.push_str("|----|------|--------|--------|--------|-------|\n");
        for row in self.rows() {
            let matched = match row.origin {
                Origin::Pool {
                    matched, conditions, ..
                } => format!("{}/{}", matched, conditions),
                Origin::Forced => "forced".to_string(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {:.2}% | {} | {} |\n",
                row.id,
                row.name,
                row.sector,
                row.weight * 100.0,
                row.sleeve.map_or_else(|| "-".to_string(), |s| s.to_string()),
                matched
            ));
        }
        md.push('\n');

        if !p.shortfalls().is_empty() {
            md.push_str("### Category Shortfalls\n\n");
            for s in p.shortfalls() {
                md.push_str(&format!("- {}: {} of {} requested\n", s.category, s.taken, s.requested));
            }
            md.push('\n');
        }

        if !p.dropped().is_empty() {
            md.push_str("### Left Out by Risk Scoring\n\n");
            md.push_str(&format!("- {}\n\n", p.dropped().join(", ")));
        }

        if let Some(review) = &self.review {
            md.push_str("## Concentration\n\n");
            md.push_str(&format!(
                "- **HHI**: {:.4} (ceiling {:.2}, {})\n",
                review.hhi,
                review.ceiling,
                if review.within_limit { "within limit" } else { "above limit" }
            ));
            md.push_str(&format!("- **Effective holdings**: {:.1}\n\n", review.effective_holdings));
            md.push_str("| Sector | Weight |\n");
            md.push_str("|--------|--------|\n");
            for (sector, weight) in &review.sector_weights {
                md.push_str(&format!("| {} | {:.2}% |\n", sector, weight * 100.0));
            }
            md.push('\n');
        }

        if !self.funnel.is_empty() {
            md.push_str("## Exclusion Funnel\n\n");
            md.push_str("| Rule | Passed | Eliminated | Rate |\n");
            md.push_str("|------|--------|------------|------|\n");
            for step in &self.funnel {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.1}% |\n",
                    step.rule, step.passed, step.eliminated, step.elimination_rate
                ));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Report generated at {} UTC*\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));

        md
    }

    /// Generate JSON report.
    pub fn to_json(&self) -> String {
        let p = &self.portfolio;
        let doc = ReportDocument {
            build_id: p.build_id(),
            risk_profile: p.risk_profile(),
            mix: p.mix(),
            generated_at: p.generated_at(),
            hhi: p.hhi(),
            rows: self.rows(),
            shortfalls: p.shortfalls(),
            weighting_fallback: p.weighting_fallback(),
            dropped: p.dropped(),
            concentration: self.review.as_ref(),
            funnel: &self.funnel,
        };
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetClass, AssetRecord};
    use crate::portfolio::{ConcentrationAuditor, Holding};
    use std::sync::Arc;

    fn sample() -> Portfolio {
        let holding = |id: &str, name: &str, sector: Option<&str>, weight: f64| {
            let mut record = AssetRecord::new(id, name, AssetClass::Equity);
            record.sector = sector.map(str::to_string);
            Holding {
                asset: Arc::new(record),
                weight,
                sleeve: None,
                origin: Origin::Pool {
                    kind: crate::screener::PoolKind::Stock(RiskProfile::Conservative),
                    matched: 4,
                    conditions: 4,
                },
            }
        };
        Portfolio::assemble(
            "build-1",
            RiskProfile::Conservative,
            MixType::PureEquity,
            vec![
                holding("2412", "Chunghwa Telecom", Some("Telecom"), 0.6),
                holding("2882", "Cathay Financial", None, 0.4),
            ],
            Vec::new(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("MD".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        let err = "xml".parse::<ReportFormat>().unwrap_err();
        assert!(matches!(err, folio_common::Error::InvalidInput(_)));
    }

    #[test]
    fn test_rows_use_sector_fallback() {
        let rows = PortfolioReport::new(sample()).rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sector, "Telecom");
        assert_eq!(rows[1].sector, crate::asset::UNCLASSIFIED_SECTOR);
    }

    #[test]
    fn test_markdown_contains_rows() {
        let portfolio = sample();
        let review = ConcentrationAuditor::default().review(&portfolio);
        let md = PortfolioReport::new(portfolio).with_review(review).to_markdown();
        assert!(md.contains("# Portfolio: conservative / pure-equity"));
        assert!(md.contains("| 2412 | Chunghwa Telecom | Telecom | 60.00% | - | 4/4 |"));
        assert!(md.contains("## Concentration"));
        assert!(!md.contains("Exclusion Funnel"));
    }

    #[test]
    fn test_json_round_trips_hhi() {
        let report = PortfolioReport::new(sample());
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["build_id"], "build-1");
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
        assert!((value["hhi"].as_f64().unwrap() - 0.52).abs() < 1e-9);
        assert!(value.get("funnel").is_none());
        assert!(value.get("dropped").is_none());
    }

    #[test]
    fn test_dropped_candidates_listed() {
        let portfolio = sample().with_dropped(vec!["00900".into(), "00881".into()]);
        let report = PortfolioReport::new(portfolio);
        assert!(report.to_markdown().contains("### Left Out by Risk Scoring\n\n- 00900, 00881\n"));
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["dropped"], serde_json::json!(["00900", "00881"]));
    }

    #[test]
    fn test_save_adds_extension() {
        let dir = tempfile::tempdir().unwrap();
        let report = PortfolioReport::new(sample());
        let path = report
            .save_to_file(&dir.path().join("reports/portfolio"), ReportFormat::Json)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "json");
        assert!(std::fs::read_to_string(path).unwrap().contains("\"rows\""));
    }
}
