// Harvest summary reporting

use crate::harvest::{CategoryOutcome, ProductOutcome};
use crate::model::Category;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub id: String,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub categories: usize,
    pub leaf_categories: usize,
    pub harvested_categories: usize,
    pub products_stored: usize,
    pub products_already_present: usize,
    pub products_skipped: usize,
    pub relations_written: usize,
    pub skipped_categories: Vec<SkippedCategory>,
}

impl HarvestSummary {
    pub fn start() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }

    pub fn record_category(&mut self, category: &Category, outcome: &CategoryOutcome) {
        self.categories += 1;
        match outcome {
            CategoryOutcome::Branch => {}
            CategoryOutcome::Harvested { .. } => {
                self.leaf_categories += 1;
                self.harvested_categories += 1;
            }
            CategoryOutcome::Skipped(reason) => {
                self.leaf_categories += 1;
                self.skipped_categories.push(SkippedCategory {
                    id: category.id.clone(),
                    title: category.title.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    pub fn record_product(&mut self, outcome: &ProductOutcome) {
        match outcome {
            ProductOutcome::Stored => {
                self.products_stored += 1;
                self.relations_written += 1;
            }
            ProductOutcome::AlreadyPresent => {
                self.products_already_present += 1;
                self.relations_written += 1;
            }
            ProductOutcome::Skipped(_) => self.products_skipped += 1,
        }
    }
}

pub fn generate_text_summary(summary: &HarvestSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Started: {}\n", summary.started_at));
    if let Some(ref finished) = summary.finished_at {
        report.push_str(&format!("  Finished: {}\n", finished));
    }
    report.push_str(&format!("  Categories: {}\n", summary.categories));
    report.push_str(&format!("  Leaf categories: {}\n", summary.leaf_categories));
    report.push_str(&format!(
        "  Harvested categories: {}\n",
        summary.harvested_categories
    ));
    report.push_str(&format!("  Products stored: {}\n", summary.products_stored));
    report.push_str(&format!(
        "  Products already present: {}\n",
        summary.products_already_present
    ));
    report.push_str(&format!("  Products skipped: {}\n", summary.products_skipped));
    report.push_str(&format!("  Relations written: {}\n", summary.relations_written));

    if !summary.skipped_categories.is_empty() {
        report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        report.push_str(&format!(
            "## Skipped categories ({})\n",
            summary.skipped_categories.len()
        ));
        for skipped in &summary.skipped_categories {
            report.push_str(&format!(
                "  {} [{}]: {}\n",
                skipped.title, skipped.id, skipped.reason
            ));
        }
    }

    report
}

pub fn generate_json_summary(summary: &HarvestSummary) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Shelfscan",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json"
            },
            "harvest": summary
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
