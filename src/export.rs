use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::models::CompanyRecord;

pub const CSV_HEADERS: [&str; 16] = [
    "rank",
    "company_name",
    "ticker",
    "market_cap",
    "listing_market",
    "industry",
    "foundation_year",
    "employees",
    "is_newgrad_active",
    "hq_location",
    "official_site_url",
    "official_career_url",
    "logo_image_url",
    "revenue",
    "operating_income",
    "notes",
];

/// Write the ranking to `output_path`, creating parent directories and
/// overwriting any existing file.
pub fn export_companies(companies: &[CompanyRecord], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    // The header is written by hand so an empty ranking still gets one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output_path)
        .with_context(|| format!("Failed to open {}", output_path.display()))?;

    writer.write_record(CSV_HEADERS)?;
    for company in companies {
        writer
            .serialize(company)
            .with_context(|| format!("Failed to write row for rank {}", company.rank))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output_path.display()))?;

    info!("Exported {} companies to {}", companies.len(), output_path.display());
    Ok(())
}
