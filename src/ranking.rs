use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{CompanyRecord, ListingMarket};

const NEXT_DATA_SELECTOR: &str = "script#__NEXT_DATA__";
const DATA_LISTS_POINTER: &str = "/props/pageProps/data/data_lists";

/// Rows extracted from a single ranking page.
#[derive(Debug, Default)]
pub struct PageParseResult {
    pub companies: Vec<CompanyRecord>,
    /// The ranking page carries no next-page signal, so this is always false.
    pub has_next_page: bool,
}

/// Parse one ranking page. Never fails: a missing or malformed data block
/// is logged and yields an empty result.
pub fn parse_ranking_page(html: &str) -> PageParseResult {
    match extract_companies(html) {
        Ok(companies) => {
            debug!("Parsed {} ranking rows", companies.len());
            PageParseResult {
                companies,
                has_next_page: false,
            }
        }
        Err(e) => {
            warn!("Ranking page yielded no rows: {:#}", e);
            PageParseResult::default()
        }
    }
}

fn extract_companies(html: &str) -> Result<Vec<CompanyRecord>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(NEXT_DATA_SELECTOR)
        .map_err(|e| anyhow!("Invalid selector {}: {}", NEXT_DATA_SELECTOR, e))?;

    let payload: String = document
        .select(&selector)
        .next()
        .map(|script| script.text().collect())
        .unwrap_or_default();

    if payload.trim().is_empty() {
        return Err(anyhow!("__NEXT_DATA__ script not found in HTML"));
    }

    let data: Value =
        serde_json::from_str(&payload).context("Failed to parse __NEXT_DATA__ JSON")?;

    let rows = data
        .pointer(DATA_LISTS_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("data_lists not found or not an array"))?;

    Ok(rows.iter().map(company_from_row).collect())
}

fn company_from_row(row: &Value) -> CompanyRecord {
    let market_codes: Option<Vec<&str>> = row
        .get("LISS_MKTN")
        .and_then(Value::as_array)
        .map(|codes| codes.iter().filter_map(Value::as_str).collect());

    CompanyRecord {
        rank: rank_field(row.get("RANK")),
        company_name: text_field(row.get("SOBA_NAME")),
        ticker: text_field(row.get("BICD")),
        market_cap: text_field(row.get("MKCP")),
        listing_market: ListingMarket::from_codes(market_codes.as_deref()),
        ..Default::default()
    }
}

fn rank_field(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Missing, null, false, zero and empty all become an empty string.
fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_with(next_data: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><title>時価総額ランキング</title></head>
<body><div id="__next"></div>
<script id="__NEXT_DATA__" type="application/json">{}</script>
</body></html>"#,
            next_data
        )
    }

    fn sample_page() -> String {
        let data = json!({
            "props": { "pageProps": { "data": { "data_lists": [
                { "RANK": 1, "SOBA_NAME": "トヨタ自動車", "BICD": "7203",
                  "MKCP": "50228060122800", "LISS_MKTN": ["MPR", "TP"] },
                { "RANK": 2, "SOBA_NAME": "三菱ＵＦＪフィナンシャル・グループ", "BICD": "8306",
                  "MKCP": "22035461405700", "LISS_MKTN": ["TP"] },
                { "RANK": 3, "SOBA_NAME": "ソニーグループ", "BICD": "6758",
                  "MKCP": 20457890000000u64, "LISS_MKTN": ["FK", "MPR", "S", "TP"] }
            ]}}}
        });
        page_with(&data.to_string())
    }

    #[test]
    fn test_parse_ranking_page_extracts_all_rows() {
        let result = parse_ranking_page(&sample_page());
        assert_eq!(result.companies.len(), 3);
        assert!(!result.has_next_page);

        let names: Vec<_> = result
            .companies
            .iter()
            .map(|c| c.company_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "トヨタ自動車",
                "三菱ＵＦＪフィナンシャル・グループ",
                "ソニーグループ"
            ]
        );
        let tickers: Vec<_> = result.companies.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["7203", "8306", "6758"]);
    }

    #[test]
    fn test_parse_ranking_page_first_row_fields() {
        let result = parse_ranking_page(&sample_page());
        let first = &result.companies[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.company_name, "トヨタ自動車");
        assert_eq!(first.ticker, "7203");
        assert_eq!(first.market_cap, "50228060122800");
        assert_eq!(first.listing_market, ListingMarket::Prime);
    }

    #[test]
    fn test_parse_ranking_page_numeric_market_cap_becomes_text() {
        let result = parse_ranking_page(&sample_page());
        assert_eq!(result.companies[2].market_cap, "20457890000000");
    }

    #[test]
    fn test_parse_ranking_page_leaves_enrichment_fields_empty() {
        let result = parse_ranking_page(&sample_page());
        let first = &result.companies[0];
        for field in [
            &first.industry,
            &first.foundation_year,
            &first.employees,
            &first.is_newgrad_active,
            &first.hq_location,
            &first.official_site_url,
            &first.official_career_url,
            &first.logo_image_url,
            &first.revenue,
            &first.operating_income,
            &first.notes,
        ] {
            assert_eq!(field, "");
        }
    }

    #[test]
    fn test_parse_ranking_page_defaults_missing_fields() {
        let data = json!({
            "props": { "pageProps": { "data": { "data_lists": [
                { "RANK": null, "SOBA_NAME": "", "MKCP": 0 }
            ]}}}
        });
        let result = parse_ranking_page(&page_with(&data.to_string()));
        let row = &result.companies[0];
        assert_eq!(row.rank, 0);
        assert_eq!(row.company_name, "");
        assert_eq!(row.ticker, "");
        assert_eq!(row.market_cap, "");
        assert_eq!(row.listing_market, ListingMarket::Unknown);
    }

    #[test]
    fn test_parse_ranking_page_missing_data_block() {
        let result = parse_ranking_page("<html><body></body></html>");
        assert!(result.companies.is_empty());
        assert!(!result.has_next_page);
    }

    #[test]
    fn test_parse_ranking_page_invalid_json() {
        let result = parse_ranking_page(&page_with("{ not json"));
        assert!(result.companies.is_empty());
        assert!(!result.has_next_page);
    }

    #[test]
    fn test_parse_ranking_page_unexpected_shape() {
        let data = json!({ "props": { "pageProps": { "data": { "data_lists": "nope" } } } });
        assert!(parse_ranking_page(&page_with(&data.to_string())).companies.is_empty());

        let data = json!({ "props": {} });
        assert!(parse_ranking_page(&page_with(&data.to_string())).companies.is_empty());
    }
}
