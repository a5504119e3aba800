use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::models::CompanyRecord;
use crate::ranking::{parse_ranking_page, PageParseResult};

pub const DEFAULT_BASE_URL: &str = "https://www.nikkei.com/marketdata/ranking-jp/market-cap-high/";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

// --- Configuration ---

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Ranking URL. A `{page}` placeholder is substituted, otherwise `page=N` is appended.
    pub base_url: String,
    pub target_count: usize,
    pub per_page: usize,
    pub delay: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            target_count: 200,
            per_page: 30,
            delay: Duration::from_millis(1000),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 {
            return Err(anyhow!("per-page count must be at least 1"));
        }
        Ok(())
    }

    pub fn total_pages(&self) -> usize {
        self.target_count.div_ceil(self.per_page)
    }

    pub fn page_url(&self, page: usize) -> String {
        if self.base_url.contains("{page}") {
            self.base_url.replace("{page}", &page.to_string())
        } else if self.base_url.contains('?') {
            format!("{}&page={}", self.base_url, page)
        } else {
            format!("{}?page={}", self.base_url, page)
        }
    }
}

// --- Page sources ---

pub trait PageSource {
    fn fetch_page(&self, page: usize) -> Result<String>;
}

pub struct HttpPageSource {
    client: reqwest::blocking::Client,
    config: CollectorConfig,
}

impl HttpPageSource {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, page: usize) -> Result<String> {
        let url = self.config.page_url(page);
        info!("Fetching page {}: {}", page, url);

        self.client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .with_context(|| format!("Failed to fetch {}", url))
    }
}

// --- Collection ---

#[derive(Debug, Default, PartialEq)]
pub struct CollectStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub stopped_early: bool,
}

/// Fetch ranking pages one at a time, pausing between requests, until the
/// target count is reached or the page range runs out.
///
/// A page whose fetch fails contributes nothing and the run moves on to the
/// next page. The result is truncated to `target_count`, never padded.
pub fn collect<S, P>(
    source: &S,
    config: &CollectorConfig,
    mut pause: P,
) -> Result<(Vec<CompanyRecord>, CollectStats)>
where
    S: PageSource + ?Sized,
    P: FnMut(Duration),
{
    config.validate()?;

    let total_pages = config.total_pages();
    info!(
        "Starting scrape: target {} companies across {} pages",
        config.target_count, total_pages
    );

    let mut records = Vec::new();
    let mut stats = CollectStats::default();

    for page in 1..=total_pages {
        if page > 1 {
            pause(config.delay);
        }

        let outcome = source.fetch_page(page).map(|html| parse_ranking_page(&html));
        absorb_page(&mut records, &mut stats, page, outcome);

        if records.len() >= config.target_count {
            if page < total_pages {
                stats.stopped_early = true;
            }
            info!("Reached target of {} companies", config.target_count);
            break;
        }
    }

    records.truncate(config.target_count);
    Ok((records, stats))
}

/// Successful pages are appended in page order; failed ones are logged and dropped.
fn absorb_page(
    records: &mut Vec<CompanyRecord>,
    stats: &mut CollectStats,
    page: usize,
    outcome: Result<PageParseResult>,
) {
    match outcome {
        Ok(parsed) => {
            info!("Page {}: found {} companies", page, parsed.companies.len());
            // Pagination follows the computed page count, not this flag.
            debug!("Page {}: next page signalled: {}", page, parsed.has_next_page);
            stats.pages_fetched += 1;
            records.extend(parsed.companies);
        }
        Err(e) => {
            error!("Failed to scrape page {}, continuing: {:#}", page, e);
            stats.pages_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Step {
        Fetch(usize),
        Pause(Duration),
    }

    /// Serves `per_page` rows per page with globally increasing ranks and
    /// records every fetch, and every pause routed through `pause`, in order.
    struct FakeSource {
        per_page: usize,
        failing: HashSet<usize>,
        steps: RefCell<Vec<Step>>,
    }

    impl FakeSource {
        fn new(per_page: usize) -> Self {
            Self {
                per_page,
                failing: HashSet::new(),
                steps: RefCell::new(Vec::new()),
            }
        }

        fn pause(&self, delay: Duration) {
            self.steps.borrow_mut().push(Step::Pause(delay));
        }

        fn requested(&self) -> Vec<usize> {
            self.steps
                .borrow()
                .iter()
                .filter_map(|step| match step {
                    Step::Fetch(page) => Some(*page),
                    Step::Pause(_) => None,
                })
                .collect()
        }

        fn failing_on(mut self, page: usize) -> Self {
            self.failing.insert(page);
            self
        }
    }

    impl PageSource for FakeSource {
        fn fetch_page(&self, page: usize) -> Result<String> {
            self.steps.borrow_mut().push(Step::Fetch(page));
            if self.failing.contains(&page) {
                return Err(anyhow!("connection reset"));
            }
            let first_rank = (page - 1) * self.per_page + 1;
            let rows: Vec<_> = (first_rank..first_rank + self.per_page)
                .map(|rank| json!({ "RANK": rank, "SOBA_NAME": format!("Company {}", rank) }))
                .collect();
            let data = json!({ "props": { "pageProps": { "data": { "data_lists": rows } } } });
            Ok(format!(
                r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
                data
            ))
        }
    }

    fn config(target_count: usize, per_page: usize) -> CollectorConfig {
        CollectorConfig {
            base_url: "https://example.com/ranking/".to_string(),
            target_count,
            per_page,
            delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(config(200, 30).total_pages(), 7);
        assert_eq!(config(60, 30).total_pages(), 2);
        assert_eq!(config(0, 30).total_pages(), 0);
    }

    #[test]
    fn test_page_url_variants() {
        assert_eq!(config(1, 1).page_url(3), "https://example.com/ranking/?page=3");

        let mut cfg = config(1, 1);
        cfg.base_url = "https://example.com/r?sort=cap".to_string();
        assert_eq!(cfg.page_url(2), "https://example.com/r?sort=cap&page=2");

        cfg.base_url = "https://example.com/r/{page}.html".to_string();
        assert_eq!(cfg.page_url(5), "https://example.com/r/5.html");
    }

    #[test]
    fn test_collect_pauses_before_every_page_but_the_first() {
        // 25 rows per page never reaches 200 early, so all 7 pages are fetched.
        let source = FakeSource::new(25);
        let delay = Duration::from_millis(1000);

        let (records, stats) = collect(&source, &config(200, 30), |d| source.pause(d)).unwrap();

        let mut expected = vec![Step::Fetch(1)];
        for page in 2..=7 {
            expected.push(Step::Pause(delay));
            expected.push(Step::Fetch(page));
        }
        assert_eq!(*source.steps.borrow(), expected);
        assert_eq!(records.len(), 175);
        assert!(!stats.stopped_early);
    }

    #[test]
    fn test_collect_stops_once_target_is_reached() {
        // 50 rows per page reaches 200 on page 4 of 7.
        let source = FakeSource::new(50);
        let delay = Duration::from_millis(1000);

        let (records, stats) = collect(&source, &config(200, 30), |d| source.pause(d)).unwrap();

        assert_eq!(
            *source.steps.borrow(),
            vec![
                Step::Fetch(1),
                Step::Pause(delay),
                Step::Fetch(2),
                Step::Pause(delay),
                Step::Fetch(3),
                Step::Pause(delay),
                Step::Fetch(4),
            ]
        );
        assert_eq!(records.len(), 200);
        assert!(stats.stopped_early);
    }

    #[test]
    fn test_collect_truncates_to_target_preserving_rank_order() {
        let source = FakeSource::new(30);
        let (records, _) = collect(&source, &config(200, 30), |_| {}).unwrap();

        assert_eq!(records.len(), 200);
        assert_eq!(records.first().unwrap().rank, 1);
        assert_eq!(records.last().unwrap().rank, 200);
        assert!(records.windows(2).all(|w| w[0].rank < w[1].rank));
    }

    #[test]
    fn test_collect_skips_failed_page_and_continues() {
        let source = FakeSource::new(30).failing_on(3);
        let (records, stats) = collect(&source, &config(200, 30), |_| {}).unwrap();

        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(records.len(), 180);
        assert!(records.iter().all(|r| !(61..=90).contains(&r.rank)));
        assert_eq!(stats.pages_fetched, 6);
        assert_eq!(stats.pages_failed, 1);
    }

    #[test]
    fn test_collect_zero_target_fetches_nothing() {
        let source = FakeSource::new(30);
        let (records, _) = collect(&source, &config(0, 30), |_| {}).unwrap();
        assert!(records.is_empty());
        assert!(source.steps.borrow().is_empty());
    }

    #[test]
    fn test_collect_rejects_zero_per_page() {
        let source = FakeSource::new(30);
        assert!(collect(&source, &config(10, 0), |_| {}).is_err());
    }
}
