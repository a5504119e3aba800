use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cache::LoadOnce;
use crate::flatfile::{Record, Table};
use crate::master::MasterData;
use crate::models::{Posting, TransferType};

pub const POSTINGS_FILE: &str = "postings.csv";

/// Postings joined against the master data, sorted by deadline.
///
/// The source file is read on first access and the joined result is kept
/// for the life of the repository.
pub struct PostingRepository {
    source: PathBuf,
    master: MasterData,
    postings: LoadOnce<Vec<Posting>>,
}

impl PostingRepository {
    /// Postings and master files all live in `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self::with_source(data_dir.join(POSTINGS_FILE), MasterData::new(data_dir))
    }

    /// `./data` when present, otherwise the platform data directory.
    pub fn default_data_dir() -> PathBuf {
        let local = PathBuf::from("data");
        if local.is_dir() {
            return local;
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "es_calendar") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            local
        }
    }

    pub fn with_source(source: impl Into<PathBuf>, master: MasterData) -> Self {
        Self {
            source: source.into(),
            master,
            postings: LoadOnce::new(),
        }
    }

    // --- Queries ---

    /// Every posting, earliest deadline first. Ties keep file order.
    pub fn all(&self) -> Result<&[Posting]> {
        let postings = self.postings.get_or_try_load(|| self.load())?;
        Ok(postings.as_slice())
    }

    pub fn get(&self, id: &str) -> Result<Option<&Posting>> {
        Ok(self.all()?.iter().find(|p| p.id == id))
    }

    /// Other postings from the same company, for "related postings".
    pub fn by_company(&self, company_name: &str, exclude_id: &str) -> Result<Vec<&Posting>> {
        Ok(self
            .all()?
            .iter()
            .filter(|p| p.company_name == company_name && p.id != exclude_id)
            .collect())
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        Ok(distinct(self.all()?.iter().flat_map(|p| p.tags.iter())))
    }

    pub fn industries(&self) -> Result<Vec<String>> {
        Ok(distinct(self.all()?.iter().map(|p| &p.industry)))
    }

    pub fn benefits(&self) -> Result<Vec<String>> {
        Ok(distinct(self.all()?.iter().flat_map(|p| p.benefits.iter())))
    }

    /// Forget the loaded postings and master data.
    pub fn reset(&mut self) {
        self.postings.reset();
        self.master.reset();
    }

    // --- Loading ---

    fn load(&self) -> Result<Vec<Posting>> {
        let table = Table::read(&self.source)?;
        let now = Local::now().fixed_offset();

        let mut postings = Vec::with_capacity(table.rows.len());
        for (idx, record) in table.records().enumerate() {
            // Line 1 is the header.
            match self.posting_from_record(&record, now)? {
                Some(posting) => postings.push(posting),
                None => warn!("Skipping {} line {}", self.source.display(), idx + 2),
            }
        }

        // Stable, so postings sharing a deadline keep their file order.
        postings.sort_by(|a, b| a.deadline_date.cmp(&b.deadline_date));

        info!("Loaded {} postings from {}", postings.len(), self.source.display());
        Ok(postings)
    }

    /// `Ok(None)` for rows that cannot become a posting. Master data
    /// failures are returned as errors.
    fn posting_from_record(
        &self,
        record: &Record<'_>,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<Posting>> {
        let id = record.get("id").trim();
        if id.is_empty() {
            warn!("Posting row without an id");
            return Ok(None);
        }

        let raw_deadline = record.get("deadline_date").trim();
        let deadline_date = match NaiveDate::parse_from_str(raw_deadline, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                warn!("Posting {} has invalid deadline_date {:?}: {}", id, raw_deadline, e);
                return Ok(None);
            }
        };

        let target_year = record.get("target_year").trim();

        Ok(Some(Posting {
            id: id.to_string(),
            company_name: record.get("company_name").to_string(),
            ticker: record.get("ticker").to_string(),
            posting_title: record.get("posting_title").to_string(),
            deadline_date,
            deadline_time: parse_deadline_time(id, record.get("deadline_time")),
            event_type: record.get("event_type").to_string(),
            industry: self.master.resolve_industry_id(record.get("industry_id"))?,
            job_type: record.get("job_type").to_string(),
            salary: parse_leading_int(record.get("salary")),
            has_bonus: record.get("has_bonus") == "true",
            salary_notes: record.get("salary_notes").to_string(),
            transfer_type: TransferType::parse(record.get("transfer_type")),
            annual_paid_leave_days: parse_leading_int(record.get("annual_paid_leave_days")),
            benefits: self.master.resolve_benefit_ids(record.get("benefit_ids"))?,
            tags: self.master.resolve_tag_ids(record.get("tag_ids"))?,
            official_url: record.get("official_url").to_string(),
            last_verified_at: parse_verified_at(id, record.get("last_verified_at"), now),
            target_year: (!target_year.is_empty()).then(|| target_year.to_string()),
        }))
    }
}

/// Postings carrying `tag`, in repository order. `None` keeps everything.
pub fn filter_by_tag<'a>(postings: &'a [Posting], tag: Option<&str>) -> Vec<&'a Posting> {
    match tag {
        Some(tag) => postings
            .iter()
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .collect(),
        None => postings.iter().collect(),
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Leading decimal digits, 0 when there are none.
fn parse_leading_int(raw: &str) -> u32 {
    let digits: String = raw.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn parse_deadline_time(id: &str, raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(time) => Some(time),
        Err(_) => {
            warn!("Posting {} has invalid deadline_time {:?}, treating as unconfirmed", id, raw);
            None
        }
    }
}

fn parse_verified_at(id: &str, raw: &str, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let raw = raw.trim();
    if raw.is_empty() {
        return now;
    }
    DateTime::parse_from_rfc3339(raw).unwrap_or_else(|_| {
        warn!("Posting {} has invalid last_verified_at {:?}, using now", id, raw);
        now
    })
}
