use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

// --- Scraper side ---

/// Exchange tier a company is listed on, derived from the ranking page's market codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMarket {
    Prime,
    Standard,
    Growth,
    #[default]
    Unknown,
}

impl ListingMarket {
    /// Explicit segment codes win over the generic exchange code, whatever
    /// order they appear in. `TP`/`TPF` alone count as Prime.
    pub fn from_codes<S: AsRef<str>>(codes: Option<&[S]>) -> Self {
        let Some(codes) = codes else {
            return ListingMarket::Unknown;
        };
        let has = |code: &str| codes.iter().any(|c| c.as_ref() == code);

        if has("MPR") {
            ListingMarket::Prime
        } else if has("MST") {
            ListingMarket::Standard
        } else if has("MGR") {
            ListingMarket::Growth
        } else if has("TP") || has("TPF") {
            ListingMarket::Prime
        } else {
            ListingMarket::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingMarket::Prime => "Prime",
            ListingMarket::Standard => "Standard",
            ListingMarket::Growth => "Growth",
            ListingMarket::Unknown => "",
        }
    }
}

impl Serialize for ListingMarket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of the market-cap ranking. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyRecord {
    pub rank: u32,
    pub company_name: String,
    pub ticker: String,
    pub market_cap: String,
    pub listing_market: ListingMarket,
    // Not on the ranking page; reserved for enrichment and always empty for now.
    pub industry: String,
    pub foundation_year: String,
    pub employees: String,
    pub is_newgrad_active: String,
    pub hq_location: String,
    pub official_site_url: String,
    pub official_career_url: String,
    pub logo_image_url: String,
    pub revenue: String,
    pub operating_income: String,
    pub notes: String,
}

// --- Posting side ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferType {
    Nationwide,
    RegionLimited,
    FixedLocation,
}

impl TransferType {
    /// Unrecognised values are treated as nationwide.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "region-limited" | "region_limited" | "regional" | "地域限定" => {
                TransferType::RegionLimited
            }
            "fixed-location" | "fixed_location" | "fixed" | "転勤なし" => {
                TransferType::FixedLocation
            }
            _ => TransferType::Nationwide,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Nationwide => "nationwide",
            TransferType::RegionLimited => "region-limited",
            TransferType::FixedLocation => "fixed-location",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub id: String,
    pub company_name: String,
    pub ticker: String,
    pub posting_title: String,
    pub deadline_date: NaiveDate,
    /// `None` means the time has not been confirmed yet.
    #[serde(serialize_with = "serialize_deadline_time")]
    pub deadline_time: Option<NaiveTime>,
    pub event_type: String,
    pub industry: String,
    pub job_type: String,
    /// Monthly starting salary in yen, 0 when unknown.
    pub salary: u32,
    pub has_bonus: bool,
    pub salary_notes: String,
    pub transfer_type: TransferType,
    pub annual_paid_leave_days: u32,
    pub benefits: Vec<String>,
    pub tags: Vec<String>,
    pub official_url: String,
    pub last_verified_at: DateTime<FixedOffset>,
    pub target_year: Option<String>,
}

impl Posting {
    pub fn days_until_deadline(&self, today: NaiveDate) -> i64 {
        days_until(self.deadline_date, today)
    }

    pub fn urgency(&self, today: NaiveDate) -> Urgency {
        Urgency::from_days(self.days_until_deadline(today))
    }

    /// `HH:MM`, or empty while unconfirmed.
    pub fn deadline_time_text(&self) -> String {
        deadline_time_text(self.deadline_time)
    }
}

fn deadline_time_text(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}

fn serialize_deadline_time<S: Serializer>(
    time: &Option<NaiveTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&deadline_time_text(*time))
}

/// Whole calendar days from `today` to `deadline`; negative once it has passed.
pub fn days_until(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Expired,
    Today,
    Tomorrow,
    Soon,
    Normal,
}

impl Urgency {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 0 => Urgency::Expired,
            0 => Urgency::Today,
            1 => Urgency::Tomorrow,
            2..=3 => Urgency::Soon,
            _ => Urgency::Normal,
        }
    }

    pub fn label(&self, days: i64) -> String {
        match self {
            Urgency::Expired => "締切済み".to_string(),
            Urgency::Today => "本日締切".to_string(),
            Urgency::Tomorrow => "明日締切".to_string(),
            Urgency::Soon | Urgency::Normal => format!("あと{}日", days),
        }
    }
}
