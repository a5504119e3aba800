use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};

/// `3/1`
pub fn format_date_short(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

/// `2025年3月1日`
pub fn format_date_long(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

/// How long ago a posting was last checked, relative to `now`.
pub fn format_verified_at(verified: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> String {
    let elapsed = now - verified;
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if hours < 1 {
        "1時間以内に確認".to_string()
    } else if hours < 24 {
        format!("{}時間前に確認", hours)
    } else if days < 7 {
        format!("{}日前に確認", days)
    } else {
        format!("{}に確認", format_date_short(verified.date_naive()))
    }
}

pub fn format_salary(salary: u32) -> String {
    if salary == 0 {
        return "要確認".to_string();
    }
    let digits = salary.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}円/月", grouped)
}

pub fn format_bonus(has_bonus: bool) -> &'static str {
    if has_bonus { "あり" } else { "要確認" }
}
