use crate::utils::CardError;
use chrono::{Datelike, Months, NaiveDate};
use std::fmt;

/// Julian day number of 1 Meskerem 1 (Amete Mihret).
const ETHIOPIAN_EPOCH_JDN: i64 = 1_723_856;
/// Offset between `num_days_from_ce` and the Julian day number.
const CE_TO_JDN: i64 = 1_721_425;

/// Used when the issue date cannot be expressed in the Ethiopian calendar.
pub const FALLBACK_ETHIOPIAN_ISSUE: &str = "01/01/2016";
pub const FALLBACK_ETHIOPIAN_EXPIRY: &str = "01/01/2024";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthiopianDate {
    pub year: i64,
    /// 1..=13, the thirteenth month being Pagume.
    pub month: u32,
    pub day: u32,
}

impl EthiopianDate {
    pub fn plus_years(self, years: u32) -> Self {
        EthiopianDate {
            year: self.year + i64::from(years),
            ..self
        }
    }
}

impl fmt::Display for EthiopianDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{}", self.day, self.month, self.year)
    }
}

pub fn to_ethiopian(date: NaiveDate) -> Result<EthiopianDate, CardError> {
    let jdn = i64::from(date.num_days_from_ce()) + CE_TO_JDN;
    if jdn < ETHIOPIAN_EPOCH_JDN {
        return Err(CardError::CalendarConversionError(format!(
            "{} precedes the Ethiopian epoch",
            date
        )));
    }
    let days = jdn - ETHIOPIAN_EPOCH_JDN;
    let r = days % 1461;
    let n = r % 365 + 365 * (r / 1460);
    let year = 4 * (days / 1461) + r / 365 - r / 1460;
    Ok(EthiopianDate {
        year,
        month: (n / 30 + 1) as u32,
        day: (n % 30 + 1) as u32,
    })
}

/// Issue and expiry dates printed on a card, all as `DD/MM/YYYY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDates {
    pub gregorian_issue: String,
    pub gregorian_expiry: String,
    pub ethiopian_issue: String,
    pub ethiopian_expiry: String,
}

impl CardDates {
    pub fn for_issue_date(issued: NaiveDate, validity_years: u32) -> Self {
        // 29 February on a non-leap target year lands on 28 February
        let expiry = issued
            .checked_add_months(Months::new(validity_years.saturating_mul(12)))
            .unwrap_or(issued);

        let (ethiopian_issue, ethiopian_expiry) = match to_ethiopian(issued) {
            Ok(eth) => (eth.to_string(), eth.plus_years(validity_years).to_string()),
            Err(e) => {
                log::warn!("Using fallback Ethiopian dates: {}", e);
                (
                    FALLBACK_ETHIOPIAN_ISSUE.to_string(),
                    FALLBACK_ETHIOPIAN_EXPIRY.to_string(),
                )
            }
        };

        CardDates {
            gregorian_issue: issued.format("%d/%m/%Y").to_string(),
            gregorian_expiry: expiry.format("%d/%m/%Y").to_string(),
            ethiopian_issue,
            ethiopian_expiry,
        }
    }

    pub fn expiry_line(&self) -> String {
        format!("{} | {}", self.gregorian_expiry, self.ethiopian_expiry)
    }
}
