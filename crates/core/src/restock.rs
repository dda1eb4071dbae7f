//! Restock date presentation.
//!
//! The storefront shows a restock hint only for items that are out of stock.
//! Which hint it shows depends on nothing but the stored expected date and the
//! current time.

use core::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Language used for dates and labels in emails and storefront hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    De,
    En,
}

const MONTHS_DE: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl Locale {
    /// Resolve a language tag such as `de`, `de-AT` or `en_GB`, falling back
    /// to German.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_default()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::De => "de",
            Self::En => "en",
        }
    }

    /// Long-form date: `15. März 2026` or `March 15, 2026`.
    #[must_use]
    pub fn format_date(self, date: DateTime<Utc>) -> String {
        let month_index = usize::try_from(date.month0()).unwrap_or(0);
        match self {
            Self::De => {
                let month = MONTHS_DE.get(month_index).copied().unwrap_or_default();
                format!("{}. {month} {}", date.day(), date.year())
            }
            Self::En => {
                let month = MONTHS_EN.get(month_index).copied().unwrap_or_default();
                format!("{month} {}, {}", date.day(), date.year())
            }
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "de" => Ok(Self::De),
            "en" => Ok(Self::En),
            _ => Err(format!("unsupported locale: {s}")),
        }
    }
}

/// Which restock hint applies to an out-of-stock item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestockState {
    /// No expected date is stored.
    NoDate,
    /// The stored date is not after now.
    Expired,
    /// The stored date is in the future.
    FutureDate,
}

/// What the storefront renders next to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockDisplay {
    pub should_show: bool,
    pub state: Option<RestockState>,
    pub expected_date: Option<DateTime<Utc>>,
    pub label: Option<String>,
}

impl RestockDisplay {
    /// Decide the hint for an item.
    ///
    /// In-stock items never show a hint. Out-of-stock items show exactly one
    /// of the three states.
    #[must_use]
    pub fn resolve(
        in_stock: bool,
        expected_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        locale: Locale,
    ) -> Self {
        if in_stock {
            return Self {
                should_show: false,
                state: None,
                expected_date,
                label: None,
            };
        }

        let state = match expected_date {
            None => RestockState::NoDate,
            Some(date) if date <= now => RestockState::Expired,
            Some(_) => RestockState::FutureDate,
        };

        let label = match (state, expected_date, locale) {
            (RestockState::FutureDate, Some(date), Locale::De) => {
                format!("Voraussichtlich wieder verfügbar ab {}", locale.format_date(date))
            }
            (RestockState::FutureDate, Some(date), Locale::En) => {
                format!("Expected back in stock on {}", locale.format_date(date))
            }
            (RestockState::Expired, _, Locale::De) => "Wieder verfügbar in Kürze".to_owned(),
            (RestockState::Expired, _, Locale::En) => "Back in stock soon".to_owned(),
            (_, _, Locale::De) => "Derzeit nicht vorrätig".to_owned(),
            (_, _, Locale::En) => "Currently out of stock".to_owned(),
        };

        Self {
            should_show: true,
            state: Some(state),
            expected_date,
            label: Some(label),
        }
    }
}
