// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Month;

use crate::model::MoveDetails;
use crate::validation::parse_date;

const AUSTIN_METRO_PREFIXES: [&str; 2] = ["786", "787"];
const FLEXIBLE_DATE_PERCENT: i64 = 90;
const MONTH_END_SURCHARGE_PERCENT: i64 = 10;
const MONTH_END_FIRST_DAY: u8 = 25;
const ROUND_TO_CENTS: i64 = 10_00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBand {
    Local,
    Regional,
    LongDistance,
}

impl DistanceBand {
    pub fn classify(from_zip: &str, to_zip: Option<&str>) -> Self {
        let Some(to_zip) = to_zip else {
            return Self::Local;
        };
        let austin = |zip: &str| AUSTIN_METRO_PREFIXES.iter().any(|prefix| zip.starts_with(prefix));
        let texas = |zip: &str| {
            zip.get(..2)
                .and_then(|prefix| prefix.parse::<u8>().ok())
                .is_some_and(|prefix| (75..=79).contains(&prefix))
        };

        if austin(from_zip) && austin(to_zip) {
            Self::Local
        } else if texas(from_zip) && texas(to_zip) {
            Self::Regional
        } else {
            Self::LongDistance
        }
    }

    pub const fn percent(self) -> i64 {
        match self {
            Self::Local => 100,
            Self::Regional => 180,
            Self::LongDistance => 350,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Regional => "regional",
            Self::LongDistance => "long distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Standard,
    Peak,
}

impl Season {
    pub fn for_month(month: Month) -> Self {
        match month {
            Month::May | Month::June | Month::July | Month::August | Month::September => {
                Self::Peak
            }
            _ => Self::Standard,
        }
    }

    pub const fn percent(self) -> i64 {
        match self {
            Self::Standard => 100,
            Self::Peak => 120,
        }
    }
}

fn base_range_cents(home_size: &str) -> Option<(i64, i64)> {
    match home_size {
        "studio" => Some((300_00, 600_00)),
        "one_bedroom" => Some((400_00, 800_00)),
        "two_bedroom" => Some((700_00, 1_300_00)),
        "three_bedroom" => Some((1_100_00, 2_000_00)),
        "four_plus" => Some((1_600_00, 3_200_00)),
        "office" => Some((1_200_00, 2_800_00)),
        _ => None,
    }
}

fn item_surcharge_cents(item: &str) -> i64 {
    match item {
        "piano" => 350_00,
        "pool_table" => 300_00,
        "safe" => 250_00,
        "hot_tub" => 500_00,
        "artwork" | "antiques" => 150_00,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEstimate {
    pub low_cents: i64,
    pub high_cents: i64,
    pub distance: DistanceBand,
    pub season: Season,
}

impl MoveEstimate {
    /// Rough price range from the move details, or `None` without an origin
    /// ZIP and a known home size.
    pub fn from_details(details: &MoveDetails) -> Option<Self> {
        let from_zip = details.from_zip.as_deref()?;
        let (base_low, base_high) = base_range_cents(details.home_size.as_deref()?)?;
        let distance = DistanceBand::classify(from_zip, details.to_zip.as_deref());

        let date = details
            .move_date
            .as_deref()
            .and_then(|raw| parse_date(raw).ok());
        let season = date.map_or(Season::Standard, |date| Season::for_month(date.month()));
        let month_end = date.is_some_and(|date| date.day() >= MONTH_END_FIRST_DAY);

        let items: i64 = details
            .special_items
            .iter()
            .map(|item| item_surcharge_cents(item))
            .sum();

        let scale = |cents: i64| {
            let mut value = cents * distance.percent() / 100 * season.percent() / 100;
            if month_end {
                value += value * MONTH_END_SURCHARGE_PERCENT / 100;
            }
            value += items;
            if details.flexible_date {
                value = value * FLEXIBLE_DATE_PERCENT / 100;
            }
            round_cents(value)
        };

        Some(Self {
            low_cents: scale(base_low),
            high_cents: scale(base_high),
            distance,
            season,
        })
    }

    pub fn display_range(&self) -> String {
        format!(
            "{} - {}",
            format_whole_dollars(self.low_cents),
            format_whole_dollars(self.high_cents)
        )
    }
}

fn round_cents(cents: i64) -> i64 {
    (cents + ROUND_TO_CENTS / 2) / ROUND_TO_CENTS * ROUND_TO_CENTS
}

pub fn format_whole_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${}", comma_format(cents.unsigned_abs() / 100))
}

fn comma_format(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}
