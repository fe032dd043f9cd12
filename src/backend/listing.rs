use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::sequence::Entry;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    #[serde(alias = "PhotoUrl")]
    pub photo_url: Option<String>,
    #[serde(alias = "PhotoDateUtc")]
    pub photo_date_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotosResponse {
    #[serde(alias = "Response")]
    response: Option<PhotoPage>,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    #[serde(alias = "Photos")]
    photos: Option<Vec<Photo>>,
}

/// Inclusive time-of-day range a photo must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            start: NaiveTime::parse_from_str(start, "%H:%M")?,
            end: NaiveTime::parse_from_str(end, "%H:%M")?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

pub fn parse_listing(text: &str) -> Result<Vec<Photo>, serde_json::Error> {
    let response: PhotosResponse = serde_json::from_str(text)?;
    Ok(response
        .response
        .and_then(|page| page.photos)
        .unwrap_or_default())
}

/// Parses a listing timestamp, taking naive timestamps as UTC.
pub fn parse_photo_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Keeps the earliest in-window photo of each calendar day in `tz`,
/// oldest day first.
pub fn daily_entries<Tz: TimeZone>(photos: Vec<Photo>, window: &TimeWindow, tz: &Tz) -> Vec<Entry> {
    let mut days: BTreeMap<NaiveDate, (DateTime<Utc>, String)> = BTreeMap::new();

    for photo in photos {
        let (Some(url), Some(raw)) = (photo.photo_url, photo.photo_date_utc) else {
            continue;
        };
        let Some(taken) = parse_photo_date(&raw) else {
            continue;
        };
        let local = taken.with_timezone(tz);
        if !window.contains(local.time()) {
            continue;
        }
        let day = local.date_naive();
        match days.get(&day) {
            Some((earliest, _)) if *earliest <= taken => {}
            _ => {
                days.insert(day, (taken, url));
            }
        }
    }

    days.into_iter()
        .map(|(day, (_, url))| Entry {
            locator: url,
            label: day.format("%Y-%m-%d").to_string(),
        })
        .collect()
}
