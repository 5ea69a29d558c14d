use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use shared::{domain::SortOrder, protocol::MediaItem};

/// Camera EXIF timestamp layout, e.g. `2025:05:31 03:07:18`.
const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const UNKNOWN_DATE_TITLE: &str = "Unknown date";

pub trait Timestamped {
    fn sort_timestamp(&self) -> Option<&str>;
}

impl Timestamped for MediaItem {
    fn sort_timestamp(&self) -> Option<&str> {
        MediaItem::sort_timestamp(self)
    }
}

impl<T: Timestamped> Timestamped for &T {
    fn sort_timestamp(&self) -> Option<&str> {
        (**self).sort_timestamp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayKey {
    Day(NaiveDate),
    /// Missing or unparseable timestamp.
    Unknown,
}

impl DayKey {
    pub fn id(&self) -> String {
        match self {
            Self::Day(date) => date.format("%Y-%m-%d").to_string(),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

/// A contiguous run of items sharing one day key.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySection<'a, T> {
    pub key: DayKey,
    pub title: String,
    pub items: Vec<&'a T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedLayout<'a, T> {
    Sections(Vec<DaySection<'a, T>>),
    Flat(Vec<&'a T>),
}

pub struct DaySectionBuilder<Tz: TimeZone> {
    tz: Tz,
    current_year: i32,
}

impl DaySectionBuilder<Local> {
    pub fn local() -> Self {
        Self {
            tz: Local,
            current_year: Local::now().year(),
        }
    }
}

impl Default for DaySectionBuilder<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> DaySectionBuilder<Tz> {
    pub fn new(tz: Tz, current_year: i32) -> Self {
        Self { tz, current_year }
    }

    /// RFC 3339 (with or without fractional seconds) first, then the EXIF
    /// layout interpreted in the builder's time zone.
    pub fn parse_timestamp(&self, raw: &str) -> Option<DateTime<Tz>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&self.tz));
        }
        let naive = NaiveDateTime::parse_from_str(raw, EXIF_FORMAT).ok()?;
        self.tz.from_local_datetime(&naive).earliest()
    }

    /// An EXIF time that does not exist locally (a daylight-saving gap)
    /// still keeps its calendar day.
    pub fn day_key(&self, raw: Option<&str>) -> DayKey {
        let Some(raw) = raw else {
            return DayKey::Unknown;
        };
        if let Some(parsed) = self.parse_timestamp(raw) {
            return DayKey::Day(parsed.date_naive());
        }
        NaiveDateTime::parse_from_str(raw.trim(), EXIF_FORMAT)
            .map(|naive| DayKey::Day(naive.date()))
            .unwrap_or(DayKey::Unknown)
    }

    pub fn title(&self, key: DayKey) -> String {
        match key {
            DayKey::Unknown => UNKNOWN_DATE_TITLE.to_string(),
            DayKey::Day(date) if date.year() == self.current_year => {
                date.format("%b %d").to_string()
            }
            DayKey::Day(date) => date.format("%b %d, %Y").to_string(),
        }
    }

    /// Splits `items` into runs of consecutive items on the same day.
    ///
    /// A day that reappears after a different one starts a new section.
    pub fn build<'a, T: Timestamped>(&self, items: &'a [T]) -> Vec<DaySection<'a, T>> {
        let mut sections: Vec<DaySection<'a, T>> = Vec::new();
        for item in items {
            let key = self.day_key(item.sort_timestamp());
            match sections.last_mut() {
                Some(section) if section.key == key => section.items.push(item),
                _ => sections.push(DaySection {
                    key,
                    title: self.title(key),
                    items: vec![item],
                }),
            }
        }
        sections
    }

    /// Day sections for chronological feeds, one flat run otherwise.
    pub fn layout_for_sort<'a, T: Timestamped>(
        &self,
        items: &'a [T],
        sort: SortOrder,
    ) -> FeedLayout<'a, T> {
        if sort.is_chronological() {
            FeedLayout::Sections(self.build(items))
        } else {
            FeedLayout::Flat(items.iter().collect())
        }
    }
}

#[cfg(test)]
#[path = "tests/sections_tests.rs"]
mod tests;
