use super::*;

use chrono::Utc;

fn stamped(id: &str, timestamp: Option<&str>) -> MediaItem {
    let mut item = MediaItem::new(id, format!("/{id}.jpg"));
    item.datetime_original = timestamp.map(str::to_string);
    item
}

fn builder() -> DaySectionBuilder<Utc> {
    DaySectionBuilder::new(Utc, 2025)
}

fn section_ids<'a>(sections: &[DaySection<'a, MediaItem>]) -> Vec<Vec<&'a str>> {
    sections
        .iter()
        .map(|section| section.items.iter().map(|item| item.id.as_str()).collect())
        .collect()
}

fn day(y: i32, m: u32, d: u32) -> DayKey {
    DayKey::Day(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

#[test]
fn returning_day_starts_a_new_section() {
    let items = vec![
        stamped("a1", Some("2025:05:31 09:00:00")),
        stamped("a2", Some("2025:05:31 08:00:00")),
        stamped("b1", Some("2025:05:30 22:00:00")),
        stamped("a3", Some("2025:05:31 07:00:00")),
    ];

    let sections = builder().build(&items);

    assert_eq!(section_ids(&sections), [vec!["a1", "a2"], vec!["b1"], vec!["a3"]]);
    assert_eq!(sections[0].key, day(2025, 5, 31));
    assert_eq!(sections[1].key, day(2025, 5, 30));
    assert_eq!(sections[2].key, day(2025, 5, 31));
}

#[test]
fn malformed_timestamp_gets_its_own_unknown_run() {
    let items = vec![
        stamped("a1", Some("2025-05-31T10:00:00Z")),
        stamped("a2", Some("2025-05-31T09:00:00Z")),
        stamped("bad", Some("last tuesday")),
        stamped("b1", Some("2025-05-30T10:00:00Z")),
    ];

    let sections = builder().build(&items);

    assert_eq!(section_ids(&sections), [vec!["a1", "a2"], vec!["bad"], vec!["b1"]]);
    assert_eq!(sections[1].key, DayKey::Unknown);
    assert_eq!(sections[1].title, UNKNOWN_DATE_TITLE);
}

#[test]
fn contiguous_unknown_items_share_one_run() {
    let items = vec![
        stamped("n1", None),
        stamped("n2", Some("")),
        stamped("n3", Some("31/05/2025")),
        stamped("a1", Some("2025:05:31 09:00:00")),
        stamped("n4", None),
    ];

    let sections = builder().build(&items);

    assert_eq!(
        section_ids(&sections),
        [vec!["n1", "n2", "n3"], vec!["a1"], vec!["n4"]]
    );
    assert_eq!(sections[0].key.id(), "unknown");
}

#[test]
fn parses_all_supported_layouts() {
    let b = builder();
    assert_eq!(b.day_key(Some("2024-02-29T23:59:59.123Z")), day(2024, 2, 29));
    assert_eq!(b.day_key(Some("2024-02-29T12:00:00+00:00")), day(2024, 2, 29));
    assert_eq!(b.day_key(Some("2024:02:29 12:00:00")), day(2024, 2, 29));
    assert_eq!(b.day_key(Some("2024-02-29")), DayKey::Unknown);
    assert_eq!(b.day_key(None), DayKey::Unknown);
}

#[test]
fn offsets_are_converted_to_the_builder_time_zone() {
    let b = builder();
    assert_eq!(b.day_key(Some("2025-05-31T23:30:00-02:00")), day(2025, 6, 1));
}

#[test]
fn exif_timestamps_are_read_in_the_builder_time_zone() {
    let plus_nine = chrono::FixedOffset::east_opt(9 * 3600).expect("offset");
    let b = DaySectionBuilder::new(plus_nine, 2025);
    assert_eq!(b.day_key(Some("2025:05:31 03:07:18")), day(2025, 5, 31));
    assert_eq!(b.day_key(Some("2025-05-30T20:00:00Z")), day(2025, 5, 31));
}

#[test]
fn titles_omit_the_current_year() {
    let b = builder();
    assert_eq!(b.title(day(2025, 5, 31)), "May 31");
    assert_eq!(b.title(day(2024, 5, 31)), "May 31, 2024");
    assert_eq!(b.title(day(2025, 1, 5)), "Jan 05");
    assert_eq!(b.title(DayKey::Unknown), "Unknown date");
    assert_eq!(day(2024, 5, 31).id(), "2024-05-31");
}

#[test]
fn created_at_is_used_when_capture_time_is_missing() {
    let mut item = MediaItem::new("m", "/m.jpg");
    item.created_at = Some("2025-03-01T08:00:00Z".into());
    let items = vec![item];
    let sections = builder().build(&items);
    assert_eq!(sections[0].key, day(2025, 3, 1));
    assert_eq!(sections[0].title, "Mar 01");
}

#[test]
fn popularity_sort_is_not_sectioned() {
    let items = vec![
        stamped("a", Some("2025:05:31 09:00:00")),
        stamped("b", Some("2025:01:01 09:00:00")),
    ];
    let b = builder();

    match b.layout_for_sort(&items, SortOrder::Likes) {
        FeedLayout::Flat(flat) => assert_eq!(flat.len(), 2),
        FeedLayout::Sections(_) => panic!("likes order must not be sectioned"),
    }
    match b.layout_for_sort(&items, SortOrder::Date) {
        FeedLayout::Sections(sections) => assert_eq!(sections.len(), 2),
        FeedLayout::Flat(_) => panic!("date order must be sectioned"),
    }
}

#[test]
fn empty_input_has_no_sections() {
    let items: Vec<MediaItem> = Vec::new();
    assert!(builder().build(&items).is_empty());
}

/// A zone where 02:00..03:00 local time never happens.
#[derive(Debug, Clone, Copy)]
struct SkipsTwoAm;

fn one_hour_east() -> chrono::FixedOffset {
    chrono::FixedOffset::east_opt(3600).expect("offset")
}

impl TimeZone for SkipsTwoAm {
    type Offset = chrono::FixedOffset;

    fn from_offset(_offset: &chrono::FixedOffset) -> Self {
        SkipsTwoAm
    }

    fn offset_from_local_date(&self, _local: &NaiveDate) -> chrono::LocalResult<chrono::FixedOffset> {
        chrono::LocalResult::Single(one_hour_east())
    }

    fn offset_from_local_datetime(
        &self,
        local: &NaiveDateTime,
    ) -> chrono::LocalResult<chrono::FixedOffset> {
        use chrono::Timelike;
        if local.hour() == 2 {
            chrono::LocalResult::None
        } else {
            chrono::LocalResult::Single(one_hour_east())
        }
    }

    fn offset_from_utc_date(&self, _utc: &NaiveDate) -> chrono::FixedOffset {
        one_hour_east()
    }

    fn offset_from_utc_datetime(&self, _utc: &NaiveDateTime) -> chrono::FixedOffset {
        one_hour_east()
    }
}

#[test]
fn exif_time_in_a_skipped_hour_keeps_its_day() {
    let builder = DaySectionBuilder::new(SkipsTwoAm, 2025);
    assert!(builder.parse_timestamp("2025:03:30 02:30:00").is_none());
    assert_eq!(builder.day_key(Some("2025:03:30 02:30:00")), day(2025, 3, 30));
    assert_eq!(builder.day_key(Some("2025:03:30 04:30:00")), day(2025, 3, 30));
    assert_eq!(builder.day_key(Some("not a date")), DayKey::Unknown);
}
