//! ICS feed adapter.
//!
//! Downloads the personal feed and converts VEVENTs into the core's
//! `SourceEvent` type using the icalendar crate's parser. The rest of
//! the pipeline never sees the parser's native shapes.

use async_trait::async_trait;
use calmask_core::{CalMaskError, CalMaskResult, EventStatus, FeedSnapshot, FeedSource, SourceEvent};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};

pub struct IcsFeed {
    url: String,
    http: reqwest::Client,
}

impl IcsFeed {
    pub fn new(url: impl Into<String>) -> IcsFeed {
        IcsFeed {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FeedSource for IcsFeed {
    async fn fetch(&self) -> CalMaskResult<FeedSnapshot> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CalMaskError::FeedUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CalMaskError::FeedUnavailable(format!(
                "HTTP {} from feed",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CalMaskError::FeedUnavailable(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Parse raw ICS content into a feed snapshot.
///
/// A calendar that does not parse at all is `FeedUnavailable` (fatal
/// for the run). Individual VEVENTs with unparseable or all-day
/// timestamps are counted as skipped and the run continues.
pub fn parse_feed(content: &str) -> CalMaskResult<FeedSnapshot> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| CalMaskError::FeedUnavailable(format!("invalid calendar data: {e}")))?;

    let mut snapshot = FeedSnapshot::default();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_source_event(vevent) {
            Some(event) => snapshot.events.push(event),
            None => snapshot.skipped += 1,
        }
    }

    Ok(snapshot)
}

fn parse_source_event(vevent: &Component<'_>) -> Option<SourceEvent> {
    let uid = vevent.find_prop("UID").map(|p| p.val.to_string());
    let start = to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?)?;
    let end = to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTEND")?).ok()?)?;

    Some(SourceEvent {
        uid,
        start,
        end,
        status: source_status(vevent),
    })
}

/// Map STATUS and TRANSP onto the busy/free indicator. A missing
/// STATUS means confirmed; only opaque confirmed events end up busy.
fn source_status(vevent: &Component<'_>) -> EventStatus {
    match vevent.find_prop("STATUS").map(|p| p.val.to_string()).as_deref() {
        Some("CANCELLED") => EventStatus::Cancelled,
        Some("TENTATIVE") => EventStatus::Tentative,
        _ => {
            let transparent = vevent
                .find_prop("TRANSP")
                .map(|p| p.val.as_ref() == "TRANSPARENT")
                .unwrap_or(false);
            if transparent {
                EventStatus::Free
            } else {
                EventStatus::Busy
            }
        }
    }
}

/// Resolve an ICS timestamp to UTC.
///
/// Floating times are taken as UTC, matching how the feed exporter we
/// mirror emits them. All-day (date-only) values have no time range to
/// block and are skipped.
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(_) => None,
        DatePerhapsTime::DateTime(dt) => match dt {
            CalendarDateTime::Utc(dt) => Some(dt),
            CalendarDateTime::Floating(naive) => Some(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: Tz = tzid.parse().ok()?;
                tz.from_local_datetime(&date_time)
                    .earliest()
                    .map(|local| local.with_timezone(&Utc))
            }
        },
    }
}
