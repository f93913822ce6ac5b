use foundation::bounds::LngLat;
use foundation::time::{Year, YearSpan};
use serde::{Deserialize, Serialize};

/// Years either side of the target searched before falling back to any year.
pub const NEARBY_WINDOW_YEARS: u32 = 10;

/// Maximum events returned for one hover lookup.
pub const MAX_HOVER_EVENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub id: String,
    pub title: String,
    pub year: Year,
    pub region: String,
    pub location: LngLat,
    pub category: String,
    pub summary: String,
}

/// Events for `region` most relevant to `year`.
///
/// Tiers are tried in order and the first non-empty tier wins:
/// exact year, nearest within [`NEARBY_WINDOW_YEARS`], nearest at any distance.
/// Within a tier events are ordered by distance, then list order.
pub fn most_relevant<'a>(
    events: &'a [HistoricalEvent],
    region: &str,
    year: Year,
    limit: usize,
) -> Vec<&'a HistoricalEvent> {
    let in_region: Vec<&HistoricalEvent> = events
        .iter()
        .filter(|e| e.region.eq_ignore_ascii_case(region))
        .collect();

    let exact: Vec<&HistoricalEvent> = in_region
        .iter()
        .copied()
        .filter(|e| e.year == year)
        .take(limit)
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let window = YearSpan::around(year, NEARBY_WINDOW_YEARS);
    let nearby = nearest(
        in_region.iter().copied().filter(|e| window.contains(e.year)),
        year,
        limit,
    );
    if !nearby.is_empty() {
        return nearby;
    }

    nearest(in_region.into_iter(), year, limit)
}

fn nearest<'a>(
    events: impl Iterator<Item = &'a HistoricalEvent>,
    year: Year,
    limit: usize,
) -> Vec<&'a HistoricalEvent> {
    let mut v: Vec<&HistoricalEvent> = events.collect();
    // Stable: equal distances keep list order.
    v.sort_by_key(|e| e.year.distance(year));
    v.truncate(limit);
    v
}
