use foundation::bounds::LngLat;
use foundation::time::Year;
use serde::{Deserialize, Serialize};

use crate::events::HistoricalEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub born: Year,
    pub died: Option<Year>,
    pub field: String,
    pub birthplace: String,
    pub location: LngLat,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invention {
    pub name: String,
    pub year: Year,
    pub inventor: String,
    pub country: String,
    pub location: LngLat,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub country: String,
    pub location: LngLat,
    pub population: Option<u64>,
    pub summary: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Location,
    Event,
    Person,
    Invention,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SearchPayload {
    Location(Location),
    Event(HistoricalEvent),
    Person(Person),
    Invention(Invention),
}

/// A single search hit ready to be placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub coordinates: LngLat,
    #[serde(flatten)]
    pub payload: SearchPayload,
}

impl SearchResult {
    pub fn kind(&self) -> SearchKind {
        match self.payload {
            SearchPayload::Location(_) => SearchKind::Location,
            SearchPayload::Event(_) => SearchKind::Event,
            SearchPayload::Person(_) => SearchKind::Person,
            SearchPayload::Invention(_) => SearchKind::Invention,
        }
    }

    pub fn title(&self) -> &str {
        match &self.payload {
            SearchPayload::Location(l) => &l.name,
            SearchPayload::Event(e) => &e.title,
            SearchPayload::Person(p) => &p.name,
            SearchPayload::Invention(i) => &i.name,
        }
    }

    fn body(&self) -> &str {
        match &self.payload {
            SearchPayload::Location(l) => &l.summary,
            SearchPayload::Event(e) => &e.summary,
            SearchPayload::Person(p) => &p.summary,
            SearchPayload::Invention(i) => &i.summary,
        }
    }
}

impl From<&Location> for SearchResult {
    fn from(l: &Location) -> Self {
        Self {
            coordinates: l.location,
            payload: SearchPayload::Location(l.clone()),
        }
    }
}

impl From<&HistoricalEvent> for SearchResult {
    fn from(e: &HistoricalEvent) -> Self {
        Self {
            coordinates: e.location,
            payload: SearchPayload::Event(e.clone()),
        }
    }
}

impl From<&Person> for SearchResult {
    fn from(p: &Person) -> Self {
        Self {
            coordinates: p.location,
            payload: SearchPayload::Person(p.clone()),
        }
    }
}

impl From<&Invention> for SearchResult {
    fn from(i: &Invention) -> Self {
        Self {
            coordinates: i.location,
            payload: SearchPayload::Invention(i.clone()),
        }
    }
}

/// Match rank; lower is better. `None` when the query does not match.
fn rank(result: &SearchResult, needle: &str) -> Option<u8> {
    let title = result.title().to_lowercase();
    if title == needle {
        Some(0)
    } else if title.starts_with(needle) {
        Some(1)
    } else if title.contains(needle) {
        Some(2)
    } else if result.body().to_lowercase().contains(needle) {
        Some(3)
    } else {
        None
    }
}

/// Case-insensitive search over candidates in the given order.
///
/// Results are ordered by match rank, ties keep candidate order.
pub fn search<I>(candidates: I, query: &str, limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = SearchResult>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<(u8, SearchResult)> = candidates
        .into_iter()
        .filter_map(|r| rank(&r, &needle).map(|k| (k, r)))
        .collect();
    hits.sort_by_key(|(k, _)| *k);
    hits.into_iter().take(limit).map(|(_, r)| r).collect()
}
