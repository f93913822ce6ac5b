//! HTML bodies for hover and search popups.

use std::fmt::Write;

use catalog::{HistoricalEvent, SearchPayload, SearchResult};
use foundation::time::Year;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Hover popup for a region of a layer.
pub fn hover_html(layer_name: &str, region: &str, year: Year, events: &[&HistoricalEvent]) -> String {
    let mut html = format!(
        "<div class=\"hover-popup\"><h4>{}</h4><p class=\"layer\">{}</p>",
        escape_html(region),
        escape_html(layer_name)
    );
    if events.is_empty() {
        let _ = write!(html, "<p class=\"empty\">No recorded events near {year}</p>");
    } else {
        html.push_str("<ul>");
        for e in events {
            let _ = write!(
                html,
                "<li><strong>{}</strong> ({}) {}</li>",
                escape_html(&e.title),
                e.year,
                escape_html(&e.summary)
            );
        }
        html.push_str("</ul>");
    }
    html.push_str("</div>");
    html
}

/// Search popup; each result kind has its own template.
pub fn search_html(result: &SearchResult) -> String {
    match &result.payload {
        SearchPayload::Location(l) => {
            let population = l
                .population
                .map(|p| format!("<p>Population: {p}</p>"))
                .unwrap_or_default();
            format!(
                "<div class=\"search-popup location\"><h3>{}</h3><p>{}</p>{population}<p>{}</p></div>",
                escape_html(&l.name),
                escape_html(&l.country),
                escape_html(&l.summary)
            )
        }
        SearchPayload::Event(e) => format!(
            "<div class=\"search-popup event\"><h3>{}</h3><p class=\"year\">{}</p><p class=\"category\">{}</p><p>{}</p></div>",
            escape_html(&e.title),
            e.year,
            escape_html(&e.category),
            escape_html(&e.summary)
        ),
        SearchPayload::Person(p) => {
            let lifespan = match p.died {
                Some(d) => format!("{}-{}", p.born, d),
                None => format!("b. {}", p.born),
            };
            format!(
                "<div class=\"search-popup person\"><h3>{}</h3><p>{lifespan}</p><p>{}, {}</p><p>{}</p></div>",
                escape_html(&p.name),
                escape_html(&p.field),
                escape_html(&p.birthplace),
                escape_html(&p.summary)
            )
        }
        SearchPayload::Invention(i) => format!(
            "<div class=\"search-popup invention\"><h3>{}</h3><p>{} ({}, {})</p><p>{}</p></div>",
            escape_html(&i.name),
            i.year,
            escape_html(&i.inventor),
            escape_html(&i.country),
            escape_html(&i.summary)
        ),
    }
}
