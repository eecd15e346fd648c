//! Simulated external services for the reference handlers.
//!
//! All data in this module is hardcoded and fictional. No external systems
//! are contacted. It stands in for a geocoding API, a realtime weather API, a
//! web search API and the text a language model would write.

use serde_json::{json, Value};

// ── Geocoding (mock) ─────────────────────────────────────────────────────────

/// Look up the coordinates of a location description.
///
/// Known places match case-insensitively on a substring; anything else lands
/// on a fixed point in the ocean.
pub fn geocode(location_description: &str) -> (f64, f64) {
    let place = location_description.to_lowercase();
    let known: [(&str, f64, f64); 5] = [
        ("tokyo", 35.6764, 139.65),
        ("los angeles", 34.0522, -118.2437),
        ("london", 51.5072, -0.1276),
        ("oslo", 59.9139, 10.7522),
        ("nairobi", -1.2921, 36.8219),
    ];
    known
        .iter()
        .find(|(name, _, _)| place.contains(name))
        .map(|&(_, lat, lng)| (lat, lng))
        .unwrap_or((10.0, 20.0))
}

// ── Realtime weather (mock) ──────────────────────────────────────────────────

/// Apparent temperature (°C) and weather code at a location.
///
/// Deterministic in the coordinates so repeated runs agree.
pub fn realtime_weather(lat: f64, lng: f64) -> (f64, u32) {
    let temperature = (30.0 - lat.abs() * 0.4).round();
    let codes = [1000, 1101, 4200, 1001, 5100, 8000];
    let index = ((lat.abs() + lng.abs()) as usize) % codes.len();
    (temperature, codes[index])
}

/// Human-readable description of a weather code.
pub fn weather_code_description(code: u32) -> &'static str {
    match code {
        1000 => "Clear, Sunny",
        1100 => "Mostly Clear",
        1101 => "Partly Cloudy",
        1102 => "Mostly Cloudy",
        1001 => "Cloudy",
        2000 => "Fog",
        2100 => "Light Fog",
        4000 => "Drizzle",
        4001 => "Rain",
        4200 => "Light Rain",
        4201 => "Heavy Rain",
        5000 => "Snow",
        5001 => "Flurries",
        5100 => "Light Snow",
        5101 => "Heavy Snow",
        6000 => "Freezing Drizzle",
        6001 => "Freezing Rain",
        6200 => "Light Freezing Rain",
        6201 => "Heavy Freezing Rain",
        7000 => "Ice Pellets",
        7101 => "Heavy Ice Pellets",
        7102 => "Light Ice Pellets",
        8000 => "Thunderstorm",
        _ => "Unknown",
    }
}

// ── Web search (mock) ────────────────────────────────────────────────────────

/// Run a web search and return the raw API response body.
///
/// The response shape follows a typical search API: the query, a ranked list
/// of results with url/title/content/score, the response time in seconds and
/// a request id.
pub fn web_search(query: &str, todays_date: &str, max_results: usize) -> Value {
    let topics = [
        ("scores", "https://www.mlb.com/scores", "MLB Scores", "Final scores and box scores for every game played"),
        ("box", "https://www.espn.com/mlb/scoreboard", "MLB Scoreboard - ESPN", "Live and final box scores, with links to every game recap"),
        ("baseball", "https://www.baseball-reference.com/boxes/", "Box Scores | Baseball-Reference.com", "Daily box score index with batting and pitching lines"),
        ("news", "https://apnews.com/hub/mlb", "MLB News | AP", "Latest reporting from around the league"),
    ];

    let lowered = query.to_lowercase();
    let results: Vec<Value> = topics
        .iter()
        .filter(|(keyword, ..)| lowered.contains(keyword))
        .take(max_results)
        .enumerate()
        .map(|(rank, (_, url, title, content))| {
            json!({
                "url": format!("{url}?date={todays_date}"),
                "title": title,
                "content": format!("{content} ({todays_date})."),
                "score": 0.875 - 0.125 * rank as f64,
                "raw_content": null,
            })
        })
        .collect();

    json!({
        "query": query,
        "results": results,
        "response_time": 0.5,
        "request_id": format!("req-{:08x}", fold_hash(query)),
    })
}

fn fold_hash(s: &str) -> u32 {
    s.bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193))
}

// ── Prompt chaining (mock model output) ──────────────────────────────────────

pub const EXAMPLE_REPORT: &str = "Q3 Performance Summary:
Our customer satisfaction score rose to 92 points this quarter.
Revenue grew by 45% compared to last year.
Market share is now at 23% in our primary market.
Customer churn decreased to 5% from 8%.";

/// One `metric name: value` line per sentence that mentions a number.
///
/// Only the first number of a sentence is kept, so "decreased to 5% from 8%"
/// reports the current value.
pub fn extract_metric_lines(text: &str) -> String {
    let names = [
        ("satisfaction", "Customer Satisfaction"),
        ("revenue", "Revenue Growth"),
        ("market share", "Market Share"),
        ("churn", "Customer Churn"),
    ];

    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let value = line
                .split_whitespace()
                .map(|w| w.trim_matches(|c: char| c == '.' || c == ','))
                .find(|w| !w.is_empty() && metric_value(w).is_some())?;
            let lowered = line.to_lowercase();
            let name = names
                .iter()
                .find(|(keyword, _)| lowered.contains(keyword))
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| format!("Metric {}", i + 1));
            Some(format!("{name}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sort `name: value` lines by value, largest first.
pub fn sort_metric_lines(text: &str) -> String {
    let mut lines: Vec<(&str, f64)> = text
        .lines()
        .filter_map(|line| {
            let (_, value) = line.rsplit_once(':')?;
            Some((line.trim(), metric_value(value.trim())?))
        })
        .collect();
    lines.sort_by(|a, b| b.1.total_cmp(&a.1));
    lines
        .into_iter()
        .map(|(line, _)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `name: value` lines as a two-column markdown table.
pub fn markdown_table(text: &str) -> String {
    let mut table = String::from("| Metric Name | Value |\n|:------------|------:|");
    for line in text.lines() {
        if let Some((name, value)) = line.rsplit_once(':') {
            table.push_str(&format!("\n| {} | {} |", name.trim(), value.trim()));
        }
    }
    table
}

fn metric_value(word: &str) -> Option<f64> {
    word.trim_end_matches('%').parse::<f64>().ok()
}

// ── Lead generation (mock model output) ──────────────────────────────────────

pub const EXAMPLE_BUSINESS: &str = r#"{
  "company_name": "Larkspur Ledger",
  "what_we_do": "Bookkeeping software for independent restaurants that reconciles card settlements, delivery platform payouts and supplier invoices automatically.",
  "target_market": "Owners and finance leads of independent restaurants and small restaurant groups in Canada, English or French speaking."
}"#;

/// The free-form query plan a model would write for `EXAMPLE_BUSINESS`.
pub fn freeform_lead_plan() -> String {
    "Priority 1 - Owners and operators (decide and sign):
- restaurant owner Canada
- restaurateur independent restaurant Ontario
- propriétaire restaurant Québec

Priority 2 - Finance leads at restaurant groups:
- controller restaurant group Canada
- director of finance hospitality Toronto

Priority 3 - Influencers:
- general manager restaurant Vancouver
- restaurant bookkeeper Canada

Work the tiers in order, ten profiles per day."
        .to_string()
}

/// The structured form of `freeform_lead_plan`.
///
/// `complete = false` leaves out `usage_instructions`, the way a sloppy
/// first answer might.
pub fn structured_lead_plan(complete: bool) -> Value {
    let mut plan = json!({
        "company_context": "Larkspur Ledger sells automated bookkeeping to independent restaurants in Canada.",
        "total_tiers": 3,
        "priority_tiers": [
            {
                "tier_name": "Owners and operators",
                "tier_description": "They feel reconciliation pain directly and sign the contract.",
                "priority_level": 1,
                "queries": [
                    { "query": "restaurant owner Canada", "description": "Owners across Canada" },
                    { "query": "restaurateur independent restaurant Ontario", "description": "Independent owners in Ontario" },
                    { "query": "propriétaire restaurant Québec", "description": "French-speaking owners in Quebec" }
                ]
            },
            {
                "tier_name": "Finance leads",
                "tier_description": "Own the books at small restaurant groups.",
                "priority_level": 2,
                "queries": [
                    { "query": "controller restaurant group Canada", "description": "Group controllers" },
                    { "query": "director of finance hospitality Toronto", "description": "Hospitality finance directors" }
                ]
            },
            {
                "tier_name": "Influencers",
                "tier_description": "Use the tooling daily and recommend it upward.",
                "priority_level": 3,
                "queries": [
                    { "query": "general manager restaurant Vancouver", "description": "Restaurant general managers" },
                    { "query": "restaurant bookkeeper Canada", "description": "Freelance restaurant bookkeepers" }
                ]
            }
        ]
    });
    if complete {
        plan["usage_instructions"] = json!([
            "Work the tiers in priority order.",
            "Contact at most ten profiles per day.",
        ]);
    }
    plan
}
