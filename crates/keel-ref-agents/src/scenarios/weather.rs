//! Handler 1: Weather Agent
//!
//! A plain-text agent with two tools. For a question about several places
//! the model first geocodes every place, then asks for the weather at each
//! pair of coordinates, then answers in one sentence.
//!
//! Steps recorded for "Tokyo and Los Angeles":
//!
//! ```text
//! model:0 → tool:0:get_lat_lng → tool:1:get_lat_lng
//! model:1 → tool:2:get_weather → tool:3:get_weather
//! model:2 (final answer)
//! ```
//!
//! The run is then replayed from its snapshot with a model that would fail if
//! asked anything, which shows that a completed run costs no further model or
//! tool calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use keel_codec::Typed;
use keel_config::RuntimeConfig;
use keel_contracts::{
    error::KeelResult,
    model::{ModelRequest, ModelResponse, ProviderError, ProviderErrorKind},
    tool::ToolError,
};
use keel_core::{Agent, DurableContext, FnTool, ModelProvider, Tool};
use keel_journal::InMemoryJournal;

use crate::{
    mock_data::{geocode, realtime_weather, weather_code_description},
    scenarios::{demo_journal, print_journal, runtime_config, skip_sleep},
    scripted::{call, returns_of, text, tool_rounds, user_prompt, FnModel},
};

pub const EXAMPLE_QUESTION: &str = "What is the weather like in Tokyo and Los Angeles?";

// ── Dependencies and records ──────────────────────────────────────────────────

/// API keys for the geocoding and weather services. Without a key the tool
/// answers with fixed placeholder data.
#[derive(Debug, Clone, Default)]
pub struct WeatherDeps {
    pub geo_api_key: Option<String>,
    pub weather_api_key: Option<String>,
}

impl WeatherDeps {
    pub fn with_keys() -> Self {
        Self {
            geo_api_key: Some("geo-demo-key".to_string()),
            weather_api_key: Some("weather-demo-key".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl Typed for LatLng {
    fn type_name() -> String {
        "lat_lng".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["lat", "lng"],
            "properties": {
                "lat": { "type": "number", "minimum": -90, "maximum": 90 },
                "lng": { "type": "number", "minimum": -180, "maximum": 180 }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature: String,
    pub description: String,
}

impl Typed for Weather {
    fn type_name() -> String {
        "weather".to_string()
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "required": ["temperature", "description"],
            "properties": {
                "temperature": { "type": "string" },
                "description": { "type": "string" }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct LocationArgs {
    location_description: String,
}

// ── Tools ─────────────────────────────────────────────────────────────────────

pub fn get_lat_lng() -> impl Tool<WeatherDeps> {
    FnTool::new(
        "get_lat_lng",
        "Get the latitude and longitude of a location.",
        json!({
            "type": "object",
            "required": ["location_description"],
            "properties": {
                "location_description": {
                    "type": "string",
                    "description": "A description of a location."
                }
            }
        }),
        |deps: &WeatherDeps, args: LocationArgs| -> Result<LatLng, ToolError> {
            if args.location_description.trim().is_empty() {
                return Err(ToolError::terminal("location description is empty"));
            }
            if deps.geo_api_key.is_none() {
                return Ok(LatLng { lat: 51.1, lng: -0.1 });
            }
            let (lat, lng) = geocode(&args.location_description);
            Ok(LatLng { lat, lng })
        },
    )
}

pub fn get_weather() -> impl Tool<WeatherDeps> {
    FnTool::new(
        "get_weather",
        "Get the weather at a location.",
        LatLng::json_schema(),
        |deps: &WeatherDeps, at: LatLng| -> Result<Weather, ToolError> {
            if deps.weather_api_key.is_none() {
                return Ok(Weather {
                    temperature: "21 °C".to_string(),
                    description: "Sunny".to_string(),
                });
            }
            let (temperature, code) = realtime_weather(at.lat, at.lng);
            Ok(Weather {
                temperature: format!("{temperature:.0}°C"),
                description: weather_code_description(code).to_string(),
            })
        },
    )
}

// ── Scripted model ────────────────────────────────────────────────────────────

/// The places named in a question such as "... in Tokyo and Los Angeles?".
pub fn places_in(question: &str) -> Vec<String> {
    let tail = question
        .rsplit_once(" in ")
        .map(|(_, tail)| tail)
        .unwrap_or(question);
    tail.trim_end_matches(['?', '.', '!'])
        .split(" and ")
        .flat_map(|part| part.split(','))
        .map(str::trim)
        .filter(|place| !place.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn weather_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|request: &ModelRequest| {
        let places = places_in(user_prompt(request));
        match tool_rounds(request) {
            0 => Ok(ModelResponse::ToolCalls {
                calls: places
                    .iter()
                    .enumerate()
                    .map(|(i, place)| {
                        call(0, i, "get_lat_lng", json!({ "location_description": place }))
                    })
                    .collect(),
            }),
            1 => Ok(ModelResponse::ToolCalls {
                calls: returns_of(request, "get_lat_lng")
                    .iter()
                    .enumerate()
                    .map(|(i, ret)| call(1, i, "get_weather", ret.content.clone()))
                    .collect(),
            }),
            _ => {
                let reports: Vec<String> = returns_of(request, "get_weather")
                    .iter()
                    .zip(&places)
                    .map(|(ret, place)| {
                        format!(
                            "{} and {} in {}",
                            ret.content["temperature"].as_str().unwrap_or("?"),
                            ret.content["description"]
                                .as_str()
                                .unwrap_or("unknown")
                                .to_lowercase(),
                            place
                        )
                    })
                    .collect();
                Ok(text(format!("It is {}.", reports.join(", and "))))
            }
        }
    })
}

/// A model for replays of completed runs: any request is a bug.
fn unreachable_model(
) -> FnModel<impl Fn(&ModelRequest) -> Result<ModelResponse, ProviderError> + Send + Sync> {
    FnModel::new(|_: &ModelRequest| {
        Err(ProviderError::new(
            ProviderErrorKind::InvalidRequest,
            "a completed run must not reach the model",
        ))
    })
}

// ── Handler ───────────────────────────────────────────────────────────────────

pub fn weather_agent(
    config: &RuntimeConfig,
    provider: Arc<dyn ModelProvider>,
) -> KeelResult<Agent<WeatherDeps, String>> {
    let descriptor = config
        .descriptor::<WeatherDeps, String>("weather")?
        .with_tool(get_lat_lng())
        .with_tool(get_weather());
    Ok(Agent::new(descriptor, provider))
}

/// Answer a weather question inside the run owned by `ctx`.
pub fn handle(
    ctx: &dyn DurableContext,
    agent: &Agent<WeatherDeps, String>,
    deps: &WeatherDeps,
    question: &str,
) -> KeelResult<String> {
    Ok(agent.run(ctx, question, deps)?.output)
}

/// Run Handler 1: Weather Agent.
pub fn run_scenario() -> KeelResult<()> {
    println!("=== Handler 1: Weather Agent ===");
    println!();

    let config = runtime_config()?;
    let deps = WeatherDeps::with_keys();

    let model = Arc::new(weather_model());
    let agent = weather_agent(&config, model.clone())?;
    let journal = demo_journal("weather-run");

    println!("  Question: {EXAMPLE_QUESTION}");
    let answer = handle(&journal, &agent, &deps, EXAMPLE_QUESTION)?;
    println!("  Answer:   {answer}");
    println!("  Model requests: {}", model.calls());
    println!();
    print_journal(&journal);
    println!();

    // ── Replay the completed run ──────────────────────────────────────────────

    let replay_model = Arc::new(unreachable_model());
    let replay_agent = weather_agent(&config, replay_model.clone())?;
    let replay = InMemoryJournal::resume(journal.export_snapshot()?)?.with_sleeper(skip_sleep);
    let replayed = handle(&replay, &replay_agent, &deps, EXAMPLE_QUESTION)?;

    println!("  Replayed answer: {replayed}");
    println!(
        "  Same answer: {}   model requests during replay: {}",
        if replayed == answer { "YES" } else { "NO" },
        replay_model.calls()
    );
    println!();
    println!("  Handler 1 complete.");
    println!();

    journal.finalize()
}
