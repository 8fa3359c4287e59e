//! Weather lookup tool backed by the wttr.in JSON API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ToolError, ToolSpec, required_str};

const WTTR_BASE_URL: &str = "https://wttr.in";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Looks up current conditions for a free-text location name.
pub struct WeatherTool {
    http_client: reqwest::Client,
    base_url: String,
}

impl WeatherTool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(WTTR_BASE_URL)
    }

    /// Point the tool at a different endpoint (used by tests).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, location: &str) -> Result<Value> {
        let url = format!("{}/{location}?format=j1", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status}");
        }

        let payload: Value = response.json().await.context("invalid weather payload")?;
        normalize_report(location, &payload)
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSpec for WeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Look up real-time weather for a city, including temperature, \
         condition and humidity. Requires a city name, e.g. Paris, Beijing \
         or San Francisco."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name, e.g. Beijing, Shanghai, San Francisco"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let location = required_str(&input, "location")?;
        self.fetch(location).await.map_err(|err| {
            ToolError::execution_failed(format!("weather lookup failed for {location}: {err:#}"))
        })
    }
}

/// Map the wttr.in `current_condition` block into the normalized result
/// schema expected by the chat client.
fn normalize_report(location: &str, payload: &Value) -> Result<Value> {
    let current = payload
        .get("current_condition")
        .and_then(Value::as_array)
        .and_then(|conditions| conditions.first())
        .context("missing current_condition")?;

    fn field<'a>(current: &'a Value, key: &str) -> Result<&'a str> {
        current
            .get(key)
            .and_then(Value::as_str)
            .with_context(|| format!("missing field {key}"))
    }

    let condition = current
        .get("weatherDesc")
        .and_then(Value::as_array)
        .and_then(|descs| descs.first())
        .and_then(|desc| desc.get("value"))
        .and_then(Value::as_str)
        .context("missing weatherDesc")?;

    Ok(json!({
        "location": location,
        "temperature": format!("{}°C", field(current, "temp_C")?),
        "feels_like": format!("{}°C", field(current, "FeelsLikeC")?),
        "condition": condition,
        "humidity": format!("{}%", field(current, "humidity")?),
        "wind_speed": format!("{} km/h", field(current, "windspeedKmph")?),
        "wind_direction": field(current, "winddir16Point")?,
        "pressure": format!("{} mb", field(current, "pressure")?),
        "visibility": format!("{} km", field(current, "visibility")?),
        "uv_index": field(current, "uvIndex")?,
    }))
}
