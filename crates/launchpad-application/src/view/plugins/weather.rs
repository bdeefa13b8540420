use crate::view::{AgentView, ViewContext};
use async_trait::async_trait;
use launchpad_core::error::{LaunchpadError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

const WEATHER_KEY: &str = "weather";

/// The reading persisted under `weather` in session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Degrees Fahrenheit.
    pub temperature: i64,
    pub condition: String,
    /// Relative humidity in percent, kept within 10..=100.
    pub humidity: i64,
    pub location: String,
}

impl Default for WeatherReading {
    fn default() -> Self {
        Self {
            temperature: 72,
            condition: "Partly Cloudy".into(),
            humidity: 40,
            location: "San Francisco".into(),
        }
    }
}

impl WeatherReading {
    /// Drifts temperature and humidity by at most two units each.
    pub fn jitter(&self, rng: &mut impl Rng) -> Self {
        Self {
            temperature: self.temperature + rng.gen_range(-2..=2),
            humidity: (self.humidity + rng.gen_range(-2..=2)).clamp(10, 100),
            ..self.clone()
        }
    }
}

pub struct WeatherView {
    ctx: ViewContext,
}

impl WeatherView {
    pub const KEY: &'static str = "weather-visualizer";

    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: ViewContext) -> Box<dyn AgentView> {
        Box::new(Self::new(ctx))
    }

    pub fn reading(&self) -> WeatherReading {
        self.ctx.read(WEATHER_KEY).unwrap_or_default()
    }

    pub fn refresh(&self) -> Result<WeatherReading> {
        let next = self.reading().jitter(&mut rand::thread_rng());
        self.ctx.write(WEATHER_KEY, &next)?;
        Ok(next)
    }

    pub fn set_location(&self, location: &str) -> Result<WeatherReading> {
        let location = location.trim();
        if location.is_empty() {
            return Err(LaunchpadError::invalid_input("location must not be empty"));
        }
        let next = WeatherReading {
            location: location.to_string(),
            ..self.reading()
        };
        self.ctx.write(WEATHER_KEY, &next)?;
        Ok(next)
    }
}

#[async_trait]
impl AgentView for WeatherView {
    fn kind(&self) -> &str {
        Self::KEY
    }

    fn render(&self) -> String {
        let r = self.reading();
        format!(
            "{}: {}°F, {}, humidity {}%",
            r.location, r.temperature, r.condition, r.humidity
        )
    }

    async fn handle_input(&mut self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("refresh") {
            self.refresh()?;
        } else if let Some(location) = input.strip_prefix("location ") {
            self.set_location(location)?;
        } else {
            return Err(LaunchpadError::invalid_input(
                "enter `refresh` or `location <name>`",
            ));
        }
        Ok(self.render())
    }
}
