//! Custom views bundled with the workspace, registered by
//! [`PluginRegistry::with_builtin_plugins`](super::PluginRegistry::with_builtin_plugins).

mod text_analyzer;
mod weather;

pub use text_analyzer::{Sentiment, TextAnalysis, TextAnalyzerView, analyze};
pub use weather::{WeatherReading, WeatherView};
