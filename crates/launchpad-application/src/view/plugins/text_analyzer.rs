use crate::view::{AgentView, ViewContext};
use async_trait::async_trait;
use launchpad_core::error::{LaunchpadError, Result};
use serde::{Deserialize, Serialize};

const TEXT_KEY: &str = "text";
const ANALYSIS_KEY: &str = "analysis";
const WORDS_PER_MINUTE: usize = 200;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "love", "happy", "beautiful",
];
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "horrible", "disgusting", "angry", "sad", "disappointed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
    pub word_count: usize,
    pub character_count: usize,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub key_insights: Vec<String>,
    /// Minutes, rounded up.
    pub reading_time: usize,
}

/// Keyword-based text statistics.
pub fn analyze(text: &str) -> TextAnalysis {
    let words = text.split_whitespace().count();
    let characters = text.chars().count();
    let reading_time = words.div_ceil(WORDS_PER_MINUTE);

    let lower = text.to_lowercase();
    let hits = |list: &[&str]| list.iter().filter(|w| lower.contains(*w)).count();
    let (positive, negative) = (hits(POSITIVE_WORDS), hits(NEGATIVE_WORDS));
    let (sentiment, sentiment_score) = if positive > negative {
        (Sentiment::Positive, 0.7)
    } else if negative > positive {
        (Sentiment::Negative, -0.7)
    } else {
        (Sentiment::Neutral, 0.0)
    };

    let mut insights = Vec::new();
    if words > 100 {
        insights.push("Long-form content");
    }
    if words < 50 {
        insights.push("Concise content");
    }
    if text.contains('?') {
        insights.push("Contains questions");
    }
    if text.contains('!') {
        insights.push("Emphatic tone");
    }
    match sentiment {
        Sentiment::Positive => insights.push("Positive sentiment detected"),
        Sentiment::Negative => insights.push("Negative sentiment detected"),
        Sentiment::Neutral => {}
    }
    if reading_time > 2 {
        insights.push("Requires focused reading");
    }

    TextAnalysis {
        word_count: words,
        character_count: characters,
        sentiment,
        sentiment_score,
        key_insights: insights.into_iter().map(String::from).collect(),
        reading_time,
    }
}

pub struct TextAnalyzerView {
    ctx: ViewContext,
}

impl TextAnalyzerView {
    pub const KEY: &'static str = "text-analyzer";

    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: ViewContext) -> Box<dyn AgentView> {
        Box::new(Self::new(ctx))
    }

    pub fn analysis(&self) -> Option<TextAnalysis> {
        self.ctx.read(ANALYSIS_KEY)
    }

    /// Analyzes `text` and keeps both the text and the result in session state.
    pub fn submit(&self, text: &str) -> Result<TextAnalysis> {
        if text.trim().is_empty() {
            return Err(LaunchpadError::invalid_input("nothing to analyze"));
        }
        let analysis = analyze(text);
        self.ctx.write(TEXT_KEY, &text)?;
        self.ctx.write(ANALYSIS_KEY, &analysis)?;
        Ok(analysis)
    }

    pub fn reset(&self) -> Result<()> {
        self.ctx.remove(TEXT_KEY)?;
        self.ctx.remove(ANALYSIS_KEY)
    }
}

#[async_trait]
impl AgentView for TextAnalyzerView {
    fn kind(&self) -> &str {
        Self::KEY
    }

    fn render(&self) -> String {
        match self.analysis() {
            None => "Paste some text to analyze it.".to_string(),
            Some(a) => format!(
                "{} words, {} characters, ~{} min read, sentiment {:?} ({:+.1}){}",
                a.word_count,
                a.character_count,
                a.reading_time,
                a.sentiment,
                a.sentiment_score,
                if a.key_insights.is_empty() {
                    String::new()
                } else {
                    format!("\ninsights: {}", a.key_insights.join(", "))
                }
            ),
        }
    }

    async fn handle_input(&mut self, input: &str) -> Result<String> {
        if input.trim().eq_ignore_ascii_case("reset") {
            self.reset()?;
        } else {
            self.submit(input)?;
        }
        Ok(self.render())
    }
}
