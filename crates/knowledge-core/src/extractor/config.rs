use serde::{Deserialize, Serialize};

/// A topic and the keywords that trigger it. Keywords are matched as
/// lower-case substrings of the user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Topic {
    pub fn new<S: Into<String>>(name: impl Into<String>, keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }
}

/// Keyword and header tables for the relevance extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractorConfig {
    pub topics: Vec<Topic>,

    /// Lines containing any of these phrases (case-insensitive) open a
    /// captured block.
    pub section_headers: Vec<String>,

    /// Upper bound, in characters, on the extracted text. Also the length
    /// of the prefix returned when nothing relevant is found. Default: 3000.
    pub max_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            topics: vec![
                Topic::new(
                    "integration",
                    ["integrate", "integration", "install", "setup", "set up", "configure", "embed"],
                ),
                Topic::new("forms", ["form", "field", "submission", "capture"]),
                Topic::new("chat", ["chat", "widget", "bot", "assistant", "conversation"]),
                Topic::new("api", ["api", "endpoint", "webhook", "token", "api key"]),
                Topic::new(
                    "pricing",
                    ["price", "pricing", "plan", "cost", "subscription", "billing", "free trial"],
                ),
                Topic::new(
                    "support",
                    ["support", "help", "problem", "error", "bug", "not working", "contact"],
                ),
            ],
            section_headers: vec![
                "main features".to_string(),
                "implementation".to_string(),
                "how to install".to_string(),
                "available plans".to_string(),
                "pricing".to_string(),
                "technical support".to_string(),
            ],
            max_chars: 3000,
        }
    }
}

impl ExtractorConfig {
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topics.push(topic);
        self
    }

    pub fn with_section_header(mut self, header: impl Into<String>) -> Self {
        self.section_headers.push(header.into());
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}
