//! Relevance extraction: trims a composed knowledge base to the parts a
//! user message is likely about.
//!
//! This is a keyword heuristic, not semantic search. It sits behind
//! [`RelevanceExtractor::extract`] so an embedding-based retriever can
//! replace it without touching callers.

pub mod config;

pub use config::{ExtractorConfig, Topic};

pub struct RelevanceExtractor {
    config: ExtractorConfig,
}

impl RelevanceExtractor {
    /// Keyword and header tables are lower-cased. A `max_chars` of zero is
    /// raised to one so a non-empty knowledge base never yields an empty
    /// excerpt.
    pub fn new(mut config: ExtractorConfig) -> Self {
        if config.max_chars == 0 {
            log::warn!("Extractor: max_chars = 0, using 1");
            config.max_chars = 1;
        }
        for topic in &mut config.topics {
            for keyword in &mut topic.keywords {
                *keyword = keyword.to_lowercase();
            }
        }
        for header in &mut config.section_headers {
            *header = header.to_lowercase();
        }
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Names of the topics whose keywords occur in `message`.
    pub fn matched_topics(&self, message: &str) -> Vec<&str> {
        let message = message.to_lowercase();
        self.config
            .topics
            .iter()
            .filter(|t| t.keywords.iter().any(|k| !k.is_empty() && message.contains(k.as_str())))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// A bounded excerpt of `knowledge_base` for `message`.
    ///
    /// When a topic triggers, returns the blocks opened by a section header
    /// line and closed by the next blank line. Otherwise, or when no block
    /// is found, returns the first `max_chars` characters.
    pub fn extract(&self, message: &str, knowledge_base: &str) -> String {
        let topics = self.matched_topics(message);
        if topics.is_empty() {
            return prefix(knowledge_base, self.config.max_chars).to_string();
        }

        let captured = capture_sections(knowledge_base, &self.config.section_headers);
        if captured.is_empty() {
            log::debug!(
                "Extractor: topics {:?} matched but no section found, using prefix",
                topics
            );
            return prefix(knowledge_base, self.config.max_chars).to_string();
        }

        log::debug!(
            "Extractor: topics {:?} captured {} chars",
            topics,
            captured.chars().count()
        );
        prefix(&captured, self.config.max_chars).to_string()
    }
}

impl Default for RelevanceExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Blocks starting at a header line and running to the first blank line,
/// joined by blank lines. `headers` must be lower-case.
fn capture_sections(text: &str, headers: &[String]) -> String {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        match current.take() {
            Some(mut block) => {
                if line.trim().is_empty() {
                    blocks.push(block);
                } else {
                    block.push(line);
                    current = Some(block);
                }
            }
            None => {
                let lower = line.to_lowercase();
                if headers.iter().any(|h| !h.is_empty() && lower.contains(h.as_str())) {
                    current = Some(vec![line]);
                }
            }
        }
    }
    blocks.extend(current);

    blocks
        .iter()
        .map(|b| b.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The first `max_chars` characters of `s`, cut on a char boundary.
fn prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
