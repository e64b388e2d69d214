use serde::{Deserialize, Serialize};

/// Type alias for tenant (integration) identifiers
pub type IntegrationId = i64;

/// A tenant's configured chatbot instance.
///
/// Owned by the persistence layer; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Integration {
    pub id: IntegrationId,

    /// Display name. Used in the identity block and closing instructions.
    pub name: String,

    /// The tenant's website.
    #[serde(default)]
    pub source_url: String,

    #[serde(default)]
    pub description: String,

    /// Persona / behavior prompt. None falls back to the default persona.
    #[serde(default)]
    pub behavior_instruction: Option<String>,

    /// Never rendered into the knowledge base.
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

impl Integration {
    pub fn new(id: IntegrationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source_url: String::new(),
            description: String::new(),
            behavior_instruction: None,
            api_key: String::new(),
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_behavior_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.behavior_instruction = Some(instruction.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// The behavior instruction, if present and not blank.
    pub fn persona(&self) -> Option<&str> {
        self.behavior_instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// An uploaded document belonging to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub display_name: String,
    /// Extracted text. May be empty (e.g. extraction failed).
    #[serde(default)]
    pub content: String,
}

impl Document {
    pub fn new(display_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            content: content.into(),
        }
    }

    /// Only documents with content make it into the knowledge base.
    pub fn is_composable(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// A snippet crawled from the tenant's own website.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteContentItem {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SiteContentItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }

    /// Both title and content must be non-empty.
    pub fn is_composable(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }
}
