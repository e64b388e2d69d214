use crate::error::{KnowledgeError, Result};
use crate::types::{Document, Integration, IntegrationId, SiteContentItem};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read access to a tenant's source material.
///
/// Implemented by the persistence layer. Collections are returned in
/// insertion order; the composer never re-sorts them.
pub trait KnowledgeSource: Send + Sync {
    fn integration(&self, id: IntegrationId) -> Result<Option<Integration>>;

    fn documents(&self, id: IntegrationId) -> Result<Vec<Document>>;

    fn site_content(&self, id: IntegrationId) -> Result<Vec<SiteContentItem>>;
}

#[derive(Default)]
struct Tables {
    integrations: HashMap<IntegrationId, Integration>,
    documents: HashMap<IntegrationId, Vec<Document>>,
    site_content: HashMap<IntegrationId, Vec<SiteContentItem>>,
}

/// In-memory [`KnowledgeSource`] for embedding and tests.
///
/// Mutators return the affected tenant id; pass it to
/// `KnowledgeEngine::content_changed` so the cached knowledge base is dropped.
#[derive(Default)]
pub struct InMemorySource {
    tables: RwLock<Tables>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| KnowledgeError::Source("source lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| KnowledgeError::Source("source lock poisoned".into()))
    }

    pub fn put_integration(&self, integration: Integration) -> Result<IntegrationId> {
        let id = integration.id;
        self.write()?.integrations.insert(id, integration);
        Ok(id)
    }

    pub fn add_document(&self, id: IntegrationId, document: Document) -> Result<IntegrationId> {
        self.write()?.documents.entry(id).or_default().push(document);
        Ok(id)
    }

    /// Replace the content of the first document with this display name.
    pub fn update_document(
        &self,
        id: IntegrationId,
        display_name: &str,
        content: impl Into<String>,
    ) -> Result<IntegrationId> {
        let mut tables = self.write()?;
        let doc = tables
            .documents
            .get_mut(&id)
            .and_then(|docs| docs.iter_mut().find(|d| d.display_name == display_name))
            .ok_or_else(|| {
                KnowledgeError::Source(format!("document '{}' not found for {}", display_name, id))
            })?;
        doc.content = content.into();
        Ok(id)
    }

    pub fn remove_document(&self, id: IntegrationId, display_name: &str) -> Result<IntegrationId> {
        if let Some(docs) = self.write()?.documents.get_mut(&id) {
            docs.retain(|d| d.display_name != display_name);
        }
        Ok(id)
    }

    pub fn add_site_content(&self, id: IntegrationId, item: SiteContentItem) -> Result<IntegrationId> {
        self.write()?.site_content.entry(id).or_default().push(item);
        Ok(id)
    }

    pub fn remove_site_content(&self, id: IntegrationId, url: &str) -> Result<IntegrationId> {
        if let Some(items) = self.write()?.site_content.get_mut(&id) {
            items.retain(|s| s.url != url);
        }
        Ok(id)
    }
}

impl KnowledgeSource for InMemorySource {
    fn integration(&self, id: IntegrationId) -> Result<Option<Integration>> {
        Ok(self.read()?.integrations.get(&id).cloned())
    }

    fn documents(&self, id: IntegrationId) -> Result<Vec<Document>> {
        Ok(self.read()?.documents.get(&id).cloned().unwrap_or_default())
    }

    fn site_content(&self, id: IntegrationId) -> Result<Vec<SiteContentItem>> {
        Ok(self.read()?.site_content.get(&id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_keep_insertion_order() {
        let source = InMemorySource::new();
        source.add_document(1, Document::new("b.pdf", "second")).unwrap();
        source.add_document(1, Document::new("a.pdf", "first")).unwrap();

        let names: Vec<String> = source
            .documents(1)
            .unwrap()
            .into_iter()
            .map(|d| d.display_name)
            .collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
    }

    #[test]
    fn test_unknown_tenant_is_empty() {
        let source = InMemorySource::new();
        assert!(source.integration(42).unwrap().is_none());
        assert!(source.documents(42).unwrap().is_empty());
        assert!(source.site_content(42).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_remove() {
        let source = InMemorySource::new();
        source.add_document(1, Document::new("faq.pdf", "v1")).unwrap();
        source.update_document(1, "faq.pdf", "v2").unwrap();
        assert_eq!(source.documents(1).unwrap()[0].content, "v2");

        assert!(matches!(
            source.update_document(1, "missing.pdf", "x"),
            Err(KnowledgeError::Source(_))
        ));

        source.remove_document(1, "faq.pdf").unwrap();
        assert!(source.documents(1).unwrap().is_empty());

        source
            .add_site_content(1, SiteContentItem::new("Home", "https://a.test/", "hi"))
            .unwrap();
        source.remove_site_content(1, "https://a.test/").unwrap();
        assert!(source.site_content(1).unwrap().is_empty());
    }
}
