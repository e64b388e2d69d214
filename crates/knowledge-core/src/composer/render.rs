use crate::types::{Document, Integration, SiteContentItem};

pub const DEFAULT_PERSONA: &str = "You are a friendly and helpful virtual assistant. \
Answer questions clearly and politely, and keep your answers short and to the point.";

pub const IDENTITY_HEADER: &str = "## Company information";
pub const DOCUMENTS_HEADER: &str = "## Knowledge base documents";
pub const SITE_CONTENT_HEADER: &str = "## Website content";
pub const INSTRUCTIONS_HEADER: &str = "## Instructions";

const SECTION_RULE: &str = "---";

/// Render a tenant's knowledge base.
///
/// Pure: the same inputs always produce the same bytes. Documents and site
/// content appear in the order given. Content is inserted verbatim.
pub fn render_knowledge_base(
    integration: &Integration,
    default_persona: &str,
    documents: &[Document],
    site_content: &[SiteContentItem],
) -> String {
    let mut out = String::new();

    out.push_str(integration.persona().unwrap_or(default_persona));
    out.push_str("\n\n");

    render_identity(&mut out, integration);
    render_documents(&mut out, documents);
    render_site_content(&mut out, site_content);
    render_instructions(&mut out, integration);

    out
}

fn render_identity(out: &mut String, integration: &Integration) {
    out.push_str(IDENTITY_HEADER);
    out.push('\n');
    out.push_str(&format!("Name: {}\n", integration.name));
    if !integration.source_url.trim().is_empty() {
        out.push_str(&format!("Website: {}\n", integration.source_url));
    }
    if !integration.description.trim().is_empty() {
        out.push_str(&format!("Description: {}\n", integration.description));
    }
    out.push('\n');
}

fn render_documents(out: &mut String, documents: &[Document]) {
    let mut docs = documents.iter().filter(|d| d.is_composable()).peekable();
    if docs.peek().is_none() {
        return;
    }

    out.push_str(DOCUMENTS_HEADER);
    out.push_str("\n\n");
    for doc in docs {
        out.push_str(&format!("{SECTION_RULE}\nDocument: {}\n{SECTION_RULE}\n", doc.display_name));
        out.push_str(&doc.content);
        out.push_str("\n\n");
    }
}

fn render_site_content(out: &mut String, site_content: &[SiteContentItem]) {
    let mut items = site_content.iter().filter(|s| s.is_composable()).peekable();
    if items.peek().is_none() {
        return;
    }

    out.push_str(SITE_CONTENT_HEADER);
    out.push_str("\n\n");
    for item in items {
        out.push_str(&format!("{SECTION_RULE}\nPage: {}\n", item.title));
        if !item.url.trim().is_empty() {
            out.push_str(&format!("Source: {}\n", item.url));
        }
        out.push_str(SECTION_RULE);
        out.push('\n');
        out.push_str(&item.content);
        out.push_str("\n\n");
    }
}

fn render_instructions(out: &mut String, integration: &Integration) {
    out.push_str(INSTRUCTIONS_HEADER);
    out.push('\n');
    out.push_str(
        "- Answer only with information found in the material above. \
         If the answer is not there, say you don't know and suggest contacting the company.\n",
    );
    out.push_str("- Always reply in the same language the user writes in.\n");
    out.push_str(&format!(
        "- You are the virtual assistant of {}. Never claim to be anything else.\n",
        integration.name
    ));
}
