//! Content fingerprints used to detect stale knowledge bases.
//!
//! A fingerprint summarizes an *ordered* collection of content items. Every
//! byte of every field is hashed: reordering items, or changing a single
//! character anywhere in a long document, produces a different token.
//!
//! The default [`FingerprintAlgorithm::Polynomial32`] is a 32-bit checksum.
//! Collisions are possible; a collision means one stale knowledge base is
//! served until the entry expires or is invalidated. Deployments that cannot
//! accept that select [`FingerprintAlgorithm::Sha256`].

use crate::types::{Document, SiteContentItem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separates fields inside one item.
const UNIT_SEPARATOR: u8 = 0x1f;
/// Separates items.
const RECORD_SEPARATOR: u8 = 0x1e;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque token summarizing a content collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Token for an empty collection. `-` is outside both output alphabets.
    pub const EMPTY: &'static str = "-";

    pub fn empty() -> Self {
        Self(Self::EMPTY.to_string())
    }

    pub fn is_empty_collection(&self) -> bool {
        self.0 == Self::EMPTY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintAlgorithm {
    /// `h = h * 31 + byte` over UTF-8 bytes, wrapping at 32 bits, base-36 output.
    #[default]
    Polynomial32,
    /// SHA-256, first 8 bytes as hex.
    Sha256,
}

/// Anything that can be folded into a fingerprint.
pub trait ContentItem {
    fn write_fingerprint(&self, hasher: &mut FingerprintHasher);
}

impl ContentItem for Document {
    fn write_fingerprint(&self, hasher: &mut FingerprintHasher) {
        hasher.write_field(&self.display_name);
        hasher.write_field(&self.content);
    }
}

impl ContentItem for SiteContentItem {
    fn write_fingerprint(&self, hasher: &mut FingerprintHasher) {
        hasher.write_field(&self.title);
        hasher.write_field(&self.url);
        hasher.write_field(&self.content);
    }
}

impl<T: ContentItem + ?Sized> ContentItem for &T {
    fn write_fingerprint(&self, hasher: &mut FingerprintHasher) {
        (**self).write_fingerprint(hasher);
    }
}

enum HashState {
    Polynomial(u32),
    Sha256(Sha256),
}

/// Streaming hasher. Items write their fields directly into it, so the
/// collection is never concatenated into one string.
pub struct FingerprintHasher {
    state: HashState,
    items: usize,
}

impl FingerprintHasher {
    pub fn new(algorithm: FingerprintAlgorithm) -> Self {
        let state = match algorithm {
            FingerprintAlgorithm::Polynomial32 => HashState::Polynomial(0),
            FingerprintAlgorithm::Sha256 => HashState::Sha256(Sha256::new()),
        };
        Self { state, items: 0 }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        match &mut self.state {
            HashState::Polynomial(h) => {
                for &b in bytes {
                    *h = h.wrapping_mul(31).wrapping_add(b as u32);
                }
            }
            HashState::Sha256(digest) => digest.update(bytes),
        }
    }

    /// Write one field followed by the unit separator.
    pub fn write_field(&mut self, field: &str) {
        self.write_bytes(field.as_bytes());
        self.write_bytes(&[UNIT_SEPARATOR]);
    }

    /// Fold a whole item, separating it from the previous one.
    pub fn write_item<T: ContentItem + ?Sized>(&mut self, item: &T) {
        if self.items > 0 {
            self.write_bytes(&[RECORD_SEPARATOR]);
        }
        item.write_fingerprint(self);
        self.items += 1;
    }

    pub fn finish(self) -> Fingerprint {
        if self.items == 0 {
            return Fingerprint::empty();
        }
        match self.state {
            HashState::Polynomial(h) => Fingerprint(to_base36(h)),
            HashState::Sha256(digest) => {
                let out = digest.finalize();
                Fingerprint(hex::encode(&out[..8]))
            }
        }
    }
}

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    // Only ASCII digits and letters were pushed.
    String::from_utf8(buf).unwrap_or_default()
}

/// Fingerprint an ordered collection with the given algorithm.
pub fn fingerprint_with<I>(algorithm: FingerprintAlgorithm, items: I) -> Fingerprint
where
    I: IntoIterator,
    I::Item: ContentItem,
{
    let mut hasher = FingerprintHasher::new(algorithm);
    for item in items {
        hasher.write_item(&item);
    }
    hasher.finish()
}

/// Fingerprint an ordered collection with the default algorithm.
pub fn fingerprint<I>(items: I) -> Fingerprint
where
    I: IntoIterator,
    I::Item: ContentItem,
{
    fingerprint_with(FingerprintAlgorithm::default(), items)
}

/// The pair of fingerprints a cache entry is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    pub documents: Fingerprint,
    pub site_content: Fingerprint,
}

impl Fingerprints {
    /// Documents and site content are hashed independently.
    pub fn compute(
        algorithm: FingerprintAlgorithm,
        documents: &[Document],
        site_content: &[SiteContentItem],
    ) -> Self {
        Self {
            documents: fingerprint_with(algorithm, documents),
            site_content: fingerprint_with(algorithm, site_content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(name: &str, content: &str) -> Document {
        Document::new(name, content)
    }

    #[test]
    fn test_empty_collection_sentinel() {
        let none: Vec<Document> = vec![];
        assert_eq!(fingerprint(&none).as_str(), Fingerprint::EMPTY);
        assert_eq!(
            fingerprint_with(FingerprintAlgorithm::Sha256, &none).as_str(),
            Fingerprint::EMPTY
        );
        assert!(fingerprint(&none).is_empty_collection());
    }

    #[test]
    fn test_single_empty_item_is_not_sentinel() {
        let docs = vec![doc("", "")];
        assert!(!fingerprint(&docs).is_empty_collection());
    }

    #[test]
    fn test_order_sensitive() {
        let a = doc("a.pdf", "alpha");
        let b = doc("b.pdf", "beta");
        let ab = fingerprint(&[a.clone(), b.clone()]);
        let ba = fingerprint(&[b, a]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_tail_change_in_long_document_detected() {
        let body = "x".repeat(100_000);
        let before = vec![doc("manual.pdf", &format!("{body}end"))];
        let after = vec![doc("manual.pdf", &format!("{body}END"))];
        assert_ne!(fingerprint(&before), fingerprint(&after));
        assert_ne!(
            fingerprint_with(FingerprintAlgorithm::Sha256, &before),
            fingerprint_with(FingerprintAlgorithm::Sha256, &after)
        );
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = vec![doc("ab", "c")];
        let b = vec![doc("a", "bc")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_polynomial_matches_reference_fold() {
        let docs = vec![doc("a", "b")];
        let mut h: u32 = 0;
        for b in [b'a', UNIT_SEPARATOR, b'b', UNIT_SEPARATOR] {
            h = h.wrapping_mul(31).wrapping_add(b as u32);
        }
        assert_eq!(fingerprint(&docs).as_str(), to_base36(h));
    }

    #[test]
    fn test_base36_rendering() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u32::MAX), "1z141z3");
    }

    #[test]
    fn test_sha256_token_shape() {
        let fp = fingerprint_with(FingerprintAlgorithm::Sha256, &[doc("a", "b")]);
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_site_content_url_is_hashed() {
        let a = vec![SiteContentItem::new("Home", "https://a.test/", "Welcome")];
        let b = vec![SiteContentItem::new("Home", "https://b.test/", "Welcome")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    proptest! {
        #[test]
        fn prop_deterministic(names in proptest::collection::vec(".{0,12}", 0..6), body in ".{0,64}") {
            let docs: Vec<Document> = names.iter().map(|n| doc(n, &body)).collect();
            prop_assert_eq!(fingerprint(&docs), fingerprint(&docs.clone()));
        }

        #[test]
        fn prop_swapping_distinct_items_changes_sha256(a in "[a-z]{1,16}", b in "[a-z]{1,16}") {
            prop_assume!(a != b);
            let x = doc("x", &a);
            let y = doc("x", &b);
            prop_assert_ne!(
                fingerprint_with(FingerprintAlgorithm::Sha256, &[x.clone(), y.clone()]),
                fingerprint_with(FingerprintAlgorithm::Sha256, &[y, x])
            );
        }
    }
}
