//! Remote API types
//!
//! Public types are what the rest of the crate consumes. The `*Response`
//! structs mirror the JSON the action API returns (`format=json`,
//! `formatversion=1`) and are only used for decoding.

use serde::Deserialize;
use std::collections::HashMap;

/// Namespace discriminator of an article
pub const NAMESPACE_ARTICLE: i64 = 0;

/// Namespace discriminator of a category
pub const NAMESPACE_CATEGORY: i64 = 14;

/// One entry of a category listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryMember {
    pub title: String,
    #[serde(rename = "ns")]
    pub namespace: i64,
}

impl CategoryMember {
    pub fn is_article(&self) -> bool {
        self.namespace == NAMESPACE_ARTICLE
    }

    pub fn is_category(&self) -> bool {
        self.namespace == NAMESPACE_CATEGORY
    }
}

/// Content of one page as fetched from the API
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    /// Rendered HTML body
    pub html: String,
    /// Plain-text extract, not yet cleaned
    pub plain_text: String,
    /// Canonical article URL
    pub url: String,
    /// Page id on the remote wiki
    pub remote_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub query: Option<ListQuery>,
    #[serde(rename = "continue", default)]
    pub continuation: Option<ListContinue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub categorymembers: Vec<CategoryMember>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListContinue {
    pub cmcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParseResponse {
    #[serde(default)]
    pub parse: Option<ParsedPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedPage {
    pub text: ParsedText,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedText {
    #[serde(rename = "*")]
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractResponse {
    #[serde(default)]
    pub query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractQuery {
    #[serde(default)]
    pub pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractPage {
    #[serde(default)]
    pub pageid: Option<i64>,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub fullurl: Option<String>,
    /// Present (as an empty string) when the title does not exist
    #[serde(default)]
    pub missing: Option<serde_json::Value>,
    #[serde(default)]
    pub invalid: Option<serde_json::Value>,
}

impl ExtractQuery {
    /// The first page record that actually exists
    pub fn existing_page(self) -> Option<ExtractPage> {
        self.pages
            .into_values()
            .find(|page| page.missing.is_none() && page.invalid.is_none())
    }
}
