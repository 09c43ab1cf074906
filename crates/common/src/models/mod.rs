//! Paper data model
//!
//! Upstream responses arrive as loosely-shaped JSON: nullable abstracts,
//! missing edge lists, authors that are sometimes objects and sometimes bare
//! strings. [`RawPaper`] accepts all of that and [`RawPaper::normalize`] turns it
//! into a [`PaperRecord`] exactly once, at the retrieval boundary. Everything
//! downstream works with the normalised type only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Paper author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

/// Edge to another paper in the citation graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRef {
    pub paper_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Normalised paper metadata.
///
/// This is also the value stored in the paper cache, serialised as JSON with
/// the upstream field names (`paperId`, `citationCount`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaperRecord {
    /// Identifier assigned by the search service; the join key everywhere
    pub paper_id: Option<String>,

    pub title: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    pub year: Option<i32>,

    pub citation_count: u64,

    pub venue: String,

    pub authors: Vec<Author>,

    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub influential_citation_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,

    /// Open-access PDF link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_access_pdf: Option<String>,

    /// Papers this paper cites
    pub references: Vec<PaperRef>,

    /// Papers citing this paper
    pub citations: Vec<PaperRef>,
}

impl PaperRecord {
    /// The paper id, if present and non-empty
    pub fn id(&self) -> Option<&str> {
        self.paper_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Ids of every reference and citation edge, references first
    pub fn edge_ids(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .chain(self.citations.iter())
            .map(|edge| edge.paper_id.as_str())
    }
}

/// Paper after relevance scoring.
///
/// `ai_score` and `ai_reason` stay empty when the paper was ordered by the
/// citation-count fallback or omitted from the model's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPaper {
    #[serde(flatten)]
    pub paper: PaperRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_reason: Option<String>,
}

impl RankedPaper {
    pub fn unscored(paper: PaperRecord) -> Self {
        Self {
            paper,
            ai_score: None,
            ai_reason: None,
        }
    }

    pub fn scored(paper: PaperRecord, score: Option<f64>, reason: Option<String>) -> Self {
        Self {
            paper,
            ai_score: score,
            ai_reason: reason,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.paper.id()
    }
}

/// Paper exactly as the search service returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPaper {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub citation_count: Option<u64>,
    pub venue: Option<String>,
    pub authors: Option<Vec<Value>>,
    pub url: Option<String>,
    pub reference_count: Option<u64>,
    pub influential_citation_count: Option<u64>,
    pub publication_date: Option<String>,
    pub open_access_pdf: Option<RawOpenAccessPdf>,
    pub references: Option<Vec<Option<RawPaperRef>>>,
    pub citations: Option<Vec<Option<RawPaperRef>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOpenAccessPdf {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPaperRef {
    pub paper_id: Option<String>,
    pub title: Option<String>,
}

impl RawPaper {
    /// Decode one upstream entry; `null` and non-object entries yield `None`
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(error = %e, "Skipping malformed paper entry");
                None
            }
        }
    }

    /// Null-coalesce every field into a [`PaperRecord`]
    pub fn normalize(self) -> PaperRecord {
        PaperRecord {
            paper_id: non_empty(self.paper_id),
            title: self.title.unwrap_or_default(),
            abstract_text: self.abstract_text.unwrap_or_default(),
            year: self.year,
            citation_count: self.citation_count.unwrap_or(0),
            venue: self.venue.unwrap_or_default(),
            authors: normalize_authors(self.authors.unwrap_or_default()),
            url: non_empty(self.url),
            reference_count: self.reference_count,
            influential_citation_count: self.influential_citation_count,
            publication_date: self.publication_date,
            open_access_pdf: self.open_access_pdf.and_then(|pdf| non_empty(pdf.url)),
            references: normalize_edges(self.references),
            citations: normalize_edges(self.citations),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_edges(edges: Option<Vec<Option<RawPaperRef>>>) -> Vec<PaperRef> {
    edges
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(|edge| {
            non_empty(edge.paper_id).map(|paper_id| PaperRef {
                paper_id,
                title: edge.title,
            })
        })
        .collect()
}

/// Collapse `{"name": ..}` objects and bare strings into [`Author`];
/// anything else is dropped.
fn normalize_authors(authors: Vec<Value>) -> Vec<Author> {
    authors
        .into_iter()
        .filter_map(|entry| {
            let name = match &entry {
                Value::String(name) => Some(name.trim().to_string()),
                Value::Object(map) => map
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|name| name.trim().to_string()),
                _ => None,
            };
            match name {
                Some(name) if !name.is_empty() => Some(Author { name }),
                _ => {
                    debug!(entry = %entry, "Dropping unrecognised author entry");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_fills_defaults() {
        let raw = RawPaper::from_value(json!({
            "paperId": "abc",
            "title": "Attention Is All You Need",
            "abstract": null,
            "citationCount": null,
            "references": null,
        }))
        .unwrap();

        let paper = raw.normalize();
        assert_eq!(paper.id(), Some("abc"));
        assert_eq!(paper.abstract_text, "");
        assert_eq!(paper.citation_count, 0);
        assert!(paper.references.is_empty());
        assert!(paper.citations.is_empty());
    }

    #[test]
    fn test_normalize_mixed_authors() {
        let raw = RawPaper::from_value(json!({
            "paperId": "abc",
            "authors": [{"authorId": "1", "name": "Ada Lovelace"}, "Alan Turing", 42, {"authorId": "2"}],
        }))
        .unwrap();

        let names: Vec<_> = raw.normalize().authors.into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
    }

    #[test]
    fn test_normalize_drops_null_edges() {
        let raw = RawPaper::from_value(json!({
            "paperId": "abc",
            "references": [{"paperId": "r1"}, null, {"paperId": null}, {"paperId": ""}],
            "citations": [{"paperId": "c1", "title": "Follow-up"}],
        }))
        .unwrap();

        let paper = raw.normalize();
        let edges: Vec<_> = paper.edge_ids().collect();
        assert_eq!(edges, vec!["r1", "c1"]);
        assert_eq!(paper.citations[0].title.as_deref(), Some("Follow-up"));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(RawPaper::from_value(Value::Null).is_none());
        assert!(RawPaper::from_value(json!("abc")).is_none());
        assert!(RawPaper::from_value(json!({"paperId": 12})).is_none());
    }

    #[test]
    fn test_missing_id_is_none() {
        let paper = RawPaper::from_value(json!({"paperId": "  ", "title": "x"}))
            .unwrap()
            .normalize();
        assert_eq!(paper.id(), None);
    }

    #[test]
    fn test_cached_form_uses_upstream_names() {
        let paper = PaperRecord {
            paper_id: Some("abc".into()),
            abstract_text: "text".into(),
            citation_count: 7,
            ..Default::default()
        };

        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["paperId"], "abc");
        assert_eq!(value["abstract"], "text");
        assert_eq!(value["citationCount"], 7);

        let back: PaperRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, paper);
    }

    #[test]
    fn test_ranked_paper_flattens() {
        let paper = PaperRecord {
            paper_id: Some("abc".into()),
            ..Default::default()
        };
        let ranked = RankedPaper::scored(paper, Some(9.5), Some("Core method".into()));

        let value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(value["paperId"], "abc");
        assert_eq!(value["ai_score"], 9.5);
        assert_eq!(value["ai_reason"], "Core method");
    }
}
