//! Report writing
//!
//! The completion service writes the narrative; this module links its `[n]`
//! citation markers and appends the reference list. When the service is
//! unavailable a plain Markdown digest of the ranked papers is produced
//! instead.

use crate::prompts::REPORTING_SYSTEM_PROMPT;
use chrono::Utc;
use litgraph_common::{CompletionClient, CompletionRequest, RankedPaper};
use regex_lite::{Captures, Regex};
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{error, info};

/// Returned when there is nothing to report on
pub const NO_PAPERS_MESSAGE: &str = "## No relevant papers found, unable to generate a report.";

/// Selection reason for papers the ranker did not explain
pub const DEFAULT_REASON: &str = "High relevance";

const MAX_LISTED_AUTHORS: usize = 3;

pub struct Reporter {
    llm: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl Reporter {
    pub fn new(llm: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Write the report for `topic`; never fails
    pub async fn generate(&self, topic: &str, papers: &[RankedPaper]) -> String {
        if papers.is_empty() {
            return NO_PAPERS_MESSAGE.to_string();
        }
        info!(papers = papers.len(), "Generating report");

        let request = CompletionRequest::new(
            REPORTING_SYSTEM_PROMPT,
            format!("Papers Data:\n{}\n\nSearch Topic: {}", papers_text(papers), topic),
            self.temperature,
        );

        match self.llm.complete(&request).await {
            Ok(body) => {
                let mut report = link_citations(body.trim(), papers);
                report.push_str("\n\n");
                report.push_str(&references_section(papers));
                report
            }
            Err(e) => {
                error!(error = %e, "Report generation failed, rendering digest");
                render_digest(topic, papers)
            }
        }
    }
}

/// Numbered paper list handed to the reporting call
pub fn papers_text(papers: &[RankedPaper]) -> String {
    papers
        .iter()
        .enumerate()
        .map(|(i, ranked)| {
            let paper = &ranked.paper;
            format!(
                "Paper {}:\nTitle: {}\nYear: {}\nCitations: {}\nReason for selection: {}\nAbstract: {}\n---",
                i + 1,
                paper.title,
                year_label(paper.year),
                paper.citation_count,
                ranked.ai_reason.as_deref().unwrap_or(DEFAULT_REASON),
                paper.abstract_text,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn citation_regex() -> &'static Regex {
    static CITATION: OnceLock<Regex> = OnceLock::new();
    // Group 1 is an existing `[[n]](` link; group 3 a bare `[n](` link
    CITATION.get_or_init(|| {
        Regex::new(r"\[\[(\d+)\]\]\(|\[(\d+)\](\()?").expect("citation pattern is valid")
    })
}

/// Turn `[n]` into `[[n]](url)` when paper `n` has a URL
pub fn link_citations(text: &str, papers: &[RankedPaper]) -> String {
    citation_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let marker = &caps[0];
            let number = match (caps.get(2), caps.get(3)) {
                (Some(number), None) => number.as_str(),
                _ => return marker.to_string(),
            };
            let url = number
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| papers.get(i))
                .and_then(|p| p.paper.url.as_deref());
            match url {
                Some(url) => format!("[[{}]]({})", number, url),
                None => marker.to_string(),
            }
        })
        .into_owned()
}

/// `## References` section listing every ranked paper
pub fn references_section(papers: &[RankedPaper]) -> String {
    let mut section = String::from("## References\n");
    for (i, ranked) in papers.iter().enumerate() {
        let paper = &ranked.paper;
        let _ = write!(section, "\n{}. {}. *{}*.", i + 1, author_line(ranked), title_label(&paper.title));
        if !paper.venue.is_empty() {
            let _ = write!(section, " {}.", paper.venue);
        }
        let _ = write!(section, " {}.", year_label(paper.year));
        if let Some(url) = &paper.url {
            let _ = write!(section, " <{}>", url);
        }
    }
    section.push('\n');
    section
}

/// Local Markdown rendering used when the reporting call fails
pub fn render_digest(topic: &str, papers: &[RankedPaper]) -> String {
    let mut digest = format!(
        "# Literature digest: {}\n\n_Generated {} from the ranked core papers; the narrative report was unavailable._\n",
        topic.trim(),
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
    );

    for (i, ranked) in papers.iter().enumerate() {
        let paper = &ranked.paper;
        let _ = write!(digest, "\n### {}. {}\n\n", i + 1, title_label(&paper.title));
        let _ = writeln!(digest, "- Authors: {}", author_line(ranked));
        let _ = writeln!(digest, "- Year: {}", year_label(paper.year));
        let _ = writeln!(digest, "- Citations: {}", paper.citation_count);
        if let Some(score) = ranked.ai_score {
            let _ = writeln!(digest, "- Score: {:.1}", score);
        }
        let _ = writeln!(digest, "- Reason: {}", ranked.ai_reason.as_deref().unwrap_or(DEFAULT_REASON));
        if let Some(url) = &paper.url {
            let _ = writeln!(digest, "- Link: <{}>", url);
        }
    }
    digest
}

fn author_line(ranked: &RankedPaper) -> String {
    let authors = &ranked.paper.authors;
    if authors.is_empty() {
        return "Unknown authors".to_string();
    }
    let names: Vec<&str> = authors
        .iter()
        .take(MAX_LISTED_AUTHORS)
        .map(|a| a.name.as_str())
        .collect();
    let mut line = names.join(", ");
    if authors.len() > MAX_LISTED_AUTHORS {
        line.push_str(" et al");
    }
    line
}

fn year_label(year: Option<i32>) -> String {
    year.map_or_else(|| "n.d.".to_string(), |y| y.to_string())
}

fn title_label(title: &str) -> &str {
    if title.trim().is_empty() {
        "Untitled"
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paper, Reply, ScriptedCompletion};
    use litgraph_common::Author;

    fn ranked(id: &str, title: &str, url: Option<&str>) -> RankedPaper {
        let mut record = paper(id, title, 10);
        record.url = url.map(str::to_string);
        record.year = Some(2017);
        RankedPaper::unscored(record)
    }

    #[test]
    fn test_papers_text_defaults() {
        let mut scored = ranked("a", "Attention Is All You Need", None);
        scored.ai_reason = Some("Introduces the Transformer".into());
        let mut plain = ranked("b", "BERT", None);
        plain.paper.year = None;

        let text = papers_text(&[scored, plain]);
        assert!(text.starts_with("Paper 1:\nTitle: Attention Is All You Need\nYear: 2017\nCitations: 10\n"));
        assert!(text.contains("Reason for selection: Introduces the Transformer"));
        assert!(text.contains("Paper 2:\nTitle: BERT\nYear: n.d."));
        assert!(text.contains("Reason for selection: High relevance\nAbstract: \n---"));
    }

    #[test]
    fn test_link_citations() {
        let papers = vec![
            ranked("a", "A", Some("https://example.org/a")),
            ranked("b", "B", None),
        ];
        let text = "See [1] and [2], also [3] and [1](https://x).";
        let linked = link_citations(text, &papers);

        assert_eq!(
            linked,
            "See [[1]](https://example.org/a) and [2], also [3] and [1](https://x)."
        );
    }

    #[test]
    fn test_link_citations_keeps_existing_links() {
        let papers = vec![ranked("a", "A", Some("https://example.org/a"))];
        let text = "Already linked [[1]](https://example.org/a), bare [1].";

        assert_eq!(
            link_citations(text, &papers),
            "Already linked [[1]](https://example.org/a), bare [[1]](https://example.org/a)."
        );
        assert_eq!(link_citations(&link_citations(text, &papers), &papers), link_citations(text, &papers));
    }

    #[test]
    fn test_references_section() {
        let mut first = ranked("a", "A", Some("https://example.org/a"));
        first.paper.venue = "NeurIPS".into();
        first.paper.authors = ["Vaswani", "Shazeer", "Parmar", "Uszkoreit"]
            .iter()
            .map(|n| Author { name: n.to_string() })
            .collect();
        let second = ranked("b", "", None);

        let section = references_section(&[first, second]);
        assert!(section.starts_with("## References\n"));
        assert!(section.contains("1. Vaswani, Shazeer, Parmar et al. *A*. NeurIPS. 2017. <https://example.org/a>"));
        assert!(section.contains("2. Unknown authors. *Untitled*. 2017."));
    }

    #[tokio::test]
    async fn test_no_papers_short_circuits() {
        let llm = Arc::new(ScriptedCompletion::new());
        let reporter = Reporter::new(llm.clone(), 0.5);

        assert_eq!(reporter.generate("topic", &[]).await, NO_PAPERS_MESSAGE);
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_links_and_appends_references() {
        let llm = Arc::new(ScriptedCompletion::new().reporting(Reply::text("# Report\n\nTransformers [1] changed NLP.")));
        let reporter = Reporter::new(llm.clone(), 0.5);
        let papers = vec![ranked("a", "Attention", Some("https://example.org/a"))];

        let report = reporter.generate("transformers", &papers).await;

        assert!(report.starts_with("# Report\n\nTransformers [[1]](https://example.org/a) changed NLP."));
        assert!(report.contains("## References"));
        assert!(llm.calls()[0].user.ends_with("Search Topic: transformers"));
    }

    #[tokio::test]
    async fn test_failure_renders_digest() {
        let llm = Arc::new(ScriptedCompletion::new().reporting(Reply::Fail));
        let reporter = Reporter::new(llm, 0.5);
        let mut top = ranked("a", "Attention", Some("https://example.org/a"));
        top.ai_score = Some(9.0);

        let report = reporter.generate("transformers", &[top, ranked("b", "BERT", None)]).await;

        assert!(report.starts_with("# Literature digest: transformers"));
        assert!(report.contains("### 1. Attention"));
        assert!(report.contains("- Score: 9.0"));
        assert!(report.contains("### 2. BERT"));
        assert!(report.contains("- Reason: High relevance"));
    }
}
