pub mod dedup;
pub mod stats;

pub use dedup::{dedupe_sources, SourceGroup};
pub use stats::{retrieval_stats, ConfidenceBadge, ConfidenceThresholds, RetrievalStats};

use common::storage::types::hit::Hit;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// A hit as presented to the caller, tagged with its `[n]` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub marker: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub page: Option<u32>,
    pub score: Option<f32>,
    pub caption: Option<String>,
    pub doc_id: String,
    pub chunk_id: String,
    pub is_image: bool,
}

pub fn is_image_url(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) || lowered.contains("/images/")
}

/// Marker `[i]` of each source matches block `[i]` of the prompt context.
pub fn sources_from_hits(hits: &[Hit]) -> Vec<Source> {
    hits.iter()
        .enumerate()
        .map(|(offset, hit)| Source {
            marker: format!("[{}]", offset.saturating_add(1)),
            title: hit.title.clone(),
            url: hit.url.clone(),
            page: hit.page,
            score: hit.score,
            caption: hit.caption.clone(),
            doc_id: hit.document_id.clone(),
            chunk_id: hit.chunk_id.clone(),
            is_image: hit.url.as_deref().is_some_and(is_image_url),
        })
        .collect()
}

/// Prepends a quote line pointing at the first image source, if there is one.
pub fn with_image_callout(answer: &str, sources: &[Source]) -> String {
    let Some(image) = sources.iter().find(|source| source.is_image) else {
        return answer.to_string();
    };

    let callout = match image
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|caption| !caption.is_empty())
    {
        Some(caption) => format!("> 🖼️ Related image: {} — {caption}", image.marker),
        None => format!("> 🖼️ Related image: {}", image.marker),
    };
    format!("{callout}\n\n{answer}")
}

fn is_pdf_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".pdf")
}

fn citation_target(source: &Source) -> Option<String> {
    let url = source.url.as_deref().filter(|url| !url.is_empty())?;
    match source.page {
        Some(page) if is_pdf_url(url) => Some(format!("{url}#page={page}")),
        _ => Some(url.to_string()),
    }
}

/// Rewrites bare `[n]` markers into markdown links to their source.
#[derive(Debug, Clone)]
pub struct CitationLinker {
    pattern: Regex,
}

impl CitationLinker {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"\[(\d{1,3})\]")?,
        })
    }

    /// Markers that are out of range, zero, point at a url-less source or are
    /// already part of a link come back unchanged.
    pub fn link(&self, answer: &str, sources: &[Source]) -> String {
        self.pattern
            .replace_all(answer, |caps: &Captures<'_>| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                let (start, end) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));

                let rest = answer.get(end..).unwrap_or_default();
                let before = answer.get(..start).unwrap_or_default();
                if rest.starts_with('(') || (before.ends_with('[') && rest.starts_with("](")) {
                    return whole.to_string();
                }

                let target = caps
                    .get(1)
                    .and_then(|n| n.as_str().parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| sources.get(index))
                    .and_then(citation_target);

                match target {
                    Some(url) => format!("[{whole}]({url})"),
                    None => whole.to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(n: usize, url: Option<&str>, page: Option<u32>) -> Source {
        Source {
            marker: format!("[{n}]"),
            title: Some(format!("Doc {n}")),
            url: url.map(Into::into),
            page,
            score: Some(0.7),
            caption: None,
            doc_id: format!("doc-{n}"),
            chunk_id: format!("chunk-{n}"),
            is_image: url.is_some_and(is_image_url),
        }
    }

    #[test]
    fn detects_image_urls() {
        assert!(is_image_url("http://files/owners/o/courses/c/images/abc.PNG"));
        assert!(is_image_url("http://files/photo.webp"));
        assert!(is_image_url("http://files/images/raw"));
        assert!(!is_image_url("http://files/notes.pdf"));
    }

    #[test]
    fn links_markers_and_adds_pdf_page_anchor() {
        let linker = CitationLinker::new().expect("regex");
        let sources = vec![
            source(1, Some("http://files/notes.pdf"), Some(3)),
            source(2, Some("http://files/images/fig.png"), None),
        ];

        let linked = linker.link("Heat flows [1] and see [2].", &sources);

        assert_eq!(
            linked,
            "Heat flows [[1]](http://files/notes.pdf#page=3) and see [[2]](http://files/images/fig.png)."
        );
    }

    #[test]
    fn leaves_unmatched_markers_untouched() {
        let linker = CitationLinker::new().expect("regex");
        let sources = vec![source(1, Some("http://files/a.pdf"), None), source(2, None, Some(1))];

        let answer = "Zero [0], missing url [2], out of range [7], too long [1234].";

        assert_eq!(linker.link(answer, &sources), answer);
    }

    #[test]
    fn does_not_relink_existing_links() {
        let linker = CitationLinker::new().expect("regex");
        let sources = vec![source(1, Some("http://files/a.pdf"), Some(2))];

        let once = linker.link("Claim [1].", &sources);
        let twice = linker.link(&once, &sources);

        assert_eq!(once, "Claim [[1]](http://files/a.pdf#page=2).");
        assert_eq!(twice, once);
        assert_eq!(linker.link("[1](http://x)", &sources), "[1](http://x)");
    }

    #[test]
    fn callout_uses_first_image_source() {
        let mut image = source(2, Some("http://files/images/diagram.jpg"), None);
        image.caption = Some("Free body diagram".into());
        let sources = vec![source(1, Some("http://files/a.pdf"), Some(1)), image];

        let answer = with_image_callout("**TL;DR**: Forces balance.", &sources);

        assert_eq!(
            answer,
            "> 🖼️ Related image: [2] — Free body diagram\n\n**TL;DR**: Forces balance."
        );
    }

    #[test]
    fn callout_omits_missing_caption_and_skips_text_only_answers() {
        let sources = vec![source(1, Some("http://files/images/x.gif"), None)];
        assert_eq!(
            with_image_callout("Answer", &sources),
            "> 🖼️ Related image: [1]\n\nAnswer"
        );

        let pdf_only = vec![source(1, Some("http://files/a.pdf"), None)];
        assert_eq!(with_image_callout("Answer", &pdf_only), "Answer");
    }
}
