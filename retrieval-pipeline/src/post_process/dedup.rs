use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use super::Source;

/// All sources that came from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub doc_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub page: Option<u32>,
    pub caption: Option<String>,
    pub best_score: Option<f32>,
    pub markers: Vec<String>,
    pub is_image: bool,
}

impl SourceGroup {
    fn start(source: &Source) -> Self {
        Self {
            doc_id: source.doc_id.clone(),
            title: source.title.clone(),
            url: source.url.clone(),
            page: source.page,
            caption: source.caption.clone(),
            best_score: source.score,
            markers: vec![source.marker.clone()],
            is_image: source.is_image,
        }
    }

    fn absorb(&mut self, source: &Source) {
        self.markers.push(source.marker.clone());
        if score_key(source.score) > score_key(self.best_score) {
            self.best_score = source.score;
            self.page = source.page;
            self.url.clone_from(&source.url);
            self.caption.clone_from(&source.caption);
            self.is_image = source.is_image;
        }
    }
}

fn score_key(score: Option<f32>) -> f32 {
    score.unwrap_or(f32::NEG_INFINITY)
}

fn rank(a: &SourceGroup, b: &SourceGroup) -> Ordering {
    score_key(b.best_score)
        .total_cmp(&score_key(a.best_score))
        .then_with(|| {
            a.title
                .as_deref()
                .unwrap_or_default()
                .cmp(b.title.as_deref().unwrap_or_default())
        })
        .then_with(|| a.page.cmp(&b.page))
}

/// Collapses sources by document, strongest document first.
///
/// Every input marker ends up in exactly one group, in hit order.
pub fn dedupe_sources(sources: &[Source]) -> Vec<SourceGroup> {
    let mut groups: Vec<SourceGroup> = Vec::new();
    let mut by_doc: HashMap<&str, usize> = HashMap::new();

    for source in sources {
        match by_doc.get(source.doc_id.as_str()).copied() {
            Some(index) => {
                if let Some(group) = groups.get_mut(index) {
                    group.absorb(source);
                }
            }
            None => {
                by_doc.insert(source.doc_id.as_str(), groups.len());
                groups.push(SourceGroup::start(source));
            }
        }
    }

    groups.sort_by(rank);
    groups
}
