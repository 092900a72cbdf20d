use lopdf::Document;
use tracing::{debug, warn};

use common::error::AppError;

/// Pages whose text layer is shorter than this (after trimming) are treated as weak.
pub const WEAK_PAGE_MIN_CHARS: usize = 30;

/// Text layer of a single PDF page; `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    pub fn is_weak(&self, min_chars: usize) -> bool {
        self.text.trim().chars().count() < min_chars
    }
}

/// Quick signature check used before accepting an upload as a PDF.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Extracts the text layer of every page, keeping the parse off the async executor.
///
/// A page whose text cannot be decoded yields an empty string rather than failing
/// the whole document.
pub async fn extract_pdf_pages(pdf_bytes: Vec<u8>) -> Result<Vec<PageText>, AppError> {
    let pages = tokio::task::spawn_blocking(move || -> Result<Vec<PageText>, AppError> {
        let document = Document::load_mem(&pdf_bytes)
            .map_err(|err| AppError::Processing(format!("Failed to parse PDF: {err}")))?;

        let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();

        let pages = page_numbers
            .into_iter()
            .map(|number| {
                let text = document.extract_text(&[number]).unwrap_or_else(|err| {
                    warn!(page = number, error = %err, "Failed to extract page text");
                    String::new()
                });
                PageText { number, text }
            })
            .collect::<Vec<_>>();
        Ok(pages)
    })
    .await??;

    debug!(pages = pages.len(), "Extracted PDF text layer");
    Ok(pages)
}


#[cfg(test)]
mod tests {
    use super::{testing::sample_pdf, *};

    #[test]
    fn signature_check_requires_pdf_header() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    fn weak_page_threshold_counts_trimmed_characters() {
        let weak = PageText {
            number: 1,
            text: "   Figure 3   \n".into(),
        };
        let strong = PageText {
            number: 2,
            text: "The Laplace equation describes steady-state heat flow.".into(),
        };
        assert!(weak.is_weak(WEAK_PAGE_MIN_CHARS));
        assert!(!strong.is_weak(WEAK_PAGE_MIN_CHARS));
    }

    #[tokio::test]
    async fn extracts_text_per_page_in_order() {
        let pdf = sample_pdf(&["Separation of variables", "Fourier coefficients"]);

        let pages = extract_pdf_pages(pdf).await.expect("extract");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 2);
        assert!(pages[0].text.contains("Separation of variables"));
        assert!(pages[1].text.contains("Fourier coefficients"));
    }

    #[tokio::test]
    async fn rejects_garbage_bytes() {
        let err = extract_pdf_pages(b"%PDF-garbage".to_vec())
            .await
            .expect_err("invalid pdf");
        assert!(matches!(err, AppError::Processing(_)));
    }
}
