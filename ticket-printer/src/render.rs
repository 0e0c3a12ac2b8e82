//! Document fallback path
//!
//! When the ticket cannot go straight to the device, the same text is laid
//! out as a paginated document and handed to a generic printing backend.
//! The layout engine sits behind [`DocumentRenderer`]; this crate ships a
//! plain monospace renderer.

use crate::error::{PrintError, PrintResult};
use crate::script::{TextDirection, detect_direction};
use tracing::{debug, instrument};

/// One page of laid-out lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub lines: Vec<String>,
}

/// Paginated document ready for a printing or display backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableDocument {
    pub direction: TextDirection,
    pub pages: Vec<Page>,
}

impl RenderableDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Layout engine turning text into a document
pub trait DocumentRenderer {
    fn render(&self, text: &str, direction: TextDirection) -> PrintResult<RenderableDocument>;
}

/// Lay out `text` with `renderer`
///
/// Failures of the renderer surface as [`PrintError::Render`]; the print
/// session is never involved.
#[instrument(skip(renderer, text), fields(len = text.len()))]
pub fn render_document(
    renderer: &dyn DocumentRenderer,
    text: &str,
) -> PrintResult<RenderableDocument> {
    if text.is_empty() {
        return Err(PrintError::Validation("nothing to render".into()));
    }

    let direction = detect_direction(text);
    let document = renderer.render(text, direction).map_err(|e| match e {
        PrintError::Render(_) => e,
        other => PrintError::Render(other.to_string()),
    })?;

    debug!(pages = document.page_count(), ?direction, "Document rendered");
    Ok(document)
}

/// Monospace renderer: word-wraps to a fixed width and paginates
#[derive(Debug, Clone, Copy)]
pub struct PagedTextRenderer {
    line_width: usize,
    lines_per_page: usize,
}

impl PagedTextRenderer {
    pub fn new(line_width: usize, lines_per_page: usize) -> Self {
        Self {
            line_width,
            lines_per_page,
        }
    }

    /// Wrap one paragraph, splitting words longer than the line
    fn wrap(&self, paragraph: &str, out: &mut Vec<String>) {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > self.line_width {
                if line_len > 0 {
                    out.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(self.line_width);
                out.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > self.line_width {
                out.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }

        out.push(line);
    }

    fn align(&self, line: String, direction: TextDirection) -> String {
        let len = line.chars().count();
        if direction.is_rtl() && len < self.line_width {
            format!("{}{}", " ".repeat(self.line_width - len), line)
        } else {
            line
        }
    }
}

impl Default for PagedTextRenderer {
    fn default() -> Self {
        Self::new(48, 60)
    }
}

impl DocumentRenderer for PagedTextRenderer {
    fn render(&self, text: &str, direction: TextDirection) -> PrintResult<RenderableDocument> {
        if self.line_width == 0 || self.lines_per_page == 0 {
            return Err(PrintError::Render("page geometry must be positive".into()));
        }

        let mut lines = Vec::new();
        for paragraph in text.lines() {
            self.wrap(paragraph, &mut lines);
        }

        let pages = lines
            .chunks(self.lines_per_page)
            .map(|chunk| Page {
                lines: chunk
                    .iter()
                    .map(|l| self.align(l.clone(), direction))
                    .collect(),
            })
            .collect();

        Ok(RenderableDocument { direction, pages })
    }
}
