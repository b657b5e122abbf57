//! CSS-selector markup adapter. Defaults target the biquge-style layout: chapter links under
//! `ul.fen_4`, chapter text in `div#txt`.

use crate::scraper::error::ScraperError;
use crate::scraper::{ListingEntry, SiteMarkup};
use scraper::{ElementRef, Html, Selector};

pub const DEFAULT_LISTING_SELECTOR: &str = "ul.fen_4";
pub const DEFAULT_CONTENT_SELECTOR: &str = "div#txt";

/// Elements inside the content container that never carry chapter text (ad links, scripts).
const STRIPPED_TAGS: [&str; 3] = ["a", "script", "style"];

/// Parse a CSS selector or return an error (avoids panics from Selector::parse).
fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// Markup adapter driven by two selectors: one for the listing container on the index page
/// and one for the content container on chapter pages.
#[derive(Debug, Clone)]
pub struct SelectorMarkup {
    listing: Selector,
    content: Selector,
    anchor: Selector,
}

impl SelectorMarkup {
    pub fn new(listing_selector: &str, content_selector: &str) -> Result<Self, ScraperError> {
        Ok(Self {
            listing: parse_selector(listing_selector)?,
            content: parse_selector(content_selector)?,
            anchor: parse_selector("a[href]")?,
        })
    }

    /// Adapter with the default selectors.
    pub fn with_defaults() -> Result<Self, ScraperError> {
        Self::new(DEFAULT_LISTING_SELECTOR, DEFAULT_CONTENT_SELECTOR)
    }
}

impl SiteMarkup for SelectorMarkup {
    fn locate_listing(&self, html: &str) -> Option<Vec<ListingEntry>> {
        let doc = Html::parse_document(html);
        let container = doc.select(&self.listing).next()?;
        let entries = container
            .select(&self.anchor)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                Some(ListingEntry {
                    title: a.text().collect::<String>().trim().to_string(),
                    href: href.to_string(),
                })
            })
            .collect();
        Some(entries)
    }

    fn locate_content(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let container = doc.select(&self.content).next()?;
        Some(extract_text(container))
    }
}

/// Text of `element` with `a`/`script`/`style` subtrees removed. Text nodes are split on
/// line breaks, each line trimmed, empty lines dropped, and the rest joined with `\n`.
/// `<br>` carries no text, so it only separates the nodes around it.
pub fn extract_text(element: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    collect_lines(element, &mut lines);
    lines.join("\n")
}

fn collect_lines(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if STRIPPED_TAGS.contains(&child_el.value().name()) {
                continue;
            }
            collect_lines(child_el, lines);
        } else if let Some(text) = child.value().as_text() {
            for line in text.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"<!DOCTYPE html><html><body>
<ul class="fen_3"><a href="/c/999">最新章节</a></ul>
<ul class="fen_4">
  <li><a href="/c/1"> Ch1 </a></li>
  <li><a>no link</a></li>
  <li><a href="/c/2">Ch2</a></li>
  <li><a href="/c/3">Ch3</a></li>
</ul>
</body></html>"#;

    const CHAPTER_HTML: &str = r#"<!DOCTYPE html><html><body>
<div id="txt">
  　　第一段正文。<br/><br/>
  　　第二段正文。<a href="/ad">广告链接</a><br/>
  <script>var ad = 1;</script>
  <style>.x { color: red; }</style>
  <p>  第三段  </p>
</div>
</body></html>"#;

    #[test]
    fn listing_preserves_document_order_and_skips_anchors_without_href(
    ) -> Result<(), ScraperError> {
        let markup = SelectorMarkup::with_defaults()?;
        let entries = markup.locate_listing(INDEX_HTML).expect("listing container");
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Ch1", "Ch2", "Ch3"]);
        assert_eq!(entries[0].href, "/c/1");
        assert_eq!(entries[2].href, "/c/3");
        Ok(())
    }

    #[test]
    fn listing_missing_container_is_none() -> Result<(), ScraperError> {
        let markup = SelectorMarkup::with_defaults()?;
        assert!(markup
            .locate_listing("<html><body><ul class=\"other\"></ul></body></html>")
            .is_none());
        Ok(())
    }

    #[test]
    fn listing_empty_container_is_empty_vec() -> Result<(), ScraperError> {
        let markup = SelectorMarkup::with_defaults()?;
        let entries = markup
            .locate_listing("<html><body><ul class=\"fen_4\"></ul></body></html>")
            .expect("container present");
        assert!(entries.is_empty());
        Ok(())
    }

    #[test]
    fn content_strips_links_scripts_and_styles() -> Result<(), ScraperError> {
        let markup = SelectorMarkup::with_defaults()?;
        let text = markup.locate_content(CHAPTER_HTML).expect("content container");
        assert_eq!(text, "第一段正文。\n第二段正文。\n第三段");
        assert!(!text.contains("广告"));
        assert!(!text.contains("var ad"));
        assert!(!text.contains("color"));
        Ok(())
    }

    #[test]
    fn content_missing_container_is_none() -> Result<(), ScraperError> {
        let markup = SelectorMarkup::with_defaults()?;
        assert!(markup
            .locate_content("<html><body><div id=\"other\">x</div></body></html>")
            .is_none());
        Ok(())
    }

    #[test]
    fn custom_selectors_are_used() -> Result<(), ScraperError> {
        let markup = SelectorMarkup::new("div.toc", "article")?;
        let entries = markup
            .locate_listing(r#"<div class="toc"><a href="a.html">A</a></div>"#)
            .expect("listing");
        assert_eq!(entries.len(), 1);
        let text = markup
            .locate_content("<article>line one<br>line two</article>")
            .expect("content");
        assert_eq!(text, "line one\nline two");
        Ok(())
    }

    #[test]
    fn invalid_selector_errors() {
        match SelectorMarkup::new("ul[", DEFAULT_CONTENT_SELECTOR) {
            Err(ScraperError::InvalidSelector { selector, .. }) => assert_eq!(selector, "ul["),
            other => panic!("expected InvalidSelector, got {:?}", other),
        }
    }
}
