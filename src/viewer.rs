use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const WORDS_PER_PAGE: usize = 125;

/// Splits concatenated chapter text into roughly page-sized chunks. A
/// chapter boundary always starts a fresh page; inside a chapter the page
/// fills to `words_per_page` before breaking.
pub fn split_into_pages<'a, I>(chapter_bodies: I, words_per_page: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pages: Vec<String> = Vec::new();
    let mut current_page = String::new();
    let mut current_word_count = 0;

    for body in chapter_bodies {
        if !current_page.trim().is_empty() {
            pages.push(current_page.trim().to_string());
            current_page.clear();
            current_word_count = 0;
        }

        for word in body.split(' ') {
            if current_word_count >= words_per_page && !current_page.trim().is_empty() {
                pages.push(current_page.trim().to_string());
                current_page.clear();
                current_word_count = 0;
            }
            current_page.push_str(word);
            current_page.push(' ');
            current_word_count += 1;
        }

        current_page.push_str("\n\n");
    }

    if !current_page.trim().is_empty() {
        pages.push(current_page.trim().to_string());
    }

    pages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Single,
    Spread,
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Single
    }
}

/// One rendered viewer page. Page 0 is always the cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageView {
    Cover {
        number: usize,
        image_url: Option<String>,
    },
    Text {
        number: usize,
        body: String,
    },
}

pub fn page_views(cover_image: Option<&str>, text_pages: Vec<String>) -> Vec<PageView> {
    std::iter::once(PageView::Cover {
        number: 0,
        image_url: cover_image.map(Into::into),
    })
    .chain(
        text_pages
            .into_iter()
            .enumerate()
            .map(|(i, body)| PageView::Text { number: i + 1, body }),
    )
    .collect()
}

/// Groups pages for the two-page display: the cover sits alone, story
/// pages pair up left/right.
pub fn into_spreads(pages: Vec<PageView>) -> Vec<Vec<PageView>> {
    let mut spreads = Vec::new();
    let mut iter = pages.into_iter();
    if let Some(cover) = iter.next() {
        spreads.push(vec![cover]);
    }
    for chunk in &iter.chunks(2) {
        spreads.push(chunk.collect());
    }
    spreads
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, tag: &str) -> String {
        (0..n).map(|i| format!("{}{}", tag, i)).join(" ")
    }

    fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().join(" ")
    }

    #[test]
    fn pages_reassemble_into_the_original_text() {
        let chapters = vec![words(40, "a"), words(300, "b"), words(125, "c")];
        let pages = split_into_pages(chapters.iter().map(String::as_str), WORDS_PER_PAGE);
        let reassembled = collapse_whitespace(&pages.join(" "));
        let original = collapse_whitespace(&chapters.join(" "));
        assert_eq!(reassembled, original);
    }

    #[test]
    fn chapter_boundaries_always_start_a_new_page() {
        let chapters = vec![words(10, "a"), words(10, "b")];
        let pages = split_into_pages(chapters.iter().map(String::as_str), WORDS_PER_PAGE);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].starts_with("a0"));
        assert!(pages[1].starts_with("b0"));
    }

    #[test]
    fn breaks_align_with_the_threshold_or_a_chapter_end() {
        let chapters = vec![words(300, "a")];
        let pages = split_into_pages(chapters.iter().map(String::as_str), WORDS_PER_PAGE);
        assert_eq!(pages.len(), 3);
        // Every page but the chapter-final one fills to the threshold.
        assert_eq!(pages[0].split_whitespace().count(), WORDS_PER_PAGE);
        assert_eq!(pages[1].split_whitespace().count(), WORDS_PER_PAGE);
        assert_eq!(pages[2].split_whitespace().count(), 50);
    }

    #[test]
    fn empty_chapter_list_produces_no_pages() {
        let pages = split_into_pages(std::iter::empty(), WORDS_PER_PAGE);
        assert!(pages.is_empty());
    }

    #[test]
    fn the_cover_is_page_zero() {
        let pages = page_views(Some("https://cdn/covers/x.png"), vec!["body".into()]);
        assert_eq!(
            pages[0],
            PageView::Cover {
                number: 0,
                image_url: Some("https://cdn/covers/x.png".into())
            }
        );
        assert_eq!(
            pages[1],
            PageView::Text {
                number: 1,
                body: "body".into()
            }
        );
    }

    #[test]
    fn spreads_pair_story_pages_after_a_lone_cover() {
        let pages = page_views(None, vec!["p1".into(), "p2".into(), "p3".into()]);
        let spreads = into_spreads(pages);
        assert_eq!(spreads.len(), 3);
        assert_eq!(spreads[0].len(), 1);
        assert_eq!(spreads[1].len(), 2);
        assert_eq!(spreads[2].len(), 1);
    }
}
