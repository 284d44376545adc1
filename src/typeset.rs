use itertools::Itertools;

/// Character budget of one printed line at the fixed body size.
pub const CONTENT_WIDTH: usize = 58;
/// Lines on a page before the layout starts a new one.
pub const LINES_PER_PAGE: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
    pub heading: bool,
}

impl Line {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).join("")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypesetPage {
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq)]
struct StyledWord {
    text: String,
    style: SpanStyle,
}

fn style_of(bold: bool, italic: bool) -> SpanStyle {
    match (bold, italic) {
        (true, true) => SpanStyle::BoldItalic,
        (true, false) => SpanStyle::Bold,
        (false, true) => SpanStyle::Italic,
        (false, false) => SpanStyle::Regular,
    }
}

/// Markdown-lite inline pass: `**` toggles bold, `*` toggles italic;
/// everything else is literal text.
pub fn parse_spans(text: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut current = String::new();
    let mut bold = false;
    let mut italic = false;
    let mut chars = text.chars().peekable();

    let mut flush = |buffer: &mut String, bold: bool, italic: bool, spans: &mut Vec<Span>| {
        if !buffer.is_empty() {
            spans.push(Span {
                text: std::mem::take(buffer),
                style: style_of(bold, italic),
            });
        }
    };

    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                flush(&mut current, bold, italic, &mut spans);
                bold = !bold;
            } else {
                flush(&mut current, bold, italic, &mut spans);
                italic = !italic;
            }
        } else {
            current.push(c);
        }
    }
    flush(&mut current, bold, italic, &mut spans);
    spans
}

fn styled_words(text: &str) -> Vec<StyledWord> {
    parse_spans(text)
        .into_iter()
        .flat_map(|span| {
            span.text
                .split_whitespace()
                .map(|word| StyledWord {
                    text: word.to_string(),
                    style: span.style,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Greedy word-wrap: each line fills until the next word would overflow
/// the width, then breaks. A single word longer than the width gets a
/// line of its own rather than being split.
fn wrap(words: &[StyledWord], width: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line_words: Vec<StyledWord> = Vec::new();
    let mut line_len = 0;

    for word in words {
        let word_len = word.text.chars().count();
        let candidate = if line_words.is_empty() {
            word_len
        } else {
            line_len + 1 + word_len
        };
        if candidate > width && !line_words.is_empty() {
            lines.push(build_line(&line_words, false));
            line_words.clear();
            line_len = word_len;
        } else {
            line_len = candidate;
        }
        line_words.push(word.clone());
    }
    if !line_words.is_empty() {
        lines.push(build_line(&line_words, false));
    }
    lines
}

fn build_line(words: &[StyledWord], heading: bool) -> Line {
    let mut spans: Vec<Span> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let mut text = String::new();
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&word.text);
        match spans.last_mut() {
            Some(last) if last.style == word.style => last.text.push_str(&text),
            _ => spans.push(Span {
                text,
                style: word.style,
            }),
        }
    }
    Line { spans, heading }
}

enum Block<'a> {
    Heading(&'a str),
    Paragraph(String),
}

fn blocks(content: &str) -> Vec<Block> {
    let mut out = Vec::new();
    for raw_block in content.split("\n\n") {
        let mut paragraph = String::new();
        for line in raw_block.lines() {
            let trimmed = line.trim_start();
            if let Some(heading) = trimmed.strip_prefix('#') {
                if !paragraph.trim().is_empty() {
                    out.push(Block::Paragraph(std::mem::take(&mut paragraph)));
                }
                out.push(Block::Heading(heading.trim_start_matches('#').trim()));
            } else {
                if !paragraph.is_empty() {
                    paragraph.push(' ');
                }
                paragraph.push_str(line);
            }
        }
        if !paragraph.trim().is_empty() {
            out.push(Block::Paragraph(paragraph));
        }
    }
    out
}

/// Lays out chapters for print. Every chapter title and every in-text
/// heading starts a new page; paragraphs wrap greedily to `width` and
/// spill onto new pages at the `lines_per_page` budget.
pub fn typeset<'a, I>(chapters: I, width: usize, lines_per_page: usize) -> Vec<TypesetPage>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pages: Vec<TypesetPage> = Vec::new();
    let mut current = TypesetPage::default();

    fn flush(pages: &mut Vec<TypesetPage>, current: &mut TypesetPage) {
        if !current.lines.is_empty() {
            pages.push(std::mem::take(current));
        }
    }

    let push_line = |pages: &mut Vec<TypesetPage>, current: &mut TypesetPage, line: Line| {
        if current.lines.len() >= lines_per_page {
            flush(pages, current);
        }
        current.lines.push(line);
    };

    for (title, content) in chapters {
        flush(&mut pages, &mut current);
        for line in wrap(&styled_words(title), width) {
            push_line(
                &mut pages,
                &mut current,
                Line {
                    heading: true,
                    ..line
                },
            );
        }
        for block in blocks(content) {
            match block {
                Block::Heading(text) => {
                    flush(&mut pages, &mut current);
                    for line in wrap(&styled_words(text), width) {
                        push_line(
                            &mut pages,
                            &mut current,
                            Line {
                                heading: true,
                                ..line
                            },
                        );
                    }
                }
                Block::Paragraph(text) => {
                    for line in wrap(&styled_words(&text), width) {
                        push_line(&mut pages, &mut current, line);
                    }
                }
            }
        }
    }
    flush(&mut pages, &mut current);
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_and_italic_toggle_inline() {
        let spans = parse_spans("plain **bold** and *slanted* end");
        let styles: Vec<(String, SpanStyle)> =
            spans.into_iter().map(|s| (s.text, s.style)).collect();
        assert_eq!(
            styles,
            vec![
                ("plain ".to_string(), SpanStyle::Regular),
                ("bold".to_string(), SpanStyle::Bold),
                (" and ".to_string(), SpanStyle::Regular),
                ("slanted".to_string(), SpanStyle::Italic),
                (" end".to_string(), SpanStyle::Regular),
            ]
        );
    }

    #[test]
    fn nested_emphasis_combines() {
        let spans = parse_spans("***loud***");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].style, SpanStyle::BoldItalic);
    }

    #[test]
    fn wrap_is_greedy_and_respects_the_width() {
        let words = styled_words("one two three four five six seven eight");
        let lines = wrap(&words, 14);
        for line in &lines {
            assert!(line.text().chars().count() <= 14, "line too wide: {:?}", line.text());
        }
        // Greedy: the first word of each line would not have fit on the
        // previous one.
        let mut previous_len: Option<usize> = None;
        for line in &lines {
            let text = line.text();
            let first_word = text.split(' ').next().unwrap();
            if let Some(prev) = previous_len {
                assert!(prev + 1 + first_word.chars().count() > 14);
            }
            previous_len = Some(text.chars().count());
        }
    }

    #[test]
    fn an_oversized_word_gets_its_own_line() {
        let words = styled_words("supercalifragilisticexpialidocious no");
        let lines = wrap(&words, 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "supercalifragilisticexpialidocious");
    }

    #[test]
    fn chapter_titles_and_headings_start_new_pages() {
        let chapters = vec![
            ("Chapter One", "Some opening text.\n\n# A heading\n\nMore text."),
            ("Chapter Two", "Second chapter text."),
        ];
        let pages = typeset(chapters.into_iter(), CONTENT_WIDTH, LINES_PER_PAGE);
        assert_eq!(pages.len(), 3);
        assert!(pages[0].lines[0].heading);
        assert_eq!(pages[1].lines[0].text(), "A heading");
        assert!(pages[1].lines[0].heading);
        assert!(pages[2].lines[0].heading);
        assert_eq!(pages[2].lines[0].text(), "Chapter Two");
    }

    #[test]
    fn long_paragraphs_spill_onto_new_pages() {
        let body = (0..120).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let pages = typeset(vec![("T", body.as_str())].into_iter(), 12, 5);
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(page.lines.len() <= 5);
        }
    }
}
