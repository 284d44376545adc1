mod errors;
use crate::typeset::{SpanStyle, TypesetPage};

use rand::Rng;
use std::fs;
use tokio::process::Command;
use tracing::info;
use uuid::Uuid;

pub use self::errors::Error;

/// Fixed book stylesheet; every export gets the same look.
const BOOK_STYLESHEET: &str = r#"
body {
  font-family: 'Georgia', 'Times New Roman', serif;
  line-height: 1.8;
  margin: 2em;
  color: #2c3e50;
  background-color: #fefefe;
}

.chapter {
  margin-bottom: 2em;
}

.chapter-title {
  color: #34495e;
  border-bottom: 3px solid #3498db;
  padding-bottom: 0.5em;
  margin-bottom: 1.5em;
  font-size: 1.8em;
  font-weight: bold;
  text-align: center;
}

.chapter-content {
  text-align: justify;
  font-size: 1.1em;
}

.paragraph {
  margin-bottom: 1.2em;
  text-indent: 2em;
  word-spacing: 0.1em;
}

.page {
  page-break-after: always;
}
"#;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One flowing HTML document for the EPUB: chapter headings plus their
/// paragraphs, paragraph breaks taken from blank lines in the prose.
pub fn build_book_html(title: &str, chapters: &[(String, String)]) -> String {
    let mut body = String::new();
    for (chapter_title, content) in chapters {
        body.push_str("<div class=\"chapter\">\n");
        body.push_str(&format!(
            "<h1 class=\"chapter-title\">{}</h1>\n<div class=\"chapter-content\">\n",
            escape_html(chapter_title)
        ));
        for paragraph in content.split("\n\n").filter(|p| !p.trim().is_empty()) {
            body.push_str(&format!(
                "<p class=\"paragraph\">{}</p>\n",
                escape_html(paragraph.trim())
            ));
        }
        body.push_str("</div>\n</div>\n");
    }
    wrap_html(title, &body)
}

/// The PDF variant renders the typeset page layout: one div per laid-out
/// page, spans carrying their inline styles, page breaks forced between.
pub fn build_print_html(title: &str, pages: &[TypesetPage]) -> String {
    let mut body = String::new();
    for page in pages {
        body.push_str("<div class=\"page\">\n");
        for line in &page.lines {
            if line.heading {
                body.push_str("<h1 class=\"chapter-title\">");
            } else {
                body.push_str("<p class=\"paragraph\">");
            }
            for span in &line.spans {
                let text = escape_html(&span.text);
                match span.style {
                    SpanStyle::Regular => body.push_str(&text),
                    SpanStyle::Bold => body.push_str(&format!("<b>{}</b>", text)),
                    SpanStyle::Italic => body.push_str(&format!("<i>{}</i>", text)),
                    SpanStyle::BoldItalic => body.push_str(&format!("<b><i>{}</i></b>", text)),
                }
            }
            if line.heading {
                body.push_str("</h1>\n");
            } else {
                body.push_str("</p>\n");
            }
        }
        body.push_str("</div>\n");
    }
    wrap_html(title, &body)
}

fn wrap_html(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        BOOK_STYLESHEET,
        body
    )
}

/// Attachment filename: the story title with anything non-alphanumeric
/// flattened to underscores.
pub fn export_file_name(title: &str, extension: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.{}", safe, extension)
}

/// Display title for exports, taken from the first chapter with any
/// "Chapter N:" prefix stripped.
pub fn display_title(first_chapter_title: Option<&str>) -> String {
    let title = match first_chapter_title {
        Some(t) => t,
        None => return "Untitled Story".into(),
    };
    if let Some(rest) = title.strip_prefix("Chapter ") {
        let after_number = rest.trim_start_matches(|c: char| c.is_ascii_digit());
        if after_number.len() < rest.len() {
            if let Some(stripped) = after_number.strip_prefix(':') {
                return stripped.trim_start().to_string();
            }
        }
    }
    title.to_string()
}

pub async fn generate_epub(
    html: &str,
    book_title: &str,
    author: &str,
    cover_bytes: Option<&[u8]>,
) -> Result<Vec<u8>, Error> {
    convert(html, book_title, author, cover_bytes, "epub").await
}

pub async fn generate_pdf(
    html: &str,
    book_title: &str,
    author: &str,
    cover_bytes: Option<&[u8]>,
) -> Result<Vec<u8>, Error> {
    convert(html, book_title, author, cover_bytes, "pdf").await
}

#[tracing::instrument(
    name = "Converting a book.",
    err,
    level = "info",
    skip(html, cover_bytes),
    fields(request_id = %Uuid::new_v4())
)]
async fn convert(
    html: &str,
    book_title: &str,
    author: &str,
    cover_bytes: Option<&[u8]>,
    output_extension: &str,
) -> Result<Vec<u8>, Error> {
    let file_name: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(30)
        .map(char::from)
        .collect();
    let in_path = format!("/tmp/{}.html", file_name);
    let out_path = format!("/tmp/{}.{}", file_name, output_extension);
    fs::write(&in_path, html)?;

    let cover_path = match cover_bytes {
        Some(bytes) => {
            let path = format!("/tmp/{}.png", file_name);
            fs::write(&path, bytes)?;
            Some(path)
        }
        None => None,
    };

    let mut command = Command::new("ebook-convert");
    command
        .arg(&in_path)
        .arg(&out_path)
        .arg("--authors")
        .arg(author)
        .arg("--title")
        .arg(book_title);
    if let Some(cover) = &cover_path {
        command.arg("--cover").arg(cover);
    }
    let output = command.output().await?;
    info!(
        stdout = ?String::from_utf8_lossy(&output.stdout),
        stderr = ?String::from_utf8_lossy(&output.stderr),
        status_code = ?output.status
    );
    if !output.status.success() {
        return Err(Error::ConvertFile);
    }
    let bytes = fs::read(&out_path)?;
    fs::remove_file(&in_path)?;
    fs::remove_file(&out_path)?;
    if let Some(cover) = cover_path {
        fs::remove_file(cover)?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeset::{typeset, CONTENT_WIDTH, LINES_PER_PAGE};

    #[test]
    fn book_html_carries_chapters_and_paragraphs() {
        let chapters = vec![(
            "Chapter 1: The Lost Kitten".to_string(),
            "First paragraph.\n\nSecond <paragraph>.".to_string(),
        )];
        let html = build_book_html("The Lost Kitten", &chapters);
        assert!(html.contains("<h1 class=\"chapter-title\">Chapter 1: The Lost Kitten</h1>"));
        assert!(html.contains("<p class=\"paragraph\">First paragraph.</p>"));
        assert!(html.contains("Second &lt;paragraph&gt;."));
        assert!(html.contains("font-family: 'Georgia'"));
    }

    #[test]
    fn print_html_emits_one_div_per_page() {
        let pages = typeset(
            vec![("Chapter 1", "Some **bold** words here.")].into_iter(),
            CONTENT_WIDTH,
            LINES_PER_PAGE,
        );
        let html = build_print_html("T", &pages);
        assert_eq!(html.matches("<div class=\"page\">").count(), pages.len());
        assert!(html.contains("<b>bold</b>"));
    }

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(
            export_file_name("The Lost Kitten!", "epub"),
            "The_Lost_Kitten_.epub"
        );
    }

    #[test]
    fn display_title_strips_the_chapter_prefix() {
        assert_eq!(
            display_title(Some("Chapter 1: The Lost Kitten")),
            "The Lost Kitten"
        );
        assert_eq!(display_title(Some("A Plain Title")), "A Plain Title");
        assert_eq!(display_title(None), "Untitled Story");
    }
}
