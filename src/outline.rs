use crate::models::AgeGroup;

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

pub const MIN_CHAPTERS: usize = 5;
pub const MAX_CHAPTERS: usize = 6;

/// The raw creative brief as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryBrief {
    pub title: String,
    #[serde(rename = "ageGroup")]
    pub age_group: AgeGroup,
    pub plot: String,
    pub characters: String,
}

impl StoryBrief {
    pub fn has_missing_fields(&self) -> bool {
        self.title.trim().is_empty()
            || self.plot.trim().is_empty()
            || self.characters.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterOutline {
    pub chapter_number: i32,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryOutline {
    pub title: String,
    pub chapters: Vec<ChapterOutline>,
}

#[derive(Debug, Display, From, Error)]
pub enum Error {
    Parse(serde_json::Error),
    #[from(ignore)]
    #[display(fmt = "Outline contained {} chapters, expected {} to {}.", "_0", "MIN_CHAPTERS", "MAX_CHAPTERS")]
    ChapterCount(#[error(not(source))] usize),
    #[from(ignore)]
    #[display(fmt = "Chapter {} is missing a title or summary.", "_0")]
    EmptyChapterStub(#[error(not(source))] i32),
}

pub fn system_prompt() -> &'static str {
    "You are a professional children's book author who creates engaging story \
     outlines. Always respond with valid JSON."
}

pub fn outline_prompt(brief: &StoryBrief) -> String {
    format!(
        r#"Create a story outline for a children's book with the following details:

Title: {title}
Age Group: {age_group}
Main Characters: {characters}
Plot: {plot}

Create exactly 5-6 chapter outlines. For each chapter, provide:
1. A catchy chapter title (3-8 words)
2. A one-line summary (10-15 words describing what happens)

Format your response as a JSON object like this:
{{
  "title": "{title}",
  "chapters": [
    {{
      "chapter_number": 1,
      "title": "Chapter Title",
      "summary": "One line summary of what happens in this chapter."
    }}
  ]
}}

Make sure the story flows well from chapter to chapter and includes a clear beginning, middle, and satisfying conclusion appropriate for the age group."#,
        title = brief.title,
        age_group = brief.age_group,
        characters = brief.characters,
        plot = brief.plot,
    )
}

/// Parses the model's JSON into a typed outline and enforces the shape the
/// rest of the flow depends on: 5-6 chapters, none of them blank.
pub fn parse_outline(raw: &str) -> Result<StoryOutline, Error> {
    let outline: StoryOutline = serde_json::from_str(raw)?;
    validate(&outline)?;
    Ok(outline)
}

pub fn validate(outline: &StoryOutline) -> Result<(), Error> {
    if outline.chapters.len() < MIN_CHAPTERS || outline.chapters.len() > MAX_CHAPTERS {
        return Err(Error::ChapterCount(outline.chapters.len()));
    }
    for chapter in &outline.chapters {
        if chapter.title.trim().is_empty() || chapter.summary.trim().is_empty() {
            return Err(Error::EmptyChapterStub(chapter.chapter_number));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline_json(count: usize) -> String {
        let chapters: Vec<String> = (1..=count)
            .map(|n| {
                format!(
                    r#"{{"chapter_number": {}, "title": "Chapter {}", "summary": "Something happens in chapter {}."}}"#,
                    n, n, n
                )
            })
            .collect();
        format!(
            r#"{{"title": "The Lost Kitten", "chapters": [{}]}}"#,
            chapters.join(",")
        )
    }

    #[test]
    fn five_and_six_chapter_outlines_parse() {
        for count in [5, 6] {
            let outline = parse_outline(&outline_json(count)).unwrap();
            assert_eq!(outline.chapters.len(), count);
            assert_eq!(outline.title, "The Lost Kitten");
        }
    }

    #[test]
    fn outlines_outside_the_band_are_rejected() {
        for count in [0, 4, 7] {
            assert!(matches!(
                parse_outline(&outline_json(count)),
                Err(Error::ChapterCount(n)) if n == count
            ));
        }
    }

    #[test]
    fn blank_summaries_are_rejected() {
        let raw = r#"{"title": "T", "chapters": [
            {"chapter_number": 1, "title": "A", "summary": "ok"},
            {"chapter_number": 2, "title": "B", "summary": "ok"},
            {"chapter_number": 3, "title": "C", "summary": "   "},
            {"chapter_number": 4, "title": "D", "summary": "ok"},
            {"chapter_number": 5, "title": "E", "summary": "ok"}
        ]}"#;
        assert!(matches!(parse_outline(raw), Err(Error::EmptyChapterStub(3))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_outline("a story about a kitten"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn briefs_with_blank_fields_are_flagged() {
        let brief = StoryBrief {
            title: "The Lost Kitten".into(),
            age_group: crate::models::AgeGroup::Preschool,
            plot: "  ".into(),
            characters: "A shy kitten, a wise owl".into(),
        };
        assert!(brief.has_missing_fields());
    }
}
