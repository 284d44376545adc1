use crate::clients::openai::{self, ChatRequest, OpenAiClient};
use crate::outline::StoryBrief;

use serde::{Deserialize, Serialize};

/// How much of the freshly written prose the illustration prompt gets to see.
const IMAGE_PROMPT_CONTEXT_CHARS: usize = 500;

const FALLBACK_IMAGE_PROMPT: &str = "A colorful children's book illustration";

/// One unit of the client-driven fan-out: everything needed to write a
/// single chapter without the server holding any state between calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterTask {
    #[serde(rename = "chapterNumber")]
    pub chapter_number: i32,
    pub title: String,
    pub summary: String,
    #[serde(rename = "isLastChapter")]
    pub is_last_chapter: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedChapter {
    pub content: String,
    pub image_prompt: String,
}

fn chapter_system_prompt() -> &'static str {
    "You are a professional children's book author who creates engaging, \
     educational, and age-appropriate story chapters. Your stories are \
     imaginative, positive, and include valuable life lessons."
}

fn chapter_prompt(brief: &StoryBrief, task: &ChapterTask) -> String {
    format!(
        r#"Write a children's book chapter in the style of *Geronimo Stilton*. The chapter should be energetic, filled with quirky characters, humorous narration, and expressive language.

Story Details:
- Age Group: {age_group}
- Main Characters: {characters}
- Overall Plot: {plot}

Chapter Details:
- Chapter {number}: {title}
- Chapter Summary: {summary}

Requirements:
- Chapter length should be 200-300 words
- Make it dynamic, fast-paced, and funny
- Include vivid imagery and exciting sound words (like ZOOM! SPLAT! WHOOSH!)
- Use playful emphasis where appropriate (like THIS or *that*)
- Narrator should have a strong, fun personality
- End with a smooth transition to keep readers engaged

Write the complete chapter content."#,
        age_group = brief.age_group,
        characters = brief.characters,
        plot = brief.plot,
        number = task.chapter_number,
        title = task.title,
        summary = task.summary,
    )
}

fn image_prompt_system_prompt() -> &'static str {
    "You are an expert at creating detailed image prompts for children's book \
     illustrations. Create vivid, colorful, child-friendly descriptions."
}

fn image_prompt_request(task: &ChapterTask, brief: &StoryBrief, excerpt: &str) -> String {
    format!(
        r#"Create a detailed image prompt for an illustration for this chapter:

Chapter Title: {title}
Chapter Content: {excerpt}...

The image should be:
- Child-friendly and colorful
- In a cartoon/illustration style
- Show the main characters and key scene from this chapter
- Engaging for children aged {age_group}

Provide a detailed prompt (2-3 sentences) that an AI image generator could use."#,
        title = task.title,
        excerpt = excerpt,
        age_group = brief.age_group,
    )
}

pub fn prose_excerpt(content: &str) -> String {
    content.chars().take(IMAGE_PROMPT_CONTEXT_CHARS).collect()
}

/// Writes one chapter: prose first, then an illustration prompt seeded with
/// the opening of that prose. The two calls are sequential because the
/// second cannot be phrased until the first returns.
#[tracing::instrument(
    name = "Generating a chapter.",
    err,
    level = "info",
    skip(llm, brief, task),
    fields(chapter_number = task.chapter_number)
)]
pub async fn generate_chapter(
    llm: &OpenAiClient,
    brief: &StoryBrief,
    task: &ChapterTask,
) -> Result<GeneratedChapter, openai::Error> {
    let content = llm
        .chat_completion(ChatRequest {
            system: chapter_system_prompt().into(),
            user: chapter_prompt(brief, task),
            temperature: 0.8,
            max_tokens: None,
            json_response: false,
        })
        .await?;

    let image_prompt = match llm
        .chat_completion(ChatRequest {
            system: image_prompt_system_prompt().into(),
            user: image_prompt_request(task, brief, &prose_excerpt(&content)),
            temperature: 0.7,
            max_tokens: None,
            json_response: false,
        })
        .await
    {
        Ok(prompt) => prompt,
        // An empty illustration prompt is not worth failing the chapter for.
        Err(openai::Error::EmptyCompletion) => FALLBACK_IMAGE_PROMPT.into(),
        Err(err) => return Err(err),
    };

    Ok(GeneratedChapter {
        content,
        image_prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgeGroup;

    fn brief() -> StoryBrief {
        StoryBrief {
            title: "The Lost Kitten".into(),
            age_group: AgeGroup::Preschool,
            plot: "Kitten gets lost and finds its way home with the owl's help".into(),
            characters: "A shy kitten, a wise owl".into(),
        }
    }

    fn task() -> ChapterTask {
        ChapterTask {
            chapter_number: 2,
            title: "Into the Dark Woods".into(),
            summary: "The kitten wanders deeper and meets the owl.".into(),
            is_last_chapter: false,
        }
    }

    #[test]
    fn chapter_prompt_carries_the_brief_and_the_task() {
        let prompt = chapter_prompt(&brief(), &task());
        assert!(prompt.contains("Age Group: 3-5"));
        assert!(prompt.contains("Chapter 2: Into the Dark Woods"));
        assert!(prompt.contains("A shy kitten, a wise owl"));
    }

    #[test]
    fn excerpt_is_bounded_and_char_safe() {
        let long = "ö".repeat(900);
        let excerpt = prose_excerpt(&long);
        assert_eq!(excerpt.chars().count(), 500);
        let short = "a tiny chapter";
        assert_eq!(prose_excerpt(short), short);
    }

    #[test]
    fn chapter_tasks_serialize_with_client_facing_keys() {
        let value = serde_json::to_value(task()).unwrap();
        assert!(value.get("chapterNumber").is_some());
        assert!(value.get("isLastChapter").is_some());
    }
}
