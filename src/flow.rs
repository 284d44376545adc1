use crate::outline::StoryOutline;

use derive_more::{Display, Error};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    Chapters,
    CoverImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationProgress {
    #[serde(rename = "totalChapters")]
    pub total_chapters: i32,
    #[serde(rename = "completedChapters")]
    pub completed_chapters: i32,
    #[serde(rename = "currentTask")]
    pub current_task: GenerationTask,
}

/// The creation wizard: one tagged state per screen, transitions checked
/// instead of juggled through booleans.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CreationStep {
    Form,
    OutlineReview {
        #[serde(rename = "userInputId")]
        user_input_id: Uuid,
        outline: StoryOutline,
    },
    Generating {
        #[serde(rename = "storyId")]
        story_id: Uuid,
        progress: GenerationProgress,
    },
    Complete {
        #[serde(rename = "storyId")]
        story_id: Uuid,
    },
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display(fmt = "Event {} is not valid in step {}.", event, from)]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

impl CreationStep {
    pub fn name(&self) -> &'static str {
        match self {
            CreationStep::Form => "form",
            CreationStep::OutlineReview { .. } => "outline_review",
            CreationStep::Generating { .. } => "generating",
            CreationStep::Complete { .. } => "complete",
        }
    }

    pub fn outline_ready(
        self,
        user_input_id: Uuid,
        outline: StoryOutline,
    ) -> Result<CreationStep, TransitionError> {
        match self {
            CreationStep::Form => Ok(CreationStep::OutlineReview {
                user_input_id,
                outline,
            }),
            other => Err(TransitionError {
                from: other.name(),
                event: "outline_ready",
            }),
        }
    }

    /// A failed or limit-blocked outline sends the user back to the form.
    pub fn back_to_form(self) -> Result<CreationStep, TransitionError> {
        match self {
            CreationStep::Form | CreationStep::OutlineReview { .. } => Ok(CreationStep::Form),
            other => Err(TransitionError {
                from: other.name(),
                event: "back_to_form",
            }),
        }
    }

    pub fn approve(self, story_id: Uuid) -> Result<CreationStep, TransitionError> {
        match self {
            CreationStep::OutlineReview { outline, .. } => Ok(CreationStep::Generating {
                story_id,
                progress: GenerationProgress {
                    total_chapters: outline.chapters.len() as i32,
                    completed_chapters: 0,
                    current_task: GenerationTask::Chapters,
                },
            }),
            other => Err(TransitionError {
                from: other.name(),
                event: "approve",
            }),
        }
    }

    pub fn chapter_finished(self) -> Result<CreationStep, TransitionError> {
        match self {
            CreationStep::Generating {
                story_id,
                mut progress,
            } => {
                if progress.completed_chapters >= progress.total_chapters {
                    return Err(TransitionError {
                        from: "generating",
                        event: "chapter_finished",
                    });
                }
                progress.completed_chapters += 1;
                if progress.completed_chapters == progress.total_chapters {
                    progress.current_task = GenerationTask::CoverImage;
                }
                Ok(CreationStep::Generating { story_id, progress })
            }
            other => Err(TransitionError {
                from: other.name(),
                event: "chapter_finished",
            }),
        }
    }

    pub fn cover_finished(self) -> Result<CreationStep, TransitionError> {
        match self {
            CreationStep::Generating { story_id, progress }
                if progress.completed_chapters == progress.total_chapters =>
            {
                Ok(CreationStep::Complete { story_id })
            }
            other => Err(TransitionError {
                from: other.name(),
                event: "cover_finished",
            }),
        }
    }
}

/// Rebuilds the wizard step from persisted rows for the status endpoint.
/// Anything short of a full chapter set is still generating; a full set
/// without a cover is waiting on the cover; a cover completes the story.
pub fn derive_step(
    story_id: Uuid,
    chapter_count: i32,
    chapters_done: i32,
    cover_present: bool,
) -> CreationStep {
    let completed = chapters_done.min(chapter_count);
    if cover_present && completed == chapter_count {
        return CreationStep::Complete { story_id };
    }
    CreationStep::Generating {
        story_id,
        progress: GenerationProgress {
            total_chapters: chapter_count,
            completed_chapters: completed,
            current_task: if completed < chapter_count {
                GenerationTask::Chapters
            } else {
                GenerationTask::CoverImage
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::{ChapterOutline, StoryOutline};

    fn outline(chapters: usize) -> StoryOutline {
        StoryOutline {
            title: "The Lost Kitten".into(),
            chapters: (1..=chapters as i32)
                .map(|n| ChapterOutline {
                    chapter_number: n,
                    title: format!("Chapter {}", n),
                    summary: "Something happens.".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn the_happy_path_walks_every_step() {
        let user_input_id = Uuid::new_v4();
        let story_id = Uuid::new_v4();
        let mut step = CreationStep::Form
            .outline_ready(user_input_id, outline(5))
            .unwrap()
            .approve(story_id)
            .unwrap();
        for _ in 0..5 {
            step = step.chapter_finished().unwrap();
        }
        match &step {
            CreationStep::Generating { progress, .. } => {
                assert_eq!(progress.completed_chapters, 5);
                assert_eq!(progress.current_task, GenerationTask::CoverImage);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(
            step.cover_finished().unwrap(),
            CreationStep::Complete { story_id }
        );
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        assert!(CreationStep::Form.approve(Uuid::new_v4()).is_err());
        assert!(CreationStep::Form.chapter_finished().is_err());
        let reviewing = CreationStep::Form
            .outline_ready(Uuid::new_v4(), outline(5))
            .unwrap();
        assert!(reviewing.clone().cover_finished().is_err());
        assert!(reviewing.outline_ready(Uuid::new_v4(), outline(5)).is_err());
    }

    #[test]
    fn a_blocked_outline_returns_to_the_form() {
        let reviewing = CreationStep::Form
            .outline_ready(Uuid::new_v4(), outline(5))
            .unwrap();
        assert_eq!(reviewing.back_to_form().unwrap(), CreationStep::Form);
    }

    #[test]
    fn cover_cannot_finish_before_the_chapters() {
        let step = CreationStep::Form
            .outline_ready(Uuid::new_v4(), outline(5))
            .unwrap()
            .approve(Uuid::new_v4())
            .unwrap();
        assert!(step.cover_finished().is_err());
    }

    #[test]
    fn derivation_matches_persisted_state() {
        let id = Uuid::new_v4();
        match derive_step(id, 5, 2, false) {
            CreationStep::Generating { progress, .. } => {
                assert_eq!(progress.completed_chapters, 2);
                assert_eq!(progress.current_task, GenerationTask::Chapters);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match derive_step(id, 5, 5, false) {
            CreationStep::Generating { progress, .. } => {
                assert_eq!(progress.current_task, GenerationTask::CoverImage);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(derive_step(id, 5, 5, true), CreationStep::Complete { story_id: id });
    }
}
