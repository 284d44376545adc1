use crate::generation::{self, ChapterTask};
use crate::models::{Chapter, NewChapter, Story};
use crate::outline::StoryBrief;
use crate::schema::{chapters, stories};
use crate::usage;

use super::{map_result, ApiError, AppContext};

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{error, span, Instrument, Level};
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateChapterRequest {
    #[serde(rename = "storyId")]
    story_id: Uuid,
    #[serde(rename = "chapterNumber")]
    chapter_number: i32,
    title: String,
    summary: String,
    #[serde(rename = "userInput")]
    user_input: StoryBrief,
    #[serde(rename = "isLastChapter", default)]
    is_last_chapter: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateChapterResponse {
    pub success: bool,
    pub chapter: Chapter,
}

/// One chapter of the client's fan-out: prose, illustration prompt, row.
/// The last chapter also settles the free-plan accounting.
#[tracing::instrument(
    name = "Generating a story chapter.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn generate_chapter(
    authorization: Option<String>,
    ctx: AppContext,
    body: GenerateChapterRequest,
) -> Result<GenerateChapterResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    if body.title.trim().is_empty() || body.summary.trim().is_empty() {
        return Err(ApiError::MissingFields("title, summary"));
    }

    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();
    let db_check_span = span!(Level::INFO, "Checking the story belongs to the caller.");
    let story: Option<Story> = {
        let _a = db_check_span.enter();
        stories::table
            .find(body.story_id)
            .filter(stories::user_id.eq(&session.user_id))
            .first(&conn)
            .optional()?
    };
    if story.is_none() {
        return Err(ApiError::NotFound("story"));
    }

    let task = ChapterTask {
        chapter_number: body.chapter_number,
        title: body.title.clone(),
        summary: body.summary.clone(),
        is_last_chapter: body.is_last_chapter,
    };
    let generated = generation::generate_chapter(&ctx.llm, &body.user_input, &task).await?;

    let db_insert_span = span!(Level::INFO, "Inserting the chapter row.");
    let chapter: Chapter = {
        let _a = db_insert_span.enter();
        diesel::insert_into(chapters::table)
            .values(NewChapter {
                story_id: body.story_id,
                user_id: session.user_id.clone(),
                chapter_number: body.chapter_number,
                title: body.title.clone(),
                content: generated.content,
                image_prompt: generated.image_prompt,
            })
            .get_result(&conn)?
    };

    if body.is_last_chapter {
        // A lost increment only under-counts the free quota; not worth
        // failing an already-written chapter over.
        if let Err(err) = usage::increment_story_count(ctx.db_pool.clone(), &session.user_id).await
        {
            error!(error = ?err, "Failed to increment the story count.");
        }
    }

    Ok(GenerateChapterResponse {
        success: true,
        chapter,
    })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path("chapters"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .and(warp::body::json())
        .then(generate_chapter)
        .map(map_result)
}
