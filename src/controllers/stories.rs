use crate::flow::{self, CreationStep};
use crate::generation::ChapterTask;
use crate::models::{Chapter, NewStory, Story, UserInput};
use crate::outline::{self, StoryOutline};
use crate::schema::{chapters, stories, user_inputs};
use crate::usage;
use crate::viewer::{self, DisplayMode, PageView, WORDS_PER_PAGE};

use super::{map_result, ApiError, AppContext};

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{span, Instrument, Level};
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStoryRequest {
    #[serde(rename = "userInputId")]
    user_input_id: Uuid,
    outline: StoryOutline,
}

#[derive(Debug, Serialize)]
pub struct CreateStoryResponse {
    pub success: bool,
    #[serde(rename = "storyId")]
    pub story_id: Uuid,
    #[serde(rename = "chapterTasks")]
    pub chapter_tasks: Vec<ChapterTask>,
}

/// Turns an approved outline into a story row and the task list the client
/// fans out, one generation call per chapter. The server holds no state
/// between those calls.
#[tracing::instrument(
    name = "Creating a new story.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn create_story(
    authorization: Option<String>,
    ctx: AppContext,
    body: CreateStoryRequest,
) -> Result<CreateStoryResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    outline::validate(&body.outline)?;

    let status = usage::check_story_limit(ctx.db_pool.clone(), &session.user_id).await?;
    if !status.can_generate {
        return Err(ApiError::LimitExceeded(status));
    }

    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();

    let db_check_span = span!(Level::INFO, "Checking the user input exists.");
    let user_input: Option<UserInput> = {
        let _a = db_check_span.enter();
        user_inputs::table
            .find(body.user_input_id)
            .first(&conn)
            .optional()?
    };
    if user_input.is_none() {
        return Err(ApiError::NotFound("user input"));
    }

    let db_insert_span = span!(Level::INFO, "Inserting the story row.");
    let story: Story = {
        let _a = db_insert_span.enter();
        diesel::insert_into(stories::table)
            .values(NewStory {
                user_id: session.user_id.clone(),
                user_input_id: body.user_input_id,
                chapter_count: body.outline.chapters.len() as i32,
            })
            .get_result(&conn)?
    };

    let total = body.outline.chapters.len();
    let chapter_tasks = body
        .outline
        .chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| ChapterTask {
            chapter_number: chapter.chapter_number,
            title: chapter.title.clone(),
            summary: chapter.summary.clone(),
            is_last_chapter: i + 1 == total,
        })
        .collect();

    Ok(CreateStoryResponse {
        success: true,
        story_id: story.id,
        chapter_tasks,
    })
}

#[derive(Debug, Serialize)]
pub struct StoryWithChapters {
    #[serde(flatten)]
    pub story: Story,
    #[serde(rename = "userInput")]
    pub user_input: UserInput,
    pub chapters: Vec<Chapter>,
}

pub(super) async fn load_story_scoped(
    ctx: &AppContext,
    story_id: Uuid,
    user_id: &str,
) -> Result<(Story, Vec<Chapter>), ApiError> {
    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();
    let db_span = span!(Level::INFO, "Fetching the story from db.");
    let story: Option<Story> = {
        let _a = db_span.enter();
        stories::table
            .find(story_id)
            .filter(stories::user_id.eq(user_id))
            .first(&conn)
            .optional()?
    };
    let story = story.ok_or(ApiError::NotFound("story"))?;
    let chapter_span = span!(Level::INFO, "Fetching the chapters from db.");
    let story_chapters: Vec<Chapter> = {
        let _a = chapter_span.enter();
        chapters::table
            .filter(chapters::story_id.eq(story.id))
            .filter(chapters::user_id.eq(user_id))
            .order_by(chapters::chapter_number.asc())
            .load(&conn)?
    };
    Ok((story, story_chapters))
}

#[tracing::instrument(
    name = "Fetching a story.",
    err,
    level = "info",
    skip(ctx, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn get_story(
    story_id: Uuid,
    authorization: Option<String>,
    ctx: AppContext,
) -> Result<StoryWithChapters, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let (story, story_chapters) = load_story_scoped(&ctx, story_id, &session.user_id).await?;
    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();
    let user_input: UserInput = user_inputs::table.find(story.user_input_id).first(&conn)?;
    Ok(StoryWithChapters {
        story,
        user_input,
        chapters: story_chapters,
    })
}

#[derive(Debug, Deserialize)]
pub struct PagesQuery {
    #[serde(default)]
    mode: DisplayMode,
}

#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub mode: DisplayMode,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreads: Option<Vec<Vec<PageView>>>,
}

#[tracing::instrument(
    name = "Paginating a story for the viewer.",
    err,
    level = "info",
    skip(ctx, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn get_story_pages(
    story_id: Uuid,
    query: PagesQuery,
    authorization: Option<String>,
    ctx: AppContext,
) -> Result<PagesResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let (story, story_chapters) = load_story_scoped(&ctx, story_id, &session.user_id).await?;
    let text_pages = viewer::split_into_pages(
        story_chapters.iter().map(|c| c.content.as_str()),
        WORDS_PER_PAGE,
    );
    let pages = viewer::page_views(story.cover_image.as_deref(), text_pages);
    let total_pages = pages.len();
    Ok(match query.mode {
        DisplayMode::Single => PagesResponse {
            mode: DisplayMode::Single,
            total_pages,
            pages: Some(pages),
            spreads: None,
        },
        DisplayMode::Spread => PagesResponse {
            mode: DisplayMode::Spread,
            total_pages,
            pages: None,
            spreads: Some(viewer::into_spreads(pages)),
        },
    })
}

#[tracing::instrument(
    name = "Deriving story creation status.",
    err,
    level = "info",
    skip(ctx, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn get_story_status(
    story_id: Uuid,
    authorization: Option<String>,
    ctx: AppContext,
) -> Result<CreationStep, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let (story, story_chapters) = load_story_scoped(&ctx, story_id, &session.user_id).await?;
    Ok(flow::derive_step(
        story.id,
        story.chapter_count,
        story_chapters.len() as i32,
        story.cover_image.is_some(),
    ))
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let create_ctx = ctx.clone();
    let create_story_filter = warp::post()
        .and(warp::path("stories"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || create_ctx.clone()))
        .and(warp::body::json())
        .then(create_story)
        .map(map_result);
    let pages_ctx = ctx.clone();
    let story_pages_filter = warp::get()
        .and(warp::path("stories"))
        .and(warp::path::param())
        .and(warp::path("pages"))
        .and(warp::path::end())
        .and(warp::query())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || pages_ctx.clone()))
        .then(get_story_pages)
        .map(map_result);
    let status_ctx = ctx.clone();
    let story_status_filter = warp::get()
        .and(warp::path("stories"))
        .and(warp::path::param())
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || status_ctx.clone()))
        .then(get_story_status)
        .map(map_result);
    let get_story_filter = warp::get()
        .and(warp::path("stories"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .then(get_story)
        .map(map_result);
    create_story_filter
        .or(story_pages_filter)
        .or(story_status_filter)
        .or(get_story_filter)
}
