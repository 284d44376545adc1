use crate::binder;
use crate::typeset::{self, CONTENT_WIDTH, LINES_PER_PAGE};

use super::stories::load_story_scoped;
use super::{error_reply, ApiError, AppContext};

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportRequest {
    #[serde(rename = "storyId")]
    story_id: Uuid,
}

pub struct FileDownload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

fn map_file_result(result: Result<FileDownload, ApiError>) -> warp::reply::Response {
    match result {
        Ok(download) => warp::http::Response::builder()
            .header("content-type", download.content_type)
            .header(
                "content-disposition",
                format!("attachment; filename=\"{}\"", download.file_name),
            )
            .header("content-length", download.bytes.len())
            .body(warp::hyper::Body::from(download.bytes))
            .expect("Failed to build export response."),
        Err(err) => error_reply(err).into_response(),
    }
}

/// A missing or unfetchable cover degrades to a coverless book rather
/// than failing the export.
async fn fetch_cover_bytes(cover_image: Option<&str>) -> Option<Vec<u8>> {
    let url = cover_image?;
    let response = match reqwest::get(url).await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = ?err, "Failed to fetch the cover image; exporting without it.");
            return None;
        }
    };
    match response.bytes().await {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(err) => {
            warn!(error = ?err, "Failed to read the cover image; exporting without it.");
            None
        }
    }
}

#[tracing::instrument(
    name = "Exporting a story as epub.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn export_epub(
    authorization: Option<String>,
    ctx: AppContext,
    body: ExportRequest,
) -> Result<FileDownload, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let (story, chapters) = load_story_scoped(&ctx, body.story_id, &session.user_id).await?;
    if chapters.is_empty() {
        return Err(ApiError::NotFound("chapters"));
    }

    let story_title = binder::display_title(chapters.first().map(|c| c.title.as_str()));
    let author = session.name.unwrap_or_else(|| "Unknown Author".into());
    let chapter_pairs: Vec<(String, String)> = chapters
        .into_iter()
        .map(|c| (c.title, c.content))
        .collect();
    let html = binder::build_book_html(&story_title, &chapter_pairs);
    let cover = fetch_cover_bytes(story.cover_image.as_deref()).await;
    let bytes = binder::generate_epub(&html, &story_title, &author, cover.as_deref()).await?;
    Ok(FileDownload {
        bytes,
        content_type: "application/epub+zip",
        file_name: binder::export_file_name(&story_title, "epub"),
    })
}

#[tracing::instrument(
    name = "Exporting a story as pdf.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn export_pdf(
    authorization: Option<String>,
    ctx: AppContext,
    body: ExportRequest,
) -> Result<FileDownload, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let (story, chapters) = load_story_scoped(&ctx, body.story_id, &session.user_id).await?;
    if chapters.is_empty() {
        return Err(ApiError::NotFound("chapters"));
    }

    let story_title = binder::display_title(chapters.first().map(|c| c.title.as_str()));
    let author = session.name.unwrap_or_else(|| "Unknown Author".into());
    let pages = typeset::typeset(
        chapters
            .iter()
            .map(|c| (c.title.as_str(), c.content.as_str())),
        CONTENT_WIDTH,
        LINES_PER_PAGE,
    );
    let html = binder::build_print_html(&story_title, &pages);
    let cover = fetch_cover_bytes(story.cover_image.as_deref()).await;
    let bytes = binder::generate_pdf(&html, &story_title, &author, cover.as_deref()).await?;
    Ok(FileDownload {
        bytes,
        content_type: "application/pdf",
        file_name: binder::export_file_name(&story_title, "pdf"),
    })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let epub_ctx = ctx.clone();
    let epub_filter = warp::post()
        .and(warp::path("exports"))
        .and(warp::path("epub"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || epub_ctx.clone()))
        .and(warp::body::json())
        .then(export_epub)
        .map(map_file_result);
    let pdf_filter = warp::post()
        .and(warp::path("exports"))
        .and(warp::path("pdf"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .and(warp::body::json())
        .then(export_pdf)
        .map(map_file_result);
    epub_filter.or(pdf_filter)
}
