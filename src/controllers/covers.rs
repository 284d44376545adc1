use crate::models::AgeGroup;
use crate::outline::StoryBrief;
use crate::schema::stories;

use super::{map_result, ApiError, AppContext};

use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{info, span, Instrument, Level};
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverRequest {
    title: String,
    #[serde(rename = "ageGroup")]
    age_group: AgeGroup,
    characters: String,
    plot: String,
    #[serde(rename = "storyId")]
    story_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CoverResponse {
    pub success: bool,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

fn cover_style(age_group: AgeGroup) -> &'static str {
    match age_group {
        AgeGroup::Toddler => {
            "bright primary colors, simple shapes, very cute and friendly style, \
             board book illustration style, chunky characters"
        }
        AgeGroup::Preschool => {
            "vibrant colors, cartoon style, whimsical and magical, picture book \
             illustration, friendly characters with big expressions"
        }
        AgeGroup::EarlyReader => {
            "detailed illustration, adventure book style, dynamic composition, \
             chapter book cover style, more sophisticated character design"
        }
    }
}

fn cover_prompt(request: &CoverRequest) -> String {
    format!(
        r#"Create a beautiful children's book cover illustration for "{title}".

Story details:
- Characters: {characters}
- Plot: {plot}
- Age group: {age_group}

Style requirements for age {age_group}: {style}

Cover design specifications:
- Professional children's book cover illustration
- Include the main characters prominently
- Show a scene that captures the essence of the story
- Child-friendly and appealing to both kids and parents
- High quality, publishable illustration style
- Warm, inviting, and engaging composition
- No text or title on the image (just the illustration)
- Safe and appropriate content for children

Make it look like a professional children's book cover that would stand out on a bookshelf."#,
        title = request.title,
        characters = request.characters,
        plot = request.plot,
        age_group = request.age_group,
        style = cover_style(request.age_group),
    )
}

/// Generates a cover, stores it, and attaches the URL to the owning story.
/// The update is scoped to the caller's user id, so a story id belonging to
/// someone else matches zero rows and changes nothing.
#[tracing::instrument(
    name = "Generating a cover image.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn generate_cover(
    authorization: Option<String>,
    ctx: AppContext,
    body: CoverRequest,
) -> Result<CoverResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    let brief = StoryBrief {
        title: body.title.clone(),
        age_group: body.age_group,
        plot: body.plot.clone(),
        characters: body.characters.clone(),
    };
    if brief.has_missing_fields() {
        return Err(ApiError::MissingFields(
            "title, ageGroup, characters, plot, storyId",
        ));
    }

    let payload = ctx.llm.generate_image(&cover_prompt(&body)).await?;
    let image_bytes = ctx
        .llm
        .fetch_image_bytes(&payload)
        .instrument(tracing::info_span!("Fetching the generated image bytes."))
        .await?;
    let stored = ctx.covers.store_cover(image_bytes).await?;

    let conn = ctx
        .db_pool
        .get()
        .instrument(tracing::info_span!("Acquiring a DB Connection."))
        .await?
        .into_inner();
    let db_span = span!(Level::INFO, "Attaching the cover to the story.");
    let updated = {
        let _a = db_span.enter();
        diesel::update(
            stories::table
                .find(body.story_id)
                .filter(stories::user_id.eq(&session.user_id)),
        )
        .set(stories::cover_image.eq(Some(stored.url.clone())))
        .execute(&conn)?
    };
    if updated == 0 {
        info!(story_id = %body.story_id, "Cover update matched no rows.");
    }

    Ok(CoverResponse {
        success: true,
        image_url: stored.url,
        file_name: stored.key,
    })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path("covers"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .and(warp::body::json())
        .then(generate_cover)
        .map(map_result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_prompt_styles_by_age_band() {
        let request = CoverRequest {
            title: "The Lost Kitten".into(),
            age_group: AgeGroup::Toddler,
            characters: "A shy kitten, a wise owl".into(),
            plot: "Kitten gets lost and finds its way home".into(),
            story_id: Uuid::new_v4(),
        };
        let prompt = cover_prompt(&request);
        assert!(prompt.contains("board book illustration style"));
        assert!(prompt.contains("\"The Lost Kitten\""));
        assert!(prompt.contains("Age group: 0-2"));
    }
}
