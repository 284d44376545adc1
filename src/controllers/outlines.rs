use crate::clients::openai::ChatRequest;
use crate::models::{NewUserInput, UserInput};
use crate::outline::{self, StoryBrief, StoryOutline};
use crate::schema::user_inputs;
use crate::usage;

use super::{map_result, ApiError, AppContext};

use diesel::RunQueryDsl;
use serde::Serialize;
use tracing::{span, Instrument, Level};
use uuid::Uuid;
use warp::{Filter, Reply};

#[derive(Debug, Serialize)]
pub struct OutlineResponse {
    pub success: bool,
    pub outline: StoryOutline,
    #[serde(rename = "userInputId")]
    pub user_input_id: Uuid,
}

/// The whole outline flow: gate, persist the brief, ask the model for
/// chapter stubs, validate the shape, hand both back to the client.
#[tracing::instrument(
    name = "Generating a story outline.",
    err,
    level = "info",
    skip(ctx, body, authorization),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn generate_outline(
    authorization: Option<String>,
    ctx: AppContext,
    body: StoryBrief,
) -> Result<OutlineResponse, ApiError> {
    let session = ctx.sessions.session(authorization.as_deref())?;
    if body.has_missing_fields() {
        return Err(ApiError::MissingFields("title, ageGroup, plot, characters"));
    }

    // The gate runs before anything is spent on the model.
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
    let db_span = span!(Level::INFO, "Storing the user input.");
    let user_input: UserInput = {
        let _a = db_span.enter();
        diesel::insert_into(user_inputs::table)
            .values(NewUserInput {
                title: body.title.clone(),
                age_group: body.age_group,
                plot: body.plot.clone(),
                characters: body.characters.clone(),
            })
            .get_result(&conn)?
    };

    let raw = ctx
        .llm
        .chat_completion(ChatRequest {
            system: outline::system_prompt().into(),
            user: outline::outline_prompt(&body),
            temperature: 0.7,
            max_tokens: None,
            json_response: true,
        })
        .await?;
    let outline = outline::parse_outline(&raw)?;

    Ok(OutlineResponse {
        success: true,
        outline,
        user_input_id: user_input.id,
    })
}

pub fn get_filters(
    ctx: AppContext,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path("outlines"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::any().map(move || ctx.clone()))
        .and(warp::body::json())
        .then(generate_outline)
        .map(map_result)
}
