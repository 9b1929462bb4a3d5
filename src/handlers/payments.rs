use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

/// Body the GraphQL gateway posts for an action call.
#[derive(Debug, Default, Deserialize)]
pub struct ActionPayload {
    #[serde(default)]
    pub input: InitiateInput,
    #[serde(default)]
    pub session_variables: SessionVariables,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitiateInput {
    #[serde(rename = "itemId", alias = "recipeId")]
    pub item_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionVariables {
    #[serde(rename = "x-hasura-user-id")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub checkout_url: String,
}

pub async fn initiate(
    State(state): State<AppState>,
    payload: Result<Json<ActionPayload>, JsonRejection>,
) -> Result<Json<InitiateResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Malformed action payload");
        AppError::Validation("Invalid request format.".to_string())
    })?;

    let checkout = state
        .initiator
        .initiate(
            payload.session_variables.user_id.as_deref(),
            payload.input.item_id.as_deref(),
        )
        .await?;

    Ok(Json(InitiateResponse {
        checkout_url: checkout.checkout_url,
    }))
}
