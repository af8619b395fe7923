use crate::extract::{ApiPath, ApiQuery, ValidJson};
use crate::middleware::AuthUser;
use crate::{ApiResult, AppState};
use axum::{extract::State, http::StatusCode, Extension, Json};
use recipe_core::{Label, LabelKind};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A tag or ingredient as it appears in requests, alone or nested in a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabelPayload {
    pub name: String,
}

/// PATCH body for a tag or ingredient; an absent name leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LabelPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabelResponse {
    pub id: i64,
    pub name: String,
}

impl From<Label> for LabelResponse {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LabelListQuery {
    /// Non-zero to list only labels used by at least one recipe.
    pub assigned_only: Option<u8>,
}

async fn list(
    state: AppState,
    kind: LabelKind,
    user_id: i64,
    query: LabelListQuery,
) -> ApiResult<Json<Vec<LabelResponse>>> {
    let assigned_only = query.assigned_only.unwrap_or(0) != 0;
    let labels = state
        .db(move |store| store.list_labels(kind, user_id, assigned_only))
        .await?;
    Ok(Json(labels.into_iter().map(Into::into).collect()))
}

async fn update(
    state: AppState,
    kind: LabelKind,
    user_id: i64,
    id: i64,
    name: Option<String>,
) -> ApiResult<Json<LabelResponse>> {
    let label = state
        .db(move |store| match name {
            Some(name) => store.update_label(kind, user_id, id, &name),
            None => store.get_label(kind, user_id, id),
        })
        .await?;
    Ok(Json(label.into()))
}

async fn delete(state: AppState, kind: LabelKind, user_id: i64, id: i64) -> ApiResult<StatusCode> {
    state
        .db(move |store| store.delete_label(kind, user_id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/recipe/tags",
    tag = "recipe",
    params(LabelListQuery),
    responses(
        (status = 200, description = "The user's tags, by name descending", body = Vec<LabelResponse>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<LabelListQuery>,
) -> ApiResult<Json<Vec<LabelResponse>>> {
    list(state, LabelKind::Tag, user.id, query).await
}

#[utoipa::path(
    put,
    path = "/api/recipe/tags/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Tag id")),
    request_body = LabelPayload,
    responses(
        (status = 200, description = "Tag renamed", body = LabelResponse),
        (status = 400, description = "Missing or invalid name"),
        (status = 404, description = "No such tag for this user")
    ),
    security(("token" = []))
)]
pub async fn replace_tag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(payload): ValidJson<LabelPayload>,
) -> ApiResult<Json<LabelResponse>> {
    update(state, LabelKind::Tag, user.id, id, Some(payload.name)).await
}

#[utoipa::path(
    patch,
    path = "/api/recipe/tags/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Tag id")),
    request_body = LabelPatch,
    responses(
        (status = 200, description = "Tag updated", body = LabelResponse),
        (status = 400, description = "Invalid name"),
        (status = 404, description = "No such tag for this user")
    ),
    security(("token" = []))
)]
pub async fn update_tag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(patch): ValidJson<LabelPatch>,
) -> ApiResult<Json<LabelResponse>> {
    update(state, LabelKind::Tag, user.id, id, patch.name).await
}

#[utoipa::path(
    delete,
    path = "/api/recipe/tags/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Tag id")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 404, description = "No such tag for this user")
    ),
    security(("token" = []))
)]
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    delete(state, LabelKind::Tag, user.id, id).await
}

#[utoipa::path(
    get,
    path = "/api/recipe/ingredients",
    tag = "recipe",
    params(LabelListQuery),
    responses(
        (status = 200, description = "The user's ingredients, by name descending", body = Vec<LabelResponse>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<LabelListQuery>,
) -> ApiResult<Json<Vec<LabelResponse>>> {
    list(state, LabelKind::Ingredient, user.id, query).await
}

#[utoipa::path(
    put,
    path = "/api/recipe/ingredients/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Ingredient id")),
    request_body = LabelPayload,
    responses(
        (status = 200, description = "Ingredient renamed", body = LabelResponse),
        (status = 400, description = "Missing or invalid name"),
        (status = 404, description = "No such ingredient for this user")
    ),
    security(("token" = []))
)]
pub async fn replace_ingredient(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(payload): ValidJson<LabelPayload>,
) -> ApiResult<Json<LabelResponse>> {
    update(state, LabelKind::Ingredient, user.id, id, Some(payload.name)).await
}

#[utoipa::path(
    patch,
    path = "/api/recipe/ingredients/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Ingredient id")),
    request_body = LabelPatch,
    responses(
        (status = 200, description = "Ingredient updated", body = LabelResponse),
        (status = 400, description = "Invalid name"),
        (status = 404, description = "No such ingredient for this user")
    ),
    security(("token" = []))
)]
pub async fn update_ingredient(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(patch): ValidJson<LabelPatch>,
) -> ApiResult<Json<LabelResponse>> {
    update(state, LabelKind::Ingredient, user.id, id, patch.name).await
}

#[utoipa::path(
    delete,
    path = "/api/recipe/ingredients/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Ingredient id")),
    responses(
        (status = 204, description = "Ingredient deleted"),
        (status = 404, description = "No such ingredient for this user")
    ),
    security(("token" = []))
)]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    delete(state, LabelKind::Ingredient, user.id, id).await
}
