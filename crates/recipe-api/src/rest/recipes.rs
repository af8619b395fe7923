use super::labels::{LabelPayload, LabelResponse};
use crate::extract::{ApiPath, ApiQuery, ValidJson};
use crate::middleware::AuthUser;
use crate::{ApiResult, AppState};
use axum::{extract::State, http::StatusCode, Extension, Json};
use recipe_core::{parse_id_list, Price, Recipe, RecipeFilter, RecipeInput};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Create/update payload. Absent fields are left alone on PATCH; a present
/// `tags` or `ingredients` list replaces the recipe's current set.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<u32>,
    #[schema(value_type = Option<String>, example = "5.25")]
    pub price: Option<Price>,
    pub link: Option<String>,
    pub tags: Option<Vec<LabelPayload>>,
    pub ingredients: Option<Vec<LabelPayload>>,
}

impl From<RecipeRequest> for RecipeInput {
    fn from(req: RecipeRequest) -> Self {
        let names = |items: Vec<LabelPayload>| items.into_iter().map(|l| l.name).collect();
        RecipeInput {
            title: req.title,
            description: req.description,
            time_minutes: req.time_minutes,
            price: req.price,
            link: req.link,
            tags: req.tags.map(names),
            ingredients: req.ingredients.map(names),
        }
    }
}

/// List view of a recipe; the description is only on the detail view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: u32,
    #[schema(example = "5.25")]
    pub price: String,
    pub link: String,
    pub tags: Vec<LabelResponse>,
    pub ingredients: Vec<LabelResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: u32,
    #[schema(example = "5.25")]
    pub price: String,
    pub link: String,
    pub tags: Vec<LabelResponse>,
    pub ingredients: Vec<LabelResponse>,
    pub description: String,
}

fn labels(items: Vec<recipe_core::Label>) -> Vec<LabelResponse> {
    items.into_iter().map(Into::into).collect()
}

impl From<Recipe> for RecipeSummary {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price.to_string(),
            link: r.link,
            tags: labels(r.tags),
            ingredients: labels(r.ingredients),
        }
    }
}

impl From<Recipe> for RecipeDetail {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price.to_string(),
            link: r.link,
            tags: labels(r.tags),
            ingredients: labels(r.ingredients),
            description: r.description,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeListQuery {
    /// Comma separated tag ids, e.g. `1,2`.
    pub tags: Option<String>,
    /// Comma separated ingredient ids.
    pub ingredients: Option<String>,
}

impl RecipeListQuery {
    fn filter(&self) -> recipe_core::Result<RecipeFilter> {
        Ok(RecipeFilter {
            tags: match &self.tags {
                Some(raw) => parse_id_list("tags", raw)?,
                None => Vec::new(),
            },
            ingredients: match &self.ingredients {
                Some(raw) => parse_id_list("ingredients", raw)?,
                None => Vec::new(),
            },
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/recipe/recipes",
    tag = "recipe",
    params(RecipeListQuery),
    responses(
        (status = 200, description = "The user's recipes, newest first", body = Vec<RecipeSummary>),
        (status = 400, description = "Malformed id filter"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<RecipeListQuery>,
) -> ApiResult<Json<Vec<RecipeSummary>>> {
    let filter = query.filter()?;
    let recipes = state
        .db(move |store| store.list_recipes(user.id, &filter))
        .await?;
    Ok(Json(recipes.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/recipe/recipes",
    tag = "recipe",
    request_body = RecipeRequest,
    responses(
        (status = 201, description = "Recipe created", body = RecipeDetail),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ValidJson(req): ValidJson<RecipeRequest>,
) -> ApiResult<(StatusCode, Json<RecipeDetail>)> {
    let input = RecipeInput::from(req);
    let recipe = state
        .db(move |store| store.create_recipe(user.id, &input))
        .await?;
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

#[utoipa::path(
    get,
    path = "/api/recipe/recipes/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe detail", body = RecipeDetail),
        (status = 404, description = "No such recipe for this user")
    ),
    security(("token" = []))
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<RecipeDetail>> {
    let recipe = state.db(move |store| store.get_recipe(user.id, id)).await?;
    Ok(Json(recipe.into()))
}

#[utoipa::path(
    put,
    path = "/api/recipe/recipes/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Recipe id")),
    request_body = RecipeRequest,
    responses(
        (status = 200, description = "Recipe replaced", body = RecipeDetail),
        (status = 400, description = "Missing or invalid fields"),
        (status = 404, description = "No such recipe for this user")
    ),
    security(("token" = []))
)]
pub async fn replace_recipe(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(req): ValidJson<RecipeRequest>,
) -> ApiResult<Json<RecipeDetail>> {
    save(state, user.id, id, req, false).await
}

#[utoipa::path(
    patch,
    path = "/api/recipe/recipes/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Recipe id")),
    request_body = RecipeRequest,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeDetail),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "No such recipe for this user")
    ),
    security(("token" = []))
)]
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
    ValidJson(req): ValidJson<RecipeRequest>,
) -> ApiResult<Json<RecipeDetail>> {
    save(state, user.id, id, req, true).await
}

async fn save(
    state: AppState,
    user_id: i64,
    id: i64,
    req: RecipeRequest,
    partial: bool,
) -> ApiResult<Json<RecipeDetail>> {
    let input = RecipeInput::from(req);
    let recipe = state
        .db(move |store| store.update_recipe(user_id, id, &input, partial))
        .await?;
    Ok(Json(recipe.into()))
}

#[utoipa::path(
    delete,
    path = "/api/recipe/recipes/{id}",
    tag = "recipe",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 404, description = "No such recipe for this user")
    ),
    security(("token" = []))
)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state
        .db(move |store| store.delete_recipe(user.id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_nested_labels_to_names() {
        let req: RecipeRequest = serde_json::from_value(serde_json::json!({
            "title": "Thai Prawn Curry",
            "time_minutes": 30,
            "price": "2.50",
            "tags": [{"name": "Thai"}, {"name": "Dinner"}],
            "user": 99
        }))
        .unwrap();
        let input = RecipeInput::from(req);
        assert_eq!(input.tags, Some(vec!["Thai".to_string(), "Dinner".to_string()]));
        assert_eq!(input.ingredients, None);
        assert_eq!(input.price.map(Price::cents), Some(250));
    }

    #[test]
    fn test_empty_list_means_clear() {
        let req: RecipeRequest =
            serde_json::from_value(serde_json::json!({ "tags": [] })).unwrap();
        assert_eq!(RecipeInput::from(req).tags, Some(Vec::new()));
    }

    #[test]
    fn test_query_filter_parsing() {
        let query = RecipeListQuery {
            tags: Some("1, 2".into()),
            ingredients: None,
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.tags, vec![1, 2]);
        assert!(filter.ingredients.is_empty());

        let bad = RecipeListQuery {
            tags: Some("x".into()),
            ingredients: None,
        };
        assert!(bad.filter().is_err());
    }
}
