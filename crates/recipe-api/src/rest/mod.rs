pub mod labels;
pub mod recipes;
pub mod users;

use crate::health;
use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::ready,
        users::create_user,
        users::create_token,
        users::me,
        users::replace_me,
        users::update_me,
        recipes::list_recipes,
        recipes::create_recipe,
        recipes::get_recipe,
        recipes::replace_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        labels::list_tags,
        labels::replace_tag,
        labels::update_tag,
        labels::delete_tag,
        labels::list_ingredients,
        labels::replace_ingredient,
        labels::update_ingredient,
        labels::delete_ingredient,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ReadinessResponse,
            users::CreateUserRequest,
            users::UpdateUserRequest,
            users::UserResponse,
            users::TokenRequest,
            users::TokenResponse,
            recipes::RecipeRequest,
            recipes::RecipeSummary,
            recipes::RecipeDetail,
            labels::LabelPayload,
            labels::LabelPatch,
            labels::LabelResponse,
        )
    ),
    modifiers(&TokenAuth),
    tags(
        (name = "user", description = "Accounts and auth tokens"),
        (name = "recipe", description = "Recipes, tags and ingredients"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

/// Registers the `Authorization: Token <key>` scheme referenced by
/// protected operations.
struct TokenAuth;

impl Modify for TokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token <key>, as issued by /api/user/token",
                ))),
            );
        }
    }
}

/// Serves the generated OpenAPI document.
pub async fn openapi_schema() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
