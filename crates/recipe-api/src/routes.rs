use crate::middleware::{auth_middleware, rate_limit_middleware};
use crate::rest::{self, labels, recipes, users};
use crate::{health, AppState};
use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use recipe_core::SecurityConfig;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/user/me",
            get(users::me).put(users::replace_me).patch(users::update_me),
        )
        .route(
            "/api/recipe/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipe/recipes/{id}",
            get(recipes::get_recipe)
                .put(recipes::replace_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/api/recipe/tags", get(labels::list_tags))
        .route(
            "/api/recipe/tags/{id}",
            put(labels::replace_tag)
                .patch(labels::update_tag)
                .delete(labels::delete_tag),
        )
        .route("/api/recipe/ingredients", get(labels::list_ingredients))
        .route(
            "/api/recipe/ingredients/{id}",
            put(labels::replace_ingredient)
                .patch(labels::update_ingredient)
                .delete(labels::delete_ingredient),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        // Probes
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        // Accounts
        .route("/api/user/create", post(users::create_user))
        .route("/api/user/token", post(users::create_token))
        // API documentation
        .route("/api/schema", get(rest::openapi_schema))
        .merge(protected);

    #[cfg(feature = "openapi-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/api/docs")
                .url("/api/docs/openapi.json", rest::ApiDoc::openapi()),
        )
    };

    let cors = cors_layer(&state.settings.security);
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if security.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
