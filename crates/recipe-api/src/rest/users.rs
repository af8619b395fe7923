use crate::extract::ValidJson;
use crate::middleware::AuthUser;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, http::StatusCode, Extension, Json};
use recipe_core::{NewUser, RecipeError, User, UserPatch};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Public view of an account. Passwords never leave the server.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/user/create",
    tag = "user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid payload or email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let new_user = NewUser {
        email: req.email,
        name: req.name,
        password: req.password,
    };
    let user = state.db(move |store| store.create_user(&new_user)).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/user/token",
    tag = "user",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token for the given credentials", body = TokenResponse),
        (status = 400, description = "Missing or invalid credentials")
    )
)]
pub async fn create_token(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Both email and password are required.".into(),
        ));
    }

    let token = state
        .db(move |store| match store.authenticate(&req.email, &req.password)? {
            Some(user) => store.get_or_create_token(user.id).map(Some),
            None => Ok(None),
        })
        .await?
        .ok_or_else(|| {
            ApiError::Validation("Unable to authenticate user with provided credentials.".into())
        })?;

    Ok(Json(TokenResponse { token }))
}

#[utoipa::path(
    get,
    path = "/api/user/me",
    tag = "user",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<UserResponse> {
    Json(user.into())
}

#[utoipa::path(
    put,
    path = "/api/user/me",
    tag = "user",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account replaced", body = UserResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn replace_me(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    for (field, value) in [("email", &req.email), ("password", &req.password)] {
        if value.is_none() {
            return Err(RecipeError::validation(field, "This field is required.").into());
        }
    }
    apply_user_update(state, user.id, req).await
}

#[utoipa::path(
    patch,
    path = "/api/user/me",
    tag = "user",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("token" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    apply_user_update(state, user.id, req).await
}

async fn apply_user_update(
    state: AppState,
    user_id: i64,
    req: UpdateUserRequest,
) -> ApiResult<Json<UserResponse>> {
    let patch = UserPatch {
        email: req.email,
        name: req.name,
        password: req.password,
    };
    let user = state
        .db(move |store| store.update_user(user_id, &patch))
        .await?;
    Ok(Json(user.into()))
}
