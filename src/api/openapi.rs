use super::handlers::{error, health, login, logout, me, refresh, register};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        register::register,
        login::login,
        logout::logout,
        refresh::refresh_token,
        me::me,
    ),
    components(schemas(
        error::ErrorBody,
        health::Health,
        register::RegisterRequest,
        register::UserResponse,
        login::LoginRequest,
        login::LoginResponse,
        logout::LogoutResponse,
        refresh::RefreshResponse,
        me::MeResponse,
    )),
    tags(
        (name = "health", description = "Liveness and database reachability"),
        (name = "register", description = "User registration"),
        (name = "session", description = "Login, logout and token refresh"),
    )
)]
pub struct ApiDoc;
