use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/files", file_routes(config))
        .nest("/users", user_routes(config))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::confirm))
        .routes(routes!(handlers::auth::resend_confirmation))
        .routes(routes!(handlers::auth::request_password_reset))
        .routes(routes!(handlers::auth::reset_password))
}

fn file_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(
            handlers::files::submit_file,
            handlers::files::purge_files
        ))
        .layer(handlers::files::upload_body_limit(
            config.storage.max_file_size,
        ));

    let records = OpenApiRouter::new()
        .routes(routes!(handlers::files::get_file))
        .routes(routes!(handlers::files::file_action))
        .routes(routes!(handlers::files::ingest_file))
        .routes(routes!(handlers::files::download_file))
        .routes(routes!(
            handlers::comments::list_comments,
            handlers::comments::post_comment
        ))
        .routes(routes!(handlers::comments::delete_comment));

    upload.merge(records)
}

fn user_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let avatar = OpenApiRouter::new()
        .routes(routes!(
            handlers::users::get_avatar,
            handlers::users::update_avatar
        ))
        .layer(handlers::users::avatar_body_limit(
            config.storage.max_avatar_size,
        ));

    let profile = OpenApiRouter::new()
        .routes(routes!(handlers::users::get_profile))
        .routes(routes!(handlers::users::user_action))
        .routes(routes!(handlers::users::get_activities))
        .routes(routes!(handlers::users::get_likes))
        .routes(routes!(handlers::users::get_following))
        .routes(routes!(handlers::users::get_followers))
        .routes(routes!(handlers::users::get_user_comments))
        .routes(routes!(handlers::users::get_user_submissions));

    avatar.merge(profile)
}
