use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::obtain_token_pair,
		routes::auth::refresh_token,
		routes::users::list_users,
		routes::users::me,
		routes::users::get_user,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::patch_user,
		routes::users::delete_user,
		routes::roles::list_roles,
		routes::roles::get_role,
		routes::roles::create_role,
		routes::roles::update_role,
		routes::roles::patch_role,
		routes::roles::delete_role,
		routes::projects::list_projects,
		routes::projects::get_project,
		routes::projects::create_project,
		routes::projects::update_project,
		routes::projects::patch_project,
		routes::projects::delete_project,
		routes::projects::list_project_tasks,
		routes::tasks::list_tasks,
		routes::tasks::get_task,
		routes::tasks::create_task,
		routes::tasks::update_task,
		routes::tasks::patch_task,
		routes::tasks::delete_task,
		routes::sso::google_login,
		routes::sso::google_callback,
		routes::sso::redeem_handoff,
	),
	components(
		schemas(
			routes::health::HealthResponse,
			routes::sso::RedeemRequest,
			models::user::User,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::UserPatchRequest,
			models::user::LoginRequest,
			models::user::TokenPair,
			models::user::RefreshRequest,
			models::user::AccessResponse,
			models::role::Role,
			models::role::RoleRequest,
			models::role::RolePatchRequest,
			models::project::Project,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::ProjectPatchRequest,
			models::task::Task,
			models::task::TaskStatus,
			models::task::TaskCreateRequest,
			models::task::TaskUpdateRequest,
			models::task::TaskPatchRequest
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Password login and credential refresh"),
		(name = "Users", description = "User accounts and role assignment"),
		(name = "Roles", description = "Role vocabulary"),
		(name = "Projects", description = "Projects visible through membership"),
		(name = "Tasks", description = "Tasks visible through ownership and creatorship"),
		(name = "SSO", description = "Google sign-in and handoff key redemption")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
			);
		}
	}
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}
