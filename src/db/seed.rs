//! Idempotent bootstrap writes shared by the management CLI and the test suite.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::roles::DEFAULT_ROLES;
use crate::errors::{AppError, AppResult};
use crate::utils::{hash_password, utc_now};

#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
	pub email: &'a str,
	pub first_name: &'a str,
	pub last_name: &'a str,
	/// `None` creates an account that can only sign in through SSO.
	pub password: Option<&'a str>,
}

/// Creates `admin`, `task_creator` and `read_only` if missing. Returns how many were added.
pub async fn ensure_default_roles(pool: &SqlitePool) -> AppResult<u64> {
	let mut created = 0;
	for name in DEFAULT_ROLES {
		let result = sqlx::query("INSERT OR IGNORE INTO roles (id, name, created_at) VALUES (?, ?, ?)")
			.bind(Uuid::new_v4())
			.bind(name)
			.bind(utc_now())
			.execute(pool)
			.await?;
		created += result.rows_affected();
	}
	Ok(created)
}

pub async fn role_id(pool: &SqlitePool, name: &str) -> AppResult<Uuid> {
	sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = ?")
		.bind(name)
		.fetch_optional(pool)
		.await?
		.ok_or_else(|| AppError::not_found(format!("role '{name}' does not exist")))
}

pub async fn assign_role(pool: &SqlitePool, user_id: Uuid, name: &str) -> AppResult<()> {
	let role_id = role_id(pool, name).await?;
	sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES (?, ?, ?)")
		.bind(user_id)
		.bind(role_id)
		.bind(utc_now())
		.execute(pool)
		.await?;
	Ok(())
}

pub async fn create_user(pool: &SqlitePool, user: NewUser<'_>, roles: &[&str]) -> AppResult<Uuid> {
	let password_hash = match user.password {
		Some(password) => hash_password(password)?,
		None => String::new(),
	};

	let now = utc_now();
	let user_id = Uuid::new_v4();
	sqlx::query(
		"INSERT INTO users (id, email, first_name, last_name, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(user_id)
	.bind(user.email)
	.bind(user.first_name)
	.bind(user.last_name)
	.bind(password_hash)
	.bind(now)
	.bind(now)
	.execute(pool)
	.await
	.map_err(|err| AppError::from_unique_violation(err, format!("user '{}' already exists", user.email)))?;

	for role in roles {
		assign_role(pool, user_id, role).await?;
	}

	Ok(user_id)
}

/// Creates the account if absent (or resets its password if present) and grants `admin`.
pub async fn create_admin(pool: &SqlitePool, email: &str, password: &str) -> AppResult<Uuid> {
	ensure_default_roles(pool).await?;

	let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = ?")
		.bind(email)
		.fetch_optional(pool)
		.await?;

	let user_id = match existing {
		Some(user_id) => {
			sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
				.bind(hash_password(password)?)
				.bind(utc_now())
				.bind(user_id)
				.execute(pool)
				.await?;
			user_id
		}
		None => {
			let user = NewUser {
				email,
				password: Some(password),
				..NewUser::default()
			};
			create_user(pool, user, &[]).await?
		}
	};

	assign_role(pool, user_id, crate::authz::roles::ADMIN).await?;
	Ok(user_id)
}
