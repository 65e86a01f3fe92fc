use crate::auth::password::hash_password;
use crate::cli::parser::UserAction;
use crate::config::Config;
use crate::db::queries::users;
use crate::db::{DbPool, TrackedDb};
use crate::errors::{AppError, AppResult};
use crate::models::role::Role;
use crate::notify::NullNotifier;
use crate::ui::messages::{info, success};
use crate::utils::colors::{GREY, RESET};
use std::sync::Arc;

pub async fn handle(action: &UserAction, cfg: &Config) -> AppResult<()> {
    let pool = DbPool::open(&cfg.database, 1)?;
    // No server is listening here; nothing to notify.
    let db = TrackedDb::new(pool, Arc::new(NullNotifier));

    match action {
        UserAction::Add {
            login,
            name,
            password,
            role,
        } => {
            let role = Role::from_name(role)
                .ok_or_else(|| AppError::validation(format!("unknown role '{role}'")))?;
            if login.trim().is_empty() || name.trim().is_empty() {
                return Err(AppError::validation("login and name are required"));
            }
            if password.chars().count() < 4 {
                return Err(AppError::validation("password must be at least 4 characters"));
            }
            let login = login.trim().to_string();
            let name = name.trim().to_string();
            let hash = hash_password(password);
            let id = {
                let login = login.clone();
                db.run(move |conn| users::insert(conn, &login, &name, &hash, role))
                    .await?
            };
            success(format!("User '{}' created (id {}, role {})", login, id, role.name()));
        }
        UserAction::List => {
            let all = db.run(users::list).await?;
            if all.is_empty() {
                info("No users.");
            }
            for u in all {
                let state = if u.active { "" } else { " (inactive)" };
                println!(
                    "{:>4}  {:<20} {:<30} {}{}{}{}",
                    u.id,
                    u.login,
                    u.name,
                    GREY,
                    u.role.name(),
                    state,
                    RESET
                );
            }
        }
    }
    Ok(())
}
