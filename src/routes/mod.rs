mod admin;
mod auth;
mod health_check;

pub use admin::{admin_login, admin_logout, admin_me, admin_refresh, reset_user_password, update_user};
pub use auth::{change_password, current_user, login, logout, refresh};
pub use health_check::health_check;
