use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialHasher, TokenService};
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthGuard;
use crate::routes::{
    admin_login, admin_logout, admin_me, admin_refresh, change_password, current_user, health_check,
    login, logout, refresh, reset_user_password, update_user,
};
use crate::store::AccountStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tokens: TokenService,
    pub accounts: Arc<dyn AccountStore>,
    pub hasher: CredentialHasher,
}

impl AppState {
    pub fn new(tokens: TokenService, accounts: Arc<dyn AccountStore>, hasher: CredentialHasher) -> Self {
        Self {
            tokens,
            accounts,
            hasher,
        }
    }

    fn player_guard(&self) -> AuthGuard {
        AuthGuard::player(self.tokens.clone(), self.accounts.clone())
    }

    fn admin_guard(&self) -> AuthGuard {
        AuthGuard::admin(self.tokens.clone(), self.accounts.clone())
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let player_guard = state.player_guard();
        let admin_guard = state.admin_guard();

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(state.clone())
            .route("/health_check", web::get().to(health_check))
            // Player auth; logout and change-password stay reachable while a
            // password change is pending
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .service(
                        web::resource("/logout")
                            .wrap(player_guard.clone())
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(player_guard.clone())
                            .route(web::post().to(change_password)),
                    ),
            )
            .service(
                web::scope("/api")
                    .wrap(player_guard.require_password_changed())
                    .route("/me", web::get().to(current_user)),
            )
            // Admin surface, separate secrets
            .service(
                web::scope("/admin/auth")
                    .route("/login", web::post().to(admin_login))
                    .route("/refresh", web::post().to(admin_refresh))
                    .service(
                        web::resource("/logout")
                            .wrap(admin_guard.clone())
                            .route(web::post().to(admin_logout)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(admin_guard.clone())
                            .route(web::get().to(admin_me)),
                    ),
            )
            .service(
                web::scope("/admin/users")
                    .wrap(admin_guard)
                    .route("/{id}", web::patch().to(update_user))
                    .route("/{id}/reset-password", web::post().to(reset_user_password)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
