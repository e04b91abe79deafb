/// Middleware module
///
/// Per-principal access-token guard for protected routes.

mod auth_guard;

pub use auth_guard::{AuthGuard, AuthGuardService, AuthenticatedUser};
