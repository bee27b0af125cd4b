// Authentication
// OIDC authorization-code flow with cookie sessions and group-based roles.

pub mod client;
pub mod error;
pub mod extract;
pub mod groups;
pub mod routes;

pub use client::{Identity, IdentityProvider, OidcProvider, TokenExchange};
pub use error::AuthError;
pub use extract::{CurrentUser, MaybeUser};
pub use groups::{GroupDirectory, GroupLookupError, HttpGroupDirectory, Role};
