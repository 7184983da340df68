//! Authentication Module
//! Mission: Secure API access with rotating JWT refresh tokens and RBAC

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod token_ledger;
pub mod user_store;

pub use api::AuthState;
pub use jwt::TokenIssuer;
pub use middleware::auth_middleware;
pub use token_ledger::TokenLedger;
pub use user_store::UserStore;
