//! Server-side session handling.
//!
//! The session travels as a cookie pair (`access_token`, `refresh_token`) so
//! server-rendered handlers and the route gate can see it without a network
//! call. Nothing here verifies a token; the backend does that on every API
//! call.

mod cookie;
mod errors;
mod extractors;
mod gate;
mod ip;
mod session;

pub use cookie::{
    ACCESS_COOKIE_NAME, DEFAULT_ACCESS_MAX_AGE, REFRESH_COOKIE_NAME, REFRESH_MAX_AGE,
    SessionCookie, access_max_age, get_cookie,
};
pub use errors::{LOGIN_PATH, LoginRedirect, login_location};
pub use extractors::{OptionalSession, RequireSession};
pub use gate::{GateDecision, PUBLIC_PATHS, RouteGate, STATIC_PREFIXES, route_gate};
pub use ip::extract_client_ip;
pub use session::{Session, fetch_as_user, require_or_redirect};
