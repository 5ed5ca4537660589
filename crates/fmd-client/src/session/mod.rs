//! Authentication, resumption and token lifecycle.

mod artifacts;
mod authenticator;

pub use artifacts::{AuthArtifacts, Credentials};
pub use authenticator::{Session, SessionAuthenticator, SessionState};
