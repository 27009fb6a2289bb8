//! Authentication for the export service.

mod bearer;
mod none;

pub use bearer::BearerToken;
pub use none::NoAuth;

use crate::error::Result;

/// Trait for signing outgoing HTTP requests.
///
/// Implementations push header pairs onto `headers`; the client applies
/// them before sending.
pub trait CloudAuth: Send + Sync {
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}
