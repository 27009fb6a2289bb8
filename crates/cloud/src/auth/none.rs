//! No-op authentication for open endpoints.

use crate::auth::CloudAuth;
use crate::error::Result;

/// No authentication, for local or open export services.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        _headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        Ok(())
    }
}
