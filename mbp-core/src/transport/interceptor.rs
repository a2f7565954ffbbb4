//! Bearer-token request interceptor

use std::sync::OnceLock;

use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, warn};

use crate::token::{SessionToken, TokenSupplier};

/// Attach `Authorization: Bearer <token>` to `request`.
///
/// The header is set, never appended, so applying this twice leaves exactly
/// one `Authorization` header. With no token the request is left as is.
pub fn authorize(mut request: Request, token: Option<&SessionToken>) -> Request {
    let Some(token) = token else {
        return request;
    };

    match HeaderValue::from_str(&token.bearer()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => {
            warn!("session token is not a valid header value; sending request unauthenticated");
        }
    }
    request
}

/// Per-transport record of the installed auth hook.
///
/// Holds the token supplier once installed. Installing again is a no-op.
#[derive(Default)]
pub struct InterceptorRegistration {
    supplier: OnceLock<TokenSupplier>,
}

impl InterceptorRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook. Returns `true` only for the call that installed it.
    pub fn install_once(&self, supplier: TokenSupplier) -> bool {
        let installed = self.supplier.set(supplier).is_ok();
        if installed {
            debug!("auth interceptor installed");
        } else {
            debug!("auth interceptor already installed; ignoring");
        }
        installed
    }

    /// Whether the hook has been installed.
    pub fn is_installed(&self) -> bool {
        self.supplier.get().is_some()
    }

    /// Run the hook on an outgoing request, reading the token current now.
    pub fn apply(&self, request: Request) -> Request {
        match self.supplier.get() {
            Some(supplier) => authorize(request, supplier().as_ref()),
            None => request,
        }
    }
}

impl std::fmt::Debug for InterceptorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistration")
            .field("installed", &self.is_installed())
            .finish()
    }
}
