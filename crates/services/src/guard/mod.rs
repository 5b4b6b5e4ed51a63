use crate::config_store::ConfigCheckResult;
use crate::session::SessionSnapshot;
use serde::Serialize;

/// Paths under this prefix defer to their own password gate and are never
/// blanket-redirected by the guard.
pub const ADMIN_PATH_PREFIX: &str = "/admin";

/// Inputs the guard derives its decision from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardContext {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub has_session_error: bool,
    pub config_present: bool,
}

impl GuardContext {
    pub fn from_state(session: &SessionSnapshot, config: &ConfigCheckResult) -> Self {
        Self {
            is_authenticated: session
                .user
                .as_ref()
                .is_some_and(|user| !user.expired()),
            is_loading: session.is_loading,
            has_session_error: session.error.is_some(),
            config_present: config.is_usable(),
        }
    }
}

/// What the protected view should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Render,
    ShowLoading,
    RedirectToLogin,
    RedirectToConfig,
}

/// Redirect table for protected views.
///
/// Administrative paths render unconditionally (their own gate takes over).
/// While loading no redirect decision is made. An unauthenticated visitor
/// is sent to the configuration screen when no config exists (login would
/// be unreachable), to login otherwise. A session error forces login even
/// for an authenticated user.
pub fn decide(path: &str, ctx: &GuardContext) -> RouteDecision {
    let is_admin_path = path
        .strip_prefix(ADMIN_PATH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if is_admin_path {
        return RouteDecision::Render;
    }

    if ctx.is_loading {
        return RouteDecision::ShowLoading;
    }

    if !ctx.is_authenticated {
        return if ctx.config_present {
            RouteDecision::RedirectToLogin
        } else {
            RouteDecision::RedirectToConfig
        };
    }

    if ctx.has_session_error {
        return RouteDecision::RedirectToLogin;
    }

    RouteDecision::Render
}
