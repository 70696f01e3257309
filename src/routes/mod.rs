//! Router Module Index
//!
//! The Sub-Router Registry: six handler groups bound to fixed prefixes under `/api`, plus
//! the public endpoints that belong to no group. Groups are opaque collaborators. A group that
//! has no route for a request leaves it unresolved, and the outer router's fallback (the
//! Fallback Dispatcher) takes over.

use axum::Router;

use crate::{AppState, fallback};

/// Public endpoints outside every handler group (liveness, API document).
pub mod public;

/// Default `/api/users` group: account profile lookups.
pub mod users;

/// Root of the API path space.
pub const API_PREFIX: &str = "/api";

/// True when `path` is `prefix` itself or lies below it on a segment boundary.
/// `/api/users/7` is under `/api/users`; `/api/usersx` is not.
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerGroup {
    Auth,
    Users,
    Clinical,
    Admin,
    Messages,
    Notifications,
}

impl HandlerGroup {
    pub const ALL: [HandlerGroup; 6] = [
        HandlerGroup::Auth,
        HandlerGroup::Users,
        HandlerGroup::Clinical,
        HandlerGroup::Admin,
        HandlerGroup::Messages,
        HandlerGroup::Notifications,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            HandlerGroup::Auth => "/api/auth",
            HandlerGroup::Users => "/api/users",
            HandlerGroup::Clinical => "/api/clinical",
            HandlerGroup::Admin => "/api/admin",
            HandlerGroup::Messages => "/api/messages",
            HandlerGroup::Notifications => "/api/notifications",
        }
    }
}

struct RouteEntry {
    group: HandlerGroup,
    router: Router<AppState>,
}

/// RouteTable
///
/// The fixed `(prefix, handler group)` table. Built once at startup, then consumed by
/// [`RouteTable::into_router`]; nothing can change it afterwards.
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl Default for RouteTable {
    /// Every group present; only `users` carries routes of its own.
    fn default() -> Self {
        Self::empty().with_group(HandlerGroup::Users, users::users_routes())
    }
}

impl RouteTable {
    /// All six groups, each with an empty router.
    pub fn empty() -> Self {
        Self {
            entries: HandlerGroup::ALL
                .into_iter()
                .map(|group| RouteEntry {
                    group,
                    router: Router::new(),
                })
                .collect(),
        }
    }

    /// Replaces the router bound to `group`.
    pub fn with_group(mut self, group: HandlerGroup, router: Router<AppState>) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.group == group) {
            entry.router = router;
        }
        self
    }

    /// The group whose prefix is the longest one `path` lies under, if any.
    pub fn resolve(path: &str) -> Option<HandlerGroup> {
        HandlerGroup::ALL
            .into_iter()
            .filter(|group| path_is_under(path, group.prefix()))
            .max_by_key(|group| group.prefix().len())
    }

    /// into_router
    ///
    /// Nests each group at its prefix, adds the public endpoints, and installs the Fallback
    /// Dispatcher both for unmatched paths and for paths whose route lacks the request's
    /// method. Groups see the request exactly as it arrived.
    pub fn into_router(self) -> Router<AppState> {
        let router = self
            .entries
            .into_iter()
            .fold(public::public_routes(), |router, entry| {
                router.nest(entry.group.prefix(), entry.router)
            });

        router
            .fallback(fallback::dispatch)
            .method_not_allowed_fallback(fallback::dispatch)
    }
}
