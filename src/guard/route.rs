//! Client-side routes and their path syntax.

use crate::entities::EnvelopeId;
use std::fmt;

/// Every view the client can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/` - envelope overview
    Home,
    /// `/envelope/:id`
    Envelope(EnvelopeId),
    /// `/logs/:id`
    Logs(EnvelopeId),
    /// `/prioritylist`
    PriorityList,
    /// `/settings`
    Settings,
    /// `/createenvelope`
    CreateEnvelope,
    /// `/editenvelope/:id`
    EditEnvelope(EnvelopeId),
}

impl Route {
    /// Parses a path, ignoring a query string and one trailing slash.
    ///
    /// Returns `None` for unknown paths and for ids that are not positive integers.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        let segments: Vec<&str> = trimmed.trim_start_matches('/').split('/').collect();

        match segments.as_slice() {
            [""] => Some(Self::Home),
            ["prioritylist"] => Some(Self::PriorityList),
            ["settings"] => Some(Self::Settings),
            ["createenvelope"] => Some(Self::CreateEnvelope),
            ["envelope", id] => parse_id(id).map(Self::Envelope),
            ["logs", id] => parse_id(id).map(Self::Logs),
            ["editenvelope", id] => parse_id(id).map(Self::EditEnvelope),
            _ => None,
        }
    }

    /// The envelope this route is about, if any.
    #[must_use]
    pub const fn envelope_id(&self) -> Option<EnvelopeId> {
        match self {
            Self::Envelope(id) | Self::Logs(id) | Self::EditEnvelope(id) => Some(*id),
            Self::Home | Self::PriorityList | Self::Settings | Self::CreateEnvelope => None,
        }
    }

    /// Canonical path of this route.
    #[must_use]
    pub fn path(&self) -> String {
        self.to_string()
    }
}

fn parse_id(raw: &str) -> Option<EnvelopeId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().filter(|id| *id > 0)
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Envelope(id) => write!(f, "/envelope/{id}"),
            Self::Logs(id) => write!(f, "/logs/{id}"),
            Self::PriorityList => f.write_str("/prioritylist"),
            Self::Settings => f.write_str("/settings"),
            Self::CreateEnvelope => f.write_str("/createenvelope"),
            Self::EditEnvelope(id) => write!(f, "/editenvelope/{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_routes() {
        assert_eq!(Route::parse("/"), Some(Route::Home));
        assert_eq!(Route::parse(""), Some(Route::Home));
        assert_eq!(Route::parse("/envelope/12"), Some(Route::Envelope(12)));
        assert_eq!(Route::parse("/logs/3/"), Some(Route::Logs(3)));
        assert_eq!(Route::parse("/editenvelope/4?tab=1"), Some(Route::EditEnvelope(4)));
        assert_eq!(Route::parse("/prioritylist"), Some(Route::PriorityList));
        assert_eq!(Route::parse("/settings"), Some(Route::Settings));
        assert_eq!(Route::parse("/createenvelope"), Some(Route::CreateEnvelope));
    }

    #[test]
    fn test_parse_rejects_unknown_and_bad_ids() {
        for path in [
            "/envelope/abc",
            "/envelope/0",
            "/envelope/-1",
            "/envelope/+3",
            "/envelope/",
            "/logs",
            "/envelope/1/extra",
            "/nowhere",
        ] {
            assert_eq!(Route::parse(path), None, "{path} should not parse");
        }
    }

    #[test]
    fn test_path_matches_parse() {
        for route in [
            Route::Home,
            Route::Envelope(9),
            Route::Logs(9),
            Route::PriorityList,
            Route::Settings,
            Route::CreateEnvelope,
            Route::EditEnvelope(9),
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }
}
