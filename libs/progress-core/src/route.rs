//! Navigation path -> activity type classification.
//!
//! Rules are evaluated in table order; the first match wins.

use crate::types::ActivityType;

/// How a rule matches a normalized path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    /// Path equals the pattern or continues with `/`.
    Prefix(&'static str),
    /// Pattern occurs anywhere in the path.
    Contains(&'static str),
}

impl PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => {
                path == *prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Contains(needle) => path.contains(needle),
        }
    }
}

/// One row of the route table.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub pattern: PathPattern,
    pub activity_type: ActivityType,
    /// Whether the segment after a prefix names a content item.
    pub detail: bool,
}

/// Ordered route table.
pub const ROUTE_RULES: &[RouteRule] = &[
    RouteRule {
        pattern: PathPattern::Prefix("/podcasts"),
        activity_type: ActivityType::Podcast,
        detail: true,
    },
    RouteRule {
        pattern: PathPattern::Prefix("/videos"),
        activity_type: ActivityType::Video,
        detail: true,
    },
    RouteRule {
        pattern: PathPattern::Prefix("/words/review"),
        activity_type: ActivityType::Words,
        detail: false,
    },
    RouteRule {
        pattern: PathPattern::Contains("/flashcards/review"),
        activity_type: ActivityType::Words,
        detail: false,
    },
    RouteRule {
        pattern: PathPattern::Prefix("/articles"),
        activity_type: ActivityType::Article,
        detail: true,
    },
];

/// Classified route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub activity_type: ActivityType,
    pub content_id: Option<String>,
}

/// Strip query string, fragment and trailing slashes.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn first_match(path: &str) -> Option<(&'static RouteRule, &str)> {
    let path = normalize(path);
    ROUTE_RULES
        .iter()
        .find(|rule| rule.pattern.matches(path))
        .map(|rule| (rule, path))
}

/// Map a navigation path to the activity type it tracks, if any.
pub fn classify(path: &str) -> Option<ActivityType> {
    first_match(path).map(|(rule, _)| rule.activity_type)
}

/// Content id named by a detail route, e.g. `/videos/abc` -> `abc`.
pub fn content_id_from_path(path: &str) -> Option<String> {
    let (rule, path) = first_match(path)?;
    match rule.pattern {
        PathPattern::Prefix(prefix) if rule.detail => path
            .strip_prefix(prefix)?
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Classify a path and extract its content id in one pass.
pub fn classify_route(path: &str) -> Option<RouteMatch> {
    let activity_type = classify(path)?;
    Some(RouteMatch {
        activity_type,
        content_id: content_id_from_path(path),
    })
}
