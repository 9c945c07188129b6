//! Endpoint → permission table and its lookup index

use super::Permission;
use std::collections::HashMap;

/// Static authorization rule for one method and path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPermission {
    pub method: String,
    /// Literal path, or a template whose `*` segments match one path segment
    pub path: String,
    pub permission: Permission,
    /// The handler must additionally verify resource ownership
    pub ownership_required: bool,
}

impl EndpointPermission {
    /// Rule without an ownership requirement
    pub fn new(method: &str, path: &str, permission: Permission) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: normalize_path(path).to_string(),
            permission,
            ownership_required: false,
        }
    }

    /// Rule whose handler must verify resource ownership
    pub fn owned(method: &str, path: &str, permission: Permission) -> Self {
        Self {
            ownership_required: true,
            ..Self::new(method, path, permission)
        }
    }

    fn is_template(&self) -> bool {
        self.path.split('/').any(|segment| segment == "*")
    }
}

/// Lookup index built once from an ordered rule list.
///
/// Literal rules live in a map keyed `METHOD:path`; templates are scanned in
/// table order and the first match wins.
#[derive(Debug, Clone, Default)]
pub struct EndpointIndex {
    exact: HashMap<String, EndpointPermission>,
    wildcard: Vec<EndpointPermission>,
}

impl EndpointIndex {
    pub fn new(rules: impl IntoIterator<Item = EndpointPermission>) -> Self {
        let mut exact = HashMap::new();
        let mut wildcard = Vec::new();

        for rule in rules {
            if rule.is_template() {
                wildcard.push(rule);
            } else {
                // Earlier rules take precedence, matching the template scan
                exact
                    .entry(index_key(&rule.method, &rule.path))
                    .or_insert(rule);
            }
        }

        Self { exact, wildcard }
    }

    /// Index over [`default_endpoint_permissions`]
    pub fn with_defaults() -> Self {
        Self::new(default_endpoint_permissions())
    }

    /// Rule governing `method` on `path`, if any
    pub fn lookup(&self, method: &str, path: &str) -> Option<&EndpointPermission> {
        let method = method.to_ascii_uppercase();
        let path = normalize_path(path);

        if let Some(rule) = self.exact.get(&index_key(&method, path)) {
            return Some(rule);
        }

        self.wildcard
            .iter()
            .find(|rule| rule.method == method && template_matches(&rule.path, path))
    }

    /// Number of rules held
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index_key(method: &str, path: &str) -> String {
    format!("{method}:{path}")
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Segment-wise match where `*` stands for exactly one non-empty segment
pub fn template_matches(template: &str, path: &str) -> bool {
    let mut template_segments = template.split('/');
    let mut path_segments = path.split('/');

    loop {
        match (template_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some("*"), Some(segment)) if !segment.is_empty() => continue,
            (Some(expected), Some(segment)) if expected == segment => continue,
            _ => return false,
        }
    }
}

/// Endpoint table of the data-exchange portal API
pub fn default_endpoint_permissions() -> Vec<EndpointPermission> {
    use EndpointPermission as E;
    use Permission::*;

    vec![
        // Schemas
        E::new("GET", "/api/v1/schemas", SchemaRead),
        E::new("POST", "/api/v1/schemas", SchemaCreate),
        E::owned("GET", "/api/v1/schemas/*", SchemaRead),
        E::owned("PUT", "/api/v1/schemas/*", SchemaUpdate),
        E::owned("DELETE", "/api/v1/schemas/*", SchemaDelete),
        // Schema submissions
        E::new("GET", "/api/v1/schema-submissions", SchemaSubmissionRead),
        E::new("POST", "/api/v1/schema-submissions", SchemaSubmissionCreate),
        E::owned("GET", "/api/v1/schema-submissions/*", SchemaSubmissionRead),
        E::owned("PUT", "/api/v1/schema-submissions/*", SchemaSubmissionUpdate),
        // Applications
        E::new("GET", "/api/v1/applications", ApplicationRead),
        E::new("POST", "/api/v1/applications", ApplicationCreate),
        E::owned("GET", "/api/v1/applications/*", ApplicationRead),
        E::owned("PUT", "/api/v1/applications/*", ApplicationUpdate),
        E::owned("DELETE", "/api/v1/applications/*", ApplicationDelete),
        // Application submissions
        E::new("GET", "/api/v1/application-submissions", ApplicationSubmissionRead),
        E::new("POST", "/api/v1/application-submissions", ApplicationSubmissionCreate),
        E::owned("GET", "/api/v1/application-submissions/*", ApplicationSubmissionRead),
        E::owned("PUT", "/api/v1/application-submissions/*", ApplicationSubmissionUpdate),
        // Members
        E::new("GET", "/api/v1/members", MemberRead),
        E::new("POST", "/api/v1/members", MemberCreate),
        E::owned("GET", "/api/v1/members/*", MemberRead),
        E::owned("PUT", "/api/v1/members/*", MemberUpdate),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let index = EndpointIndex::with_defaults();

        let rule = index.lookup("POST", "/api/v1/schemas").unwrap();
        assert_eq!(rule.permission, Permission::SchemaCreate);
        assert!(!rule.ownership_required);

        // Trailing slash and query string are ignored
        let rule = index.lookup("get", "/api/v1/members/?page=2").unwrap();
        assert_eq!(rule.permission, Permission::MemberRead);
    }

    #[test]
    fn test_wildcard_lookup() {
        let index = EndpointIndex::with_defaults();

        let rule = index.lookup("DELETE", "/api/v1/applications/app-42").unwrap();
        assert_eq!(rule.permission, Permission::ApplicationDelete);
        assert!(rule.ownership_required);
    }

    #[test]
    fn test_wildcard_matches_single_segment_only() {
        let index = EndpointIndex::with_defaults();

        assert!(index.lookup("GET", "/api/v1/schemas/s1/versions").is_none());
        assert!(index.lookup("GET", "/api/v1/schemas//").is_some()); // normalised to the list route
        assert!(!template_matches("/api/v1/schemas/*", "/api/v1/schemas/"));
    }

    #[test]
    fn test_undefined_routes() {
        let index = EndpointIndex::with_defaults();

        assert!(index.lookup("DELETE", "/api/v1/members/m1").is_none());
        assert!(index.lookup("GET", "/api/v2/schemas").is_none());
        assert!(index.lookup("PATCH", "/api/v1/schemas").is_none());
    }

    #[test]
    fn test_first_wildcard_wins() {
        let index = EndpointIndex::new(vec![
            EndpointPermission::owned("GET", "/things/*", Permission::SchemaRead),
            EndpointPermission::new("GET", "/things/*", Permission::SchemaReadAll),
        ]);

        let rule = index.lookup("GET", "/things/1").unwrap();
        assert_eq!(rule.permission, Permission::SchemaRead);
    }

    #[test]
    fn test_exact_takes_precedence_over_wildcard() {
        let index = EndpointIndex::new(vec![
            EndpointPermission::owned("GET", "/things/*", Permission::SchemaRead),
            EndpointPermission::new("GET", "/things/all", Permission::SchemaReadAll),
        ]);

        let rule = index.lookup("GET", "/things/all").unwrap();
        assert_eq!(rule.permission, Permission::SchemaReadAll);
    }

    #[test]
    fn test_lookup_is_stable_across_rebuilds() {
        let cold = EndpointIndex::with_defaults();
        let warm = EndpointIndex::with_defaults();

        let requests = [
            ("GET", "/api/v1/schemas"),
            ("PUT", "/api/v1/schemas/abc"),
            ("GET", "/api/v1/unknown"),
            ("POST", "/api/v1/members"),
        ];

        for (method, path) in requests {
            let first = cold.lookup(method, path).cloned();
            for _ in 0..3 {
                assert_eq!(cold.lookup(method, path).cloned(), first);
            }
            assert_eq!(warm.lookup(method, path).cloned(), first);
        }
        assert_eq!(cold.len(), default_endpoint_permissions().len());
    }
}
