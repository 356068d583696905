//! Loader configuration and package filtering.

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Which classes the loader feeds into the graph, and what to do when
/// individual classes fail to parse.
#[derive(Clone, Debug, Default)]
pub struct LoaderConfig {
    /// Glob patterns (e.g. `com.example.**`) a class's qualified name must
    /// match at least one of to be included. Empty means "include everything".
    pub include_packages: Vec<String>,
    /// Glob patterns that exclude a class even if it matched an include
    /// pattern (or when there are no include patterns at all).
    pub exclude_packages: Vec<String>,
    /// Whether a `.war` root's `WEB-INF/lib/*.jar` dependencies are scanned
    /// at all. Ignored for directory and `.jar` roots, which have no
    /// separate library set.
    pub include_libraries: bool,
    /// Glob patterns on library jar file names, applied only when
    /// `include_libraries` is set. Empty means every library jar qualifies.
    pub library_filters: Vec<String>,
}

impl LoaderConfig {
    fn glob_set(patterns: &[String]) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
    }

    pub(super) fn matcher(&self) -> PackageMatcher {
        PackageMatcher {
            include: Self::glob_set(&self.include_packages),
            exclude: Self::glob_set(&self.exclude_packages),
            include_is_empty: self.include_packages.is_empty(),
        }
    }
}

pub(super) struct PackageMatcher {
    include: GlobSet,
    exclude: GlobSet,
    include_is_empty: bool,
}

impl PackageMatcher {
    pub(super) fn is_included(&self, qualified_class_name: &str) -> bool {
        if self.exclude.is_match(qualified_class_name) {
            return false;
        }
        self.include_is_empty || self.include.is_match(qualified_class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_includes_everything() {
        let matcher = LoaderConfig::default().matcher();
        assert!(matcher.is_included("com.example.Anything"));
    }

    #[test]
    fn include_pattern_restricts_to_matching_package() {
        let config = LoaderConfig {
            include_packages: vec!["com.example.**".to_string()],
            ..Default::default()
        };
        let matcher = config.matcher();
        assert!(matcher.is_included("com.example.service.UserService"));
        assert!(!matcher.is_included("org.other.Thing"));
    }

    #[test]
    fn exclude_pattern_wins_over_include() {
        let config = LoaderConfig {
            include_packages: vec!["com.example.**".to_string()],
            exclude_packages: vec!["com.example.internal.**".to_string()],
            ..Default::default()
        };
        let matcher = config.matcher();
        assert!(matcher.is_included("com.example.service.UserService"));
        assert!(!matcher.is_included("com.example.internal.Secret"));
    }
}
