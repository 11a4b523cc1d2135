//! Include/exclude filtering of plugin ids.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::error::PluginManagerError;

/// Glob patterns that decide which plugins a manager exposes.
///
/// A plugin is visible when its id matches an include pattern (or there are
/// none) and matches no exclude pattern. `*` matches any run of characters,
/// dots included.
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl PluginFilter {
    /// A filter that lets every plugin through.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, PluginManagerError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            include_patterns: include.to_vec(),
            exclude_patterns: exclude.to_vec(),
        })
    }

    pub fn allows(&self, plugin_id: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .is_none_or(|include| include.is_match(plugin_id));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(plugin_id));
        included && !excluded
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }
}

fn compile(patterns: &[String]) -> Result<Option<GlobSet>, PluginManagerError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .build()
            .map_err(|source| PluginManagerError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| PluginManagerError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = PluginFilter::allow_all();
        assert!(filter.allows("acme.motd"));
        assert!(filter.allows(""));
    }

    #[test]
    fn test_include_narrows() {
        let filter = PluginFilter::new(&patterns(&["acme.*"]), &[]).unwrap();
        assert!(filter.allows("acme.motd"));
        assert!(filter.allows("acme.motd.quotes"));
        assert!(!filter.allows("trellis.core"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = PluginFilter::new(&patterns(&["acme.*"]), &patterns(&["*.quotes"])).unwrap();
        assert!(filter.allows("acme.motd"));
        assert!(!filter.allows("acme.motd.quotes"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = PluginFilter::new(&patterns(&["acme.[motd"]), &[]).unwrap_err();
        match err {
            PluginManagerError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "acme.[motd"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
