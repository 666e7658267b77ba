/// Mapper-wide configuration.
///
/// Each [`Mapper`](crate::db::Mapper) owns its own configuration so that
/// independent mapper instances (e.g. in tests) never observe each other's
/// settings.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// When enabled, a column name that fails exact and case-insensitive
    /// member matching is retried with its underscores removed.
    pub match_names_with_underscores: bool,
    /// When enabled, a database-null column value is explicitly assigned to
    /// the resolved member (as the member type's null/default). When
    /// disabled, the assignment is skipped so member defaults survive.
    pub apply_null_values: bool,
    /// Whether execution may request non-default cursor optimizations. A
    /// driver rejection downgrades the owning mapper permanently.
    pub allow_cursor_optimizations: bool,
    /// Maximum number of plan-cache entries.
    pub plan_cache_capacity: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            match_names_with_underscores: false,
            apply_null_values: false,
            allow_cursor_optimizations: true,
            plan_cache_capacity: 8192,
        }
    }
}
