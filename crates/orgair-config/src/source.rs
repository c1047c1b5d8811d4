//! Value sources and precedence resolution.
//!
//! A [`SourceStack`] holds the configured [`ValueSource`]s ordered by
//! [`Precedence`]: explicit overrides, then the process environment, then
//! key/value files. Compiled-in defaults live in the schema and apply only
//! when no source supplies a field.
//!
//! # Example
//!
//! ```no_run
//! use orgair_config::SourceStack;
//!
//! # fn main() -> Result<(), orgair_config::ConfigError> {
//! let sources = SourceStack::new()
//!     .with_env()
//!     .with_optional_env_file(".env")?;
//! # Ok(())
//! # }
//! ```

use std::env;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::ConfigError;
use crate::schema::Schema;
use crate::secret::MASK;

/// A source of raw configuration strings.
///
/// Lookups are case-insensitive on the field name and must not mutate the
/// source. `Debug` output must not include values.
pub trait ValueSource: Send + Sync + fmt::Debug {
    /// Short name used for attribution.
    fn name(&self) -> &str;

    /// Raw value for `key`, if this source defines it.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Rank of a source; higher ranks win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Key/value file.
    File,
    /// Process environment.
    Environment,
    /// Explicit overrides.
    Override,
}

/// In-memory key/value source.
///
/// `Debug` lists keys only.
#[derive(Clone, Default)]
pub struct MapSource {
    name: String,
    values: IndexMap<String, String>,
}

impl MapSource {
    /// Create an empty source with the given attribution name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    /// Create a source from key/value pairs.
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut source = Self::new(name);
        for (key, value) in pairs {
            source.insert(key, value);
        }
        source
    }

    /// Add or replace a value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_ascii_uppercase(), value.into());
    }

    /// Builder form of [`MapSource::insert`].
    #[must_use]
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for MapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSource")
            .field("name", &self.name)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ValueSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_ascii_uppercase()).cloned()
    }
}

/// The process environment, optionally behind a name prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSource {
    prefix: Option<String>,
}

impl EnvironmentSource {
    /// Read variables named exactly like schema fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read variables named `PREFIX` + field name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ValueSource for EnvironmentSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let wanted = match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        };

        if let Ok(value) = env::var(wanted.to_ascii_uppercase()) {
            return Some(value);
        }

        env::vars_os().find_map(|(name, value)| {
            let name = name.to_str()?;
            if name.eq_ignore_ascii_case(&wanted) {
                value.into_string().ok()
            } else {
                None
            }
        })
    }
}

/// A `KEY=value` file parsed with `dotenvy`.
///
/// Keys match field names case-insensitively; unknown keys are ignored.
#[derive(Debug, Clone)]
pub struct EnvFileSource {
    values: MapSource,
}

impl EnvFileSource {
    /// Parse a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let iter = dotenvy::from_path_iter(path).map_err(|e| match e {
            dotenvy::Error::Io(source) => ConfigError::read_error(path, source),
            other => ConfigError::env_file_error(path, other.to_string()),
        })?;

        let mut values = MapSource::new(path.display().to_string());
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::env_file_error(path, e.to_string()))?;
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Parse file contents held in memory.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut values = MapSource::new(name.clone());
        for item in dotenvy::from_read_iter(content.as_bytes()) {
            let (key, value) =
                item.map_err(|e| ConfigError::env_file_error(&name, e.to_string()))?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }
}

impl ValueSource for EnvFileSource {
    fn name(&self) -> &str {
        self.values.name()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.lookup(key)
    }
}

/// A raw value together with the source that supplied it.
///
/// `Debug` shows the source and masks the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Raw string.
    pub raw: String,
    /// Name of the supplying source.
    pub source: String,
}

/// Flat field name → raw value mapping produced by [`SourceStack::resolve`].
///
/// Fields absent from every source are simply missing; the field engine
/// falls back to schema defaults for them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedValues {
    values: IndexMap<&'static str, Resolved>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("raw", &MASK)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Debug for ResolvedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(name, r)| (name, &r.source)))
            .finish()
    }
}

impl ResolvedValues {
    /// Raw value for a field.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.get(name).map(|r| r.raw.as_str())
    }

    /// Raw value and attribution for a field.
    pub fn get(&self, name: &str) -> Option<&Resolved> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Number of fields supplied by some source.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no source supplied any field.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over supplied fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Resolved)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

/// Ordered set of value sources.
#[derive(Default)]
pub struct SourceStack {
    sources: Vec<(Precedence, Box<dyn ValueSource>)>,
}

impl SourceStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source at the given precedence.
    ///
    /// Among sources of equal precedence, the one added first wins.
    #[must_use]
    pub fn with_source(mut self, precedence: Precedence, source: impl ValueSource + 'static) -> Self {
        self.push(precedence, Box::new(source));
        self
    }

    /// Add a boxed source at the given precedence.
    pub fn push(&mut self, precedence: Precedence, source: Box<dyn ValueSource>) {
        // Stable insertion keeps earlier sources ahead within a rank.
        let index = self
            .sources
            .iter()
            .position(|(p, _)| *p < precedence)
            .unwrap_or(self.sources.len());
        self.sources.insert(index, (precedence, source));
    }

    /// Add explicit overrides.
    #[must_use]
    pub fn with_overrides(self, overrides: MapSource) -> Self {
        self.with_source(Precedence::Override, overrides)
    }

    /// Add the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_source(Precedence::Environment, EnvironmentSource::new())
    }

    /// Add the process environment behind a variable name prefix.
    #[must_use]
    pub fn with_env_prefix(self, prefix: &str) -> Self {
        self.with_source(Precedence::Environment, EnvironmentSource::with_prefix(prefix))
    }

    /// Add a key/value file.
    pub fn with_env_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = EnvFileSource::from_path(path)?;
        Ok(self.with_source(Precedence::File, file))
    }

    /// Add a key/value file if it exists.
    pub fn with_optional_env_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_env_file(path)
        } else {
            Ok(self)
        }
    }

    /// Source names from highest to lowest precedence.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|(_, s)| s.name()).collect()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the stack has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Merge all sources for every schema field.
    ///
    /// The first source in precedence order that defines a field wins.
    pub fn resolve(&self, schema: &Schema) -> ResolvedValues {
        let mut values = IndexMap::new();

        for name in schema.field_names() {
            let found = self
                .sources
                .iter()
                .find_map(|(_, source)| source.lookup(name).map(|raw| (source.name(), raw)));

            if let Some((source, raw)) = found {
                debug!(field = name, source, "resolved configuration field");
                values.insert(
                    name,
                    Resolved {
                        raw,
                        source: source.to_string(),
                    },
                );
            }
        }

        ResolvedValues { values }
    }
}

impl fmt::Debug for SourceStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|(precedence, source)| (precedence, source.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use std::io::Write;

    fn schema() -> Schema {
        Schema::builder()
            .field(FieldSpec::text("APP_ENV").default_value("development"))
            .field(FieldSpec::boolean("DEBUG").default_value("false"))
            .field(FieldSpec::integer("RATE_LIMIT_PER_MINUTE").default_value("60"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_map_source_case_insensitive() {
        let source = MapSource::new("test").with("app_env", "staging");
        assert_eq!(source.lookup("APP_ENV"), Some("staging".to_string()));
        assert_eq!(source.lookup("App_Env"), Some("staging".to_string()));
        assert_eq!(source.lookup("DEBUG"), None);
    }

    #[test]
    fn test_precedence_order_independent_of_call_order() {
        let stack = SourceStack::new()
            .with_source(Precedence::File, MapSource::new("file"))
            .with_source(Precedence::Override, MapSource::new("override"))
            .with_source(Precedence::Environment, MapSource::new("env"));
        assert_eq!(stack.names(), vec!["override", "env", "file"]);
    }

    #[test]
    fn test_equal_precedence_keeps_insertion_order() {
        let stack = SourceStack::new()
            .with_source(Precedence::File, MapSource::new("first"))
            .with_source(Precedence::File, MapSource::new("second"));
        assert_eq!(stack.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_resolve_first_source_wins() {
        let stack = SourceStack::new()
            .with_source(
                Precedence::File,
                MapSource::from_pairs("file", [("APP_ENV", "staging"), ("DEBUG", "true")]),
            )
            .with_overrides(MapSource::new("override").with("APP_ENV", "production"));

        let resolved = stack.resolve(&schema());
        assert_eq!(resolved.raw("APP_ENV"), Some("production"));
        assert_eq!(resolved.get("APP_ENV").unwrap().source, "override");
        assert_eq!(resolved.raw("DEBUG"), Some("true"));
        assert_eq!(resolved.get("DEBUG").unwrap().source, "file");
        assert_eq!(resolved.raw("RATE_LIMIT_PER_MINUTE"), None);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_resolve_ignores_unknown_keys() {
        let stack = SourceStack::new()
            .with_overrides(MapSource::new("override").with("UNRELATED", "x"));
        assert!(stack.resolve(&schema()).is_empty());
    }

    #[test]
    fn test_resolve_does_not_mutate_sources() {
        let source = MapSource::from_pairs("file", [("DEBUG", "true")]);
        let stack = SourceStack::new().with_source(Precedence::File, source.clone());
        let _ = stack.resolve(&schema());
        let _ = stack.resolve(&schema());
        assert_eq!(source.lookup("DEBUG"), Some("true".to_string()));
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_env_file_from_str() {
        let content = "# comment\napp_env=staging\nDEBUG=\"true\"\nUNKNOWN_KEY=ignored\n";
        let file = EnvFileSource::parse("inline", content).unwrap();
        assert_eq!(file.lookup("APP_ENV"), Some("staging".to_string()));
        assert_eq!(file.lookup("debug"), Some("true".to_string()));

        let stack = SourceStack::new().with_source(Precedence::File, file);
        assert_eq!(stack.resolve(&schema()).len(), 2);
    }

    #[test]
    fn test_env_file_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "RATE_LIMIT_PER_MINUTE=120").unwrap();
        writeln!(file, "debug=on").unwrap();

        let stack = SourceStack::new().with_env_file(file.path()).unwrap();
        let resolved = stack.resolve(&schema());
        assert_eq!(resolved.raw("RATE_LIMIT_PER_MINUTE"), Some("120"));
        assert_eq!(resolved.raw("DEBUG"), Some("on"));
    }

    #[test]
    fn test_env_file_not_found() {
        let result = SourceStack::new().with_env_file("/nonexistent/.env");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_optional_env_file_not_found() {
        let stack = SourceStack::new()
            .with_optional_env_file("/nonexistent/.env")
            .unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_debug_output_never_shows_values() {
        let stack = SourceStack::new()
            .with_overrides(MapSource::new("override").with("SECRET_KEY", "TOPSECRETVALUE_123"))
            .with_source(
                Precedence::File,
                EnvFileSource::parse("inline", "SNOWFLAKE_PASSWORD=FILESECRET_456\n").unwrap(),
            );

        let schema = Schema::builder()
            .field(FieldSpec::secret("SECRET_KEY"))
            .field(FieldSpec::secret("SNOWFLAKE_PASSWORD"))
            .build()
            .unwrap();
        let resolved = stack.resolve(&schema);

        let rendered = [
            format!("{stack:?}"),
            format!("{resolved:?}"),
            format!("{:?}", resolved.get("SECRET_KEY").unwrap()),
        ];
        for text in &rendered {
            assert!(!text.contains("TOPSECRETVALUE_123"), "leaked: {text}");
            assert!(!text.contains("FILESECRET_456"), "leaked: {text}");
        }
        assert!(rendered[0].contains("override"));
        assert!(rendered[1].contains("SNOWFLAKE_PASSWORD"));
        assert!(format!("{:?}", MapSource::new("m").with("k", "v")).contains("\"K\""));
    }
}
