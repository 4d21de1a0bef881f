// Command-line walker over a root structure
//
// Tokens address fields by dotted path:
//
//   module.layers=32     set a field (text for string-like fields, JSON otherwise)
//   name=@null           `@` makes a string-like field read JSON instead of text
//   verbose              set a Bool field to true, or enable a nested structure
//   @base                merge `base.json`, a map of dotted paths to values
//   --help               describe the field tree
//
// The collected assignments are applied in order, so later tokens win, and
// the result is parsed over the root's defaults like any other input.

pub mod paths;

use std::any::TypeId;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::codec::json;
use crate::codec::types::{Encoded, Target};
use crate::derive::class::Derive;
use crate::internal::error::{Error, FieldPath, Result};
use crate::materialize::materialize_struct;
use crate::schema::mapper::{MapperConfig, SchemaMapper, UnknownFields};
use crate::schema::types::{Kind, StructType, TypeDescriptor};
use crate::schema::value::StructValue;

/// Configuration for the command-line walker
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Whether `--help` is recognized
    pub help: bool,

    /// Whether `@file` includes are recognized
    pub includes: bool,

    /// Policy for unknown keys inside JSON values of nested maps
    pub unknown_fields: UnknownFields,

    /// Program name shown in the usage line
    pub program: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            help: true,
            includes: true,
            unknown_fields: UnknownFields::Strict,
            program: "program".to_string(),
        }
    }
}

/// Result of walking the tokens.
#[derive(Debug)]
pub enum CliOutcome<T> {
    /// `--help` was given; the rendered help text.
    Help(String),
    Parsed(T),
}

/// Dotted-path command-line parser for one root structure.
#[derive(Debug, Clone)]
pub struct CliParser {
    root: Arc<StructType>,
    config: CliConfig,
}

impl CliParser {
    /// Creates a parser with default configuration.
    pub fn new(root: &TypeDescriptor) -> Result<Self> {
        Self::with_config(root, CliConfig::default())
    }

    pub fn with_config(root: &TypeDescriptor, config: CliConfig) -> Result<Self> {
        let root = root
            .as_struct()
            .cloned()
            .ok_or_else(|| Error::usage(FieldPath::root(), format!("{root} is not a structure")))?;
        Ok(Self { root, config })
    }

    /// Creates a parser for a derivable class.
    pub fn for_class<T: Derive>() -> Result<Self> {
        Self::new(&crate::derive::derive::<T>()?)
    }

    pub fn root(&self) -> &Arc<StructType> {
        &self.root
    }

    /// Resolves a dotted path to the field descriptor it names.
    pub fn lookup(&self, dotted: &str) -> Result<&TypeDescriptor> {
        let segments: Vec<&str> = dotted.split('.').collect();
        let mut st: &StructType = &self.root;
        for (i, segment) in segments.iter().enumerate() {
            let field = st.get(segment).ok_or_else(|| {
                Error::usage(dotted, format!("unknown field `{segment}` in {st}"))
            })?;
            if i + 1 == segments.len() {
                return Ok(field);
            }
            st = field.as_struct().ok_or_else(|| {
                Error::usage(
                    dotted,
                    format!("`{}` is a {}, not a structure", segments[..=i].join("."), field.type_name()),
                )
            })?;
        }
        Err(Error::usage(dotted, "empty field path"))
    }

    /// Walks the tokens into ordered `(path, value)` assignments.
    pub fn assignments<I, S>(&self, tokens: I) -> Result<CliOutcome<Vec<(String, Encoded)>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            if token == "--help" {
                if self.config.help {
                    return Ok(CliOutcome::Help(self.help()));
                }
                return Err(Error::usage(FieldPath::root(), "--help is disabled"));
            }
            if token.starts_with('-') {
                return Err(Error::usage(FieldPath::root(), format!("unrecognized option `{token}`")));
            }
            if let Some(include) = token.strip_prefix('@') {
                if !self.config.includes {
                    return Err(Error::usage(FieldPath::root(), format!("includes are disabled: `{token}`")));
                }
                self.read_include(include, &mut out)?;
                continue;
            }

            match token.split_once('=') {
                Some((path, raw)) => {
                    let descriptor = self.lookup(path)?;
                    out.push((path.to_string(), token_value(descriptor, path, raw)?));
                }
                None => {
                    let descriptor = self.lookup(token)?;
                    let value = match descriptor.kind() {
                        Kind::Bool => Encoded::Bool(true),
                        Kind::Struct(_) => Encoded::Map(IndexMap::new()),
                        _ => {
                            return Err(Error::usage(
                                token,
                                format!("{descriptor} is not a flag; use {token}=VALUE"),
                            ))
                        }
                    };
                    out.push((token.to_string(), value));
                }
            }
        }
        Ok(CliOutcome::Parsed(out))
    }

    /// Walks the tokens and parses the result over the root's defaults.
    pub fn parse_value<I, S>(&self, tokens: I) -> Result<CliOutcome<StructValue>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let assignments = match self.assignments(tokens)? {
            CliOutcome::Help(text) => return Ok(CliOutcome::Help(text)),
            CliOutcome::Parsed(assignments) => assignments,
        };
        for (path, _) in &assignments {
            debug!(path = %path, "command-line assignment");
        }
        let raw = paths::unflatten(&assignments);
        let mapper = SchemaMapper::with_config(MapperConfig {
            unknown_fields: self.config.unknown_fields,
            target: Target::JsonSafe,
        });
        mapper.parse(&self.root, &raw).map(CliOutcome::Parsed)
    }

    /// Walks, parses and materializes the root class.
    pub fn parse_args<T: Derive, I, S>(&self, tokens: I) -> Result<CliOutcome<T>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bound = self.root.class().map(|binding| binding.type_id());
        if bound != Some(TypeId::of::<T>()) {
            return Err(Error::materialize(format!("{} is not bound to the requested class", self.root)));
        }
        let value = match self.parse_value(tokens)? {
            CliOutcome::Help(text) => return Ok(CliOutcome::Help(text)),
            CliOutcome::Parsed(value) => value,
        };
        let instance = materialize_struct(&self.root, &value)?
            .into_instance::<T>()
            .map_err(|err| Error::materialize(err.message))?;
        Ok(CliOutcome::Parsed(instance))
    }

    /// Like [`parse_args`](Self::parse_args), but prints help and exits with
    /// status 0, or prints the error and exits with status 2.
    pub fn parse_args_or_exit<T: Derive, I, S>(&self, tokens: I) -> T
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.parse_args::<T, I, S>(tokens) {
            Ok(CliOutcome::Parsed(instance)) => instance,
            Ok(CliOutcome::Help(text)) => {
                println!("{text}");
                std::process::exit(0);
            }
            Err(err) => {
                eprintln!("{}: error: {err}", self.config.program);
                std::process::exit(2);
            }
        }
    }

    /// Renders usage and the field tree with each field's descriptor.
    pub fn help(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "usage: {} [PATH=VALUE | FLAG | @FILE]... [--help]", self.config.program);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", self.root);
        render_fields(&self.root, 1, &mut out);
        out
    }

    fn read_include(&self, name: &str, out: &mut Vec<(String, Encoded)>) -> Result<()> {
        let mut path = PathBuf::from(name);
        if path.extension().map_or(true, |ext| ext != "json") {
            path.set_extension("json");
        }
        let text = std::fs::read_to_string(&path).map_err(|err| {
            Error::usage(FieldPath::root(), format!("cannot read include {}: {err}", path.display()))
        })?;
        let entries = match json::from_str(&text)? {
            Encoded::Map(entries) => entries,
            other => {
                return Err(Error::usage(
                    FieldPath::root(),
                    format!("include {} must hold a map, found {}", path.display(), other.kind()),
                ))
            }
        };
        debug!(include = %path.display(), entries = entries.len(), "merging include");
        for (key, value) in entries {
            self.flatten_into(key, value, out)?;
        }
        Ok(())
    }

    // Descends into nested structures so included values merge per leaf.
    fn flatten_into(&self, path: String, value: Encoded, out: &mut Vec<(String, Encoded)>) -> Result<()> {
        let descriptor = self.lookup(&path)?;
        match (descriptor.kind(), value) {
            (Kind::Struct(_), Encoded::Map(entries)) if !entries.is_empty() => {
                for (key, item) in entries {
                    self.flatten_into(format!("{path}.{key}"), item, out)?;
                }
                Ok(())
            }
            (_, value) => {
                out.push((path, value));
                Ok(())
            }
        }
    }
}

fn token_value(descriptor: &TypeDescriptor, path: &str, raw: &str) -> Result<Encoded> {
    let raw = if descriptor.kind().is_string_like() {
        match raw.strip_prefix('@') {
            Some(literal) => literal,
            None => return Ok(Encoded::Text(raw.to_string())),
        }
    } else {
        raw
    };
    match json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) if matches!(descriptor.kind(), Kind::Any) => Ok(Encoded::Text(raw.to_string())),
        Err(_) => Err(Error::usage(
            path,
            format!("cannot read {raw:?} as {}; expected a JSON literal", descriptor.type_name()),
        )),
    }
}

fn render_fields(st: &StructType, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, field) in st.fields() {
        let _ = writeln!(out, "{indent}{name}: {field}");
        if let Some(nested) = field.as_struct() {
            render_fields(nested, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::value::Value;

    fn root() -> TypeDescriptor {
        let module = StructType::named("CliModule")
            .field("layers", TypeDescriptor::int().default(42))
            .field("name", TypeDescriptor::str().default("enc"));
        StructType::named("CliRoot")
            .field("module", module.into_descriptor().empty())
            .field("verbose", TypeDescriptor::bool().default(false))
            .field("tags", TypeDescriptor::list(TypeDescriptor::str()).empty())
            .into_descriptor()
    }

    fn parse(tokens: &[&str]) -> Result<StructValue> {
        match CliParser::new(&root())?.parse_value(tokens)? {
            CliOutcome::Parsed(value) => Ok(value),
            CliOutcome::Help(_) => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_nested_assignment_keeps_sibling_defaults() {
        let value = parse(&["module.layers=32"]).unwrap();
        assert_eq!(value.get_path("module.layers"), Some(&Value::Int(32)));
        assert_eq!(value.get_path("module.name"), Some(&Value::Str("enc".into())));
        assert_eq!(value.get("verbose"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_flags_and_json_values() {
        let value = parse(&["verbose", r#"tags=["a","b"]"#, "module.name=dec"]).unwrap();
        assert_eq!(value.get("verbose"), Some(&Value::Bool(true)));
        assert_eq!(value.get("tags"), Some(&Value::from(vec!["a", "b"])));
        assert_eq!(value.get_path("module.name"), Some(&Value::Str("dec".into())));
    }

    #[test]
    fn test_at_prefix_reads_json_for_text_fields() {
        let root = StructType::named("CliNames")
            .field("name", TypeDescriptor::str().default("enc"))
            .field("alias", TypeDescriptor::str().default("a"))
            .field("home", TypeDescriptor::path().missing())
            .into_descriptor();
        let parser = CliParser::new(&root).unwrap();
        let value = match parser
            .parse_value([r#"name=@"@handle""#, "alias=@null", "home=/tmp/x"])
            .unwrap()
        {
            CliOutcome::Parsed(value) => value,
            CliOutcome::Help(_) => panic!("unexpected help"),
        };
        assert_eq!(value.get("name"), Some(&Value::Str("@handle".into())));
        assert_eq!(value.get("alias"), Some(&Value::Null));
        assert_eq!(value.get("home"), Some(&Value::Path("/tmp/x".into())));

        let err = parser.parse_value(["name=@bare"]).unwrap_err();
        assert!(matches!(err, Error::UsageError { .. }));
        assert_eq!(err.path().to_string(), "name");
    }

    #[test]
    fn test_later_tokens_win() {
        let value = parse(&["module.layers=1", "module.layers=2"]).unwrap();
        assert_eq!(value.get_path("module.layers"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unknown_path_is_usage_error() {
        let err = parse(&["module.depth=3"]).unwrap_err();
        assert!(matches!(err, Error::UsageError { .. }));
        assert_eq!(err.path().to_string(), "module.depth");
    }

    #[test]
    fn test_bad_value_and_bad_flag() {
        assert!(matches!(parse(&["module.layers=many"]).unwrap_err(), Error::UsageError { .. }));
        assert!(matches!(parse(&["tags"]).unwrap_err(), Error::UsageError { .. }));
        let err = parse(&["module.layers=1.5"]).unwrap_err();
        assert_eq!(err.path().to_string(), "module.layers");
    }

    #[test]
    fn test_help_lists_fields() {
        let parser = CliParser::new(&root()).unwrap();
        match parser.parse_value(["--help"]).unwrap() {
            CliOutcome::Help(text) => {
                assert!(text.contains("module: CliModule.empty"));
                assert!(text.contains("    layers: Int.default(42)"));
            }
            CliOutcome::Parsed(_) => panic!("expected help"),
        }
    }

    #[test]
    fn test_include_file() {
        let dir = std::env::temp_dir().join(format!("shapecast-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("base");
        std::fs::write(dir.join("base.json"), r#"{"module": {"layers": 7}, "verbose": true}"#).unwrap();

        let include = format!("@{}", base.display());
        let value = parse(&[include.as_str(), "verbose=false"]).unwrap();
        assert_eq!(value.get_path("module.layers"), Some(&Value::Int(7)));
        assert_eq!(value.get_path("module.name"), Some(&Value::Str("enc".into())));
        assert_eq!(value.get("verbose"), Some(&Value::Bool(false)));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
