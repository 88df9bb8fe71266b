//! Typed command templates with named placeholders.
//!
//! Step commands use `${name}` placeholders that are resolved per host at
//! execution time. Substituted values are shell-quoted unless they consist
//! only of characters that are safe unquoted, so a variable can never
//! inject extra shell syntax.
//!
//! # Syntax
//!
//! - `${name}` - replaced with the (quoted) value of `name`
//! - `$${name}` - produces a literal `${name}` in the command
//!
//! # Example
//!
//! ```
//! use convoy::steps::{CommandTemplate, TemplateContext};
//!
//! let template = CommandTemplate::parse("docker stop ${image_name}").unwrap();
//! let mut ctx = TemplateContext::new("web1");
//! ctx.vars.insert("image_name".to_string(), "dockertest".to_string());
//! assert_eq!(template.render(&ctx).unwrap(), "docker stop dockertest");
//!
//! ctx.vars.insert("image_name".to_string(), "x; rm -rf /".to_string());
//! assert_eq!(template.render(&ctx).unwrap(), "docker stop 'x; rm -rf /'");
//! ```

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConvoyError, Result};

/// A segment of a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal shell text
    Literal(String),
    /// Placeholder reference: ${name}
    Placeholder(String),
}

/// A parsed command with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").unwrap());

impl CommandTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntax` for an unterminated `${`, an empty
    /// placeholder, or a placeholder name that is not an identifier.
    pub fn parse(source: &str) -> Result<Self> {
        let syntax_error = |message: String| ConvoyError::TemplateSyntax {
            template: source.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos..];

            if let Some(escaped) = after.strip_prefix("$${") {
                // $${...} -> literal ${...}
                literal.push_str("${");
                rest = escaped;
            } else if let Some(open) = after.strip_prefix("${") {
                let end = open
                    .find('}')
                    .ok_or_else(|| syntax_error("unterminated placeholder".to_string()))?;
                let name = open[..end].trim();
                if name.is_empty() {
                    return Err(syntax_error("empty placeholder".to_string()));
                }
                if !PLACEHOLDER_NAME.is_match(name) {
                    return Err(syntax_error(format!("invalid placeholder name '{}'", name)));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
                rest = &open[end + 1..];
            } else {
                literal.push('$');
                rest = &after[1..];
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template produces no command at all.
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Unique placeholder names, sorted.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Placeholders that `context` cannot resolve.
    pub fn missing(&self, context: &TemplateContext) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| context.resolve(name).is_none())
            .map(String::from)
            .collect()
    }

    /// Resolve every placeholder against `context`.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedPlaceholder` for the first unknown name.
    pub fn render(&self, context: &TemplateContext) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        context
                            .resolve(name)
                            .ok_or_else(|| ConvoyError::UnresolvedPlaceholder {
                                name: name.clone(),
                                host: context.host.clone(),
                            })?;
                    out.push_str(&shell_quote(value));
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for CommandTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        CommandTemplate::parse(&source).map_err(serde::de::Error::custom)
    }
}

/// Quote `value` for a POSIX shell unless it is already safe.
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '@' | '%' | '+' | '=' | ',')
        });
    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

/// Values available to a host's templates.
///
/// Resolution order:
/// 1. Overrides from the command line (highest priority)
/// 2. Host variables
/// 3. Global variables
/// 4. Built-in variables (lowest priority)
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Host the templates render for (used in error messages).
    pub host: String,

    /// Command line overrides.
    pub overrides: HashMap<String, String>,

    /// Per-host variables.
    pub host_vars: HashMap<String, String>,

    /// Global variables.
    pub vars: HashMap<String, String>,

    /// Built-in variables (host, address, convoy_version).
    pub builtins: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a context for `host` with the version builtin.
    pub fn new(host: &str) -> Self {
        let mut builtins = HashMap::new();
        builtins.insert(
            "convoy_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        builtins.insert("host".to_string(), host.to_string());

        Self {
            host: host.to_string(),
            builtins,
            ..Default::default()
        }
    }

    /// Add a built-in variable.
    pub fn with_builtin(mut self, name: &str, value: &str) -> Self {
        self.builtins.insert(name.to_string(), value.to_string());
        self
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.overrides
            .get(name)
            .or_else(|| self.host_vars.get(name))
            .or_else(|| self.vars.get(name))
            .or_else(|| self.builtins.get(name))
            .map(String::as_str)
    }
}
