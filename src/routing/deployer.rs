//! Deployer descriptors and their URL rewrite templates.
//!
//! # Responsibilities
//! - Describe one routable backend target (name, host, base path)
//! - Parse the per-target URL template once, at construction
//! - Derive the deterministic names used by generated edge resources
//!
//! # Design Decisions
//! - Descriptors are immutable once built; order in a routing set matters
//! - Names keep their case; generated locals use the lower-cased form
//! - Unknown template placeholders are rejected up front, not at the edge

use std::fmt;
use thiserror::Error;

use crate::config::schema::DeployerConfig;

/// Suffix appended to a deployer name to form its health check name.
pub const HEALTH_CHECK_SUFFIX: &str = "Check";

/// Errors raised while parsing a URL template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at byte {0}")]
    StrayBrace(usize),
}

/// A value a URL template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathField {
    Package,
    Action,
    /// Version including its original divider (`@v1` or `_v1`).
    Version,
    /// Version with the divider normalized to `_`.
    UnderscoreVersion,
    /// Version with the divider normalized to `@`.
    AtVersion,
    /// Version with the divider normalized to `/`.
    SlashVersion,
    Rest,
    /// The deployer's own base path, fixed at compile time.
    BasePath,
}

impl PathField {
    pub const ALL: [PathField; 8] = [
        PathField::Package,
        PathField::Action,
        PathField::Version,
        PathField::UnderscoreVersion,
        PathField::AtVersion,
        PathField::SlashVersion,
        PathField::Rest,
        PathField::BasePath,
    ];

    /// Placeholder name as written inside `{}` in a template.
    pub fn placeholder(self) -> &'static str {
        match self {
            PathField::Package => "package",
            PathField::Action => "action",
            PathField::Version => "version",
            PathField::UnderscoreVersion => "_version",
            PathField::AtVersion => "atversion",
            PathField::SlashVersion => "slashversion",
            PathField::Rest => "rest",
            PathField::BasePath => "base_path",
        }
    }

    fn from_placeholder(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.placeholder() == name)
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Field(PathField),
}

/// A parsed URL rewrite template such as
/// `/api/v1/web/{package}/{action}{atversion}{rest}`.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    parts: Vec<TemplatePart>,
}

impl UrlTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(pos));
                    }
                    let field = PathField::from_placeholder(name.trim())
                        .ok_or(TemplateError::UnknownPlaceholder(name))?;
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Field(field));
                }
                '}' => return Err(TemplateError::StrayBrace(pos)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Expand the template, resolving each field through `lookup`.
    pub fn expand<'a>(&self, mut lookup: impl FnMut(PathField) -> &'a str) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Field(f) => out.push_str(lookup(*f)),
            }
        }
        out
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A routable backend target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployer {
    name: String,
    host: String,
    base_path: String,
    url_template: UrlTemplate,
    fallback_logic: String,
}

impl Deployer {
    pub fn new(name: impl Into<String>, host: impl Into<String>, url_template: UrlTemplate) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            base_path: String::new(),
            url_template,
            fallback_logic: String::new(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Opaque edge logic run only when this deployer is the fallback target.
    pub fn with_fallback_logic(mut self, logic: impl Into<String>) -> Self {
        self.fallback_logic = logic.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn url_template(&self) -> &UrlTemplate {
        &self.url_template
    }

    pub fn fallback_logic(&self) -> &str {
        &self.fallback_logic
    }

    /// Lower-cased name, used for generated locals, table keys and overrides.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Name of the edge backend reference (`F_<name>`).
    pub fn backend_ref(&self) -> String {
        format!("F_{}", self.name)
    }

    pub fn health_check_name(&self) -> String {
        format!("{}{}", self.name, HEALTH_CHECK_SUFFIX)
    }
}

impl TryFrom<&DeployerConfig> for Deployer {
    type Error = TemplateError;

    fn try_from(config: &DeployerConfig) -> Result<Self, Self::Error> {
        let template = UrlTemplate::parse(&config.url_template)?;
        Ok(Deployer::new(&config.name, &config.host, template)
            .with_base_path(&config.base_path)
            .with_fallback_logic(config.fallback_logic.clone().unwrap_or_default()))
    }
}
