//! Path parsing and per-backend URL rewriting.
//!
//! # Responsibilities
//! - Split an inbound path into package, action, version and remainder
//! - Normalize the version divider (`@` or `_`) into `_`, `@` and `/` forms
//! - Expand the selected backend's template into the upstream URL
//! - Lower the same logic to IR for the miss and pass phases
//!
//! # Design Decisions
//! - A path that does not match degrades to empty fields; upstreams reject
//!   genuinely invalid requests
//! - The in-process parser and the rendered edge logic share one pattern

use std::sync::OnceLock;

use regex::Regex;

use crate::logic::ir::{Builtin, Expr, Place, Program, Stmt, VarType};
use crate::routing::deployer::{Deployer, PathField, TemplatePart, UrlTemplate};
use crate::routing::CompileError;

/// `/<package>/<action>[<divider><version>]<rest>`
pub const PATH_PATTERN: &str = r"^/([^/]+)/([^/@_]+)([@_][^/@_]+)?(.*)$";

/// Matches the version divider.
pub const DIVIDER_PATTERN: &str = "[@_]";

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PATH_PATTERN).expect("path pattern is valid"))
}

/// Fields parsed out of an inbound path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFields {
    pub package: String,
    pub action: String,
    /// Version with its original divider, e.g. `@v1`.
    pub version: String,
    pub underscore_version: String,
    pub at_version: String,
    pub slash_version: String,
    pub rest: String,
}

impl PathFields {
    /// Parse `url`; a non-matching url yields all-empty fields.
    pub fn parse(url: &str) -> Self {
        let Some(caps) = path_regex().captures(url) else {
            return Self::default();
        };
        let group = |i| caps.get(i).map(|m| m.as_str()).unwrap_or_default().to_string();
        let version = group(3);

        Self {
            package: group(1),
            action: group(2),
            underscore_version: replace_divider(&version, "_"),
            at_version: replace_divider(&version, "@"),
            slash_version: replace_divider(&version, "/"),
            version,
            rest: group(4),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn get(&self, field: PathField) -> &str {
        match field {
            PathField::Package => &self.package,
            PathField::Action => &self.action,
            PathField::Version => &self.version,
            PathField::UnderscoreVersion => &self.underscore_version,
            PathField::AtVersion => &self.at_version,
            PathField::SlashVersion => &self.slash_version,
            PathField::Rest => &self.rest,
            // resolved by the route, not the path
            PathField::BasePath => "",
        }
    }
}

fn replace_divider(version: &str, divider: &str) -> String {
    version.replacen(['@', '_'], divider, 1)
}

/// One backend's rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRoute {
    pub name: String,
    pub backend: String,
    pub base_path: String,
    pub template: UrlTemplate,
}

impl RewriteRoute {
    pub fn expand(&self, fields: &PathFields) -> String {
        self.template.expand(|f| match f {
            PathField::BasePath => self.base_path.as_str(),
            other => fields.get(other),
        })
    }

    fn url_expr(&self) -> Expr {
        let parts = self
            .template
            .parts()
            .iter()
            .map(|part| match part {
                TemplatePart::Literal(s) => Expr::str(s),
                TemplatePart::Field(PathField::BasePath) => Expr::str(&self.base_path),
                TemplatePart::Field(f) => Expr::var(f.placeholder()),
            })
            .collect();
        Expr::Concat(parts)
    }
}

/// Compiled URL rewriting for one routing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    routes: Vec<RewriteRoute>,
}

impl RewritePlan {
    pub fn compile(deployers: &[Deployer]) -> Result<Self, CompileError> {
        if deployers.is_empty() {
            return Err(CompileError::NoDeployers);
        }
        super::check_names(deployers)?;

        let routes = deployers
            .iter()
            .map(|d| RewriteRoute {
                name: d.name().to_string(),
                backend: d.backend_ref(),
                base_path: d.base_path().to_string(),
                template: d.url_template().clone(),
            })
            .collect();
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[RewriteRoute] {
        &self.routes
    }

    /// Upstream URL for `url` when routed to the deployer named `name`.
    ///
    /// `None` when no deployer has that name; the edge then leaves the
    /// backend request URL untouched.
    pub fn rewrite(&self, name: &str, url: &str) -> Option<String> {
        let route = self.routes.iter().find(|r| r.name == name)?;
        Some(route.expand(&PathFields::parse(url)))
    }

    /// Lower to a program usable in both the miss and pass phases.
    pub fn to_program(&self) -> Program {
        let mut program = Program::new();
        let path_vars: Vec<&str> = PathField::ALL
            .iter()
            .filter(|f| **f != PathField::BasePath)
            .map(|f| f.placeholder())
            .collect();

        for var in &path_vars {
            program.push(Stmt::Declare(var.to_string(), VarType::String));
        }
        for var in &path_vars {
            program.push(Stmt::set_var(*var, Expr::str("")));
        }

        let version = || Expr::var(PathField::Version.placeholder());
        let normalize = |field: PathField, divider: &str| {
            Stmt::set_var(
                field.placeholder(),
                Expr::RegSub {
                    input: Box::new(version()),
                    pattern: DIVIDER_PATTERN.to_string(),
                    replacement: divider.to_string(),
                },
            )
        };

        program.push(Stmt::If {
            branches: vec![(
                Expr::matches(Expr::Builtin(Builtin::ReqUrl), PATH_PATTERN),
                vec![
                    Stmt::set_var(PathField::Package.placeholder(), Expr::RegexGroup(1)),
                    Stmt::set_var(PathField::Action.placeholder(), Expr::RegexGroup(2)),
                    Stmt::set_var(PathField::Version.placeholder(), Expr::RegexGroup(3)),
                    Stmt::set_var(PathField::Rest.placeholder(), Expr::RegexGroup(4)),
                    normalize(PathField::UnderscoreVersion, "_"),
                    normalize(PathField::AtVersion, "@"),
                    normalize(PathField::SlashVersion, "/"),
                ],
            )],
            otherwise: None,
        });

        let branches = self
            .routes
            .iter()
            .map(|r| {
                (
                    Expr::eq(Expr::Builtin(Builtin::ReqBackend), Expr::Backend(r.backend.clone())),
                    vec![Stmt::Set(Place::BereqUrl, r.url_expr())],
                )
            })
            .collect();
        program.push(Stmt::If {
            branches,
            otherwise: None,
        });

        program
    }
}
