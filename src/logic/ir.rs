//! Edge logic intermediate representation.
//!
//! A deliberately small statement/expression tree: enough to express
//! weighted selection, health lookups, table lookups, regex capture and
//! string templates. Renderers turn a [`Program`] into platform text.

/// Type of a declared local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Integer,
    String,
}

/// Which message a header belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Client request.
    Req,
    /// Backend response.
    Beresp,
    /// Client response.
    Resp,
}

/// Platform-provided values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ReqUrl,
    ReqBackend,
    BereqUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Le,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Bool(bool),
    /// A declared local.
    Var(String),
    Header(Scope, String),
    Builtin(Builtin),
    /// Reference to a named backend, e.g. `F_prod`.
    Backend(String),
    /// Health flag of a named backend.
    BackendHealthy(String),
    /// Uniform random integer in `[low, high]`, both inclusive.
    RandomInt(i64, i64),
    /// String to integer conversion.
    Atoi(Box<Expr>),
    TableLookup {
        table: String,
        key: String,
        default: String,
    },
    /// Value of `key` in a `separator`-delimited list of `key=value` pairs.
    Subfield {
        source: Box<Expr>,
        key: String,
        separator: String,
    },
    /// Replace the first match of `pattern` in `input`.
    RegSub {
        input: Box<Expr>,
        pattern: String,
        replacement: String,
    },
    /// Capture group of the most recent successful regex match.
    RegexGroup(u8),
    Concat(Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Matches {
        subject: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn str(s: impl Into<String>) -> Self {
        Expr::Str(s.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn req_header(name: impl Into<String>) -> Self {
        Expr::Header(Scope::Req, name.into())
    }

    pub fn compare(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::compare(CmpOp::Eq, lhs, rhs)
    }

    pub fn matches(subject: Expr, pattern: impl Into<String>) -> Self {
        Expr::Matches {
            subject: Box::new(subject),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn not_matches(subject: Expr, pattern: impl Into<String>) -> Self {
        Expr::Matches {
            subject: Box::new(subject),
            pattern: pattern.into(),
            negated: true,
        }
    }
}

/// Assignable locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Var(String),
    Header(Scope, String),
    ReqBackend,
    BereqUrl,
    BerespCacheable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Declare(String, VarType),
    Set(Place, Expr),
    /// `name += value` on an integer local.
    AddAssign(String, Expr),
    /// First branch whose condition holds runs; otherwise `otherwise`.
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    /// Opaque platform text, emitted verbatim.
    Raw(String),
}

impl Stmt {
    pub fn set_var(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Set(Place::Var(name.into()), value)
    }
}

/// An ordered list of statements forming one logic unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stmt: Stmt) -> &mut Self {
        self.stmts.push(stmt);
        self
    }
}

impl From<Vec<Stmt>> for Program {
    fn from(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}
