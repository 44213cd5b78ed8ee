// src/scanner/syntax.rs
//! Closed syntax representation the rule visitors run over.
//!
//! The tree-sitter CST is lowered into these variants once per block; every
//! later pass (facts, predicates) is a [`Visitor`] over them.

use crate::types::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub span: SourceSpan,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Function(FunctionDef),
    Class(ClassDef),
    Branch(Branch),
    Try(TryBlock),
    With(WithBlock),
    /// `global` / `nonlocal` declarations.
    Global(Vec<String>),
    Assign(Assign),
    Expr(Expr),
    Return(Option<Expr>),
    /// Names bound by an import.
    Import(Vec<String>),
    /// Statements the scanner does not model; nested expressions are kept.
    Other(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Elif,
    While,
    For,
}

impl BranchKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Elif => "elif",
            Self::While => "while",
            Self::For => "for",
        }
    }
}

/// `if`/`elif`/`while`/`for`. For loops keep the iterable in `test` and the
/// loop variable in `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    pub test: Expr,
    pub target: Option<Expr>,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub span: SourceSpan,
    pub matches: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryBlock {
    pub body: Vec<Stmt>,
    pub handlers: Vec<Handler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithBlock {
    pub items: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// Plain or augmented assignment; `op` is set for `+=` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub value: Option<Expr>,
    pub op: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtE),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtE),
            "is" => Some(Self::Is),
            "is not" => Some(Self::IsNot),
            "in" => Some(Self::In),
            "not in" => Some(Self::NotIn),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::LtE | Self::Gt | Self::GtE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// String literal contents without prefix or quotes.
    Str(String),
    Num(String),
    /// `True`, `False`, `None`.
    Const(String),
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    /// A flat `a or b or c` chain; nested only where the operator changes.
    BoolOp { op: BoolOpKind, values: Vec<Expr> },
    Not(Box<Expr>),
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Other(Vec<Expr>),
}

impl Expr {
    /// Dotted path for names, attribute chains and calls on them
    /// (`os.path.join`, `self.tick`).
    #[must_use]
    pub fn path(&self) -> Option<String> {
        match self {
            Self::Name(n) => Some(n.clone()),
            Self::Attribute { value, attr } => value.path().map(|p| format!("{p}.{attr}")),
            Self::Call { func, .. } => func.path(),
            _ => None,
        }
    }

    /// Root name of a name/attribute/subscript chain (`state` for `state["n"].x`).
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            Self::Attribute { value, .. } | Self::Subscript { value, .. } => value.root_name(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Num(_) | Self::Const(_))
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Num(text) => parse_number(text),
            _ => None,
        }
    }

    /// Flattens an `and` chain into its conjuncts.
    #[must_use]
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Self::BoolOp {
                op: BoolOpKind::And,
                values,
            } => values.iter().flat_map(Expr::conjuncts).collect(),
            other => vec![other],
        }
    }

    /// Compact source-like rendering, used for evidence and flag identity.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Name(n) | Self::Num(n) | Self::Const(n) => n.clone(),
            Self::Str(s) => format!("{s:?}"),
            Self::Attribute { value, attr } => format!("{}.{attr}", value.render()),
            Self::Call { func, args } => {
                let args: Vec<String> = args.iter().map(Expr::render).collect();
                format!("{}({})", func.render(), args.join(", "))
            }
            Self::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut out = left.render();
                for (op, rhs) in ops.iter().zip(comparators) {
                    out.push_str(&format!(" {} {}", op.symbol(), rhs.render()));
                }
                out
            }
            Self::BoolOp { op, values } => {
                let word = match op {
                    BoolOpKind::And => " and ",
                    BoolOpKind::Or => " or ",
                };
                let parts: Vec<String> = values.iter().map(Expr::render).collect();
                parts.join(word)
            }
            Self::Not(inner) => format!("not {}", inner.render()),
            Self::Binary { op, left, right } => {
                format!("{} {op} {}", left.render(), right.render())
            }
            Self::Subscript { value, index } => format!("{}[{}]", value.render(), index.render()),
            Self::Other(items) => {
                let parts: Vec<String> = items.iter().map(Expr::render).collect();
                format!("<{}>", parts.join(", "))
            }
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return u64::from_str_radix(oct, 8).ok().map(|v| v as f64);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return u64::from_str_radix(bin, 2).ok().map(|v| v as f64);
    }
    lower.trim_end_matches(&['j', 'l'][..]).parse::<f64>().ok()
}

/// Read-only traversal over the syntax representation. Override the hooks
/// you need and call the matching `walk_*` function to keep descending.
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_body<V: Visitor + ?Sized>(visitor: &mut V, body: &[Stmt]) {
    for stmt in body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Function(def) => {
            for d in &def.decorators {
                visitor.visit_expr(d);
            }
            walk_body(visitor, &def.body);
        }
        StmtKind::Class(def) => {
            for b in &def.bases {
                visitor.visit_expr(b);
            }
            walk_body(visitor, &def.body);
        }
        StmtKind::Branch(branch) => {
            visitor.visit_expr(&branch.test);
            if let Some(target) = &branch.target {
                visitor.visit_expr(target);
            }
            walk_body(visitor, &branch.body);
            walk_body(visitor, &branch.orelse);
        }
        StmtKind::Try(block) => {
            walk_body(visitor, &block.body);
            for h in &block.handlers {
                for m in &h.matches {
                    visitor.visit_expr(m);
                }
                walk_body(visitor, &h.body);
            }
            walk_body(visitor, &block.orelse);
            walk_body(visitor, &block.finalbody);
        }
        StmtKind::With(block) => {
            for item in &block.items {
                visitor.visit_expr(item);
            }
            walk_body(visitor, &block.body);
        }
        StmtKind::Assign(assign) => {
            for t in &assign.targets {
                visitor.visit_expr(t);
            }
            if let Some(v) = &assign.value {
                visitor.visit_expr(v);
            }
        }
        StmtKind::Expr(e) | StmtKind::Return(Some(e)) => visitor.visit_expr(e),
        StmtKind::Other(exprs) => {
            for e in exprs {
                visitor.visit_expr(e);
            }
        }
        StmtKind::Return(None) | StmtKind::Global(_) | StmtKind::Import(_) => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Attribute { value, .. } => visitor.visit_expr(value),
        Expr::Call { func, args } => {
            visitor.visit_expr(func);
            for a in args {
                visitor.visit_expr(a);
            }
        }
        Expr::Compare {
            left, comparators, ..
        } => {
            visitor.visit_expr(left);
            for c in comparators {
                visitor.visit_expr(c);
            }
        }
        Expr::BoolOp { values, .. } => {
            for v in values {
                visitor.visit_expr(v);
            }
        }
        Expr::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Not(inner) => visitor.visit_expr(inner),
        Expr::Subscript { value, index } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
        Expr::Other(items) => {
            for e in items {
                visitor.visit_expr(e);
            }
        }
        Expr::Name(_) | Expr::Str(_) | Expr::Num(_) | Expr::Const(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.into())
    }

    #[test]
    fn path_follows_attribute_chains() {
        let call = Expr::Call {
            func: Box::new(Expr::Attribute {
                value: Box::new(name("base64")),
                attr: "b64decode".into(),
            }),
            args: vec![Expr::Str("aGk=".into())],
        };
        assert_eq!(call.path().as_deref(), Some("base64.b64decode"));
        assert_eq!(call.render(), "base64.b64decode(\"aGk=\")");
    }

    #[test]
    fn conjuncts_flatten_nested_and() {
        let e = Expr::BoolOp {
            op: BoolOpKind::And,
            values: vec![
                Expr::BoolOp {
                    op: BoolOpKind::And,
                    values: vec![name("a"), name("b")],
                },
                Expr::Not(Box::new(name("c"))),
                Expr::BoolOp {
                    op: BoolOpKind::Or,
                    values: vec![name("d"), name("e")],
                },
            ],
        };
        let parts: Vec<String> = e.conjuncts().iter().map(|c| c.render()).collect();
        assert_eq!(parts, vec!["a", "b", "not c", "d or e"]);
    }

    #[test]
    fn numbers_parse_in_python_notations() {
        assert_eq!(Expr::Num("0xDEADBEEF".into()).as_number(), Some(3_735_928_559.0));
        assert_eq!(Expr::Num("1_700_000_000".into()).as_number(), Some(1.7e9));
        assert_eq!(Expr::Num("0.22".into()).as_number(), Some(0.22));
    }

    #[test]
    fn visitor_reaches_nested_calls() {
        struct Calls(usize);
        impl Visitor for Calls {
            fn visit_expr(&mut self, expr: &Expr) {
                if matches!(expr, Expr::Call { .. }) {
                    self.0 += 1;
                }
                walk_expr(self, expr);
            }
        }
        let inner = Expr::Call {
            func: Box::new(name("f")),
            args: vec![],
        };
        let outer = Expr::Call {
            func: Box::new(name("g")),
            args: vec![inner],
        };
        let stmt = Stmt {
            span: SourceSpan::default(),
            kind: StmtKind::Expr(outer),
        };
        let mut v = Calls(0);
        v.visit_stmt(&stmt);
        assert_eq!(v.0, 2);
    }
}
