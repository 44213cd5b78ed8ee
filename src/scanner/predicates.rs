// src/scanner/predicates.rs
//! The closed set of matchers a rule table can name.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::facts::{ModuleIndex, UnitFacts};
use super::syntax::{walk_body, walk_expr, walk_stmt, BranchKind, CmpOp, Expr, Stmt, StmtKind, Visitor};

static PREDICATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-z][a-z-]*)\s*(?:\(\s*(\d+)\s*\))?\s*$")
        .unwrap_or_else(|_| panic!("Invalid Regex"))
});

const TEMPORAL_WORDS: &[&str] = &[
    "time",
    "date",
    "datetime",
    "now",
    "today",
    "utcnow",
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "timestamp",
    "weekday",
    "epoch",
    "clock",
    "strftime",
    "isoformat",
];

/// Anything at or past this looks like a Unix timestamp.
const EPOCH_FLOOR: f64 = 1e9;

const RANDOM_CALLS: &[&str] = &[
    "random",
    "randint",
    "uniform",
    "randrange",
    "choice",
    "getrandbits",
    "randbelow",
    "rand",
    "random_sample",
];

const DEBUG_CALLS: &[&str] = &[
    "gettrace",
    "settrace",
    "getprofile",
    "setprofile",
    "IsDebuggerPresent",
    "CheckRemoteDebuggerPresent",
    "ptrace",
    "set_trace",
];

const DEBUG_MODULES: &[&str] = &["pdb", "bdb", "pydevd", "debugpy"];

const DECODERS: &[&str] = &[
    "b64decode",
    "b32decode",
    "b16decode",
    "b85decode",
    "a85decode",
    "urlsafe_b64decode",
    "standard_b64decode",
    "decodebytes",
    "unhexlify",
    "a2b_base64",
    "a2b_hex",
    "fromhex",
    "decompress",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    TemporalEquality,
    RandomThreshold,
    DebuggerProbe,
    EncodedLiteral,
    FlagChain { min_flags: usize },
    SharedMutableState,
}

impl Predicate {
    /// Whether the predicate only makes sense across units.
    #[must_use]
    pub fn is_cross_unit(self) -> bool {
        matches!(self, Self::SharedMutableState)
    }

    #[must_use]
    pub fn matches(self, unit: &UnitView<'_>) -> bool {
        match self {
            Self::TemporalEquality => branch_tests(unit.body).iter().any(|t| temporal_compare(t)),
            Self::RandomThreshold => branch_tests(unit.body).iter().any(|t| random_compare(t)),
            Self::DebuggerProbe => {
                let mut probe = DebuggerProbe(false);
                walk_body(&mut probe, unit.body);
                probe.0
            }
            Self::EncodedLiteral => {
                let mut finder = EncodedLiteral {
                    index: unit.index,
                    found: false,
                };
                walk_body(&mut finder, unit.body);
                finder.found
            }
            Self::FlagChain { min_flags } => {
                let mut chain = FlagChain {
                    min_flags,
                    gates: Vec::new(),
                    found: false,
                };
                walk_body(&mut chain, unit.body);
                chain.found
            }
            Self::SharedMutableState => unit.shares_state,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemporalEquality => f.write_str("temporal-equality"),
            Self::RandomThreshold => f.write_str("random-threshold"),
            Self::DebuggerProbe => f.write_str("debugger-probe"),
            Self::EncodedLiteral => f.write_str("encoded-literal"),
            Self::FlagChain { min_flags } => write!(f, "flag-chain({min_flags})"),
            Self::SharedMutableState => f.write_str("shared-mutable-state"),
        }
    }
}

impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = PREDICATE_RE
            .captures(s)
            .ok_or_else(|| format!("malformed predicate '{s}'"))?;
        let name = caps.get(1).map_or("", |m| m.as_str());
        let arg = caps
            .get(2)
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| format!("bad argument in '{s}': {e}"))?;
        let predicate = match (name, arg) {
            ("temporal-equality", None) => Self::TemporalEquality,
            ("random-threshold", None) => Self::RandomThreshold,
            ("debugger-probe", None) => Self::DebuggerProbe,
            ("encoded-literal", None) => Self::EncodedLiteral,
            ("shared-mutable-state", None) => Self::SharedMutableState,
            ("flag-chain", Some(0)) => return Err("flag-chain needs at least one flag".into()),
            ("flag-chain", Some(n)) => Self::FlagChain { min_flags: n },
            ("flag-chain", None) => Self::FlagChain { min_flags: 3 },
            (
                known @ ("temporal-equality" | "random-threshold" | "debugger-probe"
                | "encoded-literal" | "shared-mutable-state"),
                Some(_),
            ) => return Err(format!("predicate '{known}' takes no argument")),
            _ => return Err(format!("unknown predicate '{s}'")),
        };
        Ok(predicate)
    }
}

/// What a predicate sees of a unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitView<'a> {
    pub body: &'a [Stmt],
    pub index: &'a ModuleIndex,
    pub facts: &'a UnitFacts,
    /// Set when another unit writes what this one touches, or touches what
    /// this one writes.
    pub shares_state: bool,
}

/// Tests of `if`/`elif`/`while` headers, in source order.
fn branch_tests(body: &[Stmt]) -> Vec<&Expr> {
    fn collect<'a>(body: &'a [Stmt], out: &mut Vec<&'a Expr>) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Branch(b) => {
                    if b.kind != BranchKind::For {
                        out.push(&b.test);
                    }
                    collect(&b.body, out);
                    collect(&b.orelse, out);
                }
                StmtKind::Function(def) => collect(&def.body, out),
                StmtKind::Class(def) => collect(&def.body, out),
                StmtKind::Try(t) => {
                    collect(&t.body, out);
                    for h in &t.handlers {
                        collect(&h.body, out);
                    }
                    collect(&t.orelse, out);
                    collect(&t.finalbody, out);
                }
                StmtKind::With(w) => collect(&w.body, out),
                _ => {}
            }
        }
    }
    let mut out = Vec::new();
    collect(body, &mut out);
    out
}

/// Every comparison inside an expression, including nested ones.
fn comparisons(expr: &Expr) -> Vec<(&Expr, CmpOp, &Expr)> {
    struct Pairs<'a>(Vec<(&'a Expr, CmpOp, &'a Expr)>);
    fn visit<'a>(expr: &'a Expr, out: &mut Pairs<'a>) {
        match expr {
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut lhs: &Expr = left;
                for (op, rhs) in ops.iter().zip(comparators) {
                    out.0.push((lhs, *op, rhs));
                    lhs = rhs;
                }
                visit(left, out);
                for c in comparators {
                    visit(c, out);
                }
            }
            Expr::BoolOp { values, .. } => {
                for v in values {
                    visit(v, out);
                }
            }
            Expr::Binary { left, right, .. } => {
                visit(left, out);
                visit(right, out);
            }
            Expr::Not(inner) => visit(inner, out),
            Expr::Call { func, args } => {
                visit(func, out);
                for a in args {
                    visit(a, out);
                }
            }
            Expr::Other(items) => {
                for i in items {
                    visit(i, out);
                }
            }
            _ => {}
        }
    }
    let mut pairs = Pairs(Vec::new());
    visit(expr, &mut pairs);
    pairs.0
}

fn temporal_compare(test: &Expr) -> bool {
    comparisons(test).into_iter().any(|(lhs, op, rhs)| {
        [(lhs, rhs), (rhs, lhs)].into_iter().any(|(probe, other)| {
            if !is_temporal(probe) {
                return false;
            }
            match op {
                CmpOp::Eq | CmpOp::Is => is_literalish(other),
                o if o.is_ordering() => other.as_number().is_some_and(|n| n >= EPOCH_FLOOR),
                _ => false,
            }
        })
    })
}

fn random_compare(test: &Expr) -> bool {
    comparisons(test).into_iter().any(|(lhs, _, rhs)| {
        (is_random_call(lhs) && rhs.as_number().is_some())
            || (is_random_call(rhs) && lhs.as_number().is_some())
    })
}

fn is_literalish(expr: &Expr) -> bool {
    match expr {
        Expr::Call { args, .. } => !args.is_empty() && args.iter().all(Expr::is_literal),
        other => other.is_literal(),
    }
}

/// True when an identifier in the operand names a clock or calendar value.
fn is_temporal(expr: &Expr) -> bool {
    let mut idents = Identifiers(Vec::new());
    idents.visit_expr(expr);
    idents
        .0
        .iter()
        .flat_map(|ident| split_words(ident))
        .any(|word| TEMPORAL_WORDS.contains(&word.as_str()))
}

struct Identifiers(Vec<String>);

impl Visitor for Identifiers {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name(n) => self.0.push(n.clone()),
            Expr::Attribute { attr, .. } => self.0.push(attr.clone()),
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Splits `currentDate` / `current_date` / `EPOCH2` into lowercase words.
fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut prev_lower = false;
    for c in ident.chars() {
        if !c.is_ascii_alphabetic() {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
        prev_lower = c.is_ascii_lowercase();
        word.push(c.to_ascii_lowercase());
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

fn segments(path: &str) -> (&str, &str) {
    let first = path.split('.').next().unwrap_or(path);
    let last = path.rsplit('.').next().unwrap_or(path);
    (first, last)
}

fn is_random_call(expr: &Expr) -> bool {
    let Expr::Call { func, .. } = expr else {
        return false;
    };
    let Some(path) = func.path() else {
        return false;
    };
    let (first, last) = segments(&path);
    RANDOM_CALLS.contains(&last) || (path.contains('.') && matches!(first, "random" | "secrets"))
}

struct DebuggerProbe(bool);

impl Visitor for DebuggerProbe {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call { func, .. } => {
                if let Some(path) = func.path() {
                    let (first, last) = segments(&path);
                    if DEBUG_CALLS.contains(&last) || DEBUG_MODULES.contains(&first) {
                        self.0 = true;
                    }
                }
            }
            Expr::Str(text) if text.contains("TracerPid") => self.0 = true,
            _ => {}
        }
        walk_expr(self, expr);
    }
}

struct EncodedLiteral<'a> {
    index: &'a ModuleIndex,
    found: bool,
}

impl EncodedLiteral<'_> {
    fn is_payload(&self, arg: &Expr) -> bool {
        match arg {
            Expr::Str(_) => true,
            Expr::Name(name) => self.index.constant(name).is_some(),
            _ => false,
        }
    }
}

impl Visitor for EncodedLiteral<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Call { func, args } = expr {
            let decodes = match func.path() {
                Some(path) => {
                    let (first, last) = segments(&path);
                    DECODERS.contains(&last)
                        || (first == "codecs" && last == "decode")
                        || (matches!(first, "marshal" | "pickle") && last == "loads")
                }
                None => false,
            };
            if decodes && args.iter().any(|a| self.is_payload(a)) {
                self.found = true;
            }
            if let Expr::Attribute { value, attr } = func.as_ref() {
                if attr == "decode" && matches!(value.as_ref(), Expr::Str(_)) {
                    self.found = true;
                }
            }
        }
        walk_expr(self, expr);
    }
}

/// Tracks the conjuncts guarding the current statement.
struct FlagChain {
    min_flags: usize,
    gates: Vec<String>,
    found: bool,
}

impl FlagChain {
    fn distinct_flags(&self) -> usize {
        self.gates.iter().collect::<BTreeSet<_>>().len()
    }
}

impl Visitor for FlagChain {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Branch(branch) if matches!(branch.kind, BranchKind::If | BranchKind::Elif) => {
                let flags: Vec<String> = branch.test.conjuncts().iter().map(|c| c.render()).collect();
                let pushed = flags.len();
                self.gates.extend(flags);
                for s in &branch.body {
                    self.visit_stmt(s);
                }
                self.gates.truncate(self.gates.len() - pushed);
                for s in &branch.orelse {
                    self.visit_stmt(s);
                }
            }
            StmtKind::Expr(Expr::Call { .. }) => {
                if self.distinct_flags() >= self.min_flags {
                    self.found = true;
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }
}
