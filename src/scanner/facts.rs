// src/scanner/facts.rs
//! Per-unit structural facts: complexity, call paths and module-level state
//! access.

use std::collections::{BTreeMap, BTreeSet};

use super::syntax::{walk_body, walk_expr, walk_stmt, BranchKind, Expr, Stmt, StmtKind, Visitor};
use crate::types::Complexity;

/// Method names that mutate their receiver in place.
const MUTATORS: &[&str] = &[
    "append",
    "update",
    "add",
    "pop",
    "extend",
    "insert",
    "setdefault",
    "clear",
    "remove",
    "discard",
    "popitem",
];

/// Module-wide name tables built once per scan.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    pub functions: BTreeSet<String>,
    /// Class name to its method names.
    pub classes: BTreeMap<String, BTreeSet<String>>,
    /// Module-level names that hold mutable data.
    pub state: BTreeSet<String>,
    /// Module-level names bound to a string literal.
    pub constants: BTreeMap<String, String>,
    pub imports: BTreeSet<String>,
}

impl ModuleIndex {
    #[must_use]
    pub fn build(module: &[Stmt]) -> Self {
        let mut index = Self::default();
        index.collect(module);
        let mut declared = GlobalDecls::default();
        walk_body(&mut declared, module);
        index.state.extend(declared.0);
        for name in index.functions.iter().chain(index.classes.keys()).chain(&index.imports) {
            index.state.remove(name);
        }
        index
    }

    fn collect(&mut self, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Function(def) => {
                    self.functions.insert(def.name.clone());
                }
                StmtKind::Class(def) => {
                    let methods = def
                        .body
                        .iter()
                        .filter_map(|s| match &s.kind {
                            StmtKind::Function(m) => Some(m.name.clone()),
                            _ => None,
                        })
                        .collect();
                    self.classes.insert(def.name.clone(), methods);
                }
                StmtKind::Import(names) => self.imports.extend(names.iter().cloned()),
                StmtKind::Assign(assign) => {
                    for target in &assign.targets {
                        bound_names(target, &mut self.state);
                        if let (Expr::Name(name), Some(Expr::Str(text))) = (target, &assign.value) {
                            self.constants.insert(name.clone(), text.clone());
                        }
                    }
                }
                StmtKind::Branch(branch) => {
                    if let Some(target) = &branch.target {
                        bound_names(target, &mut self.state);
                    }
                    self.collect(&branch.body);
                    self.collect(&branch.orelse);
                }
                StmtKind::Try(block) => {
                    self.collect(&block.body);
                    for handler in &block.handlers {
                        self.collect(&handler.body);
                    }
                    self.collect(&block.orelse);
                    self.collect(&block.finalbody);
                }
                StmtKind::With(block) => self.collect(&block.body),
                _ => {}
            }
        }
    }

    /// A string literal available to a unit under `name`, if any.
    #[must_use]
    pub fn constant(&self, name: &str) -> Option<&str> {
        self.constants.get(name).map(String::as_str)
    }
}

/// Names declared `global` anywhere; they are module state even when the
/// module never assigns them at top level.
#[derive(Default)]
struct GlobalDecls(BTreeSet<String>);

impl Visitor for GlobalDecls {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::Global(names) = &stmt.kind {
            self.0.extend(names.iter().cloned());
        }
        walk_stmt(self, stmt);
    }
}

fn bound_names(target: &Expr, out: &mut BTreeSet<String>) {
    match target {
        Expr::Name(name) => {
            out.insert(name.clone());
        }
        Expr::Other(items) => {
            for item in items {
                bound_names(item, out);
            }
        }
        _ => {}
    }
}

/// Where a unit lives, which decides how bare names resolve.
#[derive(Debug, Clone, Default)]
pub struct UnitScope {
    /// Enclosing class for methods.
    pub class: Option<String>,
    /// True for module-level conditionals, loops and statements.
    pub module_level: bool,
    pub locals: BTreeSet<String>,
    pub globals: BTreeSet<String>,
}

impl UnitScope {
    #[must_use]
    pub fn module() -> Self {
        Self {
            module_level: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn function(params: &[String], body: &[Stmt], class: Option<&str>) -> Self {
        let mut locals = LocalNames::default();
        walk_body(&mut locals, body);
        let mut names: BTreeSet<String> = params.iter().cloned().collect();
        names.extend(locals.bound);
        for g in &locals.globals {
            names.remove(g);
        }
        Self {
            class: class.map(str::to_string),
            module_level: false,
            locals: names,
            globals: locals.globals,
        }
    }
}

#[derive(Default)]
struct LocalNames {
    bound: BTreeSet<String>,
    globals: BTreeSet<String>,
}

impl Visitor for LocalNames {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Global(names) => self.globals.extend(names.iter().cloned()),
            StmtKind::Assign(assign) => {
                for target in &assign.targets {
                    bound_names(target, &mut self.bound);
                }
            }
            StmtKind::Branch(branch) => {
                if let Some(target) = &branch.target {
                    bound_names(target, &mut self.bound);
                }
            }
            StmtKind::Import(names) => self.bound.extend(names.iter().cloned()),
            StmtKind::Function(def) => {
                self.bound.insert(def.name.clone());
                return;
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }
}

/// Everything the scanner learns about one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFacts {
    pub complexity: Complexity,
    /// Raw dotted call paths (`self.tick`, `base64.b64decode`).
    pub calls: BTreeSet<String>,
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
}

#[must_use]
pub fn collect(body: &[Stmt], scope: &UnitScope, index: &ModuleIndex) -> UnitFacts {
    let mut collector = FactCollector {
        scope,
        index,
        facts: UnitFacts::default(),
        depth: 0,
    };
    walk_body(&mut collector, body);
    collector.facts
}

struct FactCollector<'a> {
    scope: &'a UnitScope,
    index: &'a ModuleIndex,
    facts: UnitFacts,
    depth: usize,
}

impl FactCollector<'_> {
    fn is_module_object(&self, name: &str) -> bool {
        let visible = self.scope.module_level
            || self.scope.globals.contains(name)
            || !self.scope.locals.contains(name);
        visible && self.index.state.contains(name)
    }

    /// The module-level (or `Class.attr`) object an access path lands on.
    fn object_of(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Name(name) if self.is_module_object(name) => Some(name.clone()),
            Expr::Attribute { value, attr } => match (value.as_ref(), &self.scope.class) {
                (Expr::Name(receiver), Some(class)) if receiver == "self" => {
                    Some(format!("{class}.{attr}"))
                }
                _ => self.object_of(value),
            },
            Expr::Subscript { value, .. } => self.object_of(value),
            _ => None,
        }
    }

    fn store(&mut self, target: &Expr) {
        match target {
            Expr::Name(name) => {
                let rebinds = self.scope.module_level || self.scope.globals.contains(name);
                if rebinds && self.index.state.contains(name) {
                    self.facts.writes.insert(name.clone());
                }
            }
            Expr::Attribute { value, .. } => {
                if let Some(object) = self.object_of(target) {
                    self.facts.writes.insert(object);
                }
                if !matches!(value.as_ref(), Expr::Name(_)) {
                    self.visit_expr(value);
                }
            }
            Expr::Subscript { value, index } => {
                if let Some(object) = self.object_of(value) {
                    self.facts.writes.insert(object);
                }
                self.visit_expr(index);
            }
            Expr::Other(items) => {
                for item in items {
                    self.store(item);
                }
            }
            _ => self.visit_expr(target),
        }
    }

    fn branch_depth(&mut self, kind: BranchKind, stmt: &Stmt) {
        self.facts.complexity.branches += 1;
        let nests = kind != BranchKind::Elif;
        if nests {
            self.depth += 1;
        }
        self.facts.complexity.max_depth = self.facts.complexity.max_depth.max(self.depth);
        walk_stmt(self, stmt);
        if nests {
            self.depth -= 1;
        }
    }
}

impl Visitor for FactCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Branch(branch) => self.branch_depth(branch.kind, stmt),
            StmtKind::Try(block) => {
                self.facts.complexity.branches += block.handlers.len();
                walk_stmt(self, stmt);
            }
            StmtKind::Assign(assign) => {
                for target in &assign.targets {
                    self.store(target);
                    if assign.op.is_some() {
                        if let Some(object) = self.object_of(target) {
                            self.facts.reads.insert(object);
                        }
                    }
                }
                if let Some(value) = &assign.value {
                    self.visit_expr(value);
                }
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BoolOp { values, .. } => {
                self.facts.complexity.boolean_ops += values.len().saturating_sub(1);
            }
            Expr::Not(_) => self.facts.complexity.boolean_ops += 1,
            Expr::Call { func, .. } => {
                if let Some(path) = func.path() {
                    self.facts.calls.insert(path);
                }
                if let Expr::Attribute { value, attr } = func.as_ref() {
                    if MUTATORS.contains(&attr.as_str()) {
                        if let Some(object) = self.object_of(value) {
                            self.facts.writes.insert(object);
                        }
                    }
                }
            }
            Expr::Name(name) if self.is_module_object(name) => {
                self.facts.reads.insert(name.clone());
            }
            Expr::Attribute { value, attr } => {
                if let (Expr::Name(receiver), Some(class)) = (value.as_ref(), &self.scope.class) {
                    if receiver == "self" {
                        let object = format!("{class}.{attr}");
                        // Method references are calls, not state.
                        let is_method = self
                            .index
                            .classes
                            .get(class)
                            .is_some_and(|methods| methods.contains(attr));
                        if !is_method {
                            self.facts.reads.insert(object);
                        }
                        return;
                    }
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}
