// src/scanner/units.rs
//! Picks the analyzable constructs out of a lowered module.

use std::collections::{BTreeMap, BTreeSet};

use super::facts::{ModuleIndex, UnitScope};
use super::syntax::{BranchKind, Stmt, StmtKind};
use crate::types::{SourceSpan, UnitKind};

/// A construct that may become a `CodeUnit`, still borrowing its syntax.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub id: String,
    pub kind: UnitKind,
    pub name: String,
    pub span: SourceSpan,
    pub body: &'a [Stmt],
    pub scope: UnitScope,
}

/// Walks top-level statements in source order. `try`/`with` wrappers are
/// transparent so guarded definitions are still found.
#[must_use]
pub fn extract(module: &[Stmt]) -> Vec<Candidate<'_>> {
    let mut out = Vec::new();
    collect(module, &mut out);
    out
}

fn collect<'a>(body: &'a [Stmt], out: &mut Vec<Candidate<'a>>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Function(def) => out.push(Candidate {
                id: def.name.clone(),
                kind: UnitKind::Function,
                name: def.name.clone(),
                span: stmt.span,
                body: &def.body,
                scope: UnitScope::function(&def.params, &def.body, None),
            }),
            StmtKind::Class(class) => {
                for member in &class.body {
                    if let StmtKind::Function(def) = &member.kind {
                        out.push(Candidate {
                            id: format!("{}.{}", class.name, def.name),
                            kind: UnitKind::Method,
                            name: def.name.clone(),
                            span: member.span,
                            body: &def.body,
                            scope: UnitScope::function(&def.params, &def.body, Some(&class.name)),
                        });
                    }
                }
            }
            StmtKind::Branch(branch) => {
                let (kind, keyword) = match branch.kind {
                    BranchKind::For | BranchKind::While => (UnitKind::Loop, branch.kind.keyword()),
                    BranchKind::If | BranchKind::Elif => (UnitKind::Conditional, "if"),
                };
                let id = format!("{keyword}@L{}", stmt.span.start_line);
                out.push(Candidate {
                    id: id.clone(),
                    kind,
                    name: id,
                    span: stmt.span,
                    body: std::slice::from_ref(stmt),
                    scope: UnitScope::module(),
                });
            }
            StmtKind::Try(block) => {
                collect(&block.body, out);
                for handler in &block.handlers {
                    collect(&handler.body, out);
                }
                collect(&block.orelse, out);
                collect(&block.finalbody, out);
            }
            StmtKind::With(block) => collect(&block.body, out),
            StmtKind::Expr(_) | StmtKind::Assign(_) => {
                let id = format!("stmt@L{}", stmt.span.start_line);
                out.push(Candidate {
                    id: id.clone(),
                    kind: UnitKind::Statement,
                    name: id,
                    span: stmt.span,
                    body: std::slice::from_ref(stmt),
                    scope: UnitScope::module(),
                });
            }
            _ => {}
        }
    }
}

/// Suffixes repeated ids with `#2`, `#3`, ... in source order.
pub fn disambiguate<'i>(ids: impl IntoIterator<Item = &'i mut String>) {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for id in ids {
        let count = seen.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            *id = format!("{id}#{count}");
        }
    }
}

/// Maps raw call paths to unit ids. Self-calls are dropped.
#[must_use]
pub fn resolve_calls(
    caller: &Candidate<'_>,
    paths: &BTreeSet<String>,
    index: &ModuleIndex,
    known: &BTreeSet<String>,
) -> BTreeSet<String> {
    let class = caller.scope.class.as_deref();
    paths
        .iter()
        .filter_map(|path| resolve(path, class, index))
        .filter(|id| id != &caller.id && known.contains(id))
        .collect()
}

fn resolve(path: &str, class: Option<&str>, index: &ModuleIndex) -> Option<String> {
    let parts: Vec<&str> = path.split('.').collect();
    match parts.as_slice() {
        [name] if index.functions.contains(*name) => Some((*name).to_string()),
        [name] if index.classes.contains_key(*name) => {
            let methods = index.classes.get(*name)?;
            methods
                .contains("__init__")
                .then(|| format!("{name}.__init__"))
        }
        ["self", method] => {
            let class = class?;
            let methods = index.classes.get(class)?;
            methods.contains(*method).then(|| format!("{class}.{method}"))
        }
        [owner, method] => {
            let methods = index.classes.get(*owner)?;
            methods.contains(*method).then(|| format!("{owner}.{method}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{blocks, lower};

    fn module(source: &str) -> Vec<Stmt> {
        blocks::split(source)
            .iter()
            .flat_map(|b| lower::parse_block(b).unwrap_or_default())
            .collect()
    }

    #[test]
    fn extracts_in_source_order() {
        let stmts = module(
            "import os\n\ndef a():\n    pass\n\nclass K:\n    def m(self):\n        pass\n\nif os.environ:\n    a()\n\nfor x in range(3):\n    a()\n",
        );
        let ids: Vec<String> = extract(&stmts).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "K.m", "if@L10", "for@L13"]);
    }

    #[test]
    fn try_wrappers_are_transparent() {
        let stmts = module("try:\n    def a():\n        pass\nexcept ImportError:\n    def b():\n        pass\n");
        let ids: Vec<String> = extract(&stmts).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_ids_get_suffixes() {
        let stmts = module("def a():\n    pass\n\ndef a():\n    pass\n\ndef a():\n    pass\n");
        let mut found = extract(&stmts);
        disambiguate(found.iter_mut().map(|c| &mut c.id));
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a#2", "a#3"]);
    }

    #[test]
    fn resolves_functions_methods_and_constructors() {
        let stmts = module(
            "def helper():\n    pass\n\nclass K:\n    def __init__(self):\n        pass\n    def m(self):\n        self.n()\n        helper()\n        K()\n        os.path.join()\n    def n(self):\n        pass\n",
        );
        let index = ModuleIndex::build(&stmts);
        let found = extract(&stmts);
        let known: BTreeSet<String> = found.iter().map(|c| c.id.clone()).collect();
        let method = found.iter().find(|c| c.id == "K.m").unwrap_or_else(|| panic!("no K.m"));
        let paths: BTreeSet<String> = ["self.n", "helper", "K", "os.path.join", "self.m"]
            .into_iter()
            .map(String::from)
            .collect();
        let calls: Vec<String> = resolve_calls(method, &paths, &index, &known).into_iter().collect();
        assert_eq!(calls, vec!["K.__init__", "K.n", "helper"]);
    }
}
