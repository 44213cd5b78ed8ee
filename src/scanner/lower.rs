// src/scanner/lower.rs
//! Parses one block with tree-sitter and lowers the Python CST into
//! [`Stmt`]/[`Expr`].

use std::cell::Cell;

use tree_sitter::{Node, Parser};

use super::blocks::Block;
use super::syntax::{
    Assign, BoolOpKind, Branch, BranchKind, ClassDef, CmpOp, Expr, FunctionDef, Handler, Stmt,
    StmtKind, TryBlock, WithBlock,
};
use crate::types::{ParseError, SourceSpan};

/// Deepest statement/expression nesting lowered before the block is
/// rejected. Later passes recurse once per level.
pub const MAX_NESTING: usize = 200;

/// Parses a block. A tree containing error or missing nodes is rejected as a
/// whole so that no partial unit leaks out of a broken region.
///
/// # Errors
/// Returns a [`ParseError`] spanning the block when the grammar rejects it.
pub fn parse_block(block: &Block<'_>) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new();
    if parser.set_language(tree_sitter_python::language()).is_err() {
        return Err(block_error(block, "python grammar unavailable".to_string()));
    }
    let Some(tree) = parser.parse(block.text, None) else {
        return Err(block_error(block, "parser produced no tree".to_string()));
    };

    let root = tree.root_node();
    if root.has_error() {
        let message = first_error(root).map_or_else(
            || "syntax error".to_string(),
            |node| describe_error(node, block),
        );
        return Err(block_error(block, message));
    }

    let lowerer = Lowerer {
        src: block.text.as_bytes(),
        line_offset: block.start_line,
        byte_offset: block.start_byte,
        depth: Cell::new(0),
        too_deep: Cell::new(false),
    };
    let body = lowerer.body(root);
    if lowerer.too_deep.get() {
        return Err(block_error(
            block,
            format!("nesting deeper than {MAX_NESTING} levels"),
        ));
    }
    Ok(body)
}

fn block_error(block: &Block<'_>, message: String) -> ParseError {
    ParseError {
        span: SourceSpan {
            start_line: block.start_line + 1,
            end_line: block.last_code_line + 1,
            start_byte: block.start_byte,
            end_byte: block.start_byte + block.text.len(),
        },
        message,
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        if current.is_error() || current.is_missing() {
            return Some(current);
        }
        let mut cursor = current.walk();
        let next = current
            .children(&mut cursor)
            .find(|c| c.has_error() || c.is_missing());
        current = next?;
    }
}

fn describe_error(node: Node<'_>, block: &Block<'_>) -> String {
    let pos = node.start_position();
    let line = pos.row + block.start_line + 1;
    let column = pos.column + 1;
    if node.is_missing() {
        format!("missing `{}` at line {line}, column {column}", node.kind())
    } else {
        format!("syntax error at line {line}, column {column}")
    }
}

struct Lowerer<'s> {
    src: &'s [u8],
    line_offset: usize,
    byte_offset: usize,
    depth: Cell<usize>,
    too_deep: Cell<bool>,
}

impl Lowerer<'_> {
    /// Runs `lower` one level deeper, or flags the block once the cap is hit.
    fn nested<T>(&self, lower: impl FnOnce() -> T) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            self.too_deep.set(true);
            return None;
        }
        self.depth.set(depth + 1);
        let lowered = lower();
        self.depth.set(depth);
        Some(lowered)
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn span(&self, node: Node<'_>) -> SourceSpan {
        SourceSpan {
            start_line: node.start_position().row + self.line_offset + 1,
            end_line: node.end_position().row + self.line_offset + 1,
            start_byte: node.start_byte() + self.byte_offset,
            end_byte: node.end_byte() + self.byte_offset,
        }
    }

    /// Lowers the statements directly under `node` (a module or block).
    fn body(&self, node: Node<'_>) -> Vec<Stmt> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .filter_map(|c| self.stmt(c))
            .collect()
    }

    fn field_body(&self, node: Node<'_>, field: &str) -> Vec<Stmt> {
        node.child_by_field_name(field)
            .map(|b| self.body(b))
            .unwrap_or_default()
    }

    fn stmt(&self, node: Node<'_>) -> Option<Stmt> {
        self.nested(|| self.lower_stmt(node)).flatten()
    }

    fn lower_stmt(&self, node: Node<'_>) -> Option<Stmt> {
        let kind = match node.kind() {
            "function_definition" => StmtKind::Function(self.function(node, Vec::new())?),
            "class_definition" => StmtKind::Class(self.class(node)?),
            "decorated_definition" => return self.decorated(node),
            "if_statement" => StmtKind::Branch(self.if_chain(node, BranchKind::If)),
            "while_statement" => StmtKind::Branch(Branch {
                kind: BranchKind::While,
                test: self.field_expr(node, "condition"),
                target: None,
                body: self.field_body(node, "body"),
                orelse: self.else_body(node),
            }),
            "for_statement" => StmtKind::Branch(Branch {
                kind: BranchKind::For,
                test: self.field_expr(node, "right"),
                target: node.child_by_field_name("left").map(|l| self.expr(l)),
                body: self.field_body(node, "body"),
                orelse: self.else_body(node),
            }),
            "try_statement" => StmtKind::Try(self.try_block(node)),
            "with_statement" => StmtKind::With(self.with_block(node)),
            "global_statement" | "nonlocal_statement" => StmtKind::Global(self.identifiers(node)),
            "return_statement" => StmtKind::Return(self.named(node).first().map(|e| self.expr(*e))),
            "import_statement" | "import_from_statement" => StmtKind::Import(self.imports(node)),
            "expression_statement" => return Some(self.expression_statement(node)),
            "block" => StmtKind::Other(Vec::new()),
            _ => StmtKind::Other(
                self.named(node)
                    .into_iter()
                    .filter(|c| is_expression(c.kind()))
                    .map(|c| self.expr(c))
                    .collect(),
            ),
        };
        Some(Stmt {
            span: self.span(node),
            kind,
        })
    }

    fn named<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect()
    }

    fn identifiers(&self, node: Node<'_>) -> Vec<String> {
        self.named(node)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .map(|c| self.text(c))
            .collect()
    }

    fn decorated(&self, node: Node<'_>) -> Option<Stmt> {
        let decorators: Vec<Expr> = self
            .named(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .filter_map(|d| self.named(d).first().map(|e| self.expr(*e)))
            .collect();
        let def = node.child_by_field_name("definition")?;
        let kind = match def.kind() {
            "function_definition" => StmtKind::Function(self.function(def, decorators)?),
            "class_definition" => StmtKind::Class(self.class(def)?),
            _ => return self.stmt(def),
        };
        Some(Stmt {
            span: self.span(node),
            kind,
        })
    }

    fn function(&self, node: Node<'_>, decorators: Vec<Expr>) -> Option<FunctionDef> {
        let name = self.text(node.child_by_field_name("name")?);
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.params(p))
            .unwrap_or_default();
        Some(FunctionDef {
            name,
            params,
            decorators,
            body: self.field_body(node, "body"),
        })
    }

    fn params(&self, node: Node<'_>) -> Vec<String> {
        self.named(node)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "identifier" => Some(self.text(p)),
                "default_parameter" | "typed_default_parameter" => {
                    p.child_by_field_name("name").map(|n| self.text(n))
                }
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => self
                    .named(p)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .map(|c| self.text(c)),
                _ => None,
            })
            .collect()
    }

    fn class(&self, node: Node<'_>) -> Option<ClassDef> {
        let name = self.text(node.child_by_field_name("name")?);
        let bases = node
            .child_by_field_name("superclasses")
            .map(|s| self.arguments(s))
            .unwrap_or_default();
        Some(ClassDef {
            name,
            bases,
            body: self.field_body(node, "body"),
        })
    }

    fn if_chain(&self, node: Node<'_>, kind: BranchKind) -> Branch {
        let mut cursor = node.walk();
        let alternatives: Vec<Node<'_>> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();
        Branch {
            kind,
            test: self.field_expr(node, "condition"),
            target: None,
            body: self.field_body(node, "consequence"),
            orelse: self.alternatives(&alternatives),
        }
    }

    /// Folds `elif`/`else` clauses into nested branches, innermost last.
    fn alternatives(&self, clauses: &[Node<'_>]) -> Vec<Stmt> {
        let Some((first, rest)) = clauses.split_first() else {
            return Vec::new();
        };
        match first.kind() {
            "elif_clause" => {
                let branch = Branch {
                    kind: BranchKind::Elif,
                    test: self.field_expr(*first, "condition"),
                    target: None,
                    body: self.field_body(*first, "consequence"),
                    orelse: self
                        .nested(|| self.alternatives(rest))
                        .unwrap_or_default(),
                };
                vec![Stmt {
                    span: self.span(*first),
                    kind: StmtKind::Branch(branch),
                }]
            }
            "else_clause" => self.field_body(*first, "body"),
            _ => self.alternatives(rest),
        }
    }

    fn else_body(&self, node: Node<'_>) -> Vec<Stmt> {
        node.child_by_field_name("alternative")
            .map(|alt| self.field_body(alt, "body"))
            .unwrap_or_default()
    }

    fn try_block(&self, node: Node<'_>) -> TryBlock {
        let mut block = TryBlock {
            body: self.field_body(node, "body"),
            handlers: Vec::new(),
            orelse: Vec::new(),
            finalbody: Vec::new(),
        };
        for clause in self.named(node) {
            match clause.kind() {
                "except_clause" | "except_group_clause" => {
                    let parts = self.named(clause);
                    let body = parts
                        .iter()
                        .find(|c| c.kind() == "block")
                        .map(|b| self.body(*b))
                        .unwrap_or_default();
                    let matches = parts
                        .iter()
                        .filter(|c| is_expression(c.kind()))
                        .map(|c| self.expr(*c))
                        .collect();
                    block.handlers.push(Handler {
                        span: self.span(clause),
                        matches,
                        body,
                    });
                }
                "else_clause" => block.orelse = self.field_body(clause, "body"),
                "finally_clause" => {
                    block.finalbody = self
                        .named(clause)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                        .map(|b| self.body(b))
                        .unwrap_or_default();
                }
                _ => {}
            }
        }
        block
    }

    fn with_block(&self, node: Node<'_>) -> WithBlock {
        let mut items = Vec::new();
        for clause in self.named(node) {
            if clause.kind() != "with_clause" {
                continue;
            }
            for item in self.named(clause) {
                if let Some(value) = item.child_by_field_name("value") {
                    items.push(self.expr(value));
                }
            }
        }
        WithBlock {
            items,
            body: self.field_body(node, "body"),
        }
    }

    fn imports(&self, node: Node<'_>) -> Vec<String> {
        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        names
            .into_iter()
            .map(|n| match n.kind() {
                "aliased_import" => n
                    .child_by_field_name("alias")
                    .map_or_else(|| self.text(n), |a| self.text(a)),
                _ => {
                    let full = self.text(n);
                    full.split('.').next().unwrap_or_default().to_string()
                }
            })
            .collect()
    }

    fn expression_statement(&self, node: Node<'_>) -> Stmt {
        let span = self.span(node);
        let parts = self.named(node);
        let kind = match parts.as_slice() {
            [one] if one.kind() == "assignment" => StmtKind::Assign(self.assignment(*one)),
            [one] if one.kind() == "augmented_assignment" => StmtKind::Assign(Assign {
                targets: one
                    .child_by_field_name("left")
                    .map(|l| vec![self.expr(l)])
                    .unwrap_or_default(),
                value: one.child_by_field_name("right").map(|r| self.expr(r)),
                op: one.child_by_field_name("operator").map(|o| self.text(o)),
            }),
            [one] => StmtKind::Expr(self.expr(*one)),
            many => StmtKind::Other(many.iter().map(|e| self.expr(*e)).collect()),
        };
        Stmt { span, kind }
    }

    /// `a = b = value` nests assignments in the `right` field.
    fn assignment(&self, node: Node<'_>) -> Assign {
        let mut targets = Vec::new();
        let mut value = None;
        let mut current = Some(node);
        while let Some(n) = current.take() {
            if let Some(left) = n.child_by_field_name("left") {
                targets.push(self.expr(left));
            }
            match n.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = Some(right),
                Some(right) => value = Some(self.expr(right)),
                None => {}
            }
        }
        Assign {
            targets,
            value,
            op: None,
        }
    }

    fn field_expr(&self, node: Node<'_>, field: &str) -> Expr {
        node.child_by_field_name(field)
            .map_or_else(|| Expr::Other(Vec::new()), |n| self.expr(n))
    }

    fn arguments(&self, node: Node<'_>) -> Vec<Expr> {
        self.named(node)
            .into_iter()
            .map(|arg| match arg.kind() {
                "keyword_argument" => self.field_expr(arg, "value"),
                _ => self.expr(arg),
            })
            .collect()
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        self.nested(|| self.lower_expr(node))
            .unwrap_or_else(|| Expr::Other(Vec::new()))
    }

    fn lower_expr(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "identifier" => Expr::Name(self.text(node)),
            "attribute" => Expr::Attribute {
                value: Box::new(self.field_expr(node, "object")),
                attr: node
                    .child_by_field_name("attribute")
                    .map(|a| self.text(a))
                    .unwrap_or_default(),
            },
            "call" => Expr::Call {
                func: Box::new(self.field_expr(node, "function")),
                args: node
                    .child_by_field_name("arguments")
                    .map(|a| match a.kind() {
                        "argument_list" => self.arguments(a),
                        _ => vec![self.expr(a)],
                    })
                    .unwrap_or_default(),
            },
            "string" => Expr::Str(string_contents(&self.text(node))),
            "concatenated_string" => Expr::Str(
                self.named(node)
                    .into_iter()
                    .map(|s| string_contents(&self.text(s)))
                    .collect(),
            ),
            "integer" | "float" => Expr::Num(self.text(node)),
            "true" | "false" | "none" => Expr::Const(self.text(node)),
            "comparison_operator" => self.comparison(node),
            "boolean_operator" => self.bool_chain(node),
            "not_operator" => Expr::Not(Box::new(self.field_expr(node, "argument"))),
            "binary_operator" => Expr::Binary {
                op: node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o))
                    .unwrap_or_default(),
                left: Box::new(self.field_expr(node, "left")),
                right: Box::new(self.field_expr(node, "right")),
            },
            "unary_operator" => {
                let argument = self.field_expr(node, "argument");
                match (&argument, node.child_by_field_name("operator").map(|o| o.kind())) {
                    (Expr::Num(n), Some("-")) => Expr::Num(format!("-{n}")),
                    _ => Expr::Other(vec![argument]),
                }
            }
            "subscript" => Expr::Subscript {
                value: Box::new(self.field_expr(node, "value")),
                index: Box::new(self.field_expr(node, "subscript")),
            },
            "parenthesized_expression" => match self.named(node).first() {
                Some(inner) => self.expr(*inner),
                None => Expr::Other(Vec::new()),
            },
            "keyword_argument" => self.field_expr(node, "value"),
            _ => Expr::Other(self.named(node).into_iter().map(|c| self.expr(c)).collect()),
        }
    }

    /// Collects a run of the same boolean operator into one n-ary node
    /// without recursing down the left-nested CST spine.
    fn bool_chain(&self, node: Node<'_>) -> Expr {
        let op = bool_op_kind(node);
        let mut values = Vec::new();
        let mut pending = vec![node];
        while let Some(n) = pending.pop() {
            if n.kind() == "boolean_operator" && bool_op_kind(n) == op {
                pending.extend(n.child_by_field_name("right"));
                pending.extend(n.child_by_field_name("left"));
            } else {
                values.push(self.expr(n));
            }
        }
        Expr::BoolOp { op, values }
    }

    fn comparison(&self, node: Node<'_>) -> Expr {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            if child.is_named() {
                operands.push(self.expr(child));
            } else if let Some(op) = CmpOp::from_token(child.kind()) {
                ops.push(op);
            }
        }
        if operands.is_empty() {
            return Expr::Other(Vec::new());
        }
        let left = operands.remove(0);
        Expr::Compare {
            left: Box::new(left),
            ops,
            comparators: operands,
        }
    }
}

fn bool_op_kind(node: Node<'_>) -> BoolOpKind {
    match node.child_by_field_name("operator").map(|o| o.kind()) {
        Some("or") => BoolOpKind::Or,
        _ => BoolOpKind::And,
    }
}

fn is_expression(kind: &str) -> bool {
    !matches!(
        kind,
        "block" | "comment" | "else_clause" | "finally_clause" | "except_clause" | "decorator"
    )
}

/// Strips an optional prefix (`b`, `r`, `f`, `rb`...) and the quotes.
fn string_contents(raw: &str) -> String {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    body.to_string()
}
