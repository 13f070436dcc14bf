//! Owned syntax tree for submissions.
//!
//! The concrete tree-sitter tree is lowered into these tagged variants so the
//! analyzers can pattern-match on node kinds without holding the source
//! buffer or the parser alive.

use std::collections::VecDeque;

/// Source location of a node. Lines are 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    /// Breadth-first traversal over every node, source order within a level
    pub fn walk(&self) -> Walk<'_> {
        let mut queue = VecDeque::new();
        queue.extend(self.body.iter().map(NodeRef::Stmt));
        Walk { queue }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// `None` for a bare `except:`
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Dotted name as written, e.g. `os.path`
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
    },
    /// `if` followed by its `elif` branches, in order
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        /// Empty for `from m import *`
        names: Vec<Alias>,
    },
    /// `a = b = value` keeps every target
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    Pass,
    /// Statements without dedicated handling (raise, del, global, match, ...)
    Other {
        exprs: Vec<Expr>,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    /// Integers and floats; `display` keeps the literal as written
    Number { value: f64, display: String },
    Complex(String),
    Str(String),
    Bytes(String),
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// `None` for `**kwargs`
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Constant(Constant),
    /// f-string; only the interpolated expressions are kept
    JoinedStr(Vec<Expr>),
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        comparators: Vec<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict {
        keys: Vec<Expr>,
        values: Vec<Expr>,
    },
    /// List/set/dict comprehensions and generator expressions.
    /// Dict comprehensions carry the key in `element` and the value in `value`.
    Comprehension {
        element: Box<Expr>,
        value: Option<Box<Expr>>,
        generators: Vec<Generator>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        index: Vec<Expr>,
    },
    Starred(Box<Expr>),
    Await(Box<Expr>),
    Other(Vec<Expr>),
}

impl Expr {
    /// Dotted path for `a.b.c` style expressions, `None` for anything else
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name(name) => Some(name.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_name().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }
}

/// Borrowed handle over any node, used for uniform traversal
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Handler(&'a ExceptHandler),
}

impl<'a> NodeRef<'a> {
    pub fn span(&self) -> Span {
        match self {
            NodeRef::Stmt(stmt) => stmt.span,
            NodeRef::Expr(expr) => expr.span,
            NodeRef::Handler(handler) => handler.span,
        }
    }

    /// Direct children in source order
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            NodeRef::Stmt(stmt) => stmt_children(stmt, &mut out),
            NodeRef::Expr(expr) => expr_children(expr, &mut out),
            NodeRef::Handler(handler) => {
                if let Some(type_) = &handler.type_ {
                    out.push(NodeRef::Expr(type_));
                }
                push_stmts(&handler.body, &mut out);
            }
        }
        out
    }
}

fn push_stmts<'a>(stmts: &'a [Stmt], out: &mut Vec<NodeRef<'a>>) {
    out.extend(stmts.iter().map(NodeRef::Stmt));
}

fn push_exprs<'a>(exprs: &'a [Expr], out: &mut Vec<NodeRef<'a>>) {
    out.extend(exprs.iter().map(NodeRef::Expr));
}

fn push_params<'a>(params: &'a [Param], out: &mut Vec<NodeRef<'a>>) {
    out.extend(params.iter().filter_map(|p| p.default.as_ref()).map(NodeRef::Expr));
}

fn stmt_children<'a>(stmt: &'a Stmt, out: &mut Vec<NodeRef<'a>>) {
    match &stmt.kind {
        StmtKind::FunctionDef(def) => {
            push_exprs(&def.decorators, out);
            push_params(&def.params, out);
            push_stmts(&def.body, out);
        }
        StmtKind::ClassDef {
            bases,
            body,
            decorators,
            ..
        } => {
            push_exprs(decorators, out);
            push_exprs(bases, out);
            push_stmts(body, out);
        }
        StmtKind::If { branches, orelse } => {
            for (test, body) in branches {
                out.push(NodeRef::Expr(test));
                push_stmts(body, out);
            }
            push_stmts(orelse, out);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            out.push(NodeRef::Expr(target));
            out.push(NodeRef::Expr(iter));
            push_stmts(body, out);
            push_stmts(orelse, out);
        }
        StmtKind::While { test, body, orelse } => {
            out.push(NodeRef::Expr(test));
            push_stmts(body, out);
            push_stmts(orelse, out);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            push_stmts(body, out);
            out.extend(handlers.iter().map(NodeRef::Handler));
            push_stmts(orelse, out);
            push_stmts(finalbody, out);
        }
        StmtKind::With { items, body } => {
            for item in items {
                out.push(NodeRef::Expr(&item.context));
                if let Some(target) = &item.target {
                    out.push(NodeRef::Expr(target));
                }
            }
            push_stmts(body, out);
        }
        StmtKind::Assert { test, msg } => {
            out.push(NodeRef::Expr(test));
            if let Some(msg) = msg {
                out.push(NodeRef::Expr(msg));
            }
        }
        StmtKind::Import { .. } | StmtKind::ImportFrom { .. } | StmtKind::Pass => {}
        StmtKind::Assign { targets, value } => {
            push_exprs(targets, out);
            out.push(NodeRef::Expr(value));
        }
        StmtKind::AugAssign { target, value } => {
            out.push(NodeRef::Expr(target));
            out.push(NodeRef::Expr(value));
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            out.push(NodeRef::Expr(target));
            out.push(NodeRef::Expr(annotation));
            if let Some(value) = value {
                out.push(NodeRef::Expr(value));
            }
        }
        StmtKind::Expr(expr) => out.push(NodeRef::Expr(expr)),
        StmtKind::Return(value) => {
            if let Some(value) = value {
                out.push(NodeRef::Expr(value));
            }
        }
        StmtKind::Other { exprs, body } => {
            push_exprs(exprs, out);
            push_stmts(body, out);
        }
    }
}

fn expr_children<'a>(expr: &'a Expr, out: &mut Vec<NodeRef<'a>>) {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Constant(_) => {}
        ExprKind::Attribute { value, .. } => out.push(NodeRef::Expr(value)),
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            out.push(NodeRef::Expr(func));
            push_exprs(args, out);
            out.extend(keywords.iter().map(|k| NodeRef::Expr(&k.value)));
        }
        ExprKind::JoinedStr(values)
        | ExprKind::List(values)
        | ExprKind::Tuple(values)
        | ExprKind::Set(values)
        | ExprKind::Other(values) => push_exprs(values, out),
        ExprKind::BoolOp { values, .. } => push_exprs(values, out),
        ExprKind::UnaryOp { operand, .. } => out.push(NodeRef::Expr(operand)),
        ExprKind::BinOp { left, right, .. } => {
            out.push(NodeRef::Expr(left));
            out.push(NodeRef::Expr(right));
        }
        ExprKind::Compare { left, comparators } => {
            out.push(NodeRef::Expr(left));
            push_exprs(comparators, out);
        }
        ExprKind::Dict { keys, values } => {
            for (key, value) in keys.iter().zip(values) {
                out.push(NodeRef::Expr(key));
                out.push(NodeRef::Expr(value));
            }
        }
        ExprKind::Comprehension {
            element,
            value,
            generators,
        } => {
            out.push(NodeRef::Expr(element));
            if let Some(value) = value {
                out.push(NodeRef::Expr(value));
            }
            for generator in generators {
                out.push(NodeRef::Expr(&generator.target));
                out.push(NodeRef::Expr(&generator.iter));
                push_exprs(&generator.ifs, out);
            }
        }
        ExprKind::Lambda { params, body } => {
            push_params(params, out);
            out.push(NodeRef::Expr(body));
        }
        ExprKind::NamedExpr { target, value } => {
            out.push(NodeRef::Expr(target));
            out.push(NodeRef::Expr(value));
        }
        ExprKind::IfExp { test, body, orelse } => {
            out.push(NodeRef::Expr(body));
            out.push(NodeRef::Expr(test));
            out.push(NodeRef::Expr(orelse));
        }
        ExprKind::Subscript { value, index } => {
            out.push(NodeRef::Expr(value));
            push_exprs(index, out);
        }
        ExprKind::Starred(inner) | ExprKind::Await(inner) => out.push(NodeRef::Expr(inner)),
    }
}

/// Breadth-first iterator returned by [`Module::walk`] and [`walk_from`]
pub struct Walk<'a> {
    queue: VecDeque<NodeRef<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<NodeRef<'a>> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children());
        Some(node)
    }
}

/// Breadth-first traversal of `node` and everything below it
pub fn walk_from(node: NodeRef<'_>) -> Walk<'_> {
    let mut queue = VecDeque::new();
    queue.push_back(node);
    Walk { queue }
}
