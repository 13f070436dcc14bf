// Lowering from the tree-sitter concrete tree to the owned AST
use super::ast::*;
use tree_sitter::Node;

pub(super) struct Lowerer<'s> {
    source: &'s [u8],
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra() && child.kind() != "comment")
        .collect()
}

fn first_child_kind(node: Node<'_>) -> Option<&'static str> {
    let mut cursor = node.walk();
    let first = node.children(&mut cursor).next();
    first.map(|child| child.kind())
}

fn span_of(node: Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    // A node that swallowed its trailing newline ends at column 0 of the next row
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    Span {
        start_line: start.row + 1,
        end_line,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

fn strip_quotes(body: &str) -> String {
    for quote in ["\"\"\"", "'''"] {
        if body.len() >= 6 && body.starts_with(quote) && body.ends_with(quote) {
            return body[3..body.len() - 3].to_string();
        }
    }
    if body.len() >= 2 {
        return body[1..body.len() - 1].to_string();
    }
    body.to_string()
}

pub(super) fn number_constant(text: &str) -> Constant {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.ends_with('j') {
        return Constant::Complex(text.to_string());
    }

    let digits = cleaned.trim_end_matches('l');
    let radix = match digits.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    let value = match radix {
        Some(radix) => u128::from_str_radix(&digits[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::INFINITY),
        None => digits.parse::<f64>().unwrap_or(f64::NAN),
    };

    Constant::Number {
        value,
        display: text.to_string(),
    }
}

impl<'s> Lowerer<'s> {
    pub(super) fn new(source: &'s [u8]) -> Self {
        Self { source }
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn empty(&self, node: Node<'_>) -> Expr {
        Expr {
            kind: ExprKind::Other(Vec::new()),
            span: span_of(node),
        }
    }

    pub(super) fn module(&self, root: Node<'_>) -> Module {
        Module {
            body: self.block(root),
        }
    }

    /// Statements directly under a module or block node
    fn block(&self, node: Node<'_>) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .map(|child| self.stmt(child))
            .collect()
    }

    /// Body of a compound statement or clause
    fn suite(&self, node: Node<'_>, field: &str) -> Vec<Stmt> {
        let block = node.child_by_field_name(field).or_else(|| {
            named_children(node)
                .into_iter()
                .rev()
                .find(|child| child.kind() == "block")
        });
        block.map(|b| self.block(b)).unwrap_or_default()
    }

    fn field_expr(&self, node: Node<'_>, field: &str) -> Expr {
        match node.child_by_field_name(field) {
            Some(child) => self.expr(child),
            None => self.empty(node),
        }
    }

    fn first_named_expr(&self, node: Node<'_>) -> Expr {
        match named_children(node).into_iter().next() {
            Some(child) => self.expr(child),
            None => self.empty(node),
        }
    }

    fn stmt(&self, node: Node<'_>) -> Stmt {
        let kind = match node.kind() {
            "expression_statement" => self.expression_statement(node),
            "function_definition" => StmtKind::FunctionDef(self.function(node)),
            "class_definition" => self.class(node),
            "decorated_definition" => return self.decorated(node),
            "if_statement" => self.if_statement(node),
            "for_statement" => StmtKind::For {
                target: self.field_expr(node, "left"),
                iter: self.field_expr(node, "right"),
                body: self.suite(node, "body"),
                orelse: self.else_body(node),
                is_async: first_child_kind(node) == Some("async"),
            },
            "while_statement" => StmtKind::While {
                test: self.field_expr(node, "condition"),
                body: self.suite(node, "body"),
                orelse: self.else_body(node),
            },
            "try_statement" => self.try_statement(node),
            "with_statement" => self.with_statement(node),
            "assert_statement" => {
                let mut parts = named_children(node).into_iter().map(|c| self.expr(c));
                StmtKind::Assert {
                    test: parts.next().unwrap_or_else(|| self.empty(node)),
                    msg: parts.next(),
                }
            }
            "import_statement" => StmtKind::Import {
                names: self.import_names(node, false),
            },
            "import_from_statement" => StmtKind::ImportFrom {
                module: node.child_by_field_name("module_name").map(|m| self.text(m)),
                names: self.import_names(node, true),
            },
            "future_import_statement" => StmtKind::ImportFrom {
                module: Some("__future__".to_string()),
                names: self.import_names(node, true),
            },
            "return_statement" => {
                StmtKind::Return(named_children(node).into_iter().next().map(|c| self.expr(c)))
            }
            "pass_statement" => StmtKind::Pass,
            "print_statement" => StmtKind::Expr(self.print_call(node)),
            _ => self.other_statement(node),
        };
        Stmt {
            kind,
            span: span_of(node),
        }
    }

    fn expression_statement(&self, node: Node<'_>) -> StmtKind {
        let children = named_children(node);
        if children.len() == 1 {
            let single = children[0];
            return match single.kind() {
                "assignment" => self.assignment(single),
                "augmented_assignment" => StmtKind::AugAssign {
                    target: self.field_expr(single, "left"),
                    value: self.field_expr(single, "right"),
                },
                _ => StmtKind::Expr(self.expr(single)),
            };
        }
        // `a, b` as a bare statement
        StmtKind::Expr(Expr {
            kind: ExprKind::Tuple(children.into_iter().map(|c| self.expr(c)).collect()),
            span: span_of(node),
        })
    }

    fn assignment(&self, node: Node<'_>) -> StmtKind {
        let target = self.field_expr(node, "left");
        if let Some(annotation) = node.child_by_field_name("type") {
            return StmtKind::AnnAssign {
                target,
                annotation: self.expr(annotation),
                value: node.child_by_field_name("right").map(|r| self.expr(r)),
            };
        }

        let mut targets = vec![target];
        let mut value = node.child_by_field_name("right");
        while let Some(inner) = value {
            if inner.kind() != "assignment" || inner.child_by_field_name("type").is_some() {
                break;
            }
            targets.push(self.field_expr(inner, "left"));
            value = inner.child_by_field_name("right");
        }

        StmtKind::Assign {
            targets,
            value: match value {
                Some(v) => self.expr(v),
                None => self.empty(node),
            },
        }
    }

    fn params(&self, node: Node<'_>) -> Vec<Param> {
        let mut params = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "identifier" => params.push(Param {
                    name: self.text(child),
                    default: None,
                }),
                "default_parameter" | "typed_default_parameter" => params.push(Param {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default(),
                    default: child.child_by_field_name("value").map(|v| self.expr(v)),
                }),
                "typed_parameter" => {
                    if let Some(inner) = named_children(child).into_iter().next() {
                        params.push(Param {
                            name: self.text(inner).trim_start_matches('*').to_string(),
                            default: None,
                        });
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
                    params.push(Param {
                        name: self.text(child).trim_start_matches('*').to_string(),
                        default: None,
                    })
                }
                _ => {}
            }
        }
        params
    }

    fn function(&self, node: Node<'_>) -> FunctionDef {
        FunctionDef {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.params(p))
                .unwrap_or_default(),
            body: self.suite(node, "body"),
            decorators: Vec::new(),
            is_async: first_child_kind(node) == Some("async"),
        }
    }

    fn class(&self, node: Node<'_>) -> StmtKind {
        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| self.arguments(args).0)
            .unwrap_or_default();
        StmtKind::ClassDef {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            bases,
            body: self.suite(node, "body"),
            decorators: Vec::new(),
        }
    }

    fn decorated(&self, node: Node<'_>) -> Stmt {
        let decorators: Vec<Expr> = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "decorator")
            .map(|d| self.first_named_expr(d))
            .collect();

        let definition = node.child_by_field_name("definition").or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| matches!(c.kind(), "function_definition" | "class_definition"))
        });

        let Some(definition) = definition else {
            return Stmt {
                kind: StmtKind::Other {
                    exprs: decorators,
                    body: Vec::new(),
                },
                span: span_of(node),
            };
        };

        let mut stmt = self.stmt(definition);
        match &mut stmt.kind {
            StmtKind::FunctionDef(def) => def.decorators = decorators,
            StmtKind::ClassDef { decorators: d, .. } => *d = decorators,
            _ => {}
        }
        stmt
    }

    fn else_body(&self, node: Node<'_>) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .find(|c| c.kind() == "else_clause")
            .map(|clause| self.suite(clause, "body"))
            .unwrap_or_default()
    }

    fn if_statement(&self, node: Node<'_>) -> StmtKind {
        let mut branches = vec![(
            self.field_expr(node, "condition"),
            self.suite(node, "consequence"),
        )];
        let mut orelse = Vec::new();

        for child in named_children(node) {
            match child.kind() {
                "elif_clause" => branches.push((
                    self.field_expr(child, "condition"),
                    self.suite(child, "consequence"),
                )),
                "else_clause" => orelse = self.suite(child, "body"),
                _ => {}
            }
        }

        StmtKind::If { branches, orelse }
    }

    fn try_statement(&self, node: Node<'_>) -> StmtKind {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for child in named_children(node) {
            match child.kind() {
                "except_clause" | "except_group_clause" => handlers.push(self.handler(child)),
                "else_clause" => orelse = self.suite(child, "body"),
                "finally_clause" => finalbody = self.suite(child, "body"),
                _ => {}
            }
        }

        StmtKind::Try {
            body: self.suite(node, "body"),
            handlers,
            orelse,
            finalbody,
        }
    }

    fn handler(&self, node: Node<'_>) -> ExceptHandler {
        let children = named_children(node);
        let body = children
            .iter()
            .rev()
            .find(|c| c.kind() == "block")
            .map(|b| self.block(*b))
            .unwrap_or_default();
        let header: Vec<Node<'_>> = children
            .into_iter()
            .filter(|c| c.kind() != "block")
            .collect();

        let (type_, name) = match header.as_slice() {
            [] => (None, None),
            [pattern, ..] if pattern.kind() == "as_pattern" => {
                let alias = pattern
                    .child_by_field_name("alias")
                    .or_else(|| named_children(*pattern).into_iter().nth(1));
                (
                    Some(self.first_named_expr(*pattern)),
                    alias.map(|a| self.text(a)),
                )
            }
            [type_, rest @ ..] => (Some(self.expr(*type_)), rest.first().map(|n| self.text(*n))),
        };

        ExceptHandler {
            type_,
            name,
            body,
            span: span_of(node),
        }
    }

    fn as_target(&self, node: Node<'_>) -> Expr {
        if node.kind() == "as_pattern_target" {
            return match named_children(node).into_iter().next() {
                Some(inner) => self.expr(inner),
                None => Expr {
                    kind: ExprKind::Name(self.text(node)),
                    span: span_of(node),
                },
            };
        }
        self.expr(node)
    }

    fn with_item(&self, item: Node<'_>) -> WithItem {
        let value = item
            .child_by_field_name("value")
            .or_else(|| named_children(item).into_iter().next());

        let Some(value) = value else {
            return WithItem {
                context: self.empty(item),
                target: None,
            };
        };

        if let Some(alias) = item.child_by_field_name("alias") {
            return WithItem {
                context: self.expr(value),
                target: Some(self.as_target(alias)),
            };
        }

        if value.kind() == "as_pattern" {
            let target = value
                .child_by_field_name("alias")
                .or_else(|| named_children(value).into_iter().nth(1));
            return WithItem {
                context: self.first_named_expr(value),
                target: target.map(|t| self.as_target(t)),
            };
        }

        WithItem {
            context: self.expr(value),
            target: None,
        }
    }

    fn with_statement(&self, node: Node<'_>) -> StmtKind {
        let mut items = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "with_clause" => {
                    for item in named_children(child) {
                        if item.kind() == "with_item" {
                            items.push(self.with_item(item));
                        }
                    }
                }
                "with_item" => items.push(self.with_item(child)),
                _ => {}
            }
        }
        StmtKind::With {
            items,
            body: self.suite(node, "body"),
        }
    }

    fn import_names(&self, node: Node<'_>, by_field: bool) -> Vec<Alias> {
        let candidates: Vec<Node<'_>> = if by_field {
            let mut cursor = node.walk();
            let named: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
            named
        } else {
            named_children(node)
        };

        candidates
            .into_iter()
            .filter_map(|child| match child.kind() {
                "dotted_name" => Some(Alias {
                    name: self.text(child),
                    asname: None,
                }),
                "aliased_import" => Some(Alias {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default(),
                    asname: child.child_by_field_name("alias").map(|a| self.text(a)),
                }),
                _ => None,
            })
            .collect()
    }

    /// `print(...)` that the grammar read as a print statement
    fn print_call(&self, node: Node<'_>) -> Expr {
        let mut cursor = node.walk();
        let args: Vec<Expr> = node
            .children_by_field_name("argument", &mut cursor)
            .map(|a| self.expr(a))
            .collect();
        let span = span_of(node);
        Expr {
            kind: ExprKind::Call {
                func: Box::new(Expr {
                    kind: ExprKind::Name("print".to_string()),
                    span,
                }),
                args,
                keywords: Vec::new(),
            },
            span,
        }
    }

    fn other_statement(&self, node: Node<'_>) -> StmtKind {
        let mut exprs = Vec::new();
        let mut body = Vec::new();
        for child in named_children(node) {
            if child.kind() == "block" {
                body.extend(self.block(child));
            } else if child.kind().ends_with("_clause") {
                body.push(self.stmt(child));
            } else {
                exprs.push(self.expr(child));
            }
        }
        StmtKind::Other { exprs, body }
    }

    fn arguments(&self, node: Node<'_>) -> (Vec<Expr>, Vec<Keyword>) {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "keyword_argument" => keywords.push(Keyword {
                    arg: child.child_by_field_name("name").map(|n| self.text(n)),
                    value: self.field_expr(child, "value"),
                }),
                "dictionary_splat" => keywords.push(Keyword {
                    arg: None,
                    value: self.first_named_expr(child),
                }),
                _ => args.push(self.expr(child)),
            }
        }
        (args, keywords)
    }

    fn string(&self, node: Node<'_>) -> ExprKind {
        let text = self.text(node);
        let prefix_len = text
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        let prefix = text[..prefix_len].to_ascii_lowercase();

        let interpolations: Vec<Expr> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "interpolation")
            .map(|i| match i.child_by_field_name("expression") {
                Some(inner) => self.expr(inner),
                None => self.first_named_expr(i),
            })
            .collect();

        if prefix.contains('f') || !interpolations.is_empty() {
            return ExprKind::JoinedStr(interpolations);
        }
        let body = strip_quotes(&text[prefix_len..]);
        if prefix.contains('b') {
            ExprKind::Constant(Constant::Bytes(body))
        } else {
            ExprKind::Constant(Constant::Str(body))
        }
    }

    fn concatenated_string(&self, node: Node<'_>) -> ExprKind {
        let mut joined = Vec::new();
        let mut is_fstring = false;
        let mut is_bytes = false;
        let mut text = String::new();

        for part in named_children(node) {
            match self.string(part) {
                ExprKind::JoinedStr(values) => {
                    is_fstring = true;
                    joined.extend(values);
                }
                ExprKind::Constant(Constant::Bytes(s)) => {
                    is_bytes = true;
                    text.push_str(&s);
                }
                ExprKind::Constant(Constant::Str(s)) => text.push_str(&s),
                _ => {}
            }
        }

        if is_fstring {
            ExprKind::JoinedStr(joined)
        } else if is_bytes {
            ExprKind::Constant(Constant::Bytes(text))
        } else {
            ExprKind::Constant(Constant::Str(text))
        }
    }

    fn comprehension(&self, node: Node<'_>) -> ExprKind {
        let body = node.child_by_field_name("body");
        let (element, value) = match body {
            Some(pair) if pair.kind() == "pair" => (
                self.field_expr(pair, "key"),
                Some(Box::new(self.field_expr(pair, "value"))),
            ),
            Some(body) => (self.expr(body), None),
            None => (self.empty(node), None),
        };

        let mut generators: Vec<Generator> = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "for_in_clause" => {
                    let mut cursor = child.walk();
                    let mut iters: Vec<Expr> = child
                        .children_by_field_name("right", &mut cursor)
                        .map(|r| self.expr(r))
                        .collect();
                    let iter = if iters.len() == 1 {
                        iters.remove(0)
                    } else {
                        Expr {
                            kind: ExprKind::Tuple(iters),
                            span: span_of(child),
                        }
                    };
                    generators.push(Generator {
                        target: self.field_expr(child, "left"),
                        iter,
                        ifs: Vec::new(),
                    });
                }
                "if_clause" => {
                    let condition = self.first_named_expr(child);
                    if let Some(last) = generators.last_mut() {
                        last.ifs.push(condition);
                    }
                }
                _ => {}
            }
        }

        ExprKind::Comprehension {
            element: Box::new(element),
            value,
            generators,
        }
    }

    fn bool_op(&self, node: Node<'_>) -> ExprKind {
        let op = match node.child_by_field_name("operator").map(|o| self.text(o)) {
            Some(op) if op == "or" => BoolOperator::Or,
            _ => BoolOperator::And,
        };

        let mut values = Vec::new();
        if let Some(left) = node.child_by_field_name("left") {
            match self.expr(left) {
                Expr {
                    kind: ExprKind::BoolOp { op: inner, values: inner_values },
                    ..
                } if inner == op && left.kind() == "boolean_operator" => values.extend(inner_values),
                lowered => values.push(lowered),
            }
        }
        values.push(self.field_expr(node, "right"));

        ExprKind::BoolOp { op, values }
    }

    pub(super) fn expr(&self, node: Node<'_>) -> Expr {
        let kind = match node.kind() {
            "identifier" | "keyword_identifier" => ExprKind::Name(self.text(node)),
            "attribute" => ExprKind::Attribute {
                value: Box::new(self.field_expr(node, "object")),
                attr: node
                    .child_by_field_name("attribute")
                    .map(|a| self.text(a))
                    .unwrap_or_default(),
            },
            "call" => {
                let (args, keywords) = match node.child_by_field_name("arguments") {
                    Some(a) if a.kind() == "generator_expression" => (vec![self.expr(a)], Vec::new()),
                    Some(a) => self.arguments(a),
                    None => (Vec::new(), Vec::new()),
                };
                ExprKind::Call {
                    func: Box::new(self.field_expr(node, "function")),
                    args,
                    keywords,
                }
            }
            "integer" | "float" => ExprKind::Constant(number_constant(&self.text(node))),
            "true" => ExprKind::Constant(Constant::Bool(true)),
            "false" => ExprKind::Constant(Constant::Bool(false)),
            "none" => ExprKind::Constant(Constant::None),
            "ellipsis" => ExprKind::Constant(Constant::Ellipsis),
            "string" => self.string(node),
            "concatenated_string" => self.concatenated_string(node),
            "binary_operator" => ExprKind::BinOp {
                left: Box::new(self.field_expr(node, "left")),
                op: node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o))
                    .unwrap_or_default(),
                right: Box::new(self.field_expr(node, "right")),
            },
            "unary_operator" => ExprKind::UnaryOp {
                op: node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o))
                    .unwrap_or_default(),
                operand: Box::new(self.field_expr(node, "argument")),
            },
            "not_operator" => ExprKind::UnaryOp {
                op: "not".to_string(),
                operand: Box::new(self.field_expr(node, "argument")),
            },
            "boolean_operator" => self.bool_op(node),
            "comparison_operator" => {
                let mut operands = named_children(node).into_iter().map(|c| self.expr(c));
                let left = operands.next().unwrap_or_else(|| self.empty(node));
                ExprKind::Compare {
                    left: Box::new(left),
                    comparators: operands.collect(),
                }
            }
            "lambda" => ExprKind::Lambda {
                params: node
                    .child_by_field_name("parameters")
                    .map(|p| self.params(p))
                    .unwrap_or_default(),
                body: Box::new(self.field_expr(node, "body")),
            },
            "conditional_expression" => {
                let mut parts = named_children(node).into_iter().map(|c| self.expr(c));
                let body = parts.next().unwrap_or_else(|| self.empty(node));
                let test = parts.next().unwrap_or_else(|| self.empty(node));
                let orelse = parts.next().unwrap_or_else(|| self.empty(node));
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                }
            }
            "named_expression" => ExprKind::NamedExpr {
                target: Box::new(self.field_expr(node, "name")),
                value: Box::new(self.field_expr(node, "value")),
            },
            "list" | "list_pattern" => ExprKind::List(self.elements(node)),
            "set" => ExprKind::Set(self.elements(node)),
            "tuple" | "expression_list" | "pattern_list" | "tuple_pattern" => {
                ExprKind::Tuple(self.elements(node))
            }
            "dictionary" => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "pair" {
                        keys.push(self.field_expr(child, "key"));
                        values.push(self.field_expr(child, "value"));
                    } else {
                        keys.push(Expr {
                            kind: ExprKind::Constant(Constant::None),
                            span: span_of(child),
                        });
                        values.push(self.first_named_expr(child));
                    }
                }
                ExprKind::Dict { keys, values }
            }
            "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression" => self.comprehension(node),
            "subscript" => {
                let mut cursor = node.walk();
                let index: Vec<Expr> = node
                    .children_by_field_name("subscript", &mut cursor)
                    .map(|s| self.expr(s))
                    .collect();
                ExprKind::Subscript {
                    value: Box::new(self.field_expr(node, "value")),
                    index,
                }
            }
            "parenthesized_expression" | "as_pattern" | "type" => {
                return match named_children(node).into_iter().next() {
                    Some(inner) => self.expr(inner),
                    None => self.empty(node),
                };
            }
            "list_splat"
            | "list_splat_pattern"
            | "dictionary_splat"
            | "dictionary_splat_pattern"
            | "parenthesized_list_splat" => {
                let inner = match named_children(node).into_iter().next() {
                    Some(inner) => self.expr(inner),
                    None => Expr {
                        kind: ExprKind::Name(self.text(node).trim_start_matches('*').to_string()),
                        span: span_of(node),
                    },
                };
                ExprKind::Starred(Box::new(inner))
            }
            "await" => ExprKind::Await(Box::new(self.first_named_expr(node))),
            _ => ExprKind::Other(self.elements(node)),
        };

        Expr {
            kind,
            span: span_of(node),
        }
    }

    fn elements(&self, node: Node<'_>) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .map(|child| self.expr(child))
            .collect()
    }
}
