//! Script Lowering for the preview sandbox
//!
//! Parses sanitized component code with oxc and lowers the AST into the owned
//! restricted IR in [`crate::ast`]. Lowering is where capability restriction
//! starts: constructs outside the preview grammar (classes, async code,
//! generators, `this`, regular expressions, module syntax) are rejected here
//! and never reach the interpreter.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, AssignmentTarget, BindingPattern, ChainElement, Expression,
    ForStatementInit, ForStatementLeft, FormalParameters, Function, FunctionBody as JsFunctionBody,
    ObjectPropertyKind, PropertyKey, PropertyKind, SimpleAssignmentTarget, Statement,
    VariableDeclaration, VariableDeclarationKind,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::operator::{
    AssignmentOperator, BinaryOperator, LogicalOperator, UnaryOperator, UpdateOperator,
};
use std::cell::Cell;
use std::rc::Rc;
use std::thread;

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Declarator, Expr, FunctionBody, FunctionDef, Item, Key, Literal,
    LogicalOp, Pattern, Program, Property, Stmt, Target, UnaryOp,
};
use crate::config::ExecutionLimits;
use crate::error::SynthesisError;

type LowerResult<T> = Result<T, SynthesisError>;

/// Stack for the checking parse. Source length is capped, so the parser's
/// recursion on any accepted input fits.
const PARSE_STACK_BYTES: usize = 256 << 20;

/// Parse and lower a sanitized module.
///
/// oxc recurses once per nesting level, so input is first parsed and lowered
/// on a thread with a large stack. Only input that nests within
/// `max_nesting_depth` is then parsed on the caller's stack.
pub fn parse_program(source: &str, limits: &ExecutionLimits) -> LowerResult<Program> {
    if source.len() > limits.max_source_len {
        return Err(SynthesisError::Budget(format!(
            "source of {} bytes exceeds limit of {}",
            source.len(),
            limits.max_source_len
        )));
    }
    check_nesting(source, limits.max_nesting_depth)?;
    lower(source, limits.max_nesting_depth)
}

fn check_nesting(source: &str, max_depth: usize) -> LowerResult<()> {
    let owned = source.to_string();
    let worker = thread::Builder::new()
        .name("preview-parse".to_string())
        .stack_size(PARSE_STACK_BYTES)
        .spawn(move || lower(&owned, max_depth).map(drop))
        .map_err(|e| SynthesisError::Parse {
            message: format!("failed to start parser: {}", e),
        })?;
    worker.join().unwrap_or_else(|_| {
        Err(SynthesisError::Parse {
            message: "parser panicked".to_string(),
        })
    })
}

fn lower(source: &str, max_depth: usize) -> LowerResult<Program> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(false);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if let Some(error) = ret.errors.first() {
        return Err(SynthesisError::Parse {
            message: error.to_string(),
        });
    }

    let lowerer = Lowerer {
        source,
        depth: Cell::new(0),
        max_depth,
    };
    let mut body = Vec::with_capacity(ret.program.body.len());
    for stmt in &ret.program.body {
        body.push(lowerer.statement(stmt)?);
    }
    Ok(Program { body })
}

struct Lowerer<'s> {
    source: &'s str,
    depth: Cell<usize>,
    max_depth: usize,
}

impl<'s> Lowerer<'s> {
    fn line(&self, span: Span) -> u32 {
        let end = (span.start as usize).min(self.source.len());
        let prefix = self.source.get(..end).unwrap_or(self.source);
        prefix.matches('\n').count() as u32 + 1
    }

    fn unsupported(&self, span: Span, construct: &str) -> SynthesisError {
        SynthesisError::Unsupported {
            line: self.line(span),
            construct: construct.to_string(),
        }
    }

    /// Runs `inner` one nesting level deeper.
    fn nested<T>(&self, span: Span, inner: impl FnOnce() -> LowerResult<T>) -> LowerResult<T> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(SynthesisError::Budget(format!(
                "nesting deeper than {} levels at line {}",
                self.max_depth,
                self.line(span)
            )));
        }
        self.depth.set(depth);
        let result = inner();
        self.depth.set(depth - 1);
        result
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn statements(&self, stmts: &[Statement<'_>]) -> LowerResult<Vec<Stmt>> {
        stmts.iter().map(|s| self.statement(s)).collect()
    }

    fn statement(&self, stmt: &Statement<'_>) -> LowerResult<Stmt> {
        self.nested(stmt.span(), || self.lower_statement(stmt))
    }

    fn lower_statement(&self, stmt: &Statement<'_>) -> LowerResult<Stmt> {
        match stmt {
            Statement::VariableDeclaration(decl) => self.variable_declaration(decl),
            Statement::FunctionDeclaration(func) => {
                let name = func.id.as_ref().map(|id| id.name.to_string());
                Ok(Stmt::Function(Rc::new(self.function(func, name)?)))
            }
            Statement::ExpressionStatement(expr_stmt) => {
                Ok(Stmt::Expr(self.expression(&expr_stmt.expression)?))
            }
            Statement::ReturnStatement(ret) => {
                let argument = match &ret.argument {
                    Some(arg) => Some(self.expression(arg)?),
                    None => None,
                };
                Ok(Stmt::Return(argument))
            }
            Statement::IfStatement(if_stmt) => {
                let alternate = match &if_stmt.alternate {
                    Some(alt) => Some(Box::new(self.statement(alt)?)),
                    None => None,
                };
                Ok(Stmt::If {
                    test: self.expression(&if_stmt.test)?,
                    consequent: Box::new(self.statement(&if_stmt.consequent)?),
                    alternate,
                })
            }
            Statement::BlockStatement(block) => Ok(Stmt::Block(self.statements(&block.body)?)),
            Statement::ForOfStatement(for_of) => {
                if for_of.r#await {
                    return Err(self.unsupported(for_of.span, "for await"));
                }
                let ForStatementLeft::VariableDeclaration(decl) = &for_of.left else {
                    return Err(self.unsupported(for_of.span, "for-of over an existing binding"));
                };
                let kind = self.declaration_kind(decl)?;
                let Some(first) = decl.declarations.first() else {
                    return Err(self.unsupported(decl.span, "empty for-of declaration"));
                };
                Ok(Stmt::ForOf {
                    kind,
                    pattern: self.pattern(&first.id)?,
                    iterable: self.expression(&for_of.right)?,
                    body: Box::new(self.statement(&for_of.body)?),
                })
            }
            Statement::ForStatement(for_stmt) => {
                let init = match &for_stmt.init {
                    Some(ForStatementInit::VariableDeclaration(decl)) => {
                        Some(Box::new(self.variable_declaration(decl)?))
                    }
                    Some(init) => match init.as_expression() {
                        Some(expr) => Some(Box::new(Stmt::Expr(self.expression(expr)?))),
                        None => return Err(self.unsupported(for_stmt.span, "for loop initializer")),
                    },
                    None => None,
                };
                let test = match &for_stmt.test {
                    Some(test) => Some(self.expression(test)?),
                    None => None,
                };
                let update = match &for_stmt.update {
                    Some(update) => Some(self.expression(update)?),
                    None => None,
                };
                Ok(Stmt::For {
                    init,
                    test,
                    update,
                    body: Box::new(self.statement(&for_stmt.body)?),
                })
            }
            Statement::WhileStatement(while_stmt) => Ok(Stmt::While {
                test: self.expression(&while_stmt.test)?,
                body: Box::new(self.statement(&while_stmt.body)?),
            }),
            Statement::BreakStatement(brk) => {
                if brk.label.is_some() {
                    return Err(self.unsupported(brk.span, "labeled break"));
                }
                Ok(Stmt::Break)
            }
            Statement::ContinueStatement(cont) => {
                if cont.label.is_some() {
                    return Err(self.unsupported(cont.span, "labeled continue"));
                }
                Ok(Stmt::Continue)
            }
            Statement::ThrowStatement(throw) => Ok(Stmt::Throw(self.expression(&throw.argument)?)),
            Statement::TryStatement(try_stmt) => {
                let (param, handler) = match &try_stmt.handler {
                    Some(clause) => {
                        let param = match &clause.param {
                            Some(param) => Some(self.pattern(&param.pattern)?),
                            None => None,
                        };
                        (param, Some(self.statements(&clause.body.body)?))
                    }
                    None => (None, None),
                };
                let finalizer = match &try_stmt.finalizer {
                    Some(block) => Some(self.statements(&block.body)?),
                    None => None,
                };
                Ok(Stmt::Try {
                    block: self.statements(&try_stmt.block.body)?,
                    param,
                    handler,
                    finalizer,
                })
            }
            Statement::EmptyStatement(_) => Ok(Stmt::Empty),
            Statement::ClassDeclaration(class) => Err(self.unsupported(class.span, "class declaration")),
            Statement::ImportDeclaration(import) => {
                Err(self.unsupported(import.span, "import declaration"))
            }
            Statement::ExportNamedDeclaration(export) => {
                Err(self.unsupported(export.span, "export declaration"))
            }
            Statement::ExportDefaultDeclaration(export) => {
                Err(self.unsupported(export.span, "export declaration"))
            }
            other => Err(self.unsupported(other.span(), "statement")),
        }
    }

    fn declaration_kind(&self, decl: &VariableDeclaration<'_>) -> LowerResult<DeclKind> {
        match decl.kind {
            VariableDeclarationKind::Const => Ok(DeclKind::Const),
            VariableDeclarationKind::Let => Ok(DeclKind::Let),
            VariableDeclarationKind::Var => Ok(DeclKind::Var),
            _ => Err(self.unsupported(decl.span, "using declaration")),
        }
    }

    fn variable_declaration(&self, decl: &VariableDeclaration<'_>) -> LowerResult<Stmt> {
        let kind = self.declaration_kind(decl)?;
        let mut declarations = Vec::with_capacity(decl.declarations.len());
        for declarator in &decl.declarations {
            // `const Card = () => …` names the function after its binding.
            let binding_name = match &declarator.id {
                BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
                _ => None,
            };
            let init = match &declarator.init {
                Some(init) => Some(self.named_expression(init, binding_name)?),
                None => None,
            };
            declarations.push(Declarator {
                pattern: self.pattern(&declarator.id)?,
                init,
            });
        }
        Ok(Stmt::Declare { kind, declarations })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FUNCTIONS & PATTERNS
    // ═══════════════════════════════════════════════════════════════════════════

    fn params(&self, params: &FormalParameters<'_>) -> LowerResult<Vec<Pattern>> {
        if params.rest.is_some() {
            return Err(self.unsupported(params.span, "rest parameter"));
        }
        params
            .items
            .iter()
            .map(|param| self.pattern(&param.pattern))
            .collect()
    }

    fn function(&self, func: &Function<'_>, name: Option<String>) -> LowerResult<FunctionDef> {
        if func.r#async {
            return Err(self.unsupported(func.span, "async function"));
        }
        if func.generator {
            return Err(self.unsupported(func.span, "generator function"));
        }
        let Some(body) = &func.body else {
            return Err(self.unsupported(func.span, "function without body"));
        };
        Ok(FunctionDef {
            name: func.id.as_ref().map(|id| id.name.to_string()).or(name),
            params: self.params(&func.params)?,
            body: FunctionBody::Block(self.function_body(body)?),
            is_arrow: false,
            line: self.line(func.span),
        })
    }

    fn function_body(&self, body: &JsFunctionBody<'_>) -> LowerResult<Vec<Stmt>> {
        self.statements(&body.statements)
    }

    fn pattern(&self, pattern: &BindingPattern<'_>) -> LowerResult<Pattern> {
        self.nested(pattern.span(), || self.lower_pattern(pattern))
    }

    fn lower_pattern(&self, pattern: &BindingPattern<'_>) -> LowerResult<Pattern> {
        match pattern {
            BindingPattern::BindingIdentifier(id) => Ok(Pattern::Ident(id.name.to_string())),
            BindingPattern::ObjectPattern(obj) => {
                let mut properties = Vec::with_capacity(obj.properties.len());
                for prop in &obj.properties {
                    let key = self.property_key(&prop.key, prop.computed)?;
                    properties.push((key, self.pattern(&prop.value)?));
                }
                let rest = match &obj.rest {
                    Some(rest) => match &rest.argument {
                        BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
                        _ => return Err(self.unsupported(obj.span, "nested rest pattern")),
                    },
                    None => None,
                };
                Ok(Pattern::Object { properties, rest })
            }
            BindingPattern::ArrayPattern(arr) => {
                let mut elements = Vec::with_capacity(arr.elements.len());
                for elem in &arr.elements {
                    elements.push(match elem {
                        Some(pattern) => Some(self.pattern(pattern)?),
                        None => None,
                    });
                }
                let rest = match &arr.rest {
                    Some(rest) => Some(Box::new(self.pattern(&rest.argument)?)),
                    None => None,
                };
                Ok(Pattern::Array { elements, rest })
            }
            BindingPattern::AssignmentPattern(assign) => {
                let name = match &assign.left {
                    BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
                    _ => None,
                };
                Ok(Pattern::Default {
                    target: Box::new(self.pattern(&assign.left)?),
                    value: Box::new(self.named_expression(&assign.right, name)?),
                })
            }
        }
    }

    fn property_key(&self, key: &PropertyKey<'_>, computed: bool) -> LowerResult<Key> {
        match key {
            PropertyKey::StaticIdentifier(id) if !computed => Ok(Key::Static(id.name.as_str().into())),
            PropertyKey::StringLiteral(lit) => Ok(Key::Static(lit.value.as_str().into())),
            PropertyKey::NumericLiteral(lit) => {
                Ok(Key::Static(crate::value::number_to_string(lit.value).into()))
            }
            PropertyKey::PrivateIdentifier(id) => Err(self.unsupported(id.span, "private field")),
            other => match other.as_expression() {
                Some(expr) => Ok(Key::Computed(Box::new(self.expression(expr)?))),
                None => Err(self.unsupported(other.span(), "property key")),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lower an initializer, naming anonymous functions after their binding.
    fn named_expression(&self, expr: &Expression<'_>, name: Option<String>) -> LowerResult<Expr> {
        match expr {
            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
                self.function_expression(expr, name)
            }
            Expression::ParenthesizedExpression(paren) => self.named_expression(&paren.expression, name),
            _ => self.expression(expr),
        }
    }

    fn function_expression(&self, expr: &Expression<'_>, name: Option<String>) -> LowerResult<Expr> {
        match expr {
            Expression::ArrowFunctionExpression(arrow) => {
                if arrow.r#async {
                    return Err(self.unsupported(arrow.span, "async arrow function"));
                }
                let body = if arrow.expression {
                    match arrow.body.statements.first() {
                        Some(Statement::ExpressionStatement(stmt)) => {
                            FunctionBody::Expr(self.expression(&stmt.expression)?)
                        }
                        _ => return Err(self.unsupported(arrow.span, "arrow body")),
                    }
                } else {
                    FunctionBody::Block(self.function_body(&arrow.body)?)
                };
                Ok(Expr::Function(Rc::new(FunctionDef {
                    name,
                    params: self.params(&arrow.params)?,
                    body,
                    is_arrow: true,
                    line: self.line(arrow.span),
                })))
            }
            Expression::FunctionExpression(func) => Ok(Expr::Function(Rc::new(self.function(func, name)?))),
            other => self.expression(other),
        }
    }

    fn items(&self, args: &[Argument<'_>]) -> LowerResult<Vec<Item>> {
        let mut items = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::SpreadElement(spread) => {
                    items.push(Item::Spread(self.expression(&spread.argument)?))
                }
                other => match other.as_expression() {
                    Some(expr) => items.push(Item::Expr(self.expression(expr)?)),
                    None => return Err(self.unsupported(other.span(), "argument")),
                },
            }
        }
        Ok(items)
    }

    fn member_key(&self, expr: &Expression<'_>) -> LowerResult<Key> {
        match expr {
            Expression::StringLiteral(lit) => Ok(Key::Static(lit.value.as_str().into())),
            other => Ok(Key::Computed(Box::new(self.expression(other)?))),
        }
    }

    fn expression(&self, expr: &Expression<'_>) -> LowerResult<Expr> {
        self.nested(expr.span(), || self.lower_expression(expr))
    }

    fn lower_expression(&self, expr: &Expression<'_>) -> LowerResult<Expr> {
        match expr {
            Expression::BooleanLiteral(lit) => Ok(Expr::Literal(Literal::Bool(lit.value))),
            Expression::NullLiteral(_) => Ok(Expr::Literal(Literal::Null)),
            Expression::NumericLiteral(lit) => Ok(Expr::Literal(Literal::Number(lit.value))),
            Expression::StringLiteral(lit) => Ok(Expr::Literal(Literal::Str(lit.value.as_str().into()))),
            Expression::TemplateLiteral(tpl) => {
                let quasis = tpl
                    .quasis
                    .iter()
                    .map(|q| match &q.value.cooked {
                        Some(cooked) => cooked.to_string(),
                        None => q.value.raw.to_string(),
                    })
                    .collect();
                let exprs = tpl
                    .expressions
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<LowerResult<Vec<_>>>()?;
                Ok(Expr::Template { quasis, exprs })
            }
            Expression::Identifier(id) => Ok(Expr::Ident(id.name.to_string())),
            Expression::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for elem in &arr.elements {
                    match elem {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            items.push(Item::Spread(self.expression(&spread.argument)?))
                        }
                        ArrayExpressionElement::Elision(_) => items.push(Item::Hole),
                        other => match other.as_expression() {
                            Some(e) => items.push(Item::Expr(self.expression(e)?)),
                            None => return Err(self.unsupported(arr.span, "array element")),
                        },
                    }
                }
                Ok(Expr::Array(items))
            }
            Expression::ObjectExpression(obj) => {
                let mut properties = Vec::with_capacity(obj.properties.len());
                for prop in &obj.properties {
                    match prop {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            if !matches!(p.kind, PropertyKind::Init) {
                                return Err(self.unsupported(p.span, "property accessor"));
                            }
                            let key = self.property_key(&p.key, p.computed)?;
                            let name = match &key {
                                Key::Static(name) => Some(name.to_string()),
                                Key::Computed(_) => None,
                            };
                            properties.push(Property::Entry(key, self.named_expression(&p.value, name)?));
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => {
                            properties.push(Property::Spread(self.expression(&spread.argument)?))
                        }
                    }
                }
                Ok(Expr::Object(properties))
            }
            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
                self.function_expression(expr, None)
            }
            Expression::CallExpression(call) => Ok(Expr::Call {
                callee: Box::new(self.expression(&call.callee)?),
                args: self.items(&call.arguments)?,
                optional: call.optional,
            }),
            Expression::NewExpression(new_expr) => match &new_expr.callee {
                Expression::Identifier(id) => Ok(Expr::New {
                    callee: id.name.to_string(),
                    args: self.items(&new_expr.arguments)?,
                }),
                other => Err(self.unsupported(other.span(), "constructor call")),
            },
            Expression::StaticMemberExpression(member) => Ok(Expr::Member {
                object: Box::new(self.expression(&member.object)?),
                property: Key::Static(member.property.name.as_str().into()),
                optional: member.optional,
            }),
            Expression::ComputedMemberExpression(member) => Ok(Expr::Member {
                object: Box::new(self.expression(&member.object)?),
                property: self.member_key(&member.expression)?,
                optional: member.optional,
            }),
            Expression::ChainExpression(chain) => {
                let inner = match &chain.expression {
                    ChainElement::CallExpression(call) => Expr::Call {
                        callee: Box::new(self.expression(&call.callee)?),
                        args: self.items(&call.arguments)?,
                        optional: call.optional,
                    },
                    ChainElement::StaticMemberExpression(member) => Expr::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: Key::Static(member.property.name.as_str().into()),
                        optional: member.optional,
                    },
                    ChainElement::ComputedMemberExpression(member) => Expr::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: self.member_key(&member.expression)?,
                        optional: member.optional,
                    },
                    _ => return Err(self.unsupported(chain.span, "optional chain element")),
                };
                Ok(Expr::Chain(Box::new(inner)))
            }
            Expression::ConditionalExpression(cond) => Ok(Expr::Conditional {
                test: Box::new(self.expression(&cond.test)?),
                consequent: Box::new(self.expression(&cond.consequent)?),
                alternate: Box::new(self.expression(&cond.alternate)?),
            }),
            Expression::LogicalExpression(logical) => Ok(Expr::Logical {
                op: logical_op(logical.operator),
                left: Box::new(self.expression(&logical.left)?),
                right: Box::new(self.expression(&logical.right)?),
            }),
            Expression::BinaryExpression(bin) => {
                let Some(op) = binary_op(bin.operator) else {
                    return Err(self.unsupported(bin.span, "binary operator"));
                };
                Ok(Expr::Binary {
                    op,
                    left: Box::new(self.expression(&bin.left)?),
                    right: Box::new(self.expression(&bin.right)?),
                })
            }
            Expression::UnaryExpression(unary) => {
                let op = match unary.operator {
                    UnaryOperator::UnaryNegation => UnaryOp::Neg,
                    UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    UnaryOperator::LogicalNot => UnaryOp::Not,
                    UnaryOperator::BitwiseNot => UnaryOp::BitNot,
                    UnaryOperator::Typeof => UnaryOp::Typeof,
                    UnaryOperator::Void => UnaryOp::Void,
                    UnaryOperator::Delete => return Err(self.unsupported(unary.span, "delete")),
                };
                Ok(Expr::Unary {
                    op,
                    argument: Box::new(self.expression(&unary.argument)?),
                })
            }
            Expression::UpdateExpression(update) => {
                let target = match &update.argument {
                    SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => {
                        Target::Ident(id.name.to_string())
                    }
                    SimpleAssignmentTarget::StaticMemberExpression(member) => Target::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: Key::Static(member.property.name.as_str().into()),
                    },
                    SimpleAssignmentTarget::ComputedMemberExpression(member) => Target::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: self.member_key(&member.expression)?,
                    },
                    _ => return Err(self.unsupported(update.span, "update target")),
                };
                Ok(Expr::Update {
                    increment: matches!(update.operator, UpdateOperator::Increment),
                    prefix: update.prefix,
                    target,
                })
            }
            Expression::AssignmentExpression(assign) => {
                let target = match &assign.left {
                    AssignmentTarget::AssignmentTargetIdentifier(id) => Target::Ident(id.name.to_string()),
                    AssignmentTarget::StaticMemberExpression(member) => Target::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: Key::Static(member.property.name.as_str().into()),
                    },
                    AssignmentTarget::ComputedMemberExpression(member) => Target::Member {
                        object: Box::new(self.expression(&member.object)?),
                        property: self.member_key(&member.expression)?,
                    },
                    _ => return Err(self.unsupported(assign.span, "destructuring assignment")),
                };
                let Some(op) = assign_op(assign.operator) else {
                    return Err(self.unsupported(assign.span, "assignment operator"));
                };
                let name = match &target {
                    Target::Ident(name) => Some(name.clone()),
                    Target::Member { .. } => None,
                };
                Ok(Expr::Assign {
                    op,
                    target,
                    value: Box::new(self.named_expression(&assign.right, name)?),
                })
            }
            Expression::SequenceExpression(seq) => Ok(Expr::Sequence(
                seq.expressions
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<LowerResult<Vec<_>>>()?,
            )),
            Expression::ParenthesizedExpression(paren) => self.expression(&paren.expression),
            Expression::ThisExpression(this) => Err(self.unsupported(this.span, "this")),
            Expression::ClassExpression(class) => Err(self.unsupported(class.span, "class expression")),
            Expression::AwaitExpression(await_expr) => Err(self.unsupported(await_expr.span, "await")),
            Expression::YieldExpression(yield_expr) => Err(self.unsupported(yield_expr.span, "yield")),
            Expression::RegExpLiteral(regex) => Err(self.unsupported(regex.span, "regular expression")),
            Expression::ImportExpression(import) => Err(self.unsupported(import.span, "dynamic import")),
            Expression::TaggedTemplateExpression(tagged) => {
                Err(self.unsupported(tagged.span, "tagged template"))
            }
            other => Err(self.unsupported(other.span(), "expression")),
        }
    }
}

fn logical_op(op: LogicalOperator) -> LogicalOp {
    match op {
        LogicalOperator::And => LogicalOp::And,
        LogicalOperator::Or => LogicalOp::Or,
        LogicalOperator::Coalesce => LogicalOp::Coalesce,
    }
}

fn binary_op(op: BinaryOperator) -> Option<BinaryOp> {
    let op = match op {
        BinaryOperator::Addition => BinaryOp::Add,
        BinaryOperator::Subtraction => BinaryOp::Sub,
        BinaryOperator::Multiplication => BinaryOp::Mul,
        BinaryOperator::Division => BinaryOp::Div,
        BinaryOperator::Remainder => BinaryOp::Rem,
        BinaryOperator::Exponential => BinaryOp::Exp,
        BinaryOperator::Equality => BinaryOp::Eq,
        BinaryOperator::Inequality => BinaryOp::NotEq,
        BinaryOperator::StrictEquality => BinaryOp::StrictEq,
        BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
        BinaryOperator::LessThan => BinaryOp::Lt,
        BinaryOperator::LessEqualThan => BinaryOp::LtEq,
        BinaryOperator::GreaterThan => BinaryOp::Gt,
        BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
        BinaryOperator::In => BinaryOp::In,
        BinaryOperator::BitwiseAnd => BinaryOp::BitAnd,
        BinaryOperator::BitwiseOR => BinaryOp::BitOr,
        BinaryOperator::BitwiseXOR => BinaryOp::BitXor,
        BinaryOperator::ShiftLeft => BinaryOp::Shl,
        BinaryOperator::ShiftRight => BinaryOp::Shr,
        BinaryOperator::ShiftRightZeroFill => BinaryOp::UShr,
        _ => return None,
    };
    Some(op)
}

fn assign_op(op: AssignmentOperator) -> Option<AssignOp> {
    let op = match op {
        AssignmentOperator::Assign => AssignOp::Assign,
        AssignmentOperator::Addition => AssignOp::Arith(BinaryOp::Add),
        AssignmentOperator::Subtraction => AssignOp::Arith(BinaryOp::Sub),
        AssignmentOperator::Multiplication => AssignOp::Arith(BinaryOp::Mul),
        AssignmentOperator::Division => AssignOp::Arith(BinaryOp::Div),
        AssignmentOperator::Remainder => AssignOp::Arith(BinaryOp::Rem),
        AssignmentOperator::LogicalAnd => AssignOp::Logical(LogicalOp::And),
        AssignmentOperator::LogicalOr => AssignOp::Logical(LogicalOp::Or),
        AssignmentOperator::LogicalNullish => AssignOp::Logical(LogicalOp::Coalesce),
        _ => return None,
    };
    Some(op)
}
