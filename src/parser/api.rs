use std::rc::Rc;

use pest::error::{Error, ErrorVariant};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::{Parser, Span};
use pest_derive::Parser;

use super::ast::*;

#[derive(Parser)]
#[grammar = "parser/js_grammar.pest"] // relative to src
pub struct JsParser;

lazy_static! {
    /// Binary operator precedence, lowest first.
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left));
}

type ParseResult<T> = Result<T, Error<Rule>>;

impl JsParser {
    /// Parses a whole script into its AST.
    pub fn parse_to_ast_from_str(script: &str) -> ParseResult<ProgramData> {
        let mut pairs = JsParser::parse(Rule::script, script)?;
        let body = match pairs.next() {
            Some(script_pair) => build_statement_list(script_pair.into_inner())?,
            None => vec![],
        };
        Ok(ProgramData { body })
    }
}

fn custom_error(span: Span, message: &str) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        span,
    )
}

fn get_unexpected_error(pair: &Pair<Rule>) -> Error<Rule> {
    custom_error(
        pair.as_span(),
        &format!("Unexpected {:?} in this position", pair.as_rule()),
    )
}

fn only_child(pair: Pair<Rule>) -> ParseResult<Pair<Rule>> {
    let span = pair.as_span();
    pair.into_inner()
        .next()
        .ok_or_else(|| custom_error(span, "Expected a child node"))
}

fn is_keyword_token(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::function_kw
            | Rule::return_kw
            | Rule::if_kw
            | Rule::else_kw
            | Rule::while_kw
            | Rule::for_kw
            | Rule::break_kw
            | Rule::continue_kw
            | Rule::throw_kw
            | Rule::try_kw
            | Rule::catch_kw
            | Rule::finally_kw
            | Rule::new_kw
    )
}

/// Children of `pair` with keyword tokens dropped.
fn significant_children(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword_token(p.as_rule()))
}

fn build_statement_list(pairs: Pairs<Rule>) -> ParseResult<Vec<StatementType>> {
    let mut statements = vec![];
    for pair in pairs {
        match pair.as_rule() {
            Rule::statement => statements.push(build_statement(pair)?),
            Rule::EOI => {}
            _ => return Err(get_unexpected_error(&pair)),
        }
    }
    Ok(statements)
}

fn build_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let inner = only_child(pair)?;
    match inner.as_rule() {
        Rule::block => Ok(StatementType::BlockStatement(build_statement_list(
            inner.into_inner(),
        )?)),
        Rule::empty_statement => Ok(StatementType::EmptyStatement),
        Rule::variable_statement => build_variable_declaration(only_child(inner)?),
        Rule::function_declaration => Ok(StatementType::FunctionDeclaration(Rc::new(
            build_function(inner, false)?,
        ))),
        Rule::if_statement => build_if_statement(inner),
        Rule::while_statement => {
            let span = inner.as_span();
            let mut children = significant_children(inner);
            let test = children.next().ok_or_else(|| custom_error(span, "Missing loop test"))?;
            let body = children.next().ok_or_else(|| custom_error(span, "Missing loop body"))?;
            Ok(StatementType::WhileStatement {
                test: build_expression(test)?,
                body: Box::new(build_statement(body)?),
            })
        }
        Rule::for_statement => build_for_statement(inner),
        Rule::return_statement => {
            let argument = match significant_children(inner).next() {
                Some(expression) => Some(build_expression(expression)?),
                None => None,
            };
            Ok(StatementType::ReturnStatement(argument))
        }
        Rule::break_statement => Ok(StatementType::BreakStatement),
        Rule::continue_statement => Ok(StatementType::ContinueStatement),
        Rule::throw_statement => {
            let span = inner.as_span();
            let argument = significant_children(inner)
                .next()
                .ok_or_else(|| custom_error(span, "Missing thrown expression"))?;
            Ok(StatementType::ThrowStatement(build_expression(argument)?))
        }
        Rule::try_statement => build_try_statement(inner),
        Rule::expression_statement => Ok(StatementType::ExpressionStatement(build_expression(
            only_child(inner)?,
        )?)),
        _ => Err(get_unexpected_error(&inner)),
    }
}

fn build_variable_declaration(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let mut kind = VariableDeclarationKind::Var;
    let mut declarations = vec![];
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::declaration_kind => {
                kind = match child.as_str() {
                    "let" => VariableDeclarationKind::Let,
                    "const" => VariableDeclarationKind::Const,
                    _ => VariableDeclarationKind::Var,
                }
            }
            Rule::variable_declarator => {
                let mut parts = child.into_inner();
                let id = match parts.next() {
                    Some(id) => id.as_str().to_string(),
                    None => continue,
                };
                let init = match parts.next() {
                    Some(value) => Some(build_assignment(value)?),
                    None => None,
                };
                declarations.push(VariableDeclaratorData { id, init });
            }
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    Ok(StatementType::VariableDeclaration { kind, declarations })
}

fn build_if_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let span = pair.as_span();
    let mut children = significant_children(pair);
    let test = children.next().ok_or_else(|| custom_error(span, "Missing if test"))?;
    let consequent = children
        .next()
        .ok_or_else(|| custom_error(span, "Missing if body"))?;
    let alternate = match children.next() {
        Some(statement) => Some(Box::new(build_statement(statement)?)),
        None => None,
    };
    Ok(StatementType::IfStatement {
        test: build_expression(test)?,
        consequent: Box::new(build_statement(consequent)?),
        alternate,
    })
}

fn build_for_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let span = pair.as_span();
    let mut init = None;
    let mut test = None;
    let mut update = None;
    let mut body = None;
    for child in significant_children(pair) {
        match child.as_rule() {
            Rule::for_init => {
                let inner = only_child(child)?;
                init = Some(Box::new(match inner.as_rule() {
                    Rule::variable_declaration => build_variable_declaration(inner)?,
                    _ => StatementType::ExpressionStatement(build_expression(inner)?),
                }));
            }
            Rule::for_test => test = Some(build_expression(only_child(child)?)?),
            Rule::for_update => update = Some(build_expression(only_child(child)?)?),
            Rule::statement => body = Some(Box::new(build_statement(child)?)),
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    Ok(StatementType::ForStatement {
        init,
        test,
        update,
        body: body.ok_or_else(|| custom_error(span, "Missing loop body"))?,
    })
}

fn build_try_statement(pair: Pair<Rule>) -> ParseResult<StatementType> {
    let mut block = vec![];
    let mut handler = None;
    let mut finalizer = None;
    for child in significant_children(pair) {
        match child.as_rule() {
            Rule::block => block = build_statement_list(child.into_inner())?,
            Rule::catch_clause => {
                let mut param = None;
                let mut body = vec![];
                for part in significant_children(child) {
                    match part.as_rule() {
                        Rule::identifier => param = Some(part.as_str().to_string()),
                        Rule::block => body = build_statement_list(part.into_inner())?,
                        _ => return Err(get_unexpected_error(&part)),
                    }
                }
                handler = Some(CatchClauseData { param, body });
            }
            Rule::finally_clause => {
                let inner = significant_children(child).next();
                finalizer = Some(match inner {
                    Some(b) => build_statement_list(b.into_inner())?,
                    None => vec![],
                });
            }
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    Ok(StatementType::TryStatement {
        block,
        handler,
        finalizer,
    })
}

fn build_function(pair: Pair<Rule>, is_arrow: bool) -> ParseResult<FunctionData> {
    let mut name = None;
    let mut params = vec![];
    let mut body = FunctionBodyOrExpression::FunctionBody(vec![]);
    for child in significant_children(pair) {
        match child.as_rule() {
            Rule::identifier => name = Some(child.as_str().to_string()),
            Rule::formal_parameters => params = build_parameters(child),
            Rule::function_body => {
                body = FunctionBodyOrExpression::FunctionBody(build_statement_list(
                    child.into_inner(),
                )?)
            }
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    Ok(FunctionData {
        name,
        params,
        body,
        is_arrow,
    })
}

fn build_parameters(pair: Pair<Rule>) -> Vec<String> {
    pair.into_inner().map(|p| p.as_str().to_string()).collect()
}

fn build_arrow_function(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let mut params = vec![];
    let mut body = FunctionBodyOrExpression::FunctionBody(vec![]);
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::arrow_parameters => {
                let inner = only_child(child)?;
                params = match inner.as_rule() {
                    Rule::identifier => vec![inner.as_str().to_string()],
                    _ => build_parameters(inner),
                };
            }
            Rule::function_body => {
                body = FunctionBodyOrExpression::FunctionBody(build_statement_list(
                    child.into_inner(),
                )?)
            }
            Rule::assignment => {
                body = FunctionBodyOrExpression::Expression(Box::new(build_assignment(child)?))
            }
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    Ok(ExpressionType::FunctionExpression(Rc::new(FunctionData {
        name: None,
        params,
        body,
        is_arrow: true,
    })))
}

fn build_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let mut expressions = pair
        .into_inner()
        .map(build_assignment)
        .collect::<ParseResult<Vec<_>>>()?;
    if expressions.len() == 1 {
        Ok(expressions.remove(0))
    } else {
        Ok(ExpressionType::SequenceExpression(expressions))
    }
}

fn build_assignment(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let mut children = pair.into_inner();
    let first = children
        .next()
        .ok_or_else(|| custom_error(span, "Empty expression"))?;
    if first.as_rule() == Rule::arrow_function {
        return build_arrow_function(first);
    }
    let left = build_conditional(first)?;
    let operator = match children.next() {
        Some(op) => op,
        None => return Ok(left),
    };
    if !left.is_assignment_target() {
        return Err(custom_error(span, "Invalid left-hand side in assignment"));
    }
    let operator = match operator.as_str() {
        "+=" => AssignmentOperator::AddEquals,
        "-=" => AssignmentOperator::SubtractEquals,
        "*=" => AssignmentOperator::MultiplyEquals,
        "/=" => AssignmentOperator::DivideEquals,
        "%=" => AssignmentOperator::ModuloEquals,
        _ => AssignmentOperator::Equals,
    };
    let right = children
        .next()
        .ok_or_else(|| custom_error(span, "Missing assigned value"))?;
    Ok(ExpressionType::AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(build_assignment(right)?),
    })
}

fn build_conditional(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let mut children = pair.into_inner();
    let test = match children.next() {
        Some(binary) => build_binary(binary)?,
        None => return Err(custom_error(span, "Empty conditional")),
    };
    match (children.next(), children.next()) {
        (Some(consequent), Some(alternate)) => Ok(ExpressionType::ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(build_assignment(consequent)?),
            alternate: Box::new(build_assignment(alternate)?),
        }),
        _ => Ok(test),
    }
}

fn build_binary(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    PRATT_PARSER
        .map_primary(build_unary)
        .map_infix(|lhs, op, rhs| {
            let left = Box::new(lhs?);
            let right = Box::new(rhs?);
            let operator = match op.as_rule() {
                Rule::and => {
                    return Ok(ExpressionType::LogicalExpression {
                        operator: LogicalOperator::And,
                        left,
                        right,
                    })
                }
                Rule::or => {
                    return Ok(ExpressionType::LogicalExpression {
                        operator: LogicalOperator::Or,
                        left,
                        right,
                    })
                }
                Rule::strict_eq => BinaryOperator::StrictlyEqual,
                Rule::strict_ne => BinaryOperator::StrictlyUnequal,
                Rule::eq => BinaryOperator::LooselyEqual,
                Rule::ne => BinaryOperator::LooselyUnequal,
                Rule::lt => BinaryOperator::LessThan,
                Rule::le => BinaryOperator::LessThanEqual,
                Rule::gt => BinaryOperator::GreaterThan,
                Rule::ge => BinaryOperator::GreaterThanEqual,
                Rule::add => BinaryOperator::Add,
                Rule::sub => BinaryOperator::Subtract,
                Rule::mul => BinaryOperator::Multiply,
                Rule::div => BinaryOperator::Divide,
                Rule::rem => BinaryOperator::Modulo,
                _ => return Err(get_unexpected_error(&op)),
            };
            Ok(ExpressionType::BinaryExpression {
                operator,
                left,
                right,
            })
        })
        .parse(pair.into_inner())
}

fn build_unary(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let mut prefix = vec![];
    let mut update = None;
    let mut postfix = None;
    let mut operand = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::unary_operator => prefix.push(match child.as_str().trim() {
                "!" => UnaryOperator::LogicalNot,
                "-" => UnaryOperator::Minus,
                "+" => UnaryOperator::Plus,
                _ => UnaryOperator::TypeOf,
            }),
            Rule::update_operator => update = Some(update_operator(child.as_str())),
            Rule::postfix_operator => postfix = Some(update_operator(child.as_str())),
            Rule::call_expression => operand = Some(build_call_expression(child)?),
            _ => return Err(get_unexpected_error(&child)),
        }
    }
    let mut expression = operand.ok_or_else(|| custom_error(span, "Missing operand"))?;
    if update.is_some() || postfix.is_some() {
        if !expression.is_assignment_target() {
            return Err(custom_error(
                span,
                "Invalid left-hand side expression in update operation",
            ));
        }
        let (operator, prefix) = match (update, postfix) {
            (Some(op), None) => (op, true),
            (None, Some(op)) => (op, false),
            _ => return Err(custom_error(span, "Invalid update expression")),
        };
        expression = ExpressionType::UpdateExpression {
            operator,
            prefix,
            argument: Box::new(expression),
        };
    }
    for operator in prefix.into_iter().rev() {
        expression = ExpressionType::UnaryExpression {
            operator,
            argument: Box::new(expression),
        };
    }
    Ok(expression)
}

fn update_operator(text: &str) -> UpdateOperator {
    if text == "--" {
        UpdateOperator::Decrement
    } else {
        UpdateOperator::Increment
    }
}

fn build_call_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let mut children = pair.into_inner();
    let primary = children
        .next()
        .ok_or_else(|| custom_error(span, "Missing expression"))?;
    let mut expression = build_primary(primary)?;
    for suffix in children {
        expression = apply_suffix(expression, suffix)?;
    }
    Ok(expression)
}

fn apply_suffix(expression: ExpressionType, suffix: Pair<Rule>) -> ParseResult<ExpressionType> {
    Ok(match suffix.as_rule() {
        Rule::member_access => ExpressionType::MemberExpression {
            object: Box::new(expression),
            property: MemberProperty::Static(only_child(suffix)?.as_str().to_string()),
        },
        Rule::computed_access => ExpressionType::MemberExpression {
            object: Box::new(expression),
            property: MemberProperty::Computed(Box::new(build_expression(only_child(suffix)?)?)),
        },
        Rule::arguments => ExpressionType::CallExpression {
            callee: Box::new(expression),
            arguments: build_arguments(suffix)?,
        },
        _ => return Err(get_unexpected_error(&suffix)),
    })
}

fn build_arguments(pair: Pair<Rule>) -> ParseResult<Vec<ExpressionType>> {
    pair.into_inner().map(build_assignment).collect()
}

/// `new a.b.C(x).y` constructs `a.b.C` with `(x)` and then reads `.y`.
fn build_new_expression(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    let span = pair.as_span();
    let target = significant_children(pair)
        .next()
        .ok_or_else(|| custom_error(span, "Missing constructor"))?;
    let mut children = target.into_inner();
    let primary = children
        .next()
        .ok_or_else(|| custom_error(span, "Missing constructor"))?;
    let mut callee = build_primary(primary)?;
    let mut constructed = None;
    for suffix in children {
        match constructed {
            Some(expression) => constructed = Some(apply_suffix(expression, suffix)?),
            None if suffix.as_rule() == Rule::arguments => {
                constructed = Some(ExpressionType::NewExpression {
                    callee: Box::new(callee),
                    arguments: build_arguments(suffix)?,
                });
                callee = ExpressionType::ThisExpression;
            }
            None => callee = apply_suffix(callee, suffix)?,
        }
    }
    Ok(match constructed {
        Some(expression) => expression,
        None => ExpressionType::NewExpression {
            callee: Box::new(callee),
            arguments: vec![],
        },
    })
}

fn build_primary(pair: Pair<Rule>) -> ParseResult<ExpressionType> {
    Ok(match pair.as_rule() {
        Rule::function_expression => {
            ExpressionType::FunctionExpression(Rc::new(build_function(pair, false)?))
        }
        Rule::new_expression => build_new_expression(pair)?,
        Rule::null_kw => ExpressionType::Literal(LiteralType::NullLiteral),
        Rule::undefined_kw => ExpressionType::Literal(LiteralType::UndefinedLiteral),
        Rule::true_kw => ExpressionType::Literal(LiteralType::BooleanLiteral(true)),
        Rule::false_kw => ExpressionType::Literal(LiteralType::BooleanLiteral(false)),
        Rule::this_kw => ExpressionType::ThisExpression,
        Rule::number => ExpressionType::Literal(LiteralType::NumberLiteral(parse_number(&pair)?)),
        Rule::string => ExpressionType::Literal(LiteralType::StringLiteral(string_value(pair))),
        Rule::array_literal => ExpressionType::ArrayExpression(
            pair.into_inner()
                .map(build_assignment)
                .collect::<ParseResult<Vec<_>>>()?,
        ),
        Rule::object_literal => {
            let mut properties = vec![];
            for property in pair.into_inner() {
                let span = property.as_span();
                let mut parts = property.into_inner();
                let key = parts
                    .next()
                    .ok_or_else(|| custom_error(span, "Missing property name"))?;
                let (name, value) = match key.as_rule() {
                    Rule::identifier => (
                        key.as_str().to_string(),
                        ExpressionType::Identifier(key.as_str().to_string()),
                    ),
                    rule => {
                        let name = match rule {
                            Rule::string => string_value(key),
                            Rule::number => number_to_key(parse_number(&key)?),
                            _ => key.as_str().to_string(),
                        };
                        let value = parts
                            .next()
                            .ok_or_else(|| custom_error(span, "Missing property value"))?;
                        (name, build_assignment(value)?)
                    }
                };
                properties.push((name, value));
            }
            ExpressionType::ObjectExpression(properties)
        }
        Rule::identifier => ExpressionType::Identifier(pair.as_str().to_string()),
        Rule::parenthesized => build_expression(only_child(pair)?)?,
        _ => return Err(get_unexpected_error(&pair)),
    })
}

fn parse_number(pair: &Pair<Rule>) -> ParseResult<f64> {
    let text = pair.as_str();
    let parsed = if text.starts_with("0x") || text.starts_with("0X") {
        u64::from_str_radix(&text[2..], 16).ok().map(|n| n as f64)
    } else {
        text.parse::<f64>().ok()
    };
    parsed.ok_or_else(|| custom_error(pair.as_span(), "Invalid numeric literal"))
}

fn number_to_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn string_value(pair: Pair<Rule>) -> String {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    unescape(raw)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex);
            }
            // Line continuation.
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push('\u{FFFD}'),
    }
}
