//! Statement execution.
//!
//! This module provides statement execution logic for the interpreter,
//! including hoisting of `var` and function declarations.

use std::rc::Rc;

use crate::parser::ast::{StatementType, VariableDeclarationKind, VariableDeclaratorData};
use crate::runner::ds::error::{Exception, JsResult};
use crate::runner::ds::scope::{Scope, ScopeKind};
use crate::runner::ds::value::JsValue;

use super::expression::evaluate_expression;
use super::function::create_function_object;
use super::types::{Completion, CompletionType, EvalResult};

/// Collects `var` names declared in `statements`, not descending into
/// nested functions.
pub fn collect_var_names(statements: &[StatementType], names: &mut Vec<String>) {
    for statement in statements {
        collect_from_statement(statement, names);
    }
}

fn collect_from_statement(statement: &StatementType, names: &mut Vec<String>) {
    match statement {
        StatementType::VariableDeclaration {
            kind: VariableDeclarationKind::Var,
            declarations,
        } => {
            for d in declarations {
                if !names.contains(&d.id) {
                    names.push(d.id.clone());
                }
            }
        }
        StatementType::BlockStatement(body) => collect_var_names(body, names),
        StatementType::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_from_statement(consequent, names);
            if let Some(alternate) = alternate {
                collect_from_statement(alternate, names);
            }
        }
        StatementType::WhileStatement { body, .. } => collect_from_statement(body, names),
        StatementType::ForStatement { init, body, .. } => {
            if let Some(init) = init {
                collect_from_statement(init, names);
            }
            collect_from_statement(body, names);
        }
        StatementType::TryStatement {
            block,
            handler,
            finalizer,
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

/// Declares every hoisted `var` of a script or function body as `undefined`.
pub fn hoist_var_declarations(statements: &[StatementType], scope: &Rc<Scope>) -> JsResult<()> {
    let mut names = vec![];
    collect_var_names(statements, &mut names);
    for name in names {
        scope.declare_var(&name, None)?;
    }
    Ok(())
}

/// Execute a statement list. Function declarations are instantiated first.
pub fn execute_statements(statements: &[StatementType], scope: &Rc<Scope>) -> EvalResult {
    for statement in statements {
        if let StatementType::FunctionDeclaration(data) = statement {
            let function = create_function_object(data, scope);
            let name = data.name.clone().unwrap_or_default();
            if scope.kind() == ScopeKind::Block {
                scope.declare_lexical(&name, function, true)?;
            } else {
                scope.declare_var(&name, Some(function))?;
            }
        }
    }
    let mut last = Completion::normal();
    for statement in statements {
        let completion = execute_statement(statement, scope)?;
        if completion.is_abrupt() {
            return Ok(completion);
        }
        if completion.value.is_some() {
            last = completion;
        }
    }
    Ok(last)
}

/// Execute a single statement.
pub fn execute_statement(statement: &StatementType, scope: &Rc<Scope>) -> EvalResult {
    match statement {
        StatementType::EmptyStatement | StatementType::FunctionDeclaration(_) => {
            Ok(Completion::normal())
        }

        StatementType::ExpressionStatement(expression) => Ok(Completion::normal_with_value(
            evaluate_expression(expression, scope)?,
        )),

        StatementType::BlockStatement(body) => {
            let block_scope = Scope::new_block(scope);
            execute_statements(body, &block_scope)
        }

        StatementType::VariableDeclaration { kind, declarations } => {
            execute_variable_declaration(*kind, declarations, scope)?;
            Ok(Completion::normal())
        }

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
        } => {
            if evaluate_expression(test, scope)?.truthy() {
                execute_statement(consequent, scope)
            } else if let Some(alternate) = alternate {
                execute_statement(alternate, scope)
            } else {
                Ok(Completion::normal())
            }
        }

        StatementType::WhileStatement { test, body } => {
            while evaluate_expression(test, scope)?.truthy() {
                let completion = execute_statement(body, scope)?;
                match completion.completion_type {
                    CompletionType::Break => break,
                    CompletionType::Return => return Ok(completion),
                    CompletionType::Continue | CompletionType::Normal => {}
                }
            }
            Ok(Completion::normal())
        }

        StatementType::ForStatement {
            init,
            test,
            update,
            body,
        } => {
            let loop_scope = Scope::new_block(scope);
            if let Some(init) = init {
                execute_statement(init, &loop_scope)?;
            }
            loop {
                if let Some(test) = test {
                    if !evaluate_expression(test, &loop_scope)?.truthy() {
                        break;
                    }
                }
                let completion = execute_statement(body, &loop_scope)?;
                match completion.completion_type {
                    CompletionType::Break => break,
                    CompletionType::Return => return Ok(completion),
                    CompletionType::Continue | CompletionType::Normal => {}
                }
                if let Some(update) = update {
                    evaluate_expression(update, &loop_scope)?;
                }
            }
            Ok(Completion::normal())
        }

        StatementType::ReturnStatement(argument) => {
            let value = match argument {
                Some(expression) => evaluate_expression(expression, scope)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::BreakStatement => Ok(Completion::break_completion()),

        StatementType::ContinueStatement => Ok(Completion::continue_completion()),

        StatementType::ThrowStatement(argument) => {
            Err(Exception::Thrown(evaluate_expression(argument, scope)?))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
        } => {
            let mut result = execute_statements(block, &Scope::new_block(scope));
            if let (Err(exception), Some(handler)) = (&result, handler) {
                let catch_scope = Scope::new_block(scope);
                if let Some(param) = &handler.param {
                    catch_scope.declare_lexical(param, exception.clone().into_value(), true)?;
                }
                result = execute_statements(&handler.body, &catch_scope);
            }
            if let Some(finalizer) = finalizer {
                let completion = execute_statements(finalizer, &Scope::new_block(scope))?;
                // An abrupt finally replaces whatever the try or catch produced.
                if completion.is_abrupt() {
                    return Ok(completion);
                }
            }
            result
        }
    }
}

fn execute_variable_declaration(
    kind: VariableDeclarationKind,
    declarations: &[VariableDeclaratorData],
    scope: &Rc<Scope>,
) -> JsResult<()> {
    for declaration in declarations {
        let value = match &declaration.init {
            Some(init) => Some(evaluate_expression(init, scope)?),
            None => None,
        };
        match kind {
            VariableDeclarationKind::Var => scope.declare_var(&declaration.id, value)?,
            VariableDeclarationKind::Let => scope.declare_lexical(
                &declaration.id,
                value.unwrap_or(JsValue::Undefined),
                true,
            )?,
            VariableDeclarationKind::Const => scope.declare_lexical(
                &declaration.id,
                value.unwrap_or(JsValue::Undefined),
                false,
            )?,
        }
    }
    Ok(())
}
