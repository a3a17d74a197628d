//! Expression evaluation.
//!
//! This module provides the core expression evaluation logic for the interpreter.
//! It handles all expression types defined in the AST.

use std::rc::Rc;

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, ExpressionType, LiteralType, LogicalOperator,
    MemberProperty, UnaryOperator, UpdateOperator,
};
use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{
    get_value_property, new_array_value, set_value_property, to_property_key, JsObject,
};
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::JsValue;

use super::function::{call_function, construct, create_function_object};
use super::types::{Reference, ValueResult};

/// Evaluate an expression and return its value.
pub fn evaluate_expression(expr: &ExpressionType, scope: &Rc<Scope>) -> ValueResult {
    match expr {
        ExpressionType::Literal(lit) => Ok(evaluate_literal(lit)),

        ExpressionType::Identifier(name) => scope.lookup(name),

        ExpressionType::ThisExpression => Ok(scope.this_value()),

        ExpressionType::ArrayExpression(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(evaluate_expression(element, scope)?);
            }
            Ok(new_array_value(items))
        }

        ExpressionType::ObjectExpression(properties) => {
            let mut object = JsObject::new_ordinary();
            for (key, value) in properties {
                let value = evaluate_expression(value, scope)?;
                object.properties.insert(key.clone(), value);
            }
            Ok(JsValue::from_object(object))
        }

        ExpressionType::FunctionExpression(data) => Ok(create_function_object(data, scope)),

        ExpressionType::UnaryExpression { operator, argument } => {
            evaluate_unary_expression(*operator, argument, scope)
        }

        ExpressionType::UpdateExpression {
            operator,
            prefix,
            argument,
        } => evaluate_update_expression(*operator, *prefix, argument, scope),

        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
        } => {
            let left = evaluate_expression(left, scope)?;
            let right = evaluate_expression(right, scope)?;
            Ok(apply_binary_operator(*operator, &left, &right))
        }

        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
        } => {
            let left = evaluate_expression(left, scope)?;
            match operator {
                LogicalOperator::And if !left.truthy() => Ok(left),
                LogicalOperator::Or if left.truthy() => Ok(left),
                _ => evaluate_expression(right, scope),
            }
        }

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
        } => {
            if evaluate_expression(test, scope)?.truthy() {
                evaluate_expression(consequent, scope)
            } else {
                evaluate_expression(alternate, scope)
            }
        }

        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
        } => evaluate_assignment_expression(*operator, left, right, scope),

        ExpressionType::MemberExpression { object, property } => {
            let base = evaluate_expression(object, scope)?;
            let key = evaluate_member_key(property, scope)?;
            get_value_property(&base, &key)
        }

        ExpressionType::CallExpression { callee, arguments } => {
            evaluate_call_expression(callee, arguments, scope)
        }

        ExpressionType::NewExpression { callee, arguments } => {
            let constructor = evaluate_expression(callee, scope)?;
            let args = evaluate_arguments(arguments, scope)?;
            if !constructor.is_callable() {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a constructor",
                    describe(callee)
                ))
                .into());
            }
            construct(&constructor, args)
        }

        ExpressionType::SequenceExpression(expressions) => {
            let mut value = JsValue::Undefined;
            for expression in expressions {
                value = evaluate_expression(expression, scope)?;
            }
            Ok(value)
        }
    }
}

fn evaluate_literal(lit: &LiteralType) -> JsValue {
    match lit {
        LiteralType::UndefinedLiteral => JsValue::Undefined,
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::NumberLiteral(n) => JsValue::Number(*n),
        LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
    }
}

fn evaluate_member_key(property: &MemberProperty, scope: &Rc<Scope>) -> JsResult<String> {
    match property {
        MemberProperty::Static(name) => Ok(name.clone()),
        MemberProperty::Computed(expression) => {
            Ok(to_property_key(&evaluate_expression(expression, scope)?))
        }
    }
}

fn evaluate_arguments(arguments: &[ExpressionType], scope: &Rc<Scope>) -> JsResult<Vec<JsValue>> {
    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        args.push(evaluate_expression(argument, scope)?);
    }
    Ok(args)
}

/// Resolve an assignment target without reading it.
fn evaluate_reference(
    expr: &ExpressionType,
    scope: &Rc<Scope>,
) -> JsResult<Reference> {
    match expr {
        ExpressionType::Identifier(name) => Ok(Reference::Binding(name.clone())),
        ExpressionType::MemberExpression { object, property } => {
            let base = evaluate_expression(object, scope)?;
            let key = evaluate_member_key(property, scope)?;
            Ok(Reference::Property { base, key })
        }
        _ => Err(JErrorType::SyntaxError("Invalid assignment target".to_string()).into()),
    }
}

fn get_reference_value(reference: &Reference, scope: &Rc<Scope>) -> ValueResult {
    match reference {
        Reference::Binding(name) => scope.lookup(name),
        Reference::Property { base, key } => get_value_property(base, key),
    }
}

fn put_reference_value(reference: &Reference, value: JsValue, scope: &Rc<Scope>) -> ValueResult {
    match reference {
        Reference::Binding(name) => scope.assign(name, value.clone())?,
        Reference::Property { base, key } => set_value_property(base, key, value.clone())?,
    }
    Ok(value)
}

fn evaluate_unary_expression(
    operator: UnaryOperator,
    argument: &ExpressionType,
    scope: &Rc<Scope>,
) -> ValueResult {
    if operator == UnaryOperator::TypeOf {
        // `typeof undeclared` is not an error.
        if let ExpressionType::Identifier(name) = argument {
            return Ok(JsValue::from(match scope.try_lookup(name)? {
                Some(value) => value.type_of(),
                None => "undefined",
            }));
        }
        return Ok(JsValue::from(evaluate_expression(argument, scope)?.type_of()));
    }
    let value = evaluate_expression(argument, scope)?;
    Ok(match operator {
        UnaryOperator::Minus => JsValue::Number(-value.to_number()),
        UnaryOperator::Plus => JsValue::Number(value.to_number()),
        UnaryOperator::LogicalNot => JsValue::Boolean(!value.truthy()),
        UnaryOperator::TypeOf => JsValue::from(value.type_of()),
    })
}

fn evaluate_update_expression(
    operator: UpdateOperator,
    prefix: bool,
    argument: &ExpressionType,
    scope: &Rc<Scope>,
) -> ValueResult {
    let reference = evaluate_reference(argument, scope)?;
    let old = get_reference_value(&reference, scope)?.to_number();
    let new = match operator {
        UpdateOperator::Increment => old + 1.0,
        UpdateOperator::Decrement => old - 1.0,
    };
    put_reference_value(&reference, JsValue::Number(new), scope)?;
    Ok(JsValue::Number(if prefix { new } else { old }))
}

fn evaluate_assignment_expression(
    operator: AssignmentOperator,
    left: &ExpressionType,
    right: &ExpressionType,
    scope: &Rc<Scope>,
) -> ValueResult {
    let reference = evaluate_reference(left, scope)?;
    let value = match operator.binary_operator() {
        None => evaluate_expression(right, scope)?,
        Some(binary) => {
            let current = get_reference_value(&reference, scope)?;
            let rhs = evaluate_expression(right, scope)?;
            apply_binary_operator(binary, &current, &rhs)
        }
    };
    put_reference_value(&reference, value, scope)
}

fn evaluate_call_expression(
    callee: &ExpressionType,
    arguments: &[ExpressionType],
    scope: &Rc<Scope>,
) -> ValueResult {
    let (function, this) = match callee {
        ExpressionType::MemberExpression { object, property } => {
            let base = evaluate_expression(object, scope)?;
            let key = evaluate_member_key(property, scope)?;
            (get_value_property(&base, &key)?, base)
        }
        _ => (evaluate_expression(callee, scope)?, JsValue::Undefined),
    };
    let args = evaluate_arguments(arguments, scope)?;
    if !function.is_callable() {
        return Err(JErrorType::TypeError(format!("{} is not a function", describe(callee))).into());
    }
    call_function(&function, this, args)
}

/// Source-like text for an expression, used in error messages.
fn describe(expr: &ExpressionType) -> String {
    match expr {
        ExpressionType::Identifier(name) => name.clone(),
        ExpressionType::ThisExpression => "this".to_string(),
        ExpressionType::MemberExpression { object, property } => match property {
            MemberProperty::Static(name) => format!("{}.{}", describe(object), name),
            MemberProperty::Computed(_) => format!("{}[...]", describe(object)),
        },
        ExpressionType::CallExpression { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

/// Applies a binary operator to two evaluated operands.
pub fn apply_binary_operator(operator: BinaryOperator, left: &JsValue, right: &JsValue) -> JsValue {
    match operator {
        BinaryOperator::Add => {
            let concatenates = matches!(left, JsValue::String(_) | JsValue::Object(_))
                || matches!(right, JsValue::String(_) | JsValue::Object(_));
            if concatenates {
                JsValue::String(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                JsValue::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOperator::Subtract => JsValue::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => JsValue::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => JsValue::Number(left.to_number() / right.to_number()),
        BinaryOperator::Modulo => JsValue::Number(left.to_number() % right.to_number()),
        BinaryOperator::StrictlyEqual => JsValue::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictlyUnequal => JsValue::Boolean(!left.strict_equals(right)),
        BinaryOperator::LooselyEqual => JsValue::Boolean(left.loose_equals(right)),
        BinaryOperator::LooselyUnequal => JsValue::Boolean(!left.loose_equals(right)),
        BinaryOperator::LessThan
        | BinaryOperator::LessThanEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanEqual => JsValue::Boolean(compare(operator, left, right)),
    }
}

fn compare(operator: BinaryOperator, left: &JsValue, right: &JsValue) -> bool {
    if let (JsValue::String(a), JsValue::String(b)) = (left, right) {
        return match operator {
            BinaryOperator::LessThan => a < b,
            BinaryOperator::LessThanEqual => a <= b,
            BinaryOperator::GreaterThan => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    // Comparisons with NaN are false.
    match operator {
        BinaryOperator::LessThan => a < b,
        BinaryOperator::LessThanEqual => a <= b,
        BinaryOperator::GreaterThan => a > b,
        _ => a >= b,
    }
}
