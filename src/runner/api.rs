use std::rc::Rc;

use log::trace;

use crate::parser::ast::ProgramData;
use crate::parser::JsParser;
use crate::runner::ds::error::{Exception, JErrorType};
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::statement::{execute_statements, hoist_var_declarations};
use crate::runner::plugin::resolver::PropertyResolver;

/// Runs a parsed program as a classic script.
///
/// Free identifiers resolve through `global`; top-level `var` and function
/// declarations become its properties. `this` is the value scripts see at
/// the top level. Returns the completion value of the last expression
/// statement.
pub fn run_program(
    program: &ProgramData,
    global: Rc<dyn PropertyResolver>,
    this: JsValue,
) -> Result<JsValue, JErrorType> {
    trace!("running program of {} statements on {}", program.body.len(), global.name());
    let scope = Scope::new_script(global, this);
    hoist_var_declarations(&program.body, &scope).map_err(Exception::into_error)?;
    let completion = execute_statements(&program.body, &scope).map_err(Exception::into_error)?;
    Ok(completion.get_value())
}

/// Parses and runs `source`. Parse failures are `SyntaxError`s.
pub fn run_script(
    source: &str,
    global: Rc<dyn PropertyResolver>,
    this: JsValue,
) -> Result<JsValue, JErrorType> {
    let program = parse_script(source)?;
    run_program(&program, global, this)
}

pub fn parse_script(source: &str) -> Result<ProgramData, JErrorType> {
    JsParser::parse_to_ast_from_str(source).map_err(|e| JErrorType::SyntaxError(e.to_string()))
}
