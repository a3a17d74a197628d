use thiserror::Error;

use crate::runner::ds::object::object_from_entries;
use crate::runner::ds::value::JsValue;

/// Errors that escape a script run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JErrorType {
    #[error("Uncaught reference error: {0}.")]
    ReferenceError(String),
    #[error("Uncaught type error: {0}.")]
    TypeError(String),
    #[error("Uncaught range error: {0}.")]
    RangeError(String),
    #[error("Uncaught syntax error: {0}.")]
    SyntaxError(String),
    /// A value thrown by script code, rendered as text.
    #[error("Uncaught {0}")]
    Thrown(String),
}

impl JErrorType {
    pub fn name(&self) -> &'static str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::Thrown(_) => "Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m)
            | JErrorType::Thrown(m) => m,
        }
    }
}

/// Abrupt completion inside the interpreter. Thrown values keep their
/// identity until they leave the script.
#[derive(Debug, Clone)]
pub enum Exception {
    Error(JErrorType),
    Thrown(JsValue),
}

impl Exception {
    /// The value a `catch` clause binds.
    pub fn into_value(self) -> JsValue {
        match self {
            Exception::Thrown(value) => value,
            Exception::Error(error) => object_from_entries([
                ("name", JsValue::from(error.name())),
                ("message", JsValue::from(error.message())),
            ]),
        }
    }

    pub fn into_error(self) -> JErrorType {
        match self {
            Exception::Error(error) => error,
            Exception::Thrown(value) => JErrorType::Thrown(value.to_display()),
        }
    }
}

impl From<JErrorType> for Exception {
    fn from(error: JErrorType) -> Self {
        Exception::Error(error)
    }
}

pub type JsResult<T> = Result<T, Exception>;
