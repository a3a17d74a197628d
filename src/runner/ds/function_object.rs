use std::rc::Rc;

use crate::parser::ast::FunctionData;
use crate::runner::ds::error::JsResult;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::JsValue;

/// Signature of every built-in: receiver, then arguments.
pub type NativeFunction = Rc<dyn Fn(JsValue, Vec<JsValue>) -> JsResult<JsValue>>;

#[derive(Clone)]
pub enum JsFunction {
    Script {
        data: Rc<FunctionData>,
        closure: Rc<Scope>,
    },
    Native {
        name: String,
        call: NativeFunction,
        constructor: bool,
    },
    Bound {
        target: JsObjectType,
        this: JsValue,
        args: Vec<JsValue>,
    },
}

impl JsFunction {
    pub fn native<F>(name: &str, f: F) -> Self
    where
        F: Fn(JsValue, Vec<JsValue>) -> JsResult<JsValue> + 'static,
    {
        JsFunction::Native {
            name: name.to_string(),
            call: Rc::new(f),
            constructor: false,
        }
    }

    pub fn native_constructor<F>(name: &str, f: F) -> Self
    where
        F: Fn(JsValue, Vec<JsValue>) -> JsResult<JsValue> + 'static,
    {
        JsFunction::Native {
            name: name.to_string(),
            call: Rc::new(f),
            constructor: true,
        }
    }

    pub fn name(&self) -> String {
        match self {
            JsFunction::Script { data, .. } => data.name.clone().unwrap_or_default(),
            JsFunction::Native { name, .. } => name.clone(),
            JsFunction::Bound { target, .. } => match target.borrow().as_function() {
                Some(f) => format!("bound {}", f.name()),
                None => "bound".to_string(),
            },
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            JsFunction::Script { data, .. } => data.params.len(),
            _ => 0,
        }
    }
}
