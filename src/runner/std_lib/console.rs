//! Console built-in object.
//!
//! `console.*` calls go to the `log` facade under the `sandbox::console`
//! target, so the embedding application decides where they end up.

use log::{debug, error, info, warn};

use crate::runner::ds::error::JsResult;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::BuiltInObject;

const TARGET: &str = "sandbox::console";

/// Register the console object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let console = BuiltInObject::new("console")
        .add_method("log", console_log)
        .add_method("info", console_info)
        .add_method("warn", console_warn)
        .add_method("error", console_error)
        .add_method("debug", console_debug);

    registry.register_object(console);
}

/// Format all arguments for console output.
fn format_args(args: &[JsValue]) -> String {
    args.iter()
        .map(|v| v.to_display())
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    info!(target: TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_info(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    info!(target: TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_warn(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    warn!(target: TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_error(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    error!(target: TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_debug(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    debug!(target: TARGET, "{}", format_args(&args));
    Ok(JsValue::Undefined)
}
