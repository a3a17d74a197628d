//! Lexical scopes. The outermost lookup goes to a [`PropertyResolver`], which
//! is how a sandbox substitutes its own global object.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PropertyResolver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeKind {
    Script,
    Function,
    Block,
}

struct Binding {
    value: JsValue,
    mutable: bool,
}

pub struct Scope {
    kind: ScopeKind,
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
    global: Rc<dyn PropertyResolver>,
    this: JsValue,
    global_this: JsValue,
}

impl Scope {
    pub fn new_script(global: Rc<dyn PropertyResolver>, global_this: JsValue) -> Rc<Scope> {
        Rc::new(Scope {
            kind: ScopeKind::Script,
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            global,
            this: global_this.clone(),
            global_this,
        })
    }

    /// A call frame. Sloppy-mode calls without a receiver see the global object.
    pub fn new_function(parent: &Rc<Scope>, this: JsValue) -> Rc<Scope> {
        let this = if this.is_nullish() {
            parent.global_this.clone()
        } else {
            this
        };
        Rc::new(Scope {
            kind: ScopeKind::Function,
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            global: parent.global.clone(),
            this,
            global_this: parent.global_this.clone(),
        })
    }

    pub fn new_block(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            kind: ScopeKind::Block,
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            global: parent.global.clone(),
            this: parent.this.clone(),
            global_this: parent.global_this.clone(),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn this_value(&self) -> JsValue {
        self.this.clone()
    }

    pub fn global(&self) -> &Rc<dyn PropertyResolver> {
        &self.global
    }

    /// `let`/`const` binding in this scope.
    pub fn declare_lexical(&self, name: &str, value: JsValue, mutable: bool) -> JsResult<()> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) && self.kind == ScopeKind::Block {
            return Err(JErrorType::SyntaxError(format!(
                "Identifier '{}' has already been declared",
                name
            ))
            .into());
        }
        bindings.insert(name.to_string(), Binding { value, mutable });
        Ok(())
    }

    /// `var` and function declarations land in the nearest function scope;
    /// at script level they become properties of the global object.
    /// Without an initializer an existing binding keeps its value.
    pub fn declare_var(&self, name: &str, value: Option<JsValue>) -> JsResult<()> {
        match self.kind {
            ScopeKind::Block => match &self.parent {
                Some(parent) => parent.declare_var(name, value),
                None => Ok(()),
            },
            ScopeKind::Function => {
                let mut bindings = self.bindings.borrow_mut();
                match value {
                    Some(value) => {
                        bindings.insert(
                            name.to_string(),
                            Binding {
                                value,
                                mutable: true,
                            },
                        );
                    }
                    None => {
                        bindings.entry(name.to_string()).or_insert(Binding {
                            value: JsValue::Undefined,
                            mutable: true,
                        });
                    }
                }
                Ok(())
            }
            ScopeKind::Script => match value {
                Some(value) => self.global.set(name, value),
                None => {
                    if self.global.has(name) {
                        Ok(())
                    } else {
                        self.global.set(name, JsValue::Undefined)
                    }
                }
            },
        }
    }

    fn local(&self, name: &str) -> Option<JsValue> {
        self.bindings.borrow().get(name).map(|b| b.value.clone())
    }

    /// Resolves an identifier, `None` when nothing in the chain knows it.
    pub fn try_lookup(&self, name: &str) -> JsResult<Option<JsValue>> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.local(name) {
                return Ok(Some(value));
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => break,
            }
        }
        if self.global.has(name) {
            Ok(Some(self.global.get(name)?))
        } else {
            Ok(None)
        }
    }

    pub fn lookup(&self, name: &str) -> JsResult<JsValue> {
        match self.try_lookup(name)? {
            Some(value) => Ok(value),
            None => Err(JErrorType::ReferenceError(format!("{} is not defined", name)).into()),
        }
    }

    /// Assignment to an identifier. Undeclared names become global properties.
    pub fn assign(&self, name: &str, value: JsValue) -> JsResult<()> {
        let mut scope = self;
        loop {
            {
                let mut bindings = scope.bindings.borrow_mut();
                if let Some(binding) = bindings.get_mut(name) {
                    if !binding.mutable {
                        return Err(JErrorType::TypeError(
                            "Assignment to constant variable".to_string(),
                        )
                        .into());
                    }
                    binding.value = value;
                    return Ok(());
                }
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => break,
            }
        }
        self.global.set(name, value)
    }
}
