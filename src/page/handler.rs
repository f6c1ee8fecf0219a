use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

use super::Page;
use super::dom::NodeId;
use super::event::Event;

/// Where a piece of page code lives. Becomes one `at ...` line of a captured stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(
        function: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
            column,
        }
    }

    pub fn anonymous(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self::new(String::new(), file, line, column)
    }

    pub(crate) fn frame_line(&self) -> String {
        if self.function.is_empty() {
            format!("    at {}:{}:{}", self.file, self.line, self.column)
        } else {
            format!(
                "    at {} ({}:{}:{})",
                self.function, self.file, self.line, self.column
            )
        }
    }
}

/// An exception escaping page code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Uncaught {message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<crate::Error> for ScriptError {
    fn from(err: crate::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type HandlerResult = std::result::Result<(), ScriptError>;

type HandlerFn = dyn Fn(&mut Page, &mut Event) -> HandlerResult;

/// An event handler: a listener callback or an inline `on*` property value.
///
/// Clones share identity; two handlers are the same listener only if they were cloned from one
/// another.
#[derive(Clone)]
pub struct Handler {
    callback: Rc<HandlerFn>,
    location: Rc<SourceLocation>,
}

impl Handler {
    pub fn new<F>(location: SourceLocation, callback: F) -> Self
    where
        F: Fn(&mut Page, &mut Event) -> HandlerResult + 'static,
    {
        Self {
            callback: Rc::new(callback),
            location: Rc::new(location),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    /// Runs the callback with its own frame pushed on the page call stack.
    pub fn call(&self, page: &mut Page, event: &mut Event) -> HandlerResult {
        let callback = Rc::clone(&self.callback);
        page.with_frame(Rc::clone(&self.location), |page| callback(page, event))
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.callback) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakHandler {
        WeakHandler {
            callback: Rc::downgrade(&self.callback),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Non-owning handle to a [`Handler`]; does not keep the callback alive.
#[derive(Clone)]
pub(crate) struct WeakHandler {
    callback: Weak<HandlerFn>,
}

impl WeakHandler {
    pub(crate) fn is_same(&self, handler: &Handler) -> bool {
        self.callback
            .upgrade()
            .is_some_and(|callback| Rc::ptr_eq(&callback, &handler.callback))
    }
}

impl fmt::Debug for WeakHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandler")
            .field("alive", &(self.callback.strong_count() > 0))
            .finish()
    }
}

/// Receiver and arguments of a call into a page global.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub this: Option<NodeId>,
    pub args: Vec<Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>) -> Self {
        Self { this: None, args }
    }

    pub fn with_this(this: NodeId, args: Vec<Value>) -> Self {
        Self {
            this: Some(this),
            args,
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.args.first()
    }
}

pub type CallResult = std::result::Result<Value, ScriptError>;

type FunctionFn = dyn Fn(&mut Page, &CallArgs) -> CallResult;

/// A callable page global, e.g. a UI library's `modal` or `fire` entry point.
#[derive(Clone)]
pub struct Function {
    callback: Rc<FunctionFn>,
    location: Rc<SourceLocation>,
}

impl Function {
    pub fn new<F>(location: SourceLocation, callback: F) -> Self
    where
        F: Fn(&mut Page, &CallArgs) -> CallResult + 'static,
    {
        Self {
            callback: Rc::new(callback),
            location: Rc::new(location),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    pub fn call(&self, page: &mut Page, args: &CallArgs) -> CallResult {
        let callback = Rc::clone(&self.callback);
        page.with_frame(Rc::clone(&self.location), |page| callback(page, args))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Property and global values. Callables compare by identity.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Node(NodeId),
    Handler(Handler),
    Function(Function),
    /// A plain object whose members, if any, live under dotted global paths.
    Object,
}

impl Value {
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Node(_) => "node",
            Self::Handler(_) | Self::Function(_) => "function",
            Self::Object => "object",
        }
    }

    /// Short human readable rendering used in log messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::String(value) => value.clone(),
            Self::Node(node) => node.to_string(),
            Self::Handler(handler) => format!("function {}", handler.location().function),
            Self::Function(function) => format!("function {}", function.location().function),
            Self::Object => "{...}".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Object, Self::Object) => true,
            _ => false,
        }
    }
}

impl From<Handler> for Value {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}
