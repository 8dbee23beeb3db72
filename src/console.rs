//! Console - Line-oriented admin commands over a storage handle
//!
//! TigerStyle: Parse, validate in a fixed order, then touch storage.
//!
//! ```text
//! (hbnb) create State name="California"
//! 0f8c3a0e-...
//! (hbnb) show State 0f8c3a0e-...
//! [State] (0f8c3a0e-...) {'created_at': '...', 'id': '0f8c3a0e-...', 'name': 'California', ...}
//! ```
//!
//! Argument errors render as the fixed `** ... **` messages; every mutating
//! command commits before returning.

use serde_json::{Map, Number, Value};

use crate::models::{FieldType, Model, ModelError, ModelKind, CLASS_FIELD, PROTECTED_ATTRIBUTES};
use crate::storage::{StorageBackend, StorageError};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Interactive prompt
pub const PROMPT: &str = "(hbnb) ";

/// Commands listed by `help`
pub const COMMANDS: &[&str] = &[
    "EOF", "all", "count", "create", "destroy", "help", "quit", "show", "update",
];

// =============================================================================
// Errors
// =============================================================================

/// Command failures, rendered verbatim to the operator.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("** class name missing **")]
    ClassNameMissing,

    #[error("** class doesn't exist **")]
    UnknownClass,

    #[error("** instance id missing **")]
    InstanceIdMissing,

    #[error("** no instance found **")]
    NoInstance,

    #[error("** attribute name missing **")]
    AttributeNameMissing,

    #[error("** value missing **")]
    ValueMissing,

    #[error("** invalid value for {attribute}: {value} **")]
    InvalidValue { attribute: String, value: String },

    #[error("*** Unknown syntax: {0}")]
    UnknownSyntax(String),

    #[error("** {0} **")]
    Model(#[from] ModelError),

    #[error("** storage error: {0} **")]
    Storage(#[from] StorageError),
}

/// Result of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to print; empty prints nothing
    Output(String),
    /// Leave the loop
    Quit,
}

// =============================================================================
// Console
// =============================================================================

/// Command interpreter bound to one storage handle.
pub struct Console<'a> {
    storage: &'a mut dyn StorageBackend,
}

impl<'a> Console<'a> {
    pub fn new(storage: &'a mut dyn StorageBackend) -> Self {
        Self { storage }
    }

    /// Run one command line.
    ///
    /// # Errors
    /// Returns the operator-facing error for bad arguments, plus any storage
    /// failure from a mutating command.
    pub async fn execute(&mut self, line: &str) -> Result<Reply, ConsoleError> {
        let args = split_args(line);
        let Some((command, rest)) = args.split_first() else {
            return Ok(Reply::Output(String::new()));
        };

        let output = match command.as_str() {
            "create" => self.create(rest).await?,
            "show" => self.show(rest).await?,
            "destroy" => self.destroy(rest).await?,
            "all" => self.all(rest).await?,
            "count" => self.count(rest).await?,
            "update" => self.update(rest).await?,
            "help" => help(rest.first().map(String::as_str)),
            "quit" | "EOF" => return Ok(Reply::Quit),
            _ => return Err(ConsoleError::UnknownSyntax(line.trim().to_string())),
        };
        Ok(Reply::Output(output))
    }

    async fn create(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let kind = kind_arg(args)?;
        let mut model = Model::blank(kind)?;

        for token in args.iter().skip(1) {
            let Some((name, value)) = parse_param(token) else {
                tracing::debug!(param = %token, "Skipping unparseable parameter");
                continue;
            };
            if PROTECTED_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            if let Err(e) = model.set_attribute(&name, value) {
                tracing::debug!(param = %token, error = %e, "Skipping parameter");
            }
        }

        let id = model.id().to_string();
        self.storage.new(model);
        self.storage.save().await?;
        Ok(id)
    }

    async fn show(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let model = self.find(args).await?;
        Ok(describe(&model)?)
    }

    async fn destroy(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let model = self.find(args).await?;
        self.storage.delete(Some(&model));
        self.storage.save().await?;
        Ok(String::new())
    }

    async fn all(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let kind = match args.first() {
            Some(_) => Some(kind_arg(args)?),
            None => None,
        };

        let mut items = Vec::new();
        for model in self.storage.all(kind).await?.values() {
            items.push(py_str(&describe(model)?));
        }
        Ok(format!("[{}]", items.join(", ")))
    }

    async fn count(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let kind = kind_arg(args)?;
        Ok(self.storage.count(Some(kind)).await?.to_string())
    }

    async fn update(&mut self, args: &[String]) -> Result<String, ConsoleError> {
        let mut model = self.find(args).await?;
        let attribute = args.get(2).ok_or(ConsoleError::AttributeNameMissing)?;
        let raw = args.get(3).ok_or(ConsoleError::ValueMissing)?;

        if PROTECTED_ATTRIBUTES.contains(&attribute.as_str()) {
            tracing::debug!(attribute = %attribute, "Ignoring protected attribute");
            return Ok(String::new());
        }

        let value = coerce(model.kind(), attribute, raw)?;
        model.set_attribute(attribute, value)?;
        model.touch();
        self.storage.new(model);
        self.storage.save().await?;
        Ok(String::new())
    }

    /// Resolve `<Class> <id>` to a stored entity.
    async fn find(&self, args: &[String]) -> Result<Model, ConsoleError> {
        let kind = kind_arg(args)?;
        let id = args.get(1).ok_or(ConsoleError::InstanceIdMissing)?;
        self.storage
            .get(kind, id)
            .await?
            .ok_or(ConsoleError::NoInstance)
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn kind_arg(args: &[String]) -> Result<ModelKind, ConsoleError> {
    let name = args.first().ok_or(ConsoleError::ClassNameMissing)?;
    ModelKind::from_str(name).ok_or(ConsoleError::UnknownClass)
}

/// Split on whitespace outside double quotes. Quotes and escapes are kept.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Inner text of a `"..."` token with `\"` unescaped.
fn unquote(token: &str) -> Option<String> {
    let inner = token.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.replace("\\\"", "\""))
}

/// `key="quoted_string"`, `key=<int>` or `key=<float>`. Anything else is `None`.
fn parse_param(token: &str) -> Option<(String, Value)> {
    let (name, raw) = token.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let value = if let Some(text) = unquote(raw) {
        Value::String(text.replace('_', " "))
    } else if raw.contains('.') {
        Value::Number(Number::from_f64(raw.parse::<f64>().ok()?)?)
    } else {
        Value::Number(raw.parse::<i64>().ok()?.into())
    };
    Some((name.to_string(), value))
}

/// Convert an `update` argument to the attribute's declared type, or infer
/// one for undeclared attributes. Quoted values stay strings.
fn coerce(kind: ModelKind, attribute: &str, raw: &str) -> Result<Value, ConsoleError> {
    let invalid = || ConsoleError::InvalidValue {
        attribute: attribute.to_string(),
        value: raw.to_string(),
    };
    let quoted = unquote(raw);
    let text = quoted.clone().unwrap_or_else(|| raw.to_string());

    let value = match kind.field(attribute).map(|f| f.ty) {
        Some(FieldType::Text) => Value::String(text),
        Some(FieldType::Integer) => {
            let int = text.parse::<i64>().map_err(|_| invalid())?;
            Value::Number(int.into())
        }
        Some(FieldType::Float) => {
            let float = text.parse::<f64>().map_err(|_| invalid())?;
            Value::Number(Number::from_f64(float).ok_or_else(invalid)?)
        }
        None if quoted.is_some() => Value::String(text),
        None => {
            if let Ok(int) = text.parse::<i64>() {
                Value::Number(int.into())
            } else if let Some(float) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(float)
            } else {
                Value::String(text)
            }
        }
    };
    Ok(value)
}

// =============================================================================
// Rendering
// =============================================================================

/// `[<Class>] (<id>) {<attributes>}`
fn describe(model: &Model) -> Result<String, ModelError> {
    let mut dict = model.to_dict()?;
    dict.remove(CLASS_FIELD);
    Ok(format!("[{}] ({}) {}", model.kind(), model.id(), py_dict(&dict)))
}

fn py_dict(dict: &Map<String, Value>) -> String {
    let entries: Vec<String> = dict
        .iter()
        .map(|(key, value)| format!("{}: {}", py_str(key), py_repr(value)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn py_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(py_repr).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(dict) => py_dict(dict),
    }
}

/// Single-quoted unless the text holds a single quote and no double quote.
fn py_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn help(topic: Option<&str>) -> String {
    match topic {
        None => format!(
            "Documented commands (type help <topic>):\n{}\n{}",
            "=".repeat(40),
            COMMANDS.join("  ")
        ),
        Some("create") => "Create an instance: create <Class> [key=value ...]".to_string(),
        Some("show") => "Print an instance: show <Class> <id>".to_string(),
        Some("destroy") => "Delete an instance: destroy <Class> <id>".to_string(),
        Some("all") => "Print every instance, or those of one class: all [Class]".to_string(),
        Some("count") => "Count instances of a class: count <Class>".to_string(),
        Some("update") => "Set one attribute: update <Class> <id> <attribute> <value>".to_string(),
        Some("help") => "List commands, or describe one: help [command]".to_string(),
        Some("quit" | "EOF") => "Exit the console".to_string(),
        Some(other) => format!("*** No help on {other}"),
    }
}

// =============================================================================
// Tests
// =============================================================================
