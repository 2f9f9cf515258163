// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Structured issues
//!
//! An [`Issue`] carries one message, the context it was produced in, its
//! severity and an optional chain of causing issues. Issue *types* are
//! plain data ([`IssueDefinition`]) registered with an [`IssueRegistry`]
//! instead of being generated per type.

use crate::{Context, Severity};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use thiserror::Error;

/// Type name given to plain message issues
pub const MESSAGE_TYPE: &str = "Message";

/// A severity-tagged, context-carrying message with an optional cause
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    kind: String,
    severity: Severity,
    time: DateTime<Local>,
    context: Context,
    message: String,
    qualifiers: Vec<String>,
    attributes: Vec<(String, String)>,
    cause: Option<Box<Issue>>,
}

impl Issue {
    /// Plain message issue
    pub fn message(context: Context, message: impl Into<String>) -> Self {
        Self::with_kind(MESSAGE_TYPE, context, message)
    }

    pub fn with_kind(kind: impl Into<String>, context: Context, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            severity: Severity::Error,
            time: Local::now(),
            context,
            message: message.into(),
            qualifiers: Vec::new(),
            attributes: Vec::new(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Issue) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = time;
        self
    }

    /// Stamp the severity the issue is being reported at
    pub(crate) fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        self.message.push_str(text);
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn text(&self) -> &str {
        &self.message
    }

    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn cause(&self) -> Option<&Issue> {
        self.cause.as_deref()
    }

    /// Walk the cause chain, immediate cause first
    pub fn causes(&self) -> Causes<'_> {
        Causes {
            next: self.cause.as_deref(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Issue {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Iterator over an issue's causes
pub struct Causes<'a> {
    next: Option<&'a Issue>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a Issue;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}

/// Errors from creating issues through the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("issue type '{0}' is not registered")]
    UnknownDefinition(String),

    #[error("issue type '{child}' names unregistered parent '{parent}'")]
    UnknownParent { child: String, parent: String },
}

/// An issue type: a message template over named attributes
///
/// Placeholders are written `{attribute}`; `{{` and `}}` produce literal
/// braces. A placeholder that names no attribute is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDefinition {
    pub name: String,
    pub parent: Option<String>,
    pub template: String,
    pub attributes: Vec<String>,
}

impl IssueDefinition {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            template: template.into(),
            attributes: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Build an issue of this type
    ///
    /// Declared attributes without a value render (and are stored) empty.
    pub fn issue(&self, context: Context, values: &[(&str, &str)]) -> Issue {
        let attributes: Vec<(String, String)> = self
            .attributes
            .iter()
            .map(|name| {
                let value = values
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value)
                    .unwrap_or_default();
                (name.clone(), value.to_string())
            })
            .collect();
        let message = render_template(&self.template, &attributes);
        let mut issue = Issue::with_kind(self.name.clone(), context, message);
        issue.attributes = attributes;
        issue
    }
}

fn render_template(template: &str, attributes: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }
        match tail.find('}') {
            Some(end) => {
                let key = &tail[1..end];
                match attributes.iter().find(|(name, _)| name == key) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Registry of issue types
pub struct IssueRegistry {
    definitions: RwLock<HashMap<String, IssueDefinition>>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static IssueRegistry {
        static REGISTRY: OnceLock<IssueRegistry> = OnceLock::new();
        REGISTRY.get_or_init(IssueRegistry::new)
    }

    /// Register (or replace) an issue type
    ///
    /// A child type inherits its parent's attributes, which come first.
    pub fn register(&self, mut definition: IssueDefinition) -> Result<(), IssueError> {
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent_name) = &definition.parent {
            let parent = definitions
                .get(parent_name)
                .ok_or_else(|| IssueError::UnknownParent {
                    child: definition.name.clone(),
                    parent: parent_name.clone(),
                })?;
            let mut attributes = parent.attributes.clone();
            attributes.extend(
                definition
                    .attributes
                    .drain(..)
                    .filter(|name| !parent.attributes.contains(name)),
            );
            definition.attributes = attributes;
        }
        definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<IssueDefinition> {
        self.definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Create an issue of a registered type
    pub fn create(
        &self,
        name: &str,
        context: Context,
        values: &[(&str, &str)],
    ) -> Result<Issue, IssueError> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let definition = definitions
            .get(name)
            .ok_or_else(|| IssueError::UnknownDefinition(name.to_string()))?;
        Ok(definition.issue(context, values))
    }

    /// Whether `name` is `ancestor` or derives from it
    pub fn is_a(&self, name: &str, ancestor: &str) -> bool {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut current = Some(name);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = definitions
                .get(candidate)
                .and_then(|definition| definition.parent.as_deref());
        }
        false
    }
}

impl Default for IssueRegistry {
    fn default() -> Self {
        Self::new()
    }
}
