//! Value computation for a completed node
//!
//! When an element ends (or an attribute is read) the executor pre-parses
//! its text according to the simple type governing it, then runs the
//! component's bindings from the most derived type to the most general.
//! Every binding receives the value produced so far; a binding returning
//! `None` leaves it unchanged.
//!
//! Text rules:
//!
//! * atomic types normalize whitespace per the type's whiteSpace facet;
//!   text that is empty after trimming is no value at all, unless the
//!   element declares a default or fixed value;
//! * list types collapse whitespace, split on it, and parse every item
//!   through the bindings of the item type;
//! * union types and mixed content keep the raw text;
//! * element-only content has no text value.

use std::sync::Arc;

use tracing::trace;

use crate::bindings::{Binding, BindingWalker};
use crate::codecs::{split_list, WhiteSpace};
use crate::context::Context;
use crate::error::{Error, Result, ValidationError};
use crate::schema::{SchemaIndex, SimpleVariety, TypeDefinition};
use crate::values::Value;

use super::tree::{InstanceComponent, NodeId, NodeRef, ParseTree};
use super::validation::ErrorCollector;

/// Computes node values through the binding chain
pub struct ParseExecutor<'a> {
    index: &'a SchemaIndex,
    walker: &'a BindingWalker,
}

impl<'a> ParseExecutor<'a> {
    /// Create an executor
    pub fn new(index: &'a SchemaIndex, walker: &'a BindingWalker) -> Self {
        Self { index, walker }
    }

    /// Compute the value of node `id`
    pub fn execute(
        &self,
        tree: &ParseTree,
        id: NodeId,
        context: &Arc<Context>,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<Option<Value>> {
        let Some(node) = tree.node(id) else {
            return Ok(None);
        };
        let component = node.component();
        if node.is_nil() {
            trace!(component = %component.name, "nil element");
            return Ok(None);
        }

        let value = self.preparse(component, context, errors, path)?;
        let mut current = value.clone();
        let mut visit = |binding: &Binding| -> Result<()> {
            let result = match binding {
                Binding::Simple(b) => b.parse(component, current.clone())?,
                Binding::Complex(b) => b.parse(component, &node, current.clone())?,
            };
            if result.is_some() {
                current = result;
            }
            Ok(())
        };
        let visited = self
            .walker
            .walk(
                &component.name,
                &component.type_definition,
                value.as_ref(),
                self.index,
                context,
                &mut visit,
            )
            .map_err(|e| Error::binding(&component.name, e))?;
        trace!(component = %component.name, bindings = visited, "component parsed");
        Ok(current)
    }

    /// Pre-parse the text of a component into the value handed to the
    /// first binding
    pub fn preparse(
        &self,
        component: &InstanceComponent,
        context: &Arc<Context>,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<Option<Value>> {
        let def = &component.type_definition;
        let raw = component.text.as_str();

        if def.is_mixed() {
            return Ok(non_blank(raw));
        }
        let Some(simple) = self.index.simple_content_type(def) else {
            return Ok(None);
        };
        match self.index.variety(&simple) {
            SimpleVariety::Atomic => self.preparse_atomic(component, &simple, raw, errors, path),
            SimpleVariety::List(item) => self.preparse_list(component, &simple, &item, raw, context, errors, path),
            SimpleVariety::Union => match non_blank(raw) {
                Some(value) => Ok(Some(value)),
                None => Ok(default_value(component).map(Value::from)),
            },
        }
    }

    fn preparse_atomic(
        &self,
        component: &InstanceComponent,
        simple: &Arc<TypeDefinition>,
        raw: &str,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<Option<Value>> {
        let white_space = self.index.white_space(simple);
        let mut text = white_space.normalize(raw);
        if text.trim().is_empty() {
            match default_value(component) {
                Some(default) => text = white_space.normalize(default),
                None => return Ok(None),
            }
        } else if errors.is_enabled() {
            self.check_fixed(component, &white_space, &text, errors, path)?;
        }
        if errors.is_enabled() {
            self.check_facets(simple, &text, errors, path)?;
        }
        Ok(Some(Value::String(text)))
    }

    #[allow(clippy::too_many_arguments)]
    fn preparse_list(
        &self,
        component: &InstanceComponent,
        simple: &Arc<TypeDefinition>,
        item_type: &Arc<TypeDefinition>,
        raw: &str,
        context: &Arc<Context>,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<Option<Value>> {
        let mut normalized = WhiteSpace::Collapse.normalize(raw);
        if normalized.is_empty() {
            if let Some(default) = default_value(component) {
                normalized = WhiteSpace::Collapse.normalize(default);
            }
        }
        let items = split_list(&normalized);

        if errors.is_enabled() {
            for t in self.index.facet_chain(simple) {
                if let Some(s) = t.as_simple() {
                    let found = s.facets.check_list(&items, &normalized);
                    errors.report_all(found.into_iter().map(|e| located(e, path, &t)))?;
                }
            }
        }

        let bindings = self
            .walker
            .type_bindings(&component.name, item_type, self.index, context)
            .map_err(|e| Error::binding(&component.name, e))?;
        let item_white_space = self.index.white_space(item_type);

        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let text = item_white_space.normalize(item);
            if errors.is_enabled() {
                self.check_facets(item_type, &text, errors, path)?;
            }
            let mut item_component = component.clone();
            item_component.type_definition = item_type.clone();
            item_component.text = text.clone();

            let mut scratch = ParseTree::new();
            let id = scratch.add_element(item_component, None);
            let Some(node) = scratch.node(id) else { continue };
            let parsed = apply(&bindings, &node, Some(Value::String(text)))
                .map_err(|e| Error::binding(&component.name, e))?;
            if let Some(value) = parsed {
                values.push(value);
            }
        }
        trace!(component = %component.name, items = values.len(), "list parsed");
        Ok(Some(Value::List(values)))
    }

    fn check_facets(
        &self,
        simple: &Arc<TypeDefinition>,
        text: &str,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<()> {
        for t in self.index.facet_chain(simple) {
            if let Some(s) = t.as_simple() {
                let found = s.facets.check_value(text);
                errors.report_all(found.into_iter().map(|e| located(e, path, &t)))?;
            }
        }
        Ok(())
    }

    fn check_fixed(
        &self,
        component: &InstanceComponent,
        white_space: &WhiteSpace,
        text: &str,
        errors: &mut ErrorCollector,
        path: &str,
    ) -> Result<()> {
        let fixed = component
            .declaration
            .as_element()
            .and_then(|d| d.fixed.as_deref());
        if let Some(fixed) = fixed {
            if white_space.normalize(fixed) != text {
                errors.report(
                    ValidationError::new(format!(
                        "value '{}' of {} differs from the fixed value '{}'",
                        text, component.name, fixed
                    ))
                    .with_path(path),
                )?;
            }
        }
        Ok(())
    }
}

/// Run `bindings` in order over `value`
fn apply(bindings: &[Binding], node: &NodeRef<'_>, value: Option<Value>) -> Result<Option<Value>> {
    let component = node.component();
    let mut current = value;
    for binding in bindings {
        let result = match binding {
            Binding::Simple(b) => b.parse(component, current.clone())?,
            Binding::Complex(b) => b.parse(component, node, current.clone())?,
        };
        if result.is_some() {
            current = result;
        }
    }
    Ok(current)
}

fn non_blank(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(Value::String(raw.to_string()))
    }
}

fn default_value(component: &InstanceComponent) -> Option<&str> {
    component.declaration.as_element().and_then(|d| d.value_constraint())
}

fn located(error: ValidationError, path: &str, def: &TypeDefinition) -> ValidationError {
    error.with_path(path).with_schema_component(def.display_name())
}
