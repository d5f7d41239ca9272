//! Built-in clone filters for pages, actions and annotation arrays.

use crate::cloner::{CloneContext, CloneFilter};
use crate::error::Result;
use crate::tree::NameTree;
use crate::value::{ChildKey, ContainerKind, NodeId, PdfString, Value};
use crate::Document;
use std::collections::HashSet;
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_PAGE_ATTRIBUTES: &[&str] = &["Resources", "MediaBox", "CropBox", "Rotate"];

/// Filters applied by [`Cloner::with_default_filters`](crate::Cloner::with_default_filters):
/// pages, actions, annotation arrays, in that order.
pub fn default_filters() -> Vec<Box<dyn CloneFilter>> {
    vec![
        Box::new(PageFilter),
        Box::new(ActionFilter),
        Box::new(AnnotationsFilter),
    ]
}

/// Copies a page on its own: the `Parent` link is dropped and inherited attributes are
/// copied onto the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFilter;

impl CloneFilter for PageFilter {
    fn name(&self) -> &str {
        "page"
    }

    fn matches(&self, cx: &mut CloneContext<'_>, source: &Value) -> bool {
        cx.source()
            .dict_get(source, "Type")
            .map_or(false, |t| t.is_name("Page"))
    }

    fn before_child(
        &self,
        _cx: &mut CloneContext<'_>,
        _source: &Value,
        key: &ChildKey,
        _child: &Value,
    ) -> Result<bool> {
        Ok(!matches!(key, ChildKey::Key(name) if name == "Parent"))
    }

    fn after_object(&self, cx: &mut CloneContext<'_>, source: &Value, clone: &Value) -> Result<()> {
        for &attribute in INHERITABLE_PAGE_ATTRIBUTES {
            if cx.target().dict_contains(clone, attribute) {
                continue;
            }
            let Some(inherited) = inherited_attribute(cx.source(), source, attribute) else {
                continue;
            };
            let copy = cx.clone_value(&inherited)?;
            cx.target().dict_set(clone, attribute, copy)?;
            debug!(attribute, "copied inherited page attribute");
        }
        Ok(())
    }
}

/// First value of `attribute` on an ancestor of `page`, following `Parent` links.
fn inherited_attribute(doc: &mut Document, page: &Value, attribute: &str) -> Option<Value> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut node = doc.dict_get_resolved(page, "Parent");
    while let Some(id) = node.node_id() {
        if !node.is_dictionary() || !visited.insert(id) {
            return None;
        }
        if let Some(value) = doc.dict_get(&node, attribute) {
            return Some(value);
        }
        node = doc.dict_get_resolved(&node, "Parent");
    }
    None
}

/// Re-registers the named destination of a copied action in the target's `Dests` tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionFilter;

impl CloneFilter for ActionFilter {
    fn name(&self) -> &str {
        "action"
    }

    fn matches(&self, cx: &mut CloneContext<'_>, source: &Value) -> bool {
        let doc = cx.source();
        source.is_dictionary() && doc.dict_contains(source, "S") && doc.dict_contains(source, "D")
    }

    fn after_child(
        &self,
        cx: &mut CloneContext<'_>,
        _source: &Value,
        _clone: &Value,
        key: &ChildKey,
        child_source: &Value,
        _child_clone: &Value,
    ) -> Result<()> {
        if let (ChildKey::Key(name), Value::String(destination)) = (key, child_source) {
            if name == "D" {
                copy_named_destination(cx, destination)?;
            }
        }
        Ok(())
    }
}

/// Registers copied form-field annotations in the target's `AcroForm` and re-registers
/// named destinations of copied link annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationsFilter;

impl AnnotationsFilter {
    fn is_form_field(doc: &Document, annotation: &Value) -> bool {
        doc.dict_get(annotation, "Subtype")
            .map_or(false, |s| s.is_name("Widget"))
            || doc.dict_contains(annotation, "FT")
    }
}

impl CloneFilter for AnnotationsFilter {
    fn name(&self) -> &str {
        "annotations"
    }

    fn matches(&self, cx: &mut CloneContext<'_>, source: &Value) -> bool {
        let doc = cx.source();
        let Some(items) = doc.array_items(source) else {
            return false;
        };
        !items.is_empty()
            && items.iter().all(|item| {
                let annotation = doc.resolve(item);
                annotation.is_dictionary() && doc.dict_contains(&annotation, "Subtype")
            })
    }

    fn after_child(
        &self,
        cx: &mut CloneContext<'_>,
        _source: &Value,
        _clone: &Value,
        _key: &ChildKey,
        child_source: &Value,
        child_clone: &Value,
    ) -> Result<()> {
        if Self::is_form_field(cx.source(), child_source) {
            let target = cx.target();
            let catalog = target.catalog();
            let form = target.get_or_create(&catalog, "AcroForm", ContainerKind::Dictionary, false)?;
            let fields = target.get_or_create(&form, "Fields", ContainerKind::Array, true)?;
            let known = target
                .array_items(&fields)
                .map_or(false, |items| items.contains(child_clone));
            if !known {
                target.array_push(&fields, child_clone.clone())?;
                debug!("registered copied form field");
            }
        }
        let dest = cx.source().dict_get(child_source, "Dest");
        if let Some(Value::String(destination)) = dest {
            copy_named_destination(cx, &destination)?;
        }
        Ok(())
    }
}

/// Looks a named destination up in the source and adds its copy to the target, unless
/// the target already defines that name.
fn copy_named_destination(cx: &mut CloneContext<'_>, name: &PdfString) -> Result<()> {
    let Some(destination) = lookup_destination(cx.source(), name)? else {
        return Ok(());
    };
    let dests = cx.target().names_tree("Dests")?;
    if dests.contains_key(cx.target(), name)? {
        return Ok(());
    }
    let copy = cx.clone_value(&destination)?;
    dests.insert(cx.target(), name.clone(), copy, false)?;
    debug!(destination = %name, "registered copied named destination");
    Ok(())
}

/// Reads `Names/Dests` of `doc` without creating anything.
fn lookup_destination(doc: &mut Document, name: &PdfString) -> Result<Option<Value>> {
    let catalog = doc.catalog();
    let names = doc.dict_get_resolved(&catalog, "Names");
    if !names.is_dictionary() {
        return Ok(None);
    }
    let Some(root) = doc.dict_get(&names, "Dests") else {
        return Ok(None);
    };
    NameTree::new(root).get(doc, name)
}
