//! Reachability pruning
//!
//! Builds the component reference graph, takes the closure from the retained
//! operations, and deletes every named component outside it. Repeats until a
//! pass deletes nothing.
//!
//! Edges come from a walk over each operation (parameters including the
//! path-level ones, request body, every response with its headers and links,
//! callbacks) and over each component's own content. Schema walks descend
//! through properties, items, schema-typed additionalProperties and every
//! composition branch, and stop at `$ref`: the referenced component has its
//! own outgoing edges. Example payload values are never inspected.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::{
    parse_reference, Callback, ComponentKey, ComponentKind, Document, Example, Header, Link,
    MediaType, Operation, OperationRef, Parameter, PathItem, RefOr, RequestBody, Response,
    SchemaId,
};
use crate::error::Result;

/// Origin of a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RefSource {
    /// Operation label (operationId or `<method> <path>`)
    Operation(String),
    Component(ComponentKey),
}

/// "`from` references named component `to`"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceEdge {
    pub from: RefSource,
    pub to: ComponentKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Components deleted by each pass; the last entry is always zero
    pub passes: Vec<usize>,
    /// Deleted components in deletion order
    pub deleted: Vec<ComponentKey>,
}

impl PruneReport {
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn total_deleted(&self) -> usize {
        self.deleted.len()
    }
}

/// Delete unreachable components until a pass deletes none
pub fn prune(doc: &mut Document) -> Result<PruneReport> {
    let mut report = PruneReport::default();
    loop {
        let reached = collect_closure(doc)?;
        let dead: Vec<ComponentKey> = doc
            .components
            .keys()
            .into_iter()
            .filter(|k| !reached.contains(k))
            .collect();
        for key in &dead {
            doc.components.remove(key);
        }
        report.passes.push(dead.len());
        if dead.is_empty() {
            return Ok(report);
        }
        report.deleted.extend(dead);
    }
}

/// Components reachable from any operation
pub fn collect_closure(doc: &Document) -> Result<BTreeSet<ComponentKey>> {
    #[derive(Debug)]
    enum RefNode {
        Root,
        Component(ComponentKey),
    }

    let edges = reference_edges(doc)?;

    let mut graph: DiGraph<RefNode, ()> = DiGraph::new();
    let root = graph.add_node(RefNode::Root);
    let index: HashMap<ComponentKey, NodeIndex> = doc
        .components
        .keys()
        .into_iter()
        .map(|k| (k.clone(), graph.add_node(RefNode::Component(k))))
        .collect();

    for edge in &edges {
        let from = match &edge.from {
            RefSource::Operation(_) => Some(root),
            RefSource::Component(k) => index.get(k).copied(),
        };
        // Dangling targets are a resolution problem, not a pruning one.
        if let (Some(from), Some(&to)) = (from, index.get(&edge.to)) {
            graph.update_edge(from, to, ());
        }
    }

    let mut reached = BTreeSet::new();
    let mut bfs = Bfs::new(&graph, root);
    while let Some(n) = bfs.next(&graph) {
        if let RefNode::Component(k) = &graph[n] {
            reached.insert(k.clone());
        }
    }
    Ok(reached)
}

/// Every reference edge in the document: operations first, then components
pub fn reference_edges(doc: &Document) -> Result<Vec<ReferenceEdge>> {
    let operations = doc.operations();
    let from_operations: Vec<(String, Vec<ComponentKey>)> = operations
        .par_iter()
        .map(|op| {
            let mut c = RefCollector::new(doc);
            c.operation_with_path(op)?;
            Ok((op.label(), c.out))
        })
        .collect::<Result<_>>()?;

    let keys = doc.components.keys();
    let from_components: Vec<Vec<ComponentKey>> = keys
        .par_iter()
        .map(|key| {
            let mut c = RefCollector::new(doc);
            c.component(key)?;
            Ok(c.out)
        })
        .collect::<Result<_>>()?;

    let mut edges = Vec::new();
    for (label, targets) in from_operations {
        edges.extend(targets.into_iter().map(|to| ReferenceEdge {
            from: RefSource::Operation(label.clone()),
            to,
        }));
    }
    for (key, targets) in keys.into_iter().zip(from_components) {
        edges.extend(targets.into_iter().map(|to| ReferenceEdge {
            from: RefSource::Component(key.clone()),
            to,
        }));
    }
    Ok(edges)
}

/// Direct component references of one walk, first-seen order
struct RefCollector<'a> {
    doc: &'a Document,
    visited: HashSet<SchemaId>,
    seen: HashSet<ComponentKey>,
    out: Vec<ComponentKey>,
}

impl<'a> RefCollector<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            visited: HashSet::new(),
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn reference(&mut self, raw: &str) -> Result<()> {
        // Nested pointers still keep the whole component alive.
        let key = parse_reference(raw)?.key;
        if self.seen.insert(key.clone()) {
            self.out.push(key);
        }
        Ok(())
    }

    fn ref_or<T>(&mut self, r: &'a RefOr<T>, walk: fn(&mut Self, &'a T) -> Result<()>) -> Result<()> {
        match r {
            RefOr::Ref(raw) => self.reference(raw),
            RefOr::Item(item) => walk(self, item),
        }
    }

    fn component(&mut self, key: &ComponentKey) -> Result<()> {
        let doc = self.doc;
        let c = &doc.components;
        let name = key.name.as_str();
        match key.kind {
            ComponentKind::Schemas => match c.schemas.get(name) {
                Some(&id) => self.schema(id),
                None => Ok(()),
            },
            ComponentKind::Parameters => self.entry(c.parameters.get(name), Self::parameter),
            ComponentKind::RequestBodies => self.entry(c.request_bodies.get(name), Self::request_body),
            ComponentKind::Responses => self.entry(c.responses.get(name), Self::response),
            ComponentKind::Headers => self.entry(c.headers.get(name), Self::header),
            ComponentKind::Examples => self.entry(c.examples.get(name), Self::example),
            ComponentKind::Links => self.entry(c.links.get(name), Self::link),
            ComponentKind::Callbacks => self.entry(c.callbacks.get(name), Self::callback),
        }
    }

    fn entry<T>(&mut self, r: Option<&'a RefOr<T>>, walk: fn(&mut Self, &'a T) -> Result<()>) -> Result<()> {
        match r {
            Some(r) => self.ref_or(r, walk),
            None => Ok(()),
        }
    }

    fn schema(&mut self, id: SchemaId) -> Result<()> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let doc = self.doc;
        let node = doc.schema(id);
        if let Some(raw) = &node.reference {
            return self.reference(raw);
        }
        if let Some(d) = &node.discriminator {
            for target in d.mapping.values() {
                if target.starts_with('#') {
                    self.reference(target)?;
                } else {
                    // Bare schema name
                    let key = ComponentKey::schema(target.clone());
                    if self.seen.insert(key.clone()) {
                        self.out.push(key);
                    }
                }
            }
        }
        for child in node.children() {
            self.schema(child)?;
        }
        Ok(())
    }

    fn media(&mut self, content: &'a indexmap::IndexMap<String, MediaType>) -> Result<()> {
        for media in content.values() {
            if let Some(id) = media.schema {
                self.schema(id)?;
            }
            self.examples(&media.examples)?;
        }
        Ok(())
    }

    fn examples(&mut self, examples: &'a indexmap::IndexMap<String, RefOr<Example>>) -> Result<()> {
        for e in examples.values() {
            self.ref_or(e, Self::example)?;
        }
        Ok(())
    }

    fn parameter(&mut self, p: &'a Parameter) -> Result<()> {
        if let Some(id) = p.schema {
            self.schema(id)?;
        }
        self.media(&p.content)?;
        self.examples(&p.examples)
    }

    fn request_body(&mut self, b: &'a RequestBody) -> Result<()> {
        self.media(&b.content)
    }

    fn response(&mut self, r: &'a Response) -> Result<()> {
        self.media(&r.content)?;
        for h in r.headers.values() {
            self.ref_or(h, Self::header)?;
        }
        for l in r.links.values() {
            self.ref_or(l, Self::link)?;
        }
        Ok(())
    }

    fn header(&mut self, h: &'a Header) -> Result<()> {
        if let Some(id) = h.schema {
            self.schema(id)?;
        }
        self.media(&h.content)?;
        self.examples(&h.examples)
    }

    // Inline examples and links hold payloads and operation pointers only.
    fn example(&mut self, _e: &'a Example) -> Result<()> {
        Ok(())
    }

    fn link(&mut self, _l: &'a Link) -> Result<()> {
        Ok(())
    }

    fn callback(&mut self, c: &'a Callback) -> Result<()> {
        for item in c.expressions.values() {
            self.path_item(item)?;
        }
        Ok(())
    }

    fn path_item(&mut self, item: &'a PathItem) -> Result<()> {
        for p in &item.parameters {
            self.ref_or(p, Self::parameter)?;
        }
        for op in item.operations.values() {
            self.operation(op)?;
        }
        Ok(())
    }

    fn operation_with_path(&mut self, op: &OperationRef<'a>) -> Result<()> {
        for p in &op.path_item.parameters {
            self.ref_or(p, Self::parameter)?;
        }
        self.operation(op.operation)
    }

    fn operation(&mut self, op: &'a Operation) -> Result<()> {
        for p in &op.parameters {
            self.ref_or(p, Self::parameter)?;
        }
        if let Some(body) = &op.request_body {
            self.ref_or(body, Self::request_body)?;
        }
        for r in op.responses.values() {
            self.ref_or(r, Self::response)?;
        }
        for c in op.callbacks.values() {
            self.ref_or(c, Self::callback)?;
        }
        Ok(())
    }
}
