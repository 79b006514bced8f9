//! Document Model
//!
//! Primary data structure for an API description: an arena of schema fragments
//! (`SchemaArena`, addressed by `SchemaId`), a component registry with one
//! deletable bucket per component kind, and the path items / operations that
//! root everything else.
//!
//! Every later pass borrows this model:
//! - Pruner (reachability, deletes registry entries)
//! - Resolver (composition + union classification, read-only)
//! - Codegen (naming + validation synthesis, read-only)
//!
//! Schema nodes are never removed from the arena. Registry entries are created
//! at load time and only ever deleted.

pub mod loader;
pub mod reference;
pub mod compose;
pub mod classify;
pub mod prune;
pub mod filter;
pub mod diagnostics;

pub use loader::{load_from_path, load_from_str, load_from_value};
pub use reference::{parse_reference, suggest_name, ComponentRef};
pub use compose::{merge_nodes, CompositionResolver, ResolvedModel};
pub use classify::{
    Constraints, ResolvedProperty, ResolvedSchema, ResolvedShape, UnionDescriptor, UnionMode,
    UnionStrategy,
};
pub use prune::{collect_closure, prune, reference_edges, PruneReport, RefSource, ReferenceEdge};
pub use filter::{retain_operation_ids, retain_tags, FilterReport};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Result, TypeModelError};

// =============================================================================
// Schema Arena
// =============================================================================

/// Identity of a schema fragment inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(u32);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

/// JSON type keyword (`type: ...`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl JsonType {
    pub fn from_json_type(type_str: &str) -> Option<Self> {
        match type_str {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `additionalProperties` as written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(SchemaId),
}

/// Numeric, length and count bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        self == &Bounds::default()
    }
}

/// Boolean keywords that must agree across `allOf` branches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFlags {
    pub nullable: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub unique_items: bool,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
}

impl SchemaFlags {
    /// Keyword names paired with their values, in a fixed order
    pub fn named(&self) -> [(&'static str, bool); 6] {
        [
            ("uniqueItems", self.unique_items),
            ("exclusiveMinimum", self.exclusive_minimum),
            ("exclusiveMaximum", self.exclusive_maximum),
            ("nullable", self.nullable),
            ("readOnly", self.read_only),
            ("writeOnly", self.write_only),
        ]
    }
}

/// Discriminator object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
}

/// A schema fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `$ref` target, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Bounds::is_empty")]
    pub bounds: Bounds,
    #[serde(default)]
    pub flags: SchemaFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<SchemaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    /// Example payload. Never inspected for references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

impl SchemaNode {
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Declared type, or the type implied by structural keywords
    pub fn inferred_type(&self) -> Option<JsonType> {
        if self.json_type.is_some() {
            return self.json_type;
        }
        if !self.properties.is_empty() || self.additional_properties.is_some() {
            return Some(JsonType::Object);
        }
        if self.items.is_some() {
            return Some(JsonType::Array);
        }
        None
    }

    /// True when the node carries nothing but `allOf`
    pub fn is_bare_all_of(&self) -> bool {
        let mut local = self.clone();
        local.all_of.clear();
        local.title = None;
        !self.all_of.is_empty() && local == SchemaNode::default()
    }

    /// Direct structural children in declaration order
    pub fn children(&self) -> Vec<SchemaId> {
        let mut out: Vec<SchemaId> = self.properties.values().copied().collect();
        out.extend(self.items);
        if let Some(AdditionalProperties::Schema(id)) = self.additional_properties {
            out.push(id);
        }
        out.extend(self.all_of.iter().copied());
        out.extend(self.one_of.iter().copied());
        out.extend(self.any_of.iter().copied());
        out
    }
}

/// Owner of all schema fragments
#[derive(Debug, Clone, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    pub fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        let id = SchemaId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &SchemaNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (SchemaId(i as u32), n))
    }
}

// =============================================================================
// Reference-bearing elements
// =============================================================================

/// A direct reference or an inline value
#[derive(Debug, Clone, PartialEq)]
pub enum RefOr<T> {
    Ref(String),
    Item(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaType {
    pub schema: Option<SchemaId>,
    pub example: Option<serde_json::Value>,
    pub examples: IndexMap<String, RefOr<Example>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<SchemaId>,
    pub content: IndexMap<String, MediaType>,
    pub examples: IndexMap<String, RefOr<Example>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub description: Option<String>,
    pub headers: IndexMap<String, RefOr<Header>>,
    pub content: IndexMap<String, MediaType>,
    pub links: IndexMap<String, RefOr<Link>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub required: bool,
    pub schema: Option<SchemaId>,
    pub content: IndexMap<String, MediaType>,
    pub examples: IndexMap<String, RefOr<Example>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    pub summary: Option<String>,
    pub value: Option<serde_json::Value>,
    pub external_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub operation_id: Option<String>,
    pub operation_ref: Option<String>,
}

/// Runtime-expression → path item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Callback {
    pub expressions: IndexMap<String, PathItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<RefOr<Parameter>>,
    pub request_body: Option<RefOr<RequestBody>>,
    /// Status (`"200"`, `"4XX"`, `"default"`) → response
    pub responses: IndexMap<String, RefOr<Response>>,
    pub callbacks: IndexMap<String, RefOr<Callback>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathItem {
    /// Parameters shared by every operation of the path
    pub parameters: Vec<RefOr<Parameter>>,
    pub operations: IndexMap<HttpMethod, Operation>,
}

// =============================================================================
// Component Registry
// =============================================================================

/// Component bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Schemas,
    Parameters,
    RequestBodies,
    Responses,
    Headers,
    Examples,
    Links,
    Callbacks,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 8] = [
        Self::Schemas,
        Self::Parameters,
        Self::RequestBodies,
        Self::Responses,
        Self::Headers,
        Self::Examples,
        Self::Links,
        Self::Callbacks,
    ];

    /// Segment used in `#/components/<segment>/...`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Parameters => "parameters",
            Self::RequestBodies => "requestBodies",
            Self::Responses => "responses",
            Self::Headers => "headers",
            Self::Examples => "examples",
            Self::Links => "links",
            Self::Callbacks => "callbacks",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == segment)
    }
}

/// Address of a named component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub kind: ComponentKind,
    pub name: String,
}

impl ComponentKey {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn schema(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Schemas, name)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#/components/{}/{}",
            self.kind.as_str(),
            reference::escape_segment(&self.name)
        )
    }
}

/// Named, independently deletable component buckets
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    pub schemas: IndexMap<String, SchemaId>,
    pub parameters: IndexMap<String, RefOr<Parameter>>,
    pub request_bodies: IndexMap<String, RefOr<RequestBody>>,
    pub responses: IndexMap<String, RefOr<Response>>,
    pub headers: IndexMap<String, RefOr<Header>>,
    pub examples: IndexMap<String, RefOr<Example>>,
    pub links: IndexMap<String, RefOr<Link>>,
    pub callbacks: IndexMap<String, RefOr<Callback>>,
}

impl ComponentRegistry {
    /// Names in one bucket, declaration order
    pub fn names(&self, kind: ComponentKind) -> Vec<&str> {
        fn keys<V>(m: &IndexMap<String, V>) -> Vec<&str> {
            m.keys().map(|k| k.as_str()).collect()
        }
        match kind {
            ComponentKind::Schemas => keys(&self.schemas),
            ComponentKind::Parameters => keys(&self.parameters),
            ComponentKind::RequestBodies => keys(&self.request_bodies),
            ComponentKind::Responses => keys(&self.responses),
            ComponentKind::Headers => keys(&self.headers),
            ComponentKind::Examples => keys(&self.examples),
            ComponentKind::Links => keys(&self.links),
            ComponentKind::Callbacks => keys(&self.callbacks),
        }
    }

    /// Every key, bucket by bucket, declaration order within a bucket
    pub fn keys(&self) -> Vec<ComponentKey> {
        ComponentKind::ALL
            .iter()
            .flat_map(|&kind| {
                self.names(kind)
                    .into_iter()
                    .map(move |name| ComponentKey::new(kind, name))
            })
            .collect()
    }

    pub fn contains(&self, key: &ComponentKey) -> bool {
        let name = key.name.as_str();
        match key.kind {
            ComponentKind::Schemas => self.schemas.contains_key(name),
            ComponentKind::Parameters => self.parameters.contains_key(name),
            ComponentKind::RequestBodies => self.request_bodies.contains_key(name),
            ComponentKind::Responses => self.responses.contains_key(name),
            ComponentKind::Headers => self.headers.contains_key(name),
            ComponentKind::Examples => self.examples.contains_key(name),
            ComponentKind::Links => self.links.contains_key(name),
            ComponentKind::Callbacks => self.callbacks.contains_key(name),
        }
    }

    /// Delete one entry, keeping the order of the rest. Returns whether it existed.
    pub fn remove(&mut self, key: &ComponentKey) -> bool {
        let name = key.name.as_str();
        match key.kind {
            ComponentKind::Schemas => self.schemas.shift_remove(name).is_some(),
            ComponentKind::Parameters => self.parameters.shift_remove(name).is_some(),
            ComponentKind::RequestBodies => self.request_bodies.shift_remove(name).is_some(),
            ComponentKind::Responses => self.responses.shift_remove(name).is_some(),
            ComponentKind::Headers => self.headers.shift_remove(name).is_some(),
            ComponentKind::Examples => self.examples.shift_remove(name).is_some(),
            ComponentKind::Links => self.links.shift_remove(name).is_some(),
            ComponentKind::Callbacks => self.callbacks.shift_remove(name).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        ComponentKind::ALL.iter().map(|&k| self.names(k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Schema roots (where typed schemas enter the model)
// =============================================================================

/// Role of an inline schema relative to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineRole {
    Parameter(String),
    RequestBody,
    Response(String),
    Header(String),
}

/// Where a root schema was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaOrigin {
    /// `components.schemas.<name>`
    Component(String),
    /// Inside an operation or a non-schema component; `owner` is the name hint
    Inline { owner: String, role: InlineRole },
}

impl SchemaOrigin {
    /// Raw (un-normalized) name hint
    pub fn name_hint(&self) -> String {
        match self {
            Self::Component(name) => name.clone(),
            Self::Inline { owner, role } => match role {
                InlineRole::Parameter(p) => format!("{} {} param", owner, p),
                InlineRole::RequestBody => format!("{} request", owner),
                InlineRole::Response(status) => format!("{} {} response", owner, status),
                InlineRole::Header(h) => format!("{} {} header", owner, h),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRoot {
    pub schema: SchemaId,
    pub origin: SchemaOrigin,
}

/// Borrowed view of one operation
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    pub path: &'a str,
    pub method: HttpMethod,
    pub path_item: &'a PathItem,
    pub operation: &'a Operation,
}

impl<'a> OperationRef<'a> {
    /// operationId, or `<method> <path>`
    pub fn label(&self) -> String {
        match &self.operation.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method.as_str(), self.path),
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// The whole API description
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub title: Option<String>,
    pub paths: IndexMap<String, PathItem>,
    pub components: ComponentRegistry,
    pub arena: SchemaArena,
}

impl Document {
    pub fn schema(&self, id: SchemaId) -> &SchemaNode {
        self.arena.get(id)
    }

    /// Every operation, path order then method order
    pub fn operations(&self) -> Vec<OperationRef<'_>> {
        self.paths
            .iter()
            .flat_map(|(path, item)| {
                item.operations.iter().map(move |(method, operation)| OperationRef {
                    path,
                    method: *method,
                    path_item: item,
                    operation,
                })
            })
            .collect()
    }

    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|p| p.operations.len()).sum()
    }

    /// Follow `$ref` chains to the node that actually carries content.
    ///
    /// Only `#/components/schemas/<name>` targets are resolvable; a deeper
    /// pointer or a missing component is `UnresolvableReference`.
    pub fn canonical(&self, id: SchemaId) -> Result<SchemaId> {
        let mut current = id;
        let mut seen = HashSet::new();
        while let Some(raw) = &self.schema(current).reference {
            if !seen.insert(current) {
                return Err(TypeModelError::unresolvable(raw.clone(), "reference cycle"));
            }
            current = self.resolve_schema_ref(raw)?;
        }
        Ok(current)
    }

    /// Resolve a `$ref` string to the schema component it names
    pub fn resolve_schema_ref(&self, raw: &str) -> Result<SchemaId> {
        let parsed = parse_reference(raw)?;
        if parsed.key.kind != ComponentKind::Schemas {
            return Err(TypeModelError::unresolvable(
                raw,
                format!("expected a schema, found a {} reference", parsed.key.kind.as_str()),
            ));
        }
        if parsed.is_nested() {
            return Err(TypeModelError::unresolvable(
                raw,
                "pointers into a component are not supported",
            ));
        }
        self.components
            .schemas
            .get(&parsed.key.name)
            .copied()
            .ok_or_else(|| self.missing(raw, &parsed.key))
    }

    /// Dereference a parameter (possibly through alias components)
    pub fn resolve_parameter<'a>(&'a self, param: &'a RefOr<Parameter>) -> Result<&'a Parameter> {
        self.follow(param, ComponentKind::Parameters, |c, n| c.parameters.get(n))
    }

    pub fn resolve_header<'a>(&'a self, header: &'a RefOr<Header>) -> Result<&'a Header> {
        self.follow(header, ComponentKind::Headers, |c, n| c.headers.get(n))
    }

    fn follow<'a, T>(
        &'a self,
        start: &'a RefOr<T>,
        kind: ComponentKind,
        lookup: impl Fn(&'a ComponentRegistry, &str) -> Option<&'a RefOr<T>>,
    ) -> Result<&'a T> {
        let mut current = start;
        let mut hops = 0usize;
        loop {
            match current {
                RefOr::Item(item) => return Ok(item),
                RefOr::Ref(raw) => {
                    hops += 1;
                    if hops > self.components.len() + 1 {
                        return Err(TypeModelError::unresolvable(raw.clone(), "reference cycle"));
                    }
                    let parsed = parse_reference(raw)?;
                    if parsed.key.kind != kind || parsed.is_nested() {
                        return Err(TypeModelError::unresolvable(
                            raw.clone(),
                            format!("expected a {} reference", kind.as_str()),
                        ));
                    }
                    current = lookup(&self.components, &parsed.key.name)
                        .ok_or_else(|| self.missing(raw, &parsed.key))?;
                }
            }
        }
    }

    fn missing(&self, raw: &str, key: &ComponentKey) -> TypeModelError {
        TypeModelError::UnresolvableReference {
            reference: raw.to_string(),
            reason: "no such component".to_string(),
            suggestion: suggest_name(&key.name, self.components.names(key.kind)),
        }
    }

    /// Path-level parameters merged with operation-level ones.
    ///
    /// Operation parameters override path parameters with the same
    /// (name, location). Within one list a repeated (name, location) keeps the
    /// first definition; the later ones are returned as duplicates.
    pub fn effective_parameters<'a>(
        &'a self,
        op: &OperationRef<'a>,
    ) -> Result<(Vec<&'a Parameter>, Vec<(String, ParameterLocation)>)> {
        let mut duplicates = Vec::new();
        let path_level = self.dedup_parameters(&op.path_item.parameters, &mut duplicates)?;
        let op_level = self.dedup_parameters(&op.operation.parameters, &mut duplicates)?;

        let mut merged: Vec<&Parameter> = path_level
            .into_iter()
            .filter(|p| {
                !op_level
                    .iter()
                    .any(|o| o.name == p.name && o.location == p.location)
            })
            .collect();
        merged.extend(op_level);
        Ok((merged, duplicates))
    }

    fn dedup_parameters<'a>(
        &'a self,
        list: &'a [RefOr<Parameter>],
        duplicates: &mut Vec<(String, ParameterLocation)>,
    ) -> Result<Vec<&'a Parameter>> {
        let mut out: Vec<&Parameter> = Vec::with_capacity(list.len());
        for param in list {
            let param = self.resolve_parameter(param)?;
            if out
                .iter()
                .any(|p| p.name == param.name && p.location == param.location)
            {
                duplicates.push((param.name.clone(), param.location));
                continue;
            }
            out.push(param);
        }
        Ok(out)
    }

    /// Every place a typed schema enters the model, in a stable order:
    /// schema components, then schemas owned by other components, then
    /// operation-level schemas.
    pub fn schema_roots(&self, diagnostics: &mut Diagnostics) -> Result<Vec<SchemaRoot>> {
        let mut roots: Vec<SchemaRoot> = self
            .components
            .schemas
            .iter()
            .map(|(name, &schema)| SchemaRoot {
                schema,
                origin: SchemaOrigin::Component(name.clone()),
            })
            .collect();

        for (name, param) in &self.components.parameters {
            if let RefOr::Item(p) = param {
                push_parameter_roots(&mut roots, name, p);
            }
        }
        for (name, body) in &self.components.request_bodies {
            if let RefOr::Item(b) = body {
                push_content_roots(&mut roots, name, InlineRole::RequestBody, &b.content);
            }
        }
        for (name, response) in &self.components.responses {
            if let RefOr::Item(r) = response {
                self.push_response_roots(&mut roots, name, "", r)?;
            }
        }
        for (name, header) in &self.components.headers {
            if let RefOr::Item(h) = header {
                push_header_roots(&mut roots, name, name, h);
            }
        }

        for op in self.operations() {
            let owner = op.label();
            let (params, duplicates) = self.effective_parameters(&op)?;
            for (name, location) in duplicates {
                diagnostics.report(
                    owner.clone(),
                    DiagnosticCode::DuplicateParameter,
                    format!(
                        "parameter {} in {} is defined more than once; the first definition wins",
                        name,
                        location.as_str()
                    ),
                );
            }
            for p in params {
                // Shared parameter components are named from the component.
                push_parameter_roots(&mut roots, &owner, p);
            }
            if let Some(RefOr::Item(body)) = &op.operation.request_body {
                push_content_roots(&mut roots, &owner, InlineRole::RequestBody, &body.content);
            }
            for (status, response) in &op.operation.responses {
                if let RefOr::Item(r) = response {
                    self.push_response_roots(&mut roots, &owner, status, r)?;
                }
            }
        }

        // Parameters reached through shared components appear once per use;
        // keep the first occurrence of every schema.
        let mut seen = HashSet::new();
        roots.retain(|r| seen.insert(r.schema));
        Ok(roots)
    }

    /// JSON pointer of every schema node reachable from the document.
    ///
    /// Schema components come first, so a node keeps the pointer of the
    /// component that declares it.
    pub fn schema_pointers(&self) -> HashMap<SchemaId, String> {
        let mut out = HashMap::new();
        let c = &self.components;
        for (name, &id) in &c.schemas {
            self.label_schema(&mut out, id, ComponentKey::schema(name.clone()).to_string());
        }
        for (name, param) in &c.parameters {
            if let RefOr::Item(p) = param {
                let base = ComponentKey::new(ComponentKind::Parameters, name.clone()).to_string();
                self.label_parameter(&mut out, p, &base);
            }
        }
        for (name, body) in &c.request_bodies {
            if let RefOr::Item(b) = body {
                let base = ComponentKey::new(ComponentKind::RequestBodies, name.clone()).to_string();
                self.label_content(&mut out, &b.content, &base);
            }
        }
        for (name, response) in &c.responses {
            if let RefOr::Item(r) = response {
                let base = ComponentKey::new(ComponentKind::Responses, name.clone()).to_string();
                self.label_response(&mut out, r, &base);
            }
        }
        for (name, header) in &c.headers {
            if let RefOr::Item(h) = header {
                let base = ComponentKey::new(ComponentKind::Headers, name.clone()).to_string();
                self.label_header(&mut out, h, &base);
            }
        }

        for (path, item) in &self.paths {
            let base = format!("#/paths/{}", reference::escape_segment(path));
            for (i, param) in item.parameters.iter().enumerate() {
                if let RefOr::Item(p) = param {
                    self.label_parameter(&mut out, p, &format!("{}/parameters/{}", base, i));
                }
            }
            for (method, op) in &item.operations {
                let base = format!("{}/{}", base, method.as_str());
                for (i, param) in op.parameters.iter().enumerate() {
                    if let RefOr::Item(p) = param {
                        self.label_parameter(&mut out, p, &format!("{}/parameters/{}", base, i));
                    }
                }
                if let Some(RefOr::Item(body)) = &op.request_body {
                    self.label_content(&mut out, &body.content, &format!("{}/requestBody", base));
                }
                for (status, response) in &op.responses {
                    if let RefOr::Item(r) = response {
                        let base = format!("{}/responses/{}", base, reference::escape_segment(status));
                        self.label_response(&mut out, r, &base);
                    }
                }
            }
        }
        out
    }

    fn label_parameter(&self, out: &mut HashMap<SchemaId, String>, p: &Parameter, base: &str) {
        if let Some(schema) = p.schema {
            self.label_schema(out, schema, format!("{}/schema", base));
        }
        self.label_content(out, &p.content, base);
    }

    fn label_header(&self, out: &mut HashMap<SchemaId, String>, h: &Header, base: &str) {
        if let Some(schema) = h.schema {
            self.label_schema(out, schema, format!("{}/schema", base));
        }
        self.label_content(out, &h.content, base);
    }

    fn label_response(&self, out: &mut HashMap<SchemaId, String>, r: &Response, base: &str) {
        self.label_content(out, &r.content, base);
        for (name, header) in &r.headers {
            if let RefOr::Item(h) = header {
                let base = format!("{}/headers/{}", base, reference::escape_segment(name));
                self.label_header(out, h, &base);
            }
        }
    }

    fn label_content(&self, out: &mut HashMap<SchemaId, String>, content: &IndexMap<String, MediaType>, base: &str) {
        for (media, m) in content {
            if let Some(schema) = m.schema {
                let pointer = format!("{}/content/{}/schema", base, reference::escape_segment(media));
                self.label_schema(out, schema, pointer);
            }
        }
    }

    fn label_schema(&self, out: &mut HashMap<SchemaId, String>, root: SchemaId, pointer: String) {
        let mut stack = vec![(root, pointer)];
        while let Some((id, pointer)) = stack.pop() {
            if out.contains_key(&id) {
                continue;
            }
            let node = self.schema(id);
            let mut children = Vec::new();
            for (name, &child) in &node.properties {
                children.push((child, format!("{}/properties/{}", pointer, reference::escape_segment(name))));
            }
            if let Some(items) = node.items {
                children.push((items, format!("{}/items", pointer)));
            }
            if let Some(AdditionalProperties::Schema(child)) = node.additional_properties {
                children.push((child, format!("{}/additionalProperties", pointer)));
            }
            for (keyword, list) in [("allOf", &node.all_of), ("oneOf", &node.one_of), ("anyOf", &node.any_of)] {
                for (i, &child) in list.iter().enumerate() {
                    children.push((child, format!("{}/{}/{}", pointer, keyword, i)));
                }
            }
            out.insert(id, pointer);
            stack.extend(children.into_iter().rev());
        }
    }

    fn push_response_roots(
        &self,
        roots: &mut Vec<SchemaRoot>,
        owner: &str,
        status: &str,
        response: &Response,
    ) -> Result<()> {
        let role = InlineRole::Response(status.to_string());
        push_content_roots(roots, owner, role, &response.content);
        for (name, header) in &response.headers {
            let header = self.resolve_header(header)?;
            let hint = format!("{} {}", owner, status);
            push_header_roots(roots, hint.trim(), name, header);
        }
        Ok(())
    }
}

fn push_parameter_roots(roots: &mut Vec<SchemaRoot>, owner: &str, p: &Parameter) {
    let role = InlineRole::Parameter(p.name.clone());
    if let Some(schema) = p.schema {
        roots.push(SchemaRoot {
            schema,
            origin: SchemaOrigin::Inline {
                owner: owner.to_string(),
                role: role.clone(),
            },
        });
    }
    push_content_roots(roots, owner, role, &p.content);
}

fn push_header_roots(roots: &mut Vec<SchemaRoot>, owner: &str, name: &str, h: &Header) {
    let role = InlineRole::Header(name.to_string());
    if let Some(schema) = h.schema {
        roots.push(SchemaRoot {
            schema,
            origin: SchemaOrigin::Inline {
                owner: owner.to_string(),
                role: role.clone(),
            },
        });
    }
    push_content_roots(roots, owner, role, &h.content);
}

fn push_content_roots(
    roots: &mut Vec<SchemaRoot>,
    owner: &str,
    role: InlineRole,
    content: &IndexMap<String, MediaType>,
) {
    for media in content.values() {
        if let Some(schema) = media.schema {
            roots.push(SchemaRoot {
                schema,
                origin: SchemaOrigin::Inline {
                    owner: owner.to_string(),
                    role: role.clone(),
                },
            });
        }
    }
}
