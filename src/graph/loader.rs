//! Document Loading
//!
//! Parses an OpenAPI 3.x JSON document into a `Document`: schema fragments go
//! into the arena, named components into their buckets, paths and operations
//! keep declaration order.
//!
//! Only what the type model needs is read. Unknown keywords are ignored.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::{
    AdditionalProperties, Bounds, Callback, ComponentRegistry, Discriminator, Document, Example,
    Header, HttpMethod, JsonType, Link, MediaType, Operation, Parameter, ParameterLocation,
    PathItem, RefOr, RequestBody, Response, SchemaArena, SchemaFlags, SchemaId, SchemaNode,
};
use crate::error::{Result, TypeModelError};

/// Load a document from a JSON file
pub fn load_from_path(path: &Path) -> anyhow::Result<Document> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let json: Value = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON in {}: {}", path.display(), e))?;
    Ok(load_from_value(&json)?)
}

/// Load a document from JSON text
pub fn load_from_str(content: &str) -> Result<Document> {
    let json: Value = serde_json::from_str(content)?;
    load_from_value(&json)
}

/// Load a document from an already parsed JSON value
pub fn load_from_value(json: &Value) -> Result<Document> {
    let root = json
        .as_object()
        .ok_or_else(|| TypeModelError::InvalidDocument("document root is not an object".into()))?;

    let mut loader = Loader::default();

    let components = match root.get("components") {
        Some(v) => loader.components(object(v, "components")?)?,
        None => ComponentRegistry::default(),
    };

    let mut paths = IndexMap::new();
    if let Some(v) = root.get("paths") {
        for (path, item) in object(v, "paths")? {
            paths.insert(path.clone(), loader.path_item(item, path)?);
        }
    }

    let title = root
        .get("info")
        .and_then(|i| i.get("title"))
        .and_then(|t| t.as_str())
        .map(String::from);

    Ok(Document {
        title,
        paths,
        components,
        arena: loader.arena,
    })
}

fn object<'a>(v: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    v.as_object()
        .ok_or_else(|| TypeModelError::InvalidDocument(format!("{} must be an object", what)))
}

fn ref_of(v: &Value) -> Option<String> {
    v.get("$ref").and_then(|r| r.as_str()).map(String::from)
}

fn bool_at(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn u64_at(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    obj.get(key).and_then(|v| v.as_u64())
}

fn f64_at(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

fn string_at(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

#[derive(Default)]
struct Loader {
    arena: SchemaArena,
}

impl Loader {
    fn components(&mut self, obj: &Map<String, Value>) -> Result<ComponentRegistry> {
        let mut reg = ComponentRegistry::default();

        if let Some(v) = obj.get("schemas") {
            for (name, schema) in object(v, "components.schemas")? {
                let id = self.schema(schema)?;
                reg.schemas.insert(name.clone(), id);
            }
        }
        if let Some(v) = obj.get("parameters") {
            for (name, p) in object(v, "components.parameters")? {
                reg.parameters.insert(name.clone(), self.ref_or(p, Self::parameter)?);
            }
        }
        if let Some(v) = obj.get("requestBodies") {
            for (name, b) in object(v, "components.requestBodies")? {
                reg.request_bodies.insert(name.clone(), self.ref_or(b, Self::request_body)?);
            }
        }
        if let Some(v) = obj.get("responses") {
            for (name, r) in object(v, "components.responses")? {
                reg.responses.insert(name.clone(), self.ref_or(r, Self::response)?);
            }
        }
        if let Some(v) = obj.get("headers") {
            for (name, h) in object(v, "components.headers")? {
                reg.headers.insert(name.clone(), self.ref_or(h, Self::header)?);
            }
        }
        if let Some(v) = obj.get("examples") {
            for (name, e) in object(v, "components.examples")? {
                reg.examples.insert(name.clone(), self.ref_or(e, Self::example)?);
            }
        }
        if let Some(v) = obj.get("links") {
            for (name, l) in object(v, "components.links")? {
                reg.links.insert(name.clone(), self.ref_or(l, Self::link)?);
            }
        }
        if let Some(v) = obj.get("callbacks") {
            for (name, c) in object(v, "components.callbacks")? {
                reg.callbacks.insert(name.clone(), self.ref_or(c, Self::callback)?);
            }
        }
        Ok(reg)
    }

    fn ref_or<T>(&mut self, v: &Value, parse: fn(&mut Self, &Value) -> Result<T>) -> Result<RefOr<T>> {
        match ref_of(v) {
            Some(r) => Ok(RefOr::Ref(r)),
            None => Ok(RefOr::Item(parse(self, v)?)),
        }
    }

    // -------------------------------------------------------------------------
    // Schemas
    // -------------------------------------------------------------------------

    fn schema(&mut self, v: &Value) -> Result<SchemaId> {
        // Boolean schemas: `true` accepts anything, `false` nothing; both load
        // as an unconstrained node.
        let obj = match v {
            Value::Bool(_) => return Ok(self.arena.alloc(SchemaNode::default())),
            Value::Object(obj) => obj,
            _ => {
                return Err(TypeModelError::InvalidDocument(format!(
                    "schema must be an object, got {}",
                    v
                )))
            }
        };

        // Sibling keywords of `$ref` are ignored (3.0 semantics), except the title.
        if let Some(reference) = ref_of(v) {
            return Ok(self.arena.alloc(SchemaNode {
                reference: Some(reference),
                title: string_at(obj, "title"),
                ..Default::default()
            }));
        }

        let mut node = SchemaNode {
            title: string_at(obj, "title"),
            format: string_at(obj, "format"),
            pattern: string_at(obj, "pattern"),
            bounds: Bounds {
                minimum: f64_at(obj, "minimum"),
                maximum: f64_at(obj, "maximum"),
                multiple_of: f64_at(obj, "multipleOf"),
                min_length: u64_at(obj, "minLength"),
                max_length: u64_at(obj, "maxLength"),
                min_items: u64_at(obj, "minItems"),
                max_items: u64_at(obj, "maxItems"),
                min_properties: u64_at(obj, "minProperties"),
                max_properties: u64_at(obj, "maxProperties"),
            },
            flags: SchemaFlags {
                nullable: bool_at(obj, "nullable"),
                read_only: bool_at(obj, "readOnly"),
                write_only: bool_at(obj, "writeOnly"),
                unique_items: bool_at(obj, "uniqueItems"),
                exclusive_minimum: bool_at(obj, "exclusiveMinimum"),
                exclusive_maximum: bool_at(obj, "exclusiveMaximum"),
            },
            default: obj.get("default").cloned(),
            example: obj.get("example").cloned(),
            ..Default::default()
        };

        // 3.1 numeric exclusive bounds
        if let Some(n) = f64_at(obj, "exclusiveMinimum") {
            node.bounds.minimum = Some(n);
            node.flags.exclusive_minimum = true;
        }
        if let Some(n) = f64_at(obj, "exclusiveMaximum") {
            node.bounds.maximum = Some(n);
            node.flags.exclusive_maximum = true;
        }

        if let Some(values) = obj.get("enum").and_then(|e| e.as_array()) {
            node.enum_values = values.clone();
        }

        match obj.get("type") {
            Some(Value::String(s)) => node.json_type = Some(self.json_type(s)?),
            Some(Value::Array(types)) => {
                // 3.1 type arrays: "null" sets nullable; several other types
                // become an anyOf of single-typed branches.
                let mut kinds = Vec::new();
                for t in types {
                    let s = t.as_str().ok_or_else(|| {
                        TypeModelError::InvalidDocument("type array entries must be strings".into())
                    })?;
                    match self.json_type(s)? {
                        JsonType::Null => node.flags.nullable = true,
                        kind => kinds.push(kind),
                    }
                }
                match kinds.as_slice() {
                    [] => node.json_type = Some(JsonType::Null),
                    [single] => node.json_type = Some(*single),
                    many => {
                        for kind in many {
                            let branch = self.arena.alloc(SchemaNode {
                                json_type: Some(*kind),
                                ..Default::default()
                            });
                            node.any_of.push(branch);
                        }
                    }
                }
            }
            Some(other) => {
                return Err(TypeModelError::InvalidDocument(format!(
                    "invalid type keyword: {}",
                    other
                )))
            }
            None => {}
        }

        if let Some(props) = obj.get("properties") {
            for (name, prop) in object(props, "properties")? {
                let id = self.schema(prop)?;
                node.properties.insert(name.clone(), id);
            }
        }
        if let Some(required) = obj.get("required").and_then(|r| r.as_array()) {
            node.required = required
                .iter()
                .filter_map(|r| r.as_str().map(String::from))
                .collect();
        }
        if let Some(items) = obj.get("items") {
            node.items = Some(self.schema(items)?);
        }
        node.additional_properties = match obj.get("additionalProperties") {
            None => None,
            Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
            Some(schema) => Some(AdditionalProperties::Schema(self.schema(schema)?)),
        };

        node.all_of = self.schema_list(obj, "allOf")?;
        node.one_of = self.schema_list(obj, "oneOf")?;
        node.any_of.extend(self.schema_list(obj, "anyOf")?);

        if let Some(d) = obj.get("discriminator") {
            let d = object(d, "discriminator")?;
            let property_name = string_at(d, "propertyName").ok_or_else(|| {
                TypeModelError::InvalidDocument("discriminator without propertyName".into())
            })?;
            let mut mapping = IndexMap::new();
            if let Some(m) = d.get("mapping").and_then(|m| m.as_object()) {
                for (value, target) in m {
                    if let Some(target) = target.as_str() {
                        mapping.insert(value.clone(), target.to_string());
                    }
                }
            }
            node.discriminator = Some(Discriminator {
                property_name,
                mapping,
            });
        }

        Ok(self.arena.alloc(node))
    }

    fn json_type(&self, s: &str) -> Result<JsonType> {
        JsonType::from_json_type(s)
            .ok_or_else(|| TypeModelError::InvalidDocument(format!("unknown type '{}'", s)))
    }

    fn schema_list(&mut self, obj: &Map<String, Value>, key: &str) -> Result<Vec<SchemaId>> {
        match obj.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(list)) => list.iter().map(|s| self.schema(s)).collect(),
            Some(_) => Err(TypeModelError::InvalidDocument(format!("{} must be an array", key))),
        }
    }

    // -------------------------------------------------------------------------
    // Operations and their parts
    // -------------------------------------------------------------------------

    fn path_item(&mut self, v: &Value, path: &str) -> Result<PathItem> {
        let obj = object(v, path)?;
        if obj.contains_key("$ref") {
            return Err(TypeModelError::InvalidDocument(format!(
                "path item references are not supported ({})",
                path
            )));
        }
        let mut item = PathItem {
            parameters: self.parameter_list(obj)?,
            ..Default::default()
        };
        for method in HttpMethod::ALL {
            if let Some(op) = obj.get(method.as_str()) {
                item.operations.insert(method, self.operation(op)?);
            }
        }
        Ok(item)
    }

    fn operation(&mut self, v: &Value) -> Result<Operation> {
        let obj = object(v, "operation")?;
        let mut op = Operation {
            operation_id: string_at(obj, "operationId"),
            tags: obj
                .get("tags")
                .and_then(|t| t.as_array())
                .map(|t| t.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            parameters: self.parameter_list(obj)?,
            ..Default::default()
        };
        if let Some(body) = obj.get("requestBody") {
            op.request_body = Some(self.ref_or(body, Self::request_body)?);
        }
        if let Some(responses) = obj.get("responses") {
            for (status, r) in object(responses, "responses")? {
                op.responses.insert(status.clone(), self.ref_or(r, Self::response)?);
            }
        }
        if let Some(callbacks) = obj.get("callbacks") {
            for (name, c) in object(callbacks, "callbacks")? {
                op.callbacks.insert(name.clone(), self.ref_or(c, Self::callback)?);
            }
        }
        Ok(op)
    }

    fn parameter_list(&mut self, obj: &Map<String, Value>) -> Result<Vec<RefOr<Parameter>>> {
        match obj.get("parameters").and_then(|p| p.as_array()) {
            Some(list) => list.iter().map(|p| self.ref_or(p, Self::parameter)).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn parameter(&mut self, v: &Value) -> Result<Parameter> {
        let obj = object(v, "parameter")?;
        let name = string_at(obj, "name")
            .ok_or_else(|| TypeModelError::InvalidDocument("parameter without name".into()))?;
        let location = obj
            .get("in")
            .and_then(|l| l.as_str())
            .and_then(ParameterLocation::from_str)
            .ok_or_else(|| {
                TypeModelError::InvalidDocument(format!("parameter {} has no valid 'in'", name))
            })?;
        let schema = obj.get("schema").map(|s| self.schema(s)).transpose()?;
        Ok(Parameter {
            required: location == ParameterLocation::Path || bool_at(obj, "required"),
            name,
            location,
            schema,
            content: self.content(obj)?,
            examples: self.examples(obj)?,
        })
    }

    fn request_body(&mut self, v: &Value) -> Result<RequestBody> {
        let obj = object(v, "requestBody")?;
        Ok(RequestBody {
            required: bool_at(obj, "required"),
            content: self.content(obj)?,
        })
    }

    fn response(&mut self, v: &Value) -> Result<Response> {
        let obj = object(v, "response")?;
        let mut response = Response {
            description: string_at(obj, "description"),
            content: self.content(obj)?,
            ..Default::default()
        };
        if let Some(headers) = obj.get("headers") {
            for (name, h) in object(headers, "headers")? {
                response.headers.insert(name.clone(), self.ref_or(h, Self::header)?);
            }
        }
        if let Some(links) = obj.get("links") {
            for (name, l) in object(links, "links")? {
                response.links.insert(name.clone(), self.ref_or(l, Self::link)?);
            }
        }
        Ok(response)
    }

    fn header(&mut self, v: &Value) -> Result<Header> {
        let obj = object(v, "header")?;
        Ok(Header {
            required: bool_at(obj, "required"),
            schema: obj.get("schema").map(|s| self.schema(s)).transpose()?,
            content: self.content(obj)?,
            examples: self.examples(obj)?,
        })
    }

    fn content(&mut self, obj: &Map<String, Value>) -> Result<IndexMap<String, MediaType>> {
        let mut out = IndexMap::new();
        if let Some(content) = obj.get("content") {
            for (media, m) in object(content, "content")? {
                let m_obj = object(m, media)?;
                out.insert(
                    media.clone(),
                    MediaType {
                        schema: m_obj.get("schema").map(|s| self.schema(s)).transpose()?,
                        example: m_obj.get("example").cloned(),
                        examples: self.examples(m_obj)?,
                    },
                );
            }
        }
        Ok(out)
    }

    fn examples(&mut self, obj: &Map<String, Value>) -> Result<IndexMap<String, RefOr<Example>>> {
        let mut out = IndexMap::new();
        if let Some(examples) = obj.get("examples").and_then(|e| e.as_object()) {
            for (name, e) in examples {
                out.insert(name.clone(), self.ref_or(e, Self::example)?);
            }
        }
        Ok(out)
    }

    fn example(&mut self, v: &Value) -> Result<Example> {
        let obj = object(v, "example")?;
        Ok(Example {
            summary: string_at(obj, "summary"),
            value: obj.get("value").cloned(),
            external_value: string_at(obj, "externalValue"),
        })
    }

    fn link(&mut self, v: &Value) -> Result<Link> {
        let obj = object(v, "link")?;
        Ok(Link {
            operation_id: string_at(obj, "operationId"),
            operation_ref: string_at(obj, "operationRef"),
        })
    }

    fn callback(&mut self, v: &Value) -> Result<Callback> {
        let mut callback = Callback::default();
        for (expression, item) in object(v, "callback")? {
            callback
                .expressions
                .insert(expression.clone(), self.path_item(item, expression)?);
        }
        Ok(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_minimal_document() {
        let doc = load_from_value(&json!({
            "openapi": "3.0.3",
            "info": { "title": "Pets", "version": "1" },
            "paths": {
                "/pets/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "schema": { "type": "string" } }
                    ],
                    "get": {
                        "operationId": "getPet",
                        "tags": ["pets"],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Pet" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "required": ["name"],
                        "properties": { "name": { "type": "string", "minLength": 1 } }
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(doc.title.as_deref(), Some("Pets"));
        assert_eq!(doc.operation_count(), 1);
        let item = &doc.paths["/pets/{id}"];
        match &item.parameters[0] {
            RefOr::Item(p) => assert!(p.required),
            other => panic!("Expected inline parameter, got {:?}", other),
        }
        let pet = doc.schema(doc.components.schemas["Pet"]);
        assert_eq!(pet.json_type, Some(JsonType::Object));
        assert_eq!(pet.required, vec!["name"]);
        let name = doc.schema(pet.properties["name"]);
        assert_eq!(name.bounds.min_length, Some(1));
    }

    #[test]
    fn test_ref_siblings_ignored() {
        let doc = load_from_value(&json!({
            "components": { "schemas": {
                "A": { "$ref": "#/components/schemas/B", "nullable": true },
                "B": { "type": "string" }
            }}
        }))
        .unwrap();
        let a = doc.schema(doc.components.schemas["A"]);
        assert_eq!(a.reference.as_deref(), Some("#/components/schemas/B"));
        assert!(!a.flags.nullable);
    }

    #[test]
    fn test_type_array_with_null() {
        let doc = load_from_value(&json!({
            "components": { "schemas": {
                "Name": { "type": ["string", "null"] },
                "Mixed": { "type": ["string", "integer"] }
            }}
        }))
        .unwrap();
        let name = doc.schema(doc.components.schemas["Name"]);
        assert_eq!(name.json_type, Some(JsonType::String));
        assert!(name.flags.nullable);
        let mixed = doc.schema(doc.components.schemas["Mixed"]);
        assert_eq!(mixed.json_type, None);
        assert_eq!(mixed.any_of.len(), 2);
    }

    #[test]
    fn test_numeric_exclusive_bounds() {
        let doc = load_from_value(&json!({
            "components": { "schemas": {
                "Positive": { "type": "number", "exclusiveMinimum": 0 }
            }}
        }))
        .unwrap();
        let node = doc.schema(doc.components.schemas["Positive"]);
        assert_eq!(node.bounds.minimum, Some(0.0));
        assert!(node.flags.exclusive_minimum);
    }

    #[test]
    fn test_parameter_without_location_rejected() {
        let err = load_from_value(&json!({
            "paths": { "/x": { "get": { "parameters": [{ "name": "q" }], "responses": {} } } }
        }))
        .unwrap_err();
        assert!(matches!(err, TypeModelError::InvalidDocument(_)));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        fs::write(&path, r#"{"components":{"schemas":{"Id":{"type":"integer"}}}}"#).unwrap();
        let doc = load_from_path(&path).unwrap();
        assert_eq!(doc.components.schemas.len(), 1);
    }
}
