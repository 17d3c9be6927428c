//! OpenAPI synthesis from the endpoint catalog.
//!
//! Everything here reads the binding plans the catalog already computed;
//! nothing re-derives routes, verbs or parameter placement.

use crate::registry::SchemaRegistry;
use crate::spec::*;
use std::collections::BTreeMap;
use stencil_core::{
    short_type_name, BindingSource, EndpointCatalog, EndpointDescriptor, FieldInfo, HttpMethod,
    ParamMeta, TypeClass,
};
use tracing::debug;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Paths, tags and component schemas synthesized from a catalog
#[derive(Debug, Default)]
pub struct Synthesis {
    pub paths: BTreeMap<String, PathItem>,
    pub tags: Vec<Tag>,
    pub schemas: BTreeMap<String, Schema>,
}

/// Describe every endpoint of `catalog`.
///
/// Component schemas are emitted only for names `registry` has not seen.
pub fn synthesize(catalog: &EndpointCatalog, registry: &SchemaRegistry) -> Synthesis {
    let mut synthesis = Synthesis::default();

    for endpoint in catalog {
        let tag = endpoint.tag().to_string();
        if !synthesis.tags.iter().any(|t| t.name == tag) {
            synthesis.tags.push(Tag {
                name: tag.clone(),
                description: None,
            });
        }

        let item = synthesis.paths.entry(endpoint.route().to_string()).or_default();
        for verb in endpoint.verbs() {
            let operation = describe_operation(endpoint, *verb, &mut synthesis.schemas, registry);
            let slot = match verb {
                HttpMethod::GET => &mut item.get,
                HttpMethod::POST => &mut item.post,
                HttpMethod::PUT => &mut item.put,
                HttpMethod::DELETE => &mut item.delete,
                HttpMethod::PATCH => &mut item.patch,
            };
            slot.get_or_insert(operation);
        }
    }

    debug!(
        paths = synthesis.paths.len(),
        schemas = synthesis.schemas.len(),
        "Synthesized OpenAPI paths"
    );
    synthesis
}

fn describe_operation(
    endpoint: &EndpointDescriptor,
    verb: HttpMethod,
    schemas: &mut BTreeMap<String, Schema>,
    registry: &SchemaRegistry,
) -> Operation {
    let descriptor = endpoint.operation();
    let service = short_type_name(descriptor.service_name());
    let mut operation_id = format!("{}_{}", service, descriptor.name());
    if endpoint.verbs().len() > 1 {
        operation_id.push('_');
        operation_id.push_str(&verb.as_str().to_lowercase());
    }

    let mut parameters = Vec::new();
    let mut request_body = None;
    let mut accepts_input = false;

    for entry in endpoint.plan().entries() {
        let param = &entry.param;
        match &entry.source {
            BindingSource::Path { name } => {
                accepts_input = true;
                parameters.push(Parameter {
                    name: name.clone(),
                    location: ParameterLocation::Path,
                    description: None,
                    required: Some(true),
                    schema: Some(type_schema(&param.short_type_name())),
                });
            }
            BindingSource::Query { name } => {
                accepts_input = true;
                parameters.push(Parameter {
                    name: name.clone(),
                    location: ParameterLocation::Query,
                    description: param.default.map(|d| format!("Defaults to `{}`", d)),
                    required: Some(false),
                    schema: Some(type_schema(&param.short_type_name())),
                });
            }
            BindingSource::FlattenedQuery { prefix } => {
                accepts_input = true;
                for field in param.fields() {
                    parameters.push(Parameter {
                        name: format!("{}{}", prefix, field.name),
                        location: ParameterLocation::Query,
                        description: None,
                        required: Some(false),
                        schema: Some(type_schema(&short_type_name(field.type_name))),
                    });
                }
            }
            BindingSource::Body => {
                accepts_input = true;
                let schema = component_schema(param, schemas, registry);
                let content = [JSON, FORM]
                    .into_iter()
                    .map(|media| {
                        (
                            media.to_string(),
                            MediaType {
                                schema: Some(schema.clone()),
                            },
                        )
                    })
                    .collect();
                request_body = Some(RequestBody {
                    description: None,
                    content,
                    required: Some(!param.nullable && param.default.is_none()),
                });
            }
            BindingSource::Injected(_) => {}
        }
    }

    let meta = descriptor.meta();
    let mut responses = BTreeMap::new();
    responses.insert(
        "200".to_string(),
        Response {
            description: format!("Returns `{}`", meta.returns),
            content: success_content(meta.returns),
        },
    );
    if accepts_input {
        responses.insert(
            "400".to_string(),
            Response {
                description: "Validation failed".to_string(),
                content: None,
            },
        );
    }
    responses.insert(
        "500".to_string(),
        Response {
            description: "Service unavailable, binding failure or operation failure".to_string(),
            content: None,
        },
    );

    Operation {
        summary: Some(descriptor.name().to_string()),
        description: None,
        operation_id: Some(operation_id),
        tags: vec![endpoint.tag().to_string()],
        parameters,
        request_body,
        responses,
    }
}

fn success_content(returns: &str) -> Option<BTreeMap<String, MediaType>> {
    let short = short_type_name(returns);
    let inner = unwrap_generic(&short, "Result")
        .map(first_argument)
        .unwrap_or(&short);
    if inner == "()" || inner == "HttpResponse" {
        return None;
    }
    let inner = unwrap_generic(inner, "Json").unwrap_or(inner);

    Some(BTreeMap::from([(
        JSON.to_string(),
        MediaType {
            schema: Some(type_schema(inner)),
        },
    )]))
}

/// `$ref` to the component schema of a structured parameter, emitting the
/// component the first time its name is seen
fn component_schema(
    param: &ParamMeta,
    schemas: &mut BTreeMap<String, Schema>,
    registry: &SchemaRegistry,
) -> Schema {
    let short = param.short_type_name();
    let name = unwrap_generic(&short, "Option").unwrap_or(&short).to_string();

    if param.class == TypeClass::Structured && registry.register_once(&name) {
        schemas.insert(name.clone(), object_schema(param.fields()));
    }
    Schema::component(&name)
}

/// Object schema built from declared fields
pub fn object_schema(fields: &[FieldInfo]) -> Schema {
    let properties = fields
        .iter()
        .map(|field| (field.name.to_string(), type_schema(&short_type_name(field.type_name))))
        .collect();
    let required = fields
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name.to_string())
        .collect();

    Schema {
        properties: Some(properties),
        required,
        ..Schema::typed("object")
    }
}

/// Schema for a short type name such as `i32`, `Option<String>`, `Vec<Uuid>`
pub fn type_schema(short: &str) -> Schema {
    let short = short.trim();
    if let Some(inner) = unwrap_generic(short, "Option") {
        return Schema {
            nullable: Some(true),
            ..type_schema(inner)
        };
    }
    if let Some(inner) = unwrap_generic(short, "Vec") {
        return Schema::array(type_schema(inner));
    }

    match short {
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Schema::formatted("integer", "int32"),
        "i64" | "i128" | "isize" | "u64" | "u128" | "usize" => Schema::formatted("integer", "int64"),
        "f32" => Schema::formatted("number", "float"),
        "f64" => Schema::formatted("number", "double"),
        "bool" => Schema::typed("boolean"),
        "String" | "str" | "&str" | "char" => Schema::typed("string"),
        "Uuid" => Schema::formatted("string", "uuid"),
        "NaiveDate" => Schema::formatted("string", "date"),
        "NaiveTime" => Schema::formatted("string", "time"),
        "NaiveDateTime" => Schema::formatted("string", "date-time"),
        s if s.starts_with("DateTime<") => Schema::formatted("string", "date-time"),
        "()" => Schema::default(),
        _ => Schema::typed("object"),
    }
}

/// `Some("T")` for `Name<T>`
fn unwrap_generic<'a>(short: &'a str, name: &str) -> Option<&'a str> {
    short
        .strip_prefix(name)?
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}

/// First top-level argument of a generic argument list
fn first_argument(args: &str) -> &str {
    let mut depth = 0usize;
    for (i, ch) in args.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return args[..i].trim(),
            _ => {}
        }
    }
    args.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_schemas() {
        assert_eq!(type_schema("i32"), Schema::formatted("integer", "int32"));
        assert_eq!(type_schema("u64"), Schema::formatted("integer", "int64"));
        assert_eq!(type_schema("String"), Schema::typed("string"));
        assert_eq!(type_schema("Uuid"), Schema::formatted("string", "uuid"));
        assert_eq!(
            type_schema("DateTime<Utc>"),
            Schema::formatted("string", "date-time")
        );
    }

    #[test]
    fn test_wrapped_schemas() {
        let nullable = type_schema("Option<i64>");
        assert_eq!(nullable.nullable, Some(true));
        assert_eq!(nullable.format.as_deref(), Some("int64"));

        let list = type_schema("Vec<String>");
        assert_eq!(list.schema_type.as_deref(), Some("array"));
        assert_eq!(list.items.as_deref(), Some(&Schema::typed("string")));
    }

    #[test]
    fn test_object_schema_lists_required_fields() {
        const FIELDS: &[FieldInfo] = &[
            FieldInfo {
                name: "name",
                type_name: "String",
                required: true,
            },
            FieldInfo {
                name: "nickname",
                type_name: "Option<String>",
                required: false,
            },
        ];

        let schema = object_schema(FIELDS);
        assert_eq!(schema.required, vec!["name"]);
        let properties = schema.properties.unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["nickname"].nullable, Some(true));
    }

    #[test]
    fn test_success_content() {
        assert!(success_content("()").is_none());
        assert!(success_content("stencil_core::http::HttpResponse").is_none());
        assert!(success_content("Result<(), String>").is_none());

        assert_eq!(first_argument("HashMap<String,u32>,Error"), "HashMap<String,u32>");

        let content = success_content("Result<Vec<User>, StoreError>").unwrap();
        let schema = content[JSON].schema.clone().unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some("array"));
    }
}
