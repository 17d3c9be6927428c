//! Builder for OpenAPI documents

use crate::registry::SchemaRegistry;
use crate::spec::*;
use crate::synth;
use std::collections::BTreeMap;
use std::sync::Arc;
use stencil_core::EndpointCatalog;

/// Builder for OpenAPI documents
#[derive(Debug, Clone)]
pub struct OpenApiBuilder {
    spec: OpenApiSpec,
    registry: Arc<SchemaRegistry>,
}

impl OpenApiBuilder {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            spec: OpenApiSpec {
                openapi: "3.0.3".to_string(),
                info: Info {
                    title: title.into(),
                    version: version.into(),
                    description: None,
                },
                servers: Vec::new(),
                paths: BTreeMap::new(),
                components: Some(Components::default()),
                tags: Vec::new(),
            },
            registry: Arc::new(SchemaRegistry::new()),
        }
    }

    /// Share a schema registry with other builders.
    ///
    /// Schemas already registered elsewhere are referenced but not emitted
    /// again by this builder.
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.info.description = Some(description.into());
        self
    }

    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.spec.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    /// Add a tag; a tag already present keeps its first description
    pub fn tag(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        if !self.spec.tags.iter().any(|tag| tag.name == name) {
            self.spec.tags.push(Tag { name, description });
        }
        self
    }

    pub fn path(mut self, path: impl Into<String>, item: PathItem) -> Self {
        self.spec.paths.insert(path.into(), item);
        self
    }

    /// Add a component schema unless one with the same name was registered
    pub fn schema(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        if self.registry.register_once(&name) {
            self.spec
                .components
                .get_or_insert_with(Components::default)
                .schemas
                .insert(name, schema);
        }
        self
    }

    /// Describe every endpoint of a catalog
    pub fn catalog(mut self, catalog: &EndpointCatalog) -> Self {
        let synthesis = synth::synthesize(catalog, &self.registry);

        for (route, item) in synthesis.paths {
            let existing = self.spec.paths.entry(route).or_default();
            merge_path_item(existing, item);
        }
        for tag in synthesis.tags {
            self = self.tag(tag.name, tag.description);
        }
        self.spec
            .components
            .get_or_insert_with(Components::default)
            .schemas
            .extend(synthesis.schemas);
        self
    }

    pub fn build(self) -> OpenApiSpec {
        self.spec
    }
}

fn merge_path_item(existing: &mut PathItem, item: PathItem) {
    existing.get = existing.get.take().or(item.get);
    existing.post = existing.post.take().or(item.post);
    existing.put = existing.put.take().or(item.put);
    existing.delete = existing.delete.take().or(item.delete);
    existing.patch = existing.patch.take().or(item.patch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basics() {
        let spec = OpenApiBuilder::new("Orders", "1.0.0")
            .description("Order service")
            .server("http://localhost:3000", None)
            .tag("Sales", None)
            .tag("Sales", Some("ignored".to_string()))
            .build();

        assert_eq!(spec.openapi, "3.0.3");
        assert_eq!(spec.info.title, "Orders");
        assert_eq!(spec.servers.len(), 1);
        assert_eq!(spec.tags.len(), 1);
        assert!(spec.tags[0].description.is_none());
    }

    #[test]
    fn test_schema_is_added_once() {
        let spec = OpenApiBuilder::new("Orders", "1.0.0")
            .schema("Order", Schema::typed("object"))
            .schema("Order", Schema::typed("string"))
            .build();

        let schemas = spec.components.unwrap().schemas;
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas["Order"], Schema::typed("object"));
    }

    #[test]
    fn test_shared_registry_suppresses_known_schemas() {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register_once("Order");

        let spec = OpenApiBuilder::new("Orders", "1.0.0")
            .with_registry(Arc::clone(&registry))
            .schema("Order", Schema::typed("object"))
            .build();

        assert!(spec.components.unwrap().schemas.is_empty());
    }

    #[test]
    fn test_json_and_yaml_output() {
        let spec = OpenApiBuilder::new("Orders", "1.0.0")
            .path("/orders", PathItem::default())
            .build();

        let json = spec.to_json().unwrap();
        assert!(json.contains("\"openapi\":\"3.0.3\""));
        let yaml = spec.to_yaml().unwrap();
        assert!(yaml.contains("title: Orders"));
    }
}
