//! Built-in Tools - registered at startup
//!
//! Vector index tools (`pinecone_*`) and document tools (`notion_*`).

use crate::error::Result;
use crate::registry::{Capability, ToolDescriptor, ToolRegistry};
use crate::schema::{Field, ObjectSchema, Schema};
use tracing::info;

pub const PINECONE_QUERY: &str = "pinecone_query";
pub const PINECONE_UPSERT: &str = "pinecone_upsert";
pub const NOTION_GET_PAGE: &str = "notion_get_page";

pub fn pinecone_query() -> ToolDescriptor {
    ToolDescriptor::new(
        PINECONE_QUERY,
        "Query a Pinecone index for the vectors nearest to the given embedding.",
        ObjectSchema::new()
            .field(
                Field::required("vector", Schema::array(Schema::Number))
                    .with_description("Query embedding"),
            )
            .field(
                Field::required("topK", Schema::Integer)
                    .with_description("Number of matches to return"),
            )
            .field(
                Field::optional("indexName", Schema::String)
                    .with_description("Index to query (defaults to the configured index)"),
            )
            .field(
                Field::optional("filter", Schema::any_object())
                    .with_description("Metadata filter"),
            )
            .field(Field::optional("namespace", Schema::String))
            .field(
                Field::optional("includeMetadata", Schema::Boolean)
                    .with_description("Return match metadata (default true)"),
            ),
        Capability::VectorQuery,
    )
}

pub fn pinecone_upsert() -> ToolDescriptor {
    let record = ObjectSchema::new()
        .field(Field::required("id", Schema::String))
        .field(Field::required("values", Schema::array(Schema::Number)))
        .field(Field::optional("metadata", Schema::any_object()));

    ToolDescriptor::new(
        PINECONE_UPSERT,
        "Insert or update vectors in a Pinecone index.",
        ObjectSchema::new()
            .field(
                Field::required("vectors", Schema::array(record.into()))
                    .with_description("Vectors to write"),
            )
            .field(
                Field::optional("indexName", Schema::String)
                    .with_description("Index to write to (defaults to the configured index)"),
            )
            .field(Field::optional("namespace", Schema::String)),
        Capability::VectorUpsert,
    )
}

pub fn notion_get_page() -> ToolDescriptor {
    ToolDescriptor::new(
        NOTION_GET_PAGE,
        "Retrieve a Notion page by ID.",
        ObjectSchema::new().field(
            Field::required("pageId", Schema::String).with_description("Notion page ID"),
        ),
        Capability::FetchDocument,
    )
}

/// Register every built-in tool, returning how many were added
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<usize> {
    let tools = [pinecone_query(), pinecone_upsert(), notion_get_page()];
    let count = tools.len();
    for tool in tools {
        registry.register(tool)?;
    }

    info!("Loaded {} built-in tools", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;

    #[test]
    fn test_register_builtins() {
        let mut registry = ToolRegistry::new();
        assert_eq!(register_builtin_tools(&mut registry).unwrap(), 3);

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![PINECONE_QUERY, PINECONE_UPSERT, NOTION_GET_PAGE]);
    }

    #[test]
    fn test_builtins_register_once() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        assert_eq!(
            register_builtin_tools(&mut registry).unwrap_err(),
            ToolError::DuplicateTool(PINECONE_QUERY.into())
        );
    }

    #[test]
    fn test_query_schema_advertises_required_fields() {
        let schema = pinecone_query().definition().input_schema;
        assert_eq!(schema["required"], serde_json::json!(["vector", "topK"]));
        assert_eq!(schema["properties"]["vector"]["items"]["type"], "number");
    }
}
