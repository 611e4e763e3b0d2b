//! Tool input schemas
//!
//! A small structural type model: primitives, arrays with an element schema,
//! and objects made of named fields. Objects are open (unknown fields are
//! allowed). The model renders to JSON Schema for capability advertisement.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    String,
    Number,
    Integer,
    Boolean,
    /// Any JSON value, including null
    Any,
    Array(Box<Schema>),
    Object(ObjectSchema),
}

impl Schema {
    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    /// Object with no declared fields (any object)
    pub fn any_object() -> Self {
        Schema::Object(ObjectSchema::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::String => "string",
            Schema::Number => "number",
            Schema::Integer => "integer",
            Schema::Boolean => "boolean",
            Schema::Any => "any",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
        }
    }

    /// Render as JSON Schema
    pub fn to_json_schema(&self) -> Value {
        match self {
            Schema::Any => json!({}),
            Schema::Array(items) => json!({
                "type": "array",
                "items": items.to_json_schema()
            }),
            Schema::Object(object) => object.to_json_schema(),
            primitive => json!({ "type": primitive.type_name() }),
        }
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        Schema::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
    pub description: Option<String>,
}

impl Field {
    pub fn required(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            required: false,
            ..Self::required(name, schema)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = field.schema.to_json_schema();
            if let (Some(description), Value::Object(map)) = (&field.description, &mut property) {
                map.insert("description".into(), Value::String(description.clone()));
            }
            properties.insert(field.name.clone(), property);
        }

        let required: Vec<&str> = self.required_names().collect();
        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}
