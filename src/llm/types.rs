//! Structured completion contract
//!
//! A completion takes a system prompt, a user prompt and an output schema and
//! returns a JSON value that must deserialize into the schema's Rust type.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ServiceError;

/// JSON schema describing the expected completion output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    /// Derive the schema from a Rust type
    pub fn of<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        let name = T::schema_name().to_string();
        Self {
            name,
            schema: serde_json::to_value(&schema).unwrap_or(Value::Null),
        }
    }
}

/// One structured completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema: OutputSchema,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Request whose output deserializes into `T`
    pub fn new<T: JsonSchema>(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            schema: OutputSchema::of::<T>(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Opaque structured completion provider
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Return a value conforming to `request.schema`, or fail
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError>;
}

/// Complete and deserialize into `T`; shape errors become `SchemaMismatch`
pub async fn complete_as<T>(
    service: &dyn CompletionService,
    system: impl Into<String>,
    user: impl Into<String>,
    temperature: f32,
) -> Result<T, ServiceError>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = CompletionRequest::new::<T>(system, user).with_temperature(temperature);
    let value = service.complete(&request).await?;
    serde_json::from_value(value).map_err(|e| {
        ServiceError::SchemaMismatch(format!("{} output: {}", request.schema.name, e))
    })
}
