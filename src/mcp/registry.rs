//! Name-keyed tool registry
//!
//! Built once at start-up and handed to the transport by reference. Every
//! entry pairs the advertised descriptor with the handler that serves it.

use std::{collections::HashMap, future::Future, marker::PhantomData};

use async_trait::async_trait;
use rust_mcp_sdk::schema::Tool;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{RegistryError, ToolError};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Adapts an async closure over a typed argument struct.
struct FnHandler<P, F> {
    handler: F,
    _params: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, F, Fut> ToolHandler for FnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let params: P = serde_json::from_value(arguments).map_err(ToolError::invalid_arguments)?;
        (self.handler)(params).await
    }
}

pub struct RegisteredTool {
    pub descriptor: Tool,
    handler: Box<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, descriptor: Tool, handler: H) -> Result<(), RegistryError>
    where
        H: ToolHandler + 'static,
    {
        let name = descriptor.name.clone();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool { name });
        }

        self.index.insert(name, self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Registers an async function taking the tool's deserialized arguments.
    pub fn register_fn<P, F, Fut>(&mut self, descriptor: Tool, handler: F) -> Result<(), RegistryError>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(
            descriptor,
            FnHandler {
                handler,
                _params: PhantomData,
            },
        )
    }

    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::unknown_tool(name))?;

        tool.handler
            .call(Value::Object(arguments.unwrap_or_default()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use rust_mcp_sdk::macros;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[macros::mcp_tool(name = "echo", description = "Echo the input back")]
    #[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
    pub struct EchoTool {
        pub text: String,
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(EchoTool::tool(), |params: EchoTool| async move {
                Ok(json!(params.text))
            })
            .expect("register echo");
        registry
    }

    #[tokio::test]
    async fn calls_registered_handler() {
        let mut arguments = Map::new();
        arguments.insert("text".to_string(), json!("hello"));

        let result = registry()
            .call("echo", Some(arguments))
            .await
            .expect("echo result");
        assert_eq!(result, json!("hello"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_closed() {
        let err = registry()
            .call("missing", None)
            .await
            .expect_err("unknown tool");
        assert!(matches!(err, ToolError::UnknownTool { ref name } if name == "missing"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported() {
        let err = registry()
            .call("echo", None)
            .await
            .expect_err("missing text argument");
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry
            .register_fn(EchoTool::tool(), |_: EchoTool| async move { Ok(Value::Null) })
            .expect_err("duplicate registration");
        assert!(matches!(err, RegistryError::DuplicateTool { ref name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn descriptors_are_listed_once_per_name() {
        let registry = registry();
        let first = registry.descriptors();
        let second = registry.descriptors();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].name, "echo");
    }
}
