use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::utils::number;
use crate::errors::RegistryError;
use crate::mcp::registry::ToolRegistry;

#[macros::mcp_tool(name = "add", description = "Add two numbers together")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AddTool {
    pub a: f64,
    pub b: f64,
}

pub fn add(a: f64, b: f64) -> Value {
    number(a + b)
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register_fn(AddTool::tool(), |params: AddTool| async move {
        Ok(add(params.a, params.b))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn adds_integers_and_floats() {
        assert_eq!(add(2.0, 3.0), json!(5));
        assert_eq!(add(-1.0, 1.0), json!(0));
        assert_eq!(add(0.5, 0.25), json!(0.75));
    }
}
