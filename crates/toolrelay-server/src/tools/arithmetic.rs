use serde::Deserialize;
use serde_json::Value;

use toolrelay_core::Error;
use toolrelay_mcp::{parse_arguments, ToolOutput, ToolRegistry};

#[derive(Debug, Deserialize)]
struct Operands {
    a: f64,
    b: f64,
}

fn operands_schema(verb: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "a": { "type": "number", "description": format!("The first number to {verb}.") },
            "b": { "type": "number", "description": format!("The second number to {verb}.") }
        },
        "required": ["a", "b"]
    })
}

pub(super) fn register(tools: &mut ToolRegistry) {
    tools
        .register(
            "add",
            "Adds two numbers together and returns their sum.",
            operands_schema("add"),
            add,
        )
        .register(
            "subtract",
            "Subtracts the second number from the first.",
            operands_schema("subtract"),
            subtract,
        )
        .register(
            "multiply",
            "Multiplies two numbers.",
            operands_schema("multiply"),
            multiply,
        )
        .register(
            "divide",
            "Divides the first number by the second.",
            operands_schema("divide"),
            divide,
        );
}

fn number(value: f64) -> Result<ToolOutput, Error> {
    if value.is_finite() {
        Ok(ToolOutput::text(value.to_string()))
    } else {
        Err(Error::ToolFailed("result is not a finite number".to_string()))
    }
}

async fn add(arguments: Value) -> Result<ToolOutput, Error> {
    let Operands { a, b } = parse_arguments(arguments)?;
    number(a + b)
}

async fn subtract(arguments: Value) -> Result<ToolOutput, Error> {
    let Operands { a, b } = parse_arguments(arguments)?;
    number(a - b)
}

async fn multiply(arguments: Value) -> Result<ToolOutput, Error> {
    let Operands { a, b } = parse_arguments(arguments)?;
    number(a * b)
}

async fn divide(arguments: Value) -> Result<ToolOutput, Error> {
    let Operands { a, b } = parse_arguments(arguments)?;
    if b == 0.0 {
        return Err(Error::InvalidArguments("division by zero".to_string()));
    }
    number(a / b)
}
