//! Demo weather tool for trying out the agent loop end to end.

use async_trait::async_trait;
use serde::Deserialize;

use banter_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};

/// A stub weather lookup. It never consults anything, which makes it ideal
/// for demos and for exercising the tool-call plumbing.
pub struct GetWeatherTool;

#[derive(Deserialize)]
struct GetWeatherArgs {
    city: String,
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get weather for a given city."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new().add_property(
                "city",
                PropertySchema::string("City to get the weather for"),
                true,
            ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: GetWeatherArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool("get_weather", format!("Invalid arguments: {}", e)))?;

        Ok(ToolOutput::success(format!(
            "It's always sunny in {}!",
            args.city
        )))
    }
}
