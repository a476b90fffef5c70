//! banter-tools: Built-in tools for banter
//!
//! This crate provides the default tools available to the chat agent:
//! - Weather: a stub lookup for demos
//! - Web: fetch and parse webpages

pub mod weather;
pub mod web;

use banter_core::Tool;

pub use weather::GetWeatherTool;
pub use web::FetchPageTool;

/// Create the weather demo tools.
pub fn create_weather_tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(GetWeatherTool)]
}

/// Create the web tools.
pub fn create_web_tools() -> Vec<Box<dyn Tool>> {
    vec![Box::new(FetchPageTool::new())]
}

/// Create the default tool set. The web tools are optional because they
/// reach the network.
pub fn create_default_tools(enable_web: bool) -> Vec<Box<dyn Tool>> {
    let mut tools = create_weather_tools();
    if enable_web {
        tools.extend(create_web_tools());
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_set() {
        let tools = create_default_tools(true);
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert!(names.contains(&"get_weather"));
        assert!(names.contains(&"fetch_page"));

        let without_web = create_default_tools(false);
        assert_eq!(without_web.len(), 1);
        assert_eq!(without_web[0].name(), "get_weather");
    }
}
