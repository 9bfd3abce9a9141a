use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::Value;

use toolrelay_core::Error;
use toolrelay_mcp::{parse_arguments, ToolOutput, ToolRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TimeFormat {
    Iso,
    Local,
    Unix,
    #[default]
    Detailed,
}

#[derive(Debug, Default, Deserialize)]
struct TimeArgs {
    #[serde(default)]
    format: Option<TimeFormat>,
}

pub(super) fn register(tools: &mut ToolRegistry) {
    tools.register(
        "get_current_time",
        "Returns the current date and time as an ISO 8601 string, local time, Unix timestamp, or a detailed JSON object.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "enum": ["iso", "local", "unix", "detailed"],
                    "description": "Output format. Defaults to 'detailed'."
                }
            },
            "required": []
        }),
        current_time,
    );
}

async fn current_time(arguments: Value) -> Result<ToolOutput, Error> {
    let args: TimeArgs = if arguments.is_null() {
        TimeArgs::default()
    } else {
        parse_arguments(arguments)?
    };
    render(Utc::now(), args.format.unwrap_or_default())
}

fn render(now: DateTime<Utc>, format: TimeFormat) -> Result<ToolOutput, Error> {
    match format {
        TimeFormat::Iso => Ok(ToolOutput::text(now.to_rfc3339())),
        TimeFormat::Local => Ok(ToolOutput::text(
            now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %:z").to_string(),
        )),
        TimeFormat::Unix => Ok(ToolOutput::text(now.timestamp().to_string())),
        TimeFormat::Detailed => ToolOutput::json(&serde_json::json!({
            "iso": now.to_rfc3339(),
            "local": now.with_timezone(&Local).to_rfc3339(),
            "unix": now.timestamp(),
            "utc": now.to_rfc2822(),
            "date": now.format("%a %b %d %Y").to_string(),
            "time": now.format("%H:%M:%S UTC").to_string(),
        })),
    }
}
