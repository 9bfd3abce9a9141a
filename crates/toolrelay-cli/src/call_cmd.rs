use anyhow::Context;
use serde_json::Value;

use toolrelay_client::Client;
use toolrelay_core::MessageId;
use toolrelay_mcp::ToolOutput;

/// Call `tool` with the JSON object in `args` and print its text output.
pub async fn run(client: &Client, tool: &str, args: &str, id: Option<String>) -> anyhow::Result<()> {
    let arguments: Value = serde_json::from_str(args).context("--args is not valid JSON")?;
    if !arguments.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }

    let output: ToolOutput = match id {
        // An explicit id goes through invoke so the caller controls the tag.
        Some(id) => {
            let reply = client.invoke(tool, arguments, MessageId::from(id)).await?;
            tracing::debug!(message_id = %reply.id(), "waiting for reply");
            serde_json::from_value(reply.wait().await?)?
        }
        None => client.call(tool, arguments).await?,
    };

    let text = output.joined_text();
    if output.is_error {
        anyhow::bail!("{tool} reported an error: {text}");
    }
    println!("{text}");

    Ok(())
}
