use toolrelay_client::Client;

/// Print every tool the server exposes with its input schema.
pub async fn run(client: &Client) -> anyhow::Result<()> {
    let tools = client.fetch_tools().await?;
    if tools.is_empty() {
        println!("No tools registered.");
        return Ok(());
    }

    for tool in tools {
        println!("{} - {}", tool.name, tool.description);
        println!("{}", serde_json::to_string_pretty(&tool.input_schema)?);
        println!();
    }

    Ok(())
}
