pub fn handle() -> anyhow::Result<()> {
    let extension = batchflow_core::schema::extension();
    println!("{}", serde_json::to_string_pretty(&extension)?);
    Ok(())
}
