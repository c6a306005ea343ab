//! Query command.

use crate::config::Settings;

use super::connect_store;

/// Run query command.
pub fn run(
    text: &str,
    namespace: &str,
    top_k: usize,
    json: bool,
    settings: &Settings,
) -> anyhow::Result<()> {
    let (_, manager) = connect_store(settings)?;
    let matches = manager.query(namespace, text, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matches in namespace '{namespace}'");
        return Ok(());
    }
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{}",
            i + 1,
            m.score,
            m.source,
            m.chunk_index
        );
        println!("   {}", m.content.replace('\n', " "));
    }
    Ok(())
}
