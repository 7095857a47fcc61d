//! Print the OpenAPI document of the quiz backend as pretty JSON.

use anyhow::Context;
use live_quiz_back::routes::docs::api_document;

fn main() -> anyhow::Result<()> {
    let doc = api_document();
    let json = doc
        .to_pretty_json()
        .context("serializing the OpenAPI document")?;
    println!("{json}");
    Ok(())
}
