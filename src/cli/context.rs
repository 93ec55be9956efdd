use std::env;

use anyhow::Result;

use crate::core::config::context_urls_from;
use crate::core::logging;
use crate::scrape::ContextLoader;

// Doesn't need an API key so the full config isn't loaded
pub async fn run() -> Result<()> {
    logging::init(&format!("{}=info", env!("CARGO_CRATE_NAME")));

    let urls = context_urls_from(&|key: &str| env::var(key).ok());

    let loader = ContextLoader::new(urls)?;
    println!("{}", loader.load().await);
    Ok(())
}
