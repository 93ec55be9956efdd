//! Best effort scraping of web pages into plain text used as extra
//! context for the system turn.

mod extract;
mod loader;

pub use extract::extract_text;
pub use loader::{ContextLoader, http_client, load_context, scrape};
