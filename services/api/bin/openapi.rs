//! Writes the REST API's OpenAPI document, by default to `openapi.json`.
//!
//! Usage: `openapi [OUTPUT_PATH]`

use lumen_api::router::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("OpenAPI document written to {path}");
    Ok(())
}
