use super::{json_pretty, EXIT_SUCCESS};
use settle_core::resolve_reference;

pub fn run(reference: &str, json: bool) -> Result<u8, String> {
    let id = resolve_reference(reference);
    if json {
        let payload = serde_json::json!({ "reference": reference, "id": id });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{id}");
    }
    Ok(EXIT_SUCCESS)
}
