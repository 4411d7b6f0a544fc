use super::{json_pretty, EXIT_SUCCESS};
use labforge_schema::write_scaffold;
use std::path::Path;

pub fn run(path: &Path, json: bool) -> Result<u8, String> {
    let name = write_scaffold(path).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": path,
            "name": name,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("Created lab config: {}", path.display());
        println!("Edit the file, then run: labforge build -t {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}
