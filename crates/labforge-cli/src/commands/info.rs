use super::{json_pretty, print_access_table, EXIT_SUCCESS};
use labforge_core::Engine;

pub fn run(engine: &Engine, lab_id: &str, json: bool) -> Result<u8, String> {
    let report = engine.info(lab_id).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_access_table(&report);
    }
    Ok(EXIT_SUCCESS)
}
