use super::EXIT_SUCCESS;
use labforge_core::Engine;

pub fn run(engine: &Engine, lab_id: &str, follow: bool, service: Option<&str>) -> Result<u8, String> {
    engine
        .logs(lab_id, follow, service)
        .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
