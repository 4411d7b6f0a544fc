use super::EXIT_SUCCESS;
use labforge_core::Engine;

pub const DEFAULT_SHELL: &str = "/bin/bash";

pub fn run(engine: &Engine, lab_id: &str, service: &str, command: &str) -> Result<u8, String> {
    engine
        .shell(lab_id, service, command)
        .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
