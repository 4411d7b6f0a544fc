use super::{json_pretty, EXIT_SUCCESS};
use labforge_core::{Engine, TransitionOutcome};

pub fn run(engine: &Engine, lab_id: &str, json: bool) -> Result<u8, String> {
    let outcome = engine.stop(lab_id).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&outcome)?);
        return Ok(EXIT_SUCCESS);
    }
    match outcome {
        TransitionOutcome::Changed { record } => println!("Lab {} stopped.", record.lab_id),
        TransitionOutcome::Unchanged { reason, .. } => println!("{reason}"),
    }
    Ok(EXIT_SUCCESS)
}
