use super::{colorize_state, json_pretty, print_warnings, EXIT_SUCCESS};
use labforge_core::Engine;

pub fn run(engine: &Engine, lab_id: &str, json: bool) -> Result<u8, String> {
    let report = engine.status(lab_id).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    let record = &report.record;
    println!("Lab:      {}", record.lab_id);
    println!("Template: {}", record.template);
    println!("Status:   {}", colorize_state(record.status));
    println!("Subnet:   {}", record.subnet);
    println!("Created:  {}", record.created_at);
    if let Some(live) = &report.live {
        println!();
        print!("{live}");
        if !live.ends_with('\n') {
            println!();
        }
    }
    print_warnings(&report.warnings);
    Ok(EXIT_SUCCESS)
}
