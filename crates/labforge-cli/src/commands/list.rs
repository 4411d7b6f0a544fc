use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use labforge_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let labs = engine.list().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&labs)?);
    } else if labs.is_empty() {
        println!("No labs found. Run labforge build -t <template> to create one.");
    } else {
        println!(
            "{:<14} {:<20} {:<10} {:<18} CREATED",
            "ID", "TEMPLATE", "STATUS", "SUBNET"
        );
        for lab in &labs {
            // escape codes would skew `{:<10}`, so pad by hand
            let pad = 10usize.saturating_sub(lab.status.to_string().len());
            let status = format!("{}{}", colorize_state(lab.status), " ".repeat(pad));
            let created: String = lab.created_at.chars().take(19).collect();
            println!(
                "{:<14} {:<20} {} {:<18} {}",
                lab.lab_id,
                lab.template,
                status,
                lab.subnet.to_string(),
                created
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
