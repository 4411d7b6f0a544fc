use super::{json_pretty, EXIT_SUCCESS};
use labforge_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let templates = engine.templates();
    if json {
        println!("{}", json_pretty(&templates)?);
    } else if templates.is_empty() {
        println!(
            "No templates found in {}.",
            engine.config().templates_dir.display()
        );
    } else {
        println!("{:<20} {:<44} FILE", "NAME", "DESCRIPTION");
        for t in &templates {
            let file = if t.bundled {
                format!("{} (built-in)", t.file)
            } else {
                t.file.clone()
            };
            println!("{:<20} {:<44} {file}", t.name, t.description);
        }
    }
    Ok(EXIT_SUCCESS)
}
