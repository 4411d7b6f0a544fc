use super::{
    json_pretty, lock_labs, print_access_table, print_warnings, spin_fail, spin_ok, spinner,
    EXIT_SUCCESS,
};
use labforge_core::{BuildRequest, Engine, LabReport};
use labforge_schema::TemplateError;
use std::collections::BTreeMap;

/// Parse repeated `KEY=VAL` arguments. Later keys win.
pub fn parse_overrides(raw: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            return Err(TemplateError::InvalidOverride(item.clone()).to_string());
        };
        out.insert(key.to_owned(), value.to_owned());
    }
    Ok(out)
}

pub fn run(
    engine: &Engine,
    template: &str,
    name: Option<&str>,
    overrides: &[String],
    json: bool,
) -> Result<u8, String> {
    let request = BuildRequest {
        template: template.to_owned(),
        name: name.map(str::to_owned),
        overrides: parse_overrides(overrides)?,
    };

    let _lock = lock_labs(&engine.config().labs_dir)?;

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("building lab from {template}...")))
    };

    let report = match engine.build(&request) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("lab {} is running", r.record.lab_id));
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("lab id:  {}", report.record.lab_id);
    println!("network: {}", report.record.subnet);
    println!("compose: {}", report.manifest_path.display());
    print_warnings(&report.warnings);

    let access = engine
        .info(&report.record.lab_id)
        .map_err(|e| e.to_string())?;
    println!();
    print_access_table(&access);
    print_next_steps(&access);
    Ok(EXIT_SUCCESS)
}

fn print_next_steps(report: &LabReport) {
    let id = &report.record.lab_id;
    println!();
    println!("  labforge status {id}");
    println!("  labforge destroy {id}");
}
