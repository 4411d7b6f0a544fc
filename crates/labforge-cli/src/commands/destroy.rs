use super::{json_pretty, lock_labs, print_warnings, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use labforge_core::{DestroyOptions, DestroyOutcome, Engine};

pub fn run(
    engine: &Engine,
    lab_id: &str,
    volumes: bool,
    force: bool,
    json: bool,
) -> Result<u8, String> {
    let _lock = lock_labs(&engine.config().labs_dir)?;

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("destroying lab {lab_id}...")))
    };
    let outcome = match engine.destroy(lab_id, DestroyOptions { volumes, force }) {
        Ok(o) => o,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "destroy failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        if let Some(ref pb) = pb {
            pb.finish_and_clear();
        }
        println!("{}", json_pretty(&outcome)?);
        return Ok(EXIT_SUCCESS);
    }

    match (&outcome, pb) {
        (DestroyOutcome::Destroyed { lab_id, warnings }, Some(pb)) => {
            spin_ok(&pb, &format!("Lab {lab_id} destroyed."));
            print_warnings(warnings);
        }
        (DestroyOutcome::RemovedLeftovers { lab_id }, Some(pb)) => {
            spin_ok(&pb, &format!("Removed leftover files of lab {lab_id}."));
        }
        (DestroyOutcome::AlreadyGone { reason, .. }, Some(pb)) => {
            pb.finish_and_clear();
            println!("{reason}");
        }
        (_, None) => {}
    }
    Ok(EXIT_SUCCESS)
}
