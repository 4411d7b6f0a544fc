//! Shell completions and man pages derived from the clap definition.

use super::EXIT_SUCCESS;
use clap::{Command, CommandFactory};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

pub fn completions<C: CommandFactory>(shell: Shell) -> u8 {
    let mut cmd = C::command();
    let bin = cmd.get_name().to_owned();
    clap_complete::generate(shell, &mut cmd, bin, &mut std::io::stdout());
    EXIT_SUCCESS
}

fn render_page(cmd: Command, dest: PathBuf) -> Result<PathBuf, String> {
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buf)
        .map_err(|e| format!("man page render failed: {e}"))?;
    std::fs::write(&dest, &buf).map_err(|e| format!("failed to write {}: {e}", dest.display()))?;
    Ok(dest)
}

/// Write `labforge.1` plus one `labforge-<sub>.1` per subcommand into
/// `dir`. Returns the written paths.
pub fn write_man_pages<C: CommandFactory>(dir: &Path) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create {}: {e}", dir.display()))?;
    let cmd = C::command();
    let bin = cmd.get_name().to_owned();

    let mut written = vec![render_page(cmd.clone(), dir.join(format!("{bin}.1")))?];
    for sub in cmd.get_subcommands() {
        let page = dir.join(format!("{bin}-{}.1", sub.get_name()));
        written.push(render_page(sub.clone(), page)?);
    }
    Ok(written)
}

pub fn man_pages<C: CommandFactory>(dir: &Path) -> Result<u8, String> {
    let written = write_man_pages::<C>(dir)?;
    println!("{} man pages written to {}", written.len(), dir.display());
    Ok(EXIT_SUCCESS)
}
