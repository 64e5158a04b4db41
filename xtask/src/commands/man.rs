use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = relcut::command();
    write_page(&out_dir, crate::BIN_NAME, cmd.clone())?;

    // relcut-release.1, relcut-next.1, ...
    for subcommand in cmd.get_subcommands() {
        let page = format!("{}-{}", crate::BIN_NAME, subcommand.get_name());
        write_page(&out_dir, &page, subcommand.clone().name(page.clone()))?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, page: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render manpage for {page}: {e}"))?;

    let path = out_dir.join(format!("{page}.1"));
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
