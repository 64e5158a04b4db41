use std::fs;
use std::path::PathBuf;

use clap::Args;
use clap_complete::{Shell, generate_to};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/completions")]
    pub out_dir: PathBuf,

    /// Generate only for these shells (default: bash, zsh, fish, powershell)
    #[arg(long, value_enum)]
    pub shell: Vec<Shell>,
}

pub fn cmd_completions(args: CompletionsArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let shells = if args.shell.is_empty() {
        vec![Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell]
    } else {
        args.shell
    };

    let mut cmd = relcut::command();
    for shell in shells {
        let path = generate_to(shell, &mut cmd, crate::BIN_NAME, &out_dir)
            .map_err(|e| format!("generate {shell} completions: {e}"))?;
        println!("wrote {}", path.display());
    }

    Ok(())
}
