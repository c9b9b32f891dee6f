use std::path::PathBuf;

use clap::Parser;

use clanker::Shell;

#[derive(Parser)]
#[command(name = "clanker")]
#[command(about = "A sandboxed interactive command shell")]
#[command(version)]
struct Cli {
    /// Execute the command string and exit
    #[arg(short = 'c', value_name = "CMD", conflicts_with = "script")]
    command: Option<String>,

    /// Script file to execute
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let mut shell = match Shell::new() {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("clanker: {}", e);
            std::process::exit(1);
        }
    };

    let refused = shell.security().refuse_root_start();
    if refused != 0 {
        eprintln!("clanker: security: refusing to start with root privileges");
        std::process::exit(refused);
    }

    let status = if let Some(command) = cli.command {
        shell.run_string(&command)
    } else if let Some(script) = cli.script {
        shell.run_file(&script)
    } else {
        shell.run_interactive()
    };
    std::process::exit(status);
}
