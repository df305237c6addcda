use clap::Parser;
use std::io::Read;
use std::sync::Arc;

use just_bash::shell::{Shell, ShellConfig};
use just_bash::vfs::{MemFs, Vfs};

#[derive(Parser)]
#[command(name = "just-bash")]
#[command(about = "A sandboxed bash environment for coding agents")]
#[command(version)]
struct Cli {
    /// Execute the script given on the command line
    #[arg(short = 'c')]
    script: Option<String>,

    /// Exit immediately if a command exits with non-zero status
    #[arg(short = 'e', long = "errexit")]
    errexit: bool,

    /// Mount DIR (host path) at /home/user/project in the sandbox
    #[arg(long = "root")]
    root: Option<String>,

    /// Initial working directory inside the sandbox
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Allow writes to the virtual filesystem when --root is mounted
    #[arg(long = "allow-write")]
    allow_write: bool,

    /// Emit {stdout, stderr, exitCode} as one JSON object
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

const MOUNT_POINT: &str = "/home/user/project";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("just-bash: cannot read script file {}: {}", file, e);
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!(
                "just-bash: no script provided (use -c 'script', a script file, or stdin)"
            );
            std::process::exit(1);
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_default();
        buf
    };

    if script.trim().is_empty() {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({"stdout": "", "stderr": "", "exitCode": 0})
            );
        }
        std::process::exit(0);
    }

    // A mounted host tree arrives as a read-only projection unless
    // --allow-write lifts the restriction.
    let fs = Arc::new(MemFs::new());
    let mounted = match &cli.root {
        Some(root) => {
            if let Err(e) = fs.mount_host_dir(std::path::Path::new(root), MOUNT_POINT) {
                eprintln!("just-bash: cannot mount {}: {}", root, e);
                std::process::exit(1);
            }
            true
        }
        None => false,
    };

    let cwd = cli
        .cwd
        .clone()
        .or_else(|| mounted.then(|| MOUNT_POINT.to_string()));

    let mut shell = match Shell::new(ShellConfig {
        cwd,
        fs: Some(fs.clone()),
        ..Default::default()
    })
    .await
    {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("just-bash: {}", e);
            std::process::exit(1);
        }
    };

    if mounted && !cli.allow_write {
        fs.set_read_only(true);
    }

    let final_script = if cli.errexit {
        format!("set -e\n{}", script)
    } else {
        script
    };
    let result = shell.exec(&final_script).await;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout,
                "stderr": result.stderr,
                "exitCode": result.exit_code,
            })
        );
    } else {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
    }
    std::process::exit(result.exit_code & 0xff);
}
