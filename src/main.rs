use clap::Parser;
use std::io::Read;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bashlet::bash::{Bash, BashExecResult, BashOptions};

/// Deep scripts recurse through boxed futures; give the runtime room.
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "bashlet")]
#[command(about = "Run bash scripts against an in-memory filesystem")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Exit immediately if a command exits with non-zero status
    #[arg(short = 'e', long = "errexit")]
    errexit: bool,

    /// Working directory inside the virtual filesystem
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file, or with -c the value of $0
    #[arg()]
    script_file: Option<String>,

    /// Positional parameters for the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Script text and `$0`, from -c, a file on the host, or stdin.
fn load_script(cli: &Cli) -> Result<(String, String), String> {
    if let Some(script) = &cli.script {
        let name = cli.script_file.clone().unwrap_or_else(|| "bashlet".to_string());
        return Ok((script.clone(), name));
    }
    if let Some(file) = &cli.script_file {
        let content = std::fs::read_to_string(file).map_err(|e| format!("cannot read script file: {}: {}", file, e))?;
        return Ok((content, file.clone()));
    }
    use std::io::IsTerminal;
    if std::io::stdin().is_terminal() {
        return Err("no script provided. Use -c 'script', provide a script file, or pipe via stdin.".to_string());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).map_err(|e| format!("cannot read stdin: {}", e))?;
    Ok((buf, "bashlet".to_string()))
}

async fn run(cli: Cli) -> Result<BashExecResult, String> {
    let (script, script_name) = load_script(&cli)?;
    let mut bash = Bash::new(BashOptions {
        cwd: cli.cwd,
        args: cli.args,
        script_name: Some(script_name),
        ..Default::default()
    })
    .await;
    let script = if cli.errexit { format!("set -e\n{}", script) } else { script };
    Ok(bash.exec(&script, None).await)
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let runtime = match tokio::runtime::Builder::new_multi_thread().thread_stack_size(WORKER_STACK_SIZE).enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("bashlet: cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = match runtime.block_on(run(cli)) {
        Ok(result) => result,
        Err(msg) => {
            eprintln!("bashlet: {}", msg);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string(&result) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("bashlet: {}", e),
        }
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
    }
    std::process::exit(result.exit_code);
}
