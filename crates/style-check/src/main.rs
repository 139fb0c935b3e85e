//! Pre-commit style checker: runs rustfmt over the source files staged for
//! commit. Exit code 1 on a failing format check, 0 otherwise.
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::io::IsTerminal;
use std::process::{Command, ExitCode};

use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;

#[derive(Debug, Parser)]
#[command(version, about = "Format check for staged source files", long_about = None)]
struct Args {
    /// Apply formatting fixes in place instead of just checking.
    #[arg(long)]
    fix_inplace: bool,

    /// Disable colored output. Defaults to true when stdout is not an
    /// interactive terminal.
    #[arg(long, default_value_t = !std::io::stdout().is_terminal())]
    no_color: bool,
}

fn staged_files() -> Result<Vec<String>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only", "--diff-filter=ACM"])
        .output()
        .context("running git diff")?;
    if !output.status.success() {
        bail!("git diff failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(String::from_utf8(output.stdout)
        .context("decoding git diff output")?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}

fn paint(text: &str, color: console::Color, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        style(text).fg(color).to_string()
    }
}

fn check_rustfmt(args: &Args) -> Result<bool> {
    print!("Checking: rustfmt ");

    let rust_files: Vec<String> = staged_files()?
        .into_iter()
        .filter(|f| f.ends_with(".rs"))
        .collect();
    if rust_files.is_empty() {
        println!("{}", paint("[NOT APPLICABLE]", console::Color::Cyan, args.no_color));
        return Ok(true);
    }

    let mut cmd = Command::new("rustfmt");
    cmd.args(["--edition", "2024"]);
    if !args.fix_inplace {
        cmd.arg("--check");
    }
    if args.no_color {
        cmd.args(["--color", "never"]);
    }
    let output = cmd.args(&rust_files).output().context("running rustfmt")?;

    if output.status.success() {
        println!("{}", paint("[OK]", console::Color::Green, args.no_color));
        Ok(true)
    } else {
        println!("{}", paint("[FAILED]", console::Color::Red, args.no_color));
        println!("Please inspect the output below or re-run with --fix-inplace\n");
        println!("{}", String::from_utf8_lossy(&output.stdout));
        Ok(false)
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    if check_rustfmt(&args)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
