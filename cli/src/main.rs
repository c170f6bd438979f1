//! Snipbox CLI - Command-line interface for the Snipbox orchestrator
//!
//! Runs snippets, warms images and inspects the service

use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

/// Snipbox CLI - Run untrusted code in throwaway sandboxes
#[derive(Parser)]
#[command(name = "snipbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Snipbox sandboxed execution service", long_about = None)]
struct Cli {
    /// Snipbox API URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a snippet in a sandbox
    Run {
        /// Language of the snippet
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Code to run (or path to file with @ prefix)
        code: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Pre-pull sandbox images
    Warmup {
        /// Languages to warm (all executable languages when omitted)
        #[arg(short, long)]
        language: Vec<String>,
    },

    /// List supported languages
    Languages,

    /// Get server health status
    Health,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct RunRequest {
    language: String,
    code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunResult {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    duration_ms: u64,
    timed_out: bool,
}

#[derive(Debug, Serialize)]
struct WarmupRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WarmupResponse {
    pulled: Vec<String>,
    failed: Vec<String>,
    skipped: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LanguageInfo {
    language: String,
    executable: bool,
    image: Option<String>,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    languages: Vec<LanguageInfo>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: i64,
    engine_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Run {
            language,
            code,
            output,
        } => {
            // Read code from file if starts with @
            let code = match code.strip_prefix('@') {
                Some(file_path) => fs::read_to_string(file_path)
                    .with_context(|| format!("Failed to read code file: {}", file_path))?,
                None => code,
            };

            let response = client
                .post(format!("{}/api/v1/run", cli.api_url))
                .json(&RunRequest { language, code })
                .send()
                .context("Failed to send request")?;

            let result: RunResult = check(response, "Run")?
                .json()
                .context("Failed to parse response")?;

            if output == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_run_result(&result);
            }

            std::process::exit(exit_code_of(&result));
        }

        Commands::Warmup { language } => {
            let response = client
                .post(format!("{}/api/v1/warmup", cli.api_url))
                .json(&WarmupRequest {
                    languages: language,
                })
                .send()
                .context("Failed to send request")?;

            let report: WarmupResponse = check(response, "Warm-up")?
                .json()
                .context("Failed to parse response")?;

            for image in &report.pulled {
                println!("{} {}", "✓ Pulled:".green(), image);
            }
            for image in &report.skipped {
                println!("{} {} (local image)", "- Skipped:".yellow(), image);
            }
            for image in &report.failed {
                println!("{} {}", "✗ Failed:".red(), image);
            }
        }

        Commands::Languages => {
            let response = client
                .get(format!("{}/api/v1/languages", cli.api_url))
                .send()
                .context("Failed to list languages")?;

            let listing: LanguagesResponse = check(response, "Languages")?
                .json()
                .context("Failed to parse response")?;

            println!("{}", "Supported languages:".bright_cyan().bold());
            for info in listing.languages {
                if info.executable {
                    println!(
                        "  {:<12} {} ({})",
                        info.language.green(),
                        info.image.unwrap_or_default(),
                        info.file_name.unwrap_or_default()
                    );
                } else {
                    println!("  {:<12} {}", info.language.yellow(), "echoed, not run".dimmed());
                }
            }
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .context("Failed to get health")?;

            let health: HealthResponse = check(response, "Health check")?
                .json()
                .context("Failed to parse response")?;

            println!("{}", "Snipbox Orchestrator Status".bright_cyan().bold());
            println!("{}", "=".repeat(40).bright_blue());
            println!(
                "{} {}",
                "Status:".cyan(),
                if health.status == "healthy" {
                    health.status.green()
                } else {
                    health.status.yellow()
                }
            );
            println!("{} {}", "Version:".cyan(), health.version);
            println!("{} {}s", "Uptime:".cyan(), health.uptime_seconds);
            println!(
                "{} {}",
                "Engine:".cyan(),
                health.engine_version.as_deref().unwrap_or("unreachable")
            );
        }
    }

    Ok(())
}

/// Turn a non-success response into an error carrying the server's message
fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(err) => anyhow::bail!("{} failed ({}): {}: {}", what, status, err.error, err.message),
        Err(_) => anyhow::bail!("{} failed ({}): {}", what, status, text),
    }
}

fn print_run_result(result: &RunResult) {
    println!("{}", "=".repeat(60).bright_blue());

    let status = match (result.exit_code, result.timed_out) {
        (_, true) => "timed out".red(),
        (Some(0), _) => "success".green(),
        (Some(_), _) => "failed".red(),
        (None, _) => "not started".red(),
    };
    println!("{} {}", "Status:".bright_cyan(), status);
    println!("{} {}ms", "Duration:".bright_cyan(), result.duration_ms);

    if let Some(code) = result.exit_code {
        println!("{} {}", "Exit Code:".bright_cyan(), code);
    }

    if !result.stdout.is_empty() {
        println!("\n{}", "STDOUT:".bright_green().bold());
        println!("{}", result.stdout);
    }

    if !result.stderr.is_empty() {
        println!("\n{}", "STDERR:".bright_red().bold());
        println!("{}", result.stderr);
    }

    println!("{}", "=".repeat(60).bright_blue());
}

/// Process exit code mirroring the sandboxed program
fn exit_code_of(result: &RunResult) -> i32 {
    match result.exit_code {
        Some(code) => code,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: Option<i32>, timed_out: bool) -> RunResult {
        RunResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code,
            duration_ms: 0,
            timed_out,
        }
    }

    #[test]
    fn test_exit_code_mirrors_program() {
        assert_eq!(exit_code_of(&result(Some(0), false)), 0);
        assert_eq!(exit_code_of(&result(Some(7), false)), 7);
        assert_eq!(exit_code_of(&result(None, true)), 1);
        assert_eq!(exit_code_of(&result(None, false)), 1);
    }

    #[test]
    fn test_parses_run_result() {
        let parsed: RunResult = serde_json::from_str(
            r#"{"stdout":"4\n","stderr":"","exitCode":0,"durationMs":12,"timedOut":false}"#,
        )
        .unwrap();
        assert_eq!(parsed.stdout, "4\n");
        assert_eq!(parsed.exit_code, Some(0));
    }

    #[test]
    fn test_empty_warmup_omits_languages() {
        let body = serde_json::to_string(&WarmupRequest { languages: vec![] }).unwrap();
        assert_eq!(body, "{}");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["snipbox", "run", "-l", "bash", "echo hi", "-o", "json"]).unwrap();
        match cli.command {
            Commands::Run { language, output, .. } => {
                assert_eq!(language, "bash");
                assert!(output == OutputFormat::Json);
            }
            _ => panic!("expected run"),
        }
    }
}
