//! EWF Verify CLI
//!
//! Recompute the digests of an E01/raw forensic image and compare them with
//! the acquisition hashes stored in the container.
//!
//! Exit status: 0 all verified, 2 digest mismatch, 1 error.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use ewf_verify_lib::common::hash::is_valid_hash;
use ewf_verify_lib::metadata::CASE_FIELDS;
use ewf_verify_lib::{
    format_remaining, logging, HashAlgorithm, ImageMetadata, VerificationResult, VerificationSession,
    VerifyEvent,
};

/// EWF Verify - streaming hash verification for forensic images
#[derive(Parser, Debug)]
#[command(name = "ewf-verify")]
#[command(version)]
#[command(about = "Verify E01/raw forensic images against their stored hashes")]
struct Args {
    /// Path to the image (first segment: .E01, .001, .dd, ...)
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Compute MD5 (if no algorithm flag is given, all are computed)
    #[arg(long)]
    md5: bool,

    /// Compute SHA1
    #[arg(long)]
    sha1: bool,

    /// Compute SHA256
    #[arg(long)]
    sha256: bool,

    /// Expected MD5, overrides the value stored in the image
    #[arg(long, value_name = "HEX")]
    expected_md5: Option<String>,

    /// Expected SHA1, overrides the value stored in the image
    #[arg(long, value_name = "HEX")]
    expected_sha1: Option<String>,

    /// Expected SHA256
    #[arg(long, value_name = "HEX")]
    expected_sha256: Option<String>,

    /// Ignore digests stored in the image
    #[arg(long)]
    no_stored: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (file:line, trace level unless RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    image: &'a PathBuf,
    media_size: u64,
    metadata: &'a ImageMetadata,
    result: &'a VerificationResult,
    all_passed: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        logging::init_verbose();
    } else {
        logging::init();
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every enabled algorithm verified
fn run(args: &Args) -> Result<bool> {
    let mut session = VerificationSession::new();
    let metadata = session
        .open(&args.image)
        .with_context(|| format!("Cannot open {}", args.image.display()))?;
    let media_size = session.media_size()?;

    apply_arguments(&mut session, args)?;

    if !args.json {
        print_metadata(args, &metadata, media_size);
    }

    let events = session.start().context("Cannot start verification")?;
    let mut result = None;
    let mut eta = String::new();

    for event in events {
        match event {
            VerifyEvent::Progress(progress) => {
                eprint!(
                    "\rVerifying: {:>3}% ({} / {} bytes){:<24}",
                    progress.percentage, progress.bytes_processed, progress.total_bytes, eta
                );
                let _ = io::stderr().flush();
            }
            VerifyEvent::TimeEstimate { remaining } => {
                eta = format!("  {} remaining", format_remaining(remaining));
            }
            VerifyEvent::DigestComputed { .. } => {}
            VerifyEvent::VerificationComplete(complete) => result = Some(complete),
            VerifyEvent::Cancelled { .. } => bail!("Verification cancelled"),
            VerifyEvent::Error(e) => return Err(e).context("Verification failed"),
        }
    }
    eprintln!();
    session.wait()?;

    let result = result.context("Verification worker exited without a result")?;
    let all_passed = result.all_passed();

    if args.json {
        let report = Report {
            image: &args.image,
            media_size,
            metadata: &metadata,
            result: &result,
            all_passed,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_results(&result);
    }

    Ok(all_passed)
}

fn apply_arguments(session: &mut VerificationSession, args: &Args) -> Result<()> {
    let config = session.config_mut();
    let any_selected = args.md5 || args.sha1 || args.sha256;
    config.enable(HashAlgorithm::Md5, !any_selected || args.md5);
    config.enable(HashAlgorithm::Sha1, !any_selected || args.sha1);
    config.enable(HashAlgorithm::Sha256, !any_selected || args.sha256);

    if args.no_stored {
        for algorithm in HashAlgorithm::ALL {
            config.set_expected(algorithm, None);
        }
    }

    let overrides = [
        (HashAlgorithm::Md5, &args.expected_md5),
        (HashAlgorithm::Sha1, &args.expected_sha1),
        (HashAlgorithm::Sha256, &args.expected_sha256),
    ];
    for (algorithm, value) in overrides {
        if let Some(value) = value {
            if !is_valid_hash(value.trim(), algorithm) {
                bail!(
                    "Expected {} must be {} hex characters, got '{}'",
                    algorithm,
                    algorithm.hash_length(),
                    value
                );
            }
            config.set_expected(algorithm, Some(value.as_str()));
        }
    }
    Ok(())
}

fn print_metadata(args: &Args, metadata: &ImageMetadata, media_size: u64) {
    println!();
    println!("IMAGE");
    println!("=====");
    println!("Path:             {}", args.image.display());
    println!("Media size:       {} bytes", media_size);
    for field in CASE_FIELDS {
        if let Some(value) = metadata.get(field) {
            println!("{:<17} {}", format!("{}:", field), value);
        }
    }
    println!("Stored MD5:       {}", metadata.stored_md5().unwrap_or("-"));
    println!("Stored SHA1:      {}", metadata.stored_sha1().unwrap_or("-"));
    println!();
}

fn print_results(result: &VerificationResult) {
    println!();
    println!("VERIFICATION COMPLETE");
    println!("=====================");
    for entry in &result.entries {
        match &entry.expected {
            Some(expected) => {
                if entry.verified {
                    println!("✓ {}: Verified", entry.algorithm);
                } else {
                    println!("✗ {}: NOT VERIFIED", entry.algorithm);
                }
                println!("  Expected:   {}", expected);
                println!("  Calculated: {}", entry.computed);
            }
            None => {
                println!("{}: {}", entry.algorithm, entry.computed);
                println!("  (No stored hash to compare)");
            }
        }
        println!();
    }

    if result.all_passed() {
        println!("All hashes match the expected values.");
    } else {
        println!("Hash verification completed with mismatches!");
    }
}
