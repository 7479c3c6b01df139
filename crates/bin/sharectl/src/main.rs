//! sharectl
//!
//! Split secrets into threshold shares and join them back.
//!
//! ## Usage
//!
//! ```bash
//! # 3-of-5 split of a 16 byte secret over the 128-bit prime field
//! sharectl split -k 3 -n 5 000102030405060708090a0b0c0d0e0f
//!
//! # join any three of the shares
//! sharectl join -k 3 --bits 128 <SHARE> <SHARE> <SHARE>
//!
//! # per-byte GF(2^8) sharing
//! sharectl split -k 2 -n 4 --gf256 01020304
//!
//! # session parameters from a file
//! sharectl --params params.json info --json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::{debug, info};

use shamir_share::{random_bytes, FieldStrategy, Mode, SessionParams, ShareSession};

#[derive(Parser)]
#[command(name = "sharectl")]
#[command(about = "threshold secret sharing over prime fields and GF(2^8)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON file with session parameters; flags override its fields
    #[arg(long, global = true)]
    params: Option<PathBuf>,
}

/// Flags shared by every command that builds a session.
#[derive(clap::Args, Debug)]
struct SessionArgs {
    /// Shares required to reconstruct
    #[arg(short = 'k', long)]
    threshold: Option<u8>,

    /// Secret length in bits
    #[arg(long)]
    bits: Option<u16>,

    /// Share every byte over GF(2^8) instead of a prime field
    #[arg(long)]
    gf256: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a hex secret, printing one hex share per line
    Split {
        #[command(flatten)]
        session: SessionArgs,

        /// Number of shares to produce
        #[arg(short = 'n', long)]
        shares: Option<u8>,

        /// Allow the same x to be issued twice
        #[arg(long)]
        allow_repeated_x: bool,

        /// Secret as hex
        secret: String,
    },

    /// Join hex shares, printing the secret as hex
    Join {
        #[command(flatten)]
        session: SessionArgs,

        /// Shares as hex; only the first K are used
        #[arg(required = true)]
        shares: Vec<String>,
    },

    /// Print random bytes as hex
    Random {
        /// Number of bytes
        len: usize,
    },

    /// Show the backend and share layout a session would use
    Info {
        #[command(flatten)]
        session: SessionArgs,

        /// Number of shares
        #[arg(short = 'n', long)]
        shares: Option<u8>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SessionInfo {
    backend: &'static str,
    strategy: FieldStrategy,
    secret_bits: u16,
    secret_len: usize,
    share_len: usize,
    prime_bits: Option<u16>,
    threshold: u8,
    share_count: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sharectl={level},shamir_share={level}").into()),
        )
        .init();

    let file = cli.params.as_deref().map(load_params).transpose()?;

    match cli.command {
        Commands::Split {
            session,
            shares,
            allow_repeated_x,
            secret,
        } => run_split(file, session, shares, allow_repeated_x, &secret),
        Commands::Join { session, shares } => run_join(file, session, &shares),
        Commands::Random { len } => run_random(len),
        Commands::Info {
            session,
            shares,
            json,
        } => run_info(file, session, shares, json),
    }
}

fn load_params(path: &Path) -> Result<SessionParams> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let params: SessionParams = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    debug!(?params, "loaded session params");
    Ok(params)
}

/// Merge the params file with command-line flags, flags taking precedence.
///
/// `default_bits` fills in the secret length when neither source gives one;
/// a missing share count falls back to the threshold.
fn resolve_params(
    file: Option<SessionParams>,
    args: &SessionArgs,
    shares: Option<u8>,
    default_bits: Option<u16>,
) -> Result<SessionParams> {
    let secret_bits = args
        .bits
        .or(file.map(|p| p.secret_bits))
        .or(default_bits)
        .context("secret length unknown, pass --bits")?;
    let threshold = args
        .threshold
        .or(file.map(|p| p.threshold))
        .context("threshold unknown, pass -k")?;
    let share_count = shares
        .or(file.map(|p| p.share_count))
        .unwrap_or(threshold);

    let strategy = if args.gf256 {
        FieldStrategy::Gf256
    } else {
        file.map(|p| p.strategy).unwrap_or_default()
    };
    let distinct_x = file.map_or(true, |p| p.distinct_x);

    let params = SessionParams::new(secret_bits, threshold, share_count)
        .with_strategy(strategy)
        .with_distinct_x(distinct_x);
    params
        .validate()
        .with_context(|| format!("need 1 ≤ bits and 2 ≤ k ≤ n ≤ 16, got {params:?}"))?;
    Ok(params)
}

fn run_split(
    file: Option<SessionParams>,
    args: SessionArgs,
    shares: Option<u8>,
    allow_repeated_x: bool,
    secret_hex: &str,
) -> Result<()> {
    let secret = hex::decode(secret_hex.trim()).context("secret is not valid hex")?;
    if secret.is_empty() {
        bail!("secret is empty");
    }
    let default_bits = u16::try_from(secret.len() * 8).ok();
    let mut params = resolve_params(file, &args, shares, default_bits)?;
    if allow_repeated_x {
        params = params.with_distinct_x(false);
    }

    let mut session = ShareSession::new(params, Mode::Split)?;
    info!(
        backend = session.backend_name(),
        threshold = params.threshold,
        shares = params.share_count,
        "splitting"
    );
    session
        .split_init(&mut OsRng, &secret)
        .context("secret does not fit the session")?;
    for _ in 0..params.share_count {
        println!("{}", hex::encode(session.split(&mut OsRng)?));
    }
    session.close();
    Ok(())
}

fn run_join(file: Option<SessionParams>, args: SessionArgs, shares: &[String]) -> Result<()> {
    let params = resolve_params(file, &args, None, None)?;
    if shares.len() < usize::from(params.threshold) {
        bail!(
            "need {} shares, got {}",
            params.threshold,
            shares.len()
        );
    }

    let mut session = ShareSession::new(params, Mode::Join)?;
    info!(backend = session.backend_name(), "joining");
    session.join_init()?;
    for (i, share) in shares.iter().enumerate() {
        let bytes = hex::decode(share.trim())
            .with_context(|| format!("share {} is not valid hex", i + 1))?;
        session
            .join_update(&bytes)
            .with_context(|| format!("share {} rejected", i + 1))?;
    }
    let secret = session.join_final().context("reconstruction failed")?;
    println!("{}", hex::encode(secret));
    session.close();
    Ok(())
}

fn run_random(len: usize) -> Result<()> {
    println!("{}", hex::encode(random_bytes(&mut OsRng, len)?));
    Ok(())
}

fn run_info(
    file: Option<SessionParams>,
    args: SessionArgs,
    shares: Option<u8>,
    json: bool,
) -> Result<()> {
    let params = resolve_params(file, &args, shares, None)?;
    let session = ShareSession::new(params, Mode::Join)?;
    let info = SessionInfo {
        backend: session.backend_name(),
        strategy: params.strategy,
        secret_bits: params.secret_bits,
        secret_len: session.secret_len(),
        share_len: session.share_len(),
        prime_bits: session.prime_bits(),
        threshold: params.threshold,
        share_count: params.share_count,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("backend:     {}", info.backend);
        println!("strategy:    {}", info.strategy);
        println!("secret:      {} bits ({} bytes)", info.secret_bits, info.secret_len);
        println!("share:       {} bytes", info.share_len);
        match info.prime_bits {
            Some(bits) => println!("prime:       {bits}-bit catalog prime"),
            None => println!("prime:       none"),
        }
        println!("threshold:   {} of {}", info.threshold, info.share_count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(threshold: Option<u8>, bits: Option<u16>, gf256: bool) -> SessionArgs {
        SessionArgs {
            threshold,
            bits,
            gf256,
        }
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_only() {
        let p = resolve_params(None, &args(Some(3), Some(128), false), Some(5), None).unwrap();
        assert_eq!(p, SessionParams::new(128, 3, 5));
    }

    #[test]
    fn test_share_count_defaults_to_threshold() {
        let p = resolve_params(None, &args(Some(2), None, true), None, Some(32)).unwrap();
        assert_eq!(p.share_count, 2);
        assert_eq!(p.secret_bits, 32);
        assert_eq!(p.strategy, FieldStrategy::Gf256);
    }

    #[test]
    fn test_flags_override_file() {
        let file = SessionParams::new(256, 4, 6)
            .with_strategy(FieldStrategy::Gf256)
            .with_distinct_x(false);
        let p = resolve_params(Some(file), &args(Some(2), None, false), None, Some(64)).unwrap();
        assert_eq!(p.threshold, 2);
        assert_eq!(p.secret_bits, 256);
        assert_eq!(p.share_count, 6);
        assert_eq!(p.strategy, FieldStrategy::Gf256);
        assert!(!p.distinct_x);
    }

    #[test]
    fn test_missing_threshold() {
        assert!(resolve_params(None, &args(None, Some(128), false), None, None).is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        assert!(resolve_params(None, &args(Some(5), Some(128), false), Some(3), None).is_err());
    }
}
