// obscurity - secp256k1 key-space search
// Modes: vanity address, pubkey X mask, signature R grinding, txid grinding

use std::fs::OpenOptions;
use std::io::{stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use obscurity::reconstruct::{FoundKey, FoundPayload};
use obscurity::stats::{format_num, format_speed, format_time};
use obscurity::{
    AddressTarget, KeyMode, Mask256, MatchTarget, SearchConfig, SearchEngine, SignatureTarget,
    TxidTarget,
};

#[derive(Parser, Debug)]
#[command(
    name = "obscurity",
    version,
    about = "Batched secp256k1 key-space search: vanity addresses, pubkey masks, signature and txid grinding"
)]
struct Args {
    /// Address patterns: prefixes (1Boat, 3Foo, bc1qabc), full
    /// addresses, or wildcards (1B?at*)
    patterns: Vec<String>,

    /// JSON file with {"patterns": [...]} instead of positional args
    #[arg(long, value_name = "FILE")]
    input: Option<String>,

    /// Mask mode: target pubkey X prefix, left-aligned hex
    #[arg(long, value_name = "HEX", conflicts_with = "patterns")]
    mask: Option<String>,

    /// Explicit bit mask for --mask / --rx / --txid-target (hex)
    #[arg(long, value_name = "HEX")]
    bitmask: Option<String>,

    /// Signature mode: message hash to sign (32-byte hex)
    #[arg(long, value_name = "HEX", requires = "sig_key", requires = "rx")]
    sig_msg: Option<String>,

    /// Signature mode: signing private key (32-byte hex)
    #[arg(long, value_name = "HEX")]
    sig_key: Option<String>,

    /// Signature mode: target R.x prefix, left-aligned hex
    #[arg(long, value_name = "HEX")]
    rx: Option<String>,

    /// Produce a BIP-340 Schnorr signature instead of ECDSA
    #[arg(long)]
    schnorr: bool,

    /// Txid mode: raw transaction hex
    #[arg(long, value_name = "HEX", conflicts_with = "patterns")]
    txid_tx: Option<String>,

    /// Txid mode: nonce window byte offset
    #[arg(long, value_name = "N", default_value_t = 0)]
    nonce_offset: usize,

    /// Txid mode: nonce window length in bytes (1..=8)
    #[arg(long, value_name = "N", default_value_t = 4)]
    nonce_len: usize,

    /// Txid mode: target displayed-txid prefix, left-aligned hex
    #[arg(long, value_name = "HEX")]
    txid_target: Option<String>,

    /// CPU worker threads (default: all cores)
    #[arg(short = 't', long, value_name = "N")]
    threads: Option<usize>,

    /// Software accelerator devices
    #[arg(long, value_name = "N", default_value_t = 0)]
    devices: usize,

    /// Lanes per device
    #[arg(long, value_name = "N", default_value_t = 4)]
    lanes: usize,

    /// Candidate group size (even)
    #[arg(short = 'g', long, value_name = "N", default_value_t = 1024)]
    group_size: usize,

    /// Keep searching after the first match
    #[arg(long)]
    continue_after_find: bool,

    /// Case-insensitive address search
    #[arg(short = 'c', long)]
    ignore_case: bool,

    /// Search uncompressed keys only
    #[arg(short = 'u', long, conflicts_with = "both")]
    uncompressed: bool,

    /// Search compressed and uncompressed keys
    #[arg(short = 'b', long)]
    both: bool,

    /// Re-randomize base keys every N million candidates
    #[arg(short = 'r', long, value_name = "MKEYS", default_value_t = 0)]
    rekey: u64,

    /// Deterministic start key (32-byte hex)
    #[arg(long, value_name = "HEX")]
    start_key: Option<String>,

    /// Results file
    #[arg(short = 'o', long, value_name = "FILE", default_value = "found.txt")]
    output: String,
}

#[derive(Deserialize)]
struct PatternFile {
    patterns: Vec<String>,
}

fn main() {
    println!("\n\x1b[1;36m╔══════════════════════════════════════════════════╗");
    println!("║   OBSCURITY  •  secp256k1 key-space search       ║");
    println!("║   address  •  mask  •  signature  •  txid        ║");
    println!("╚══════════════════════════════════════════════════╝\x1b[0m\n");

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("[✗] {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> obscurity::Result<()> {
    let target = build_target(&args)?;

    println!("[*] Mode: {}", target.mode_name());
    let difficulty = target.difficulty();
    if difficulty.is_finite() {
        println!("[*] Difficulty: 2^{:.1}", difficulty.log2());
    }

    let config = SearchConfig {
        cpu_workers: args.threads.unwrap_or_else(num_cpus::get),
        software_devices: args.devices,
        device_lanes: args.lanes,
        group_size: args.group_size,
        stop_when_found: !args.continue_after_find,
        rekey_mkeys: args.rekey,
        start_key: match &args.start_key {
            Some(hex_key) => Some(parse_hex32(hex_key)?),
            None => None,
        },
    };

    let engine = Arc::new(SearchEngine::new(target, config)?);

    let stop_sig = Arc::clone(&engine);
    ctrlc::set_handler(move || {
        println!("\n[!] Stopping...");
        stop_sig.request_stop();
    })
    .ok();

    // Status line, refreshed while the search runs.
    let finished = Arc::new(AtomicBool::new(false));
    let display_engine = Arc::clone(&engine);
    let display_done = Arc::clone(&finished);
    let display = thread::spawn(move || {
        while !display_done.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(500));
            let p = display_engine.progress();
            print!(
                "\r[⚡] {} candidates | {} | {:.1}% likely | {} found | {}    ",
                format_num(p.tested),
                format_speed(p.rate),
                p.success_probability() * 100.0,
                p.found,
                format_time(p.elapsed.as_secs_f64())
            );
            stdout().flush().ok();
        }
    });

    println!("[▶] Searching... (Ctrl+C to stop)\n");

    let output = args.output.clone();
    let final_progress = engine.run_with(|found| report(&found, &output))?;

    finished.store(true, Ordering::Relaxed);
    display.join().ok();

    println!(
        "\n\n[Done] {} candidates in {} @ {} | {} found",
        format_num(final_progress.tested),
        format_time(final_progress.elapsed.as_secs_f64()),
        format_speed(final_progress.tested as f64 / final_progress.elapsed.as_secs_f64().max(0.001)),
        final_progress.found
    );
    Ok(())
}

fn build_target(args: &Args) -> obscurity::Result<MatchTarget> {
    use obscurity::EngineError;

    if let Some(value) = &args.mask {
        let mask = Mask256::from_hex(value, args.bitmask.as_deref())?;
        return Ok(MatchTarget::Mask(mask));
    }

    if let Some(msg) = &args.sig_msg {
        let key = args
            .sig_key
            .as_ref()
            .ok_or_else(|| EngineError::Config("--sig-key required".into()))?;
        let rx = args
            .rx
            .as_ref()
            .ok_or_else(|| EngineError::Config("--rx required".into()))?;
        let rx = Mask256::from_hex(rx, args.bitmask.as_deref())?;
        return Ok(MatchTarget::Signature(SignatureTarget::new(
            parse_hex32(msg)?,
            parse_hex32(key)?,
            args.schnorr,
            rx,
        )?));
    }

    if let Some(tx_hex) = &args.txid_tx {
        let raw_tx = hex::decode(tx_hex)
            .map_err(|_| EngineError::Config("--txid-tx is not valid hex".into()))?;
        let value = args
            .txid_target
            .as_ref()
            .ok_or_else(|| EngineError::Config("--txid-target required".into()))?;
        let mask = Mask256::from_hex(value, args.bitmask.as_deref())?;
        return Ok(MatchTarget::Txid(TxidTarget::new(
            raw_tx,
            args.nonce_offset,
            args.nonce_len,
            mask,
        )?));
    }

    // Address mode.
    let mut patterns = args.patterns.clone();
    if let Some(path) = &args.input {
        let content = std::fs::read_to_string(path)?;
        let file: PatternFile = serde_json::from_str(&content)?;
        patterns.extend(file.patterns);
    }
    if patterns.is_empty() {
        return Err(EngineError::Config(
            "nothing to search: give patterns or --mask / --sig-msg / --txid-tx".into(),
        ));
    }
    let key_mode = if args.both {
        KeyMode::Both
    } else if args.uncompressed {
        KeyMode::Uncompressed
    } else {
        KeyMode::Compressed
    };
    println!("[*] {} pattern(s), {} keys", patterns.len(), key_mode.as_str());
    Ok(MatchTarget::Address(AddressTarget::new(
        &patterns,
        !args.ignore_case,
        key_mode,
    )?))
}

fn parse_hex32(s: &str) -> obscurity::Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|_| obscurity::EngineError::Config(format!("\"{}\" is not valid hex", s)))?;
    bytes
        .try_into()
        .map_err(|_| obscurity::EngineError::Config(format!("\"{}\" must be 32 bytes", s)))
}

fn report(found: &FoundKey, output: &str) {
    use chrono::Local;

    let time = Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut lines: Vec<String> = Vec::new();

    match &found.payload {
        FoundPayload::Address {
            address,
            kind,
            compressed,
            wif,
            ..
        } => {
            let key = found.private_key.expect("address hits carry a key");
            lines.push(format!("Address: {} ({})", address, kind.as_str()));
            lines.push(format!(
                "Key: {} ({})",
                key,
                if *compressed { "compressed" } else { "uncompressed" }
            ));
            lines.push(format!("WIF: {}", wif));
        }
        FoundPayload::MaskedKey { x } => {
            let key = found.private_key.expect("mask hits carry a key");
            lines.push(format!("Pubkey X: {}", hex::encode(x)));
            lines.push(format!("Key: {}", key));
        }
        FoundPayload::Signature {
            r,
            s,
            nonce,
            rx,
            schnorr,
        } => {
            lines.push(format!(
                "Mode: {}",
                if *schnorr { "BIP340 Schnorr" } else { "ECDSA" }
            ));
            lines.push(format!("R.x: {}", hex::encode(rx)));
            lines.push(format!("sig.r: {}", r));
            lines.push(format!("sig.s: {}", s));
            lines.push(format!("Nonce k: {}", nonce));
        }
        FoundPayload::Transaction {
            nonce,
            txid,
            raw_tx,
        } => {
            lines.push(format!("Nonce: 0x{:08x} ({})", nonce, nonce));
            lines.push(format!("TXID: {}", hex::encode(txid)));
            lines.push(format!("Raw TX: {}", hex::encode(raw_tx)));
        }
    }

    println!("\n\n\x1b[1;32m╔══════════════════ MATCH FOUND ══════════════════╗");
    for line in &lines {
        println!("║ {}", line);
    }
    println!("╚═════════════════════════════════════════════════╝\x1b[0m");

    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(output) {
        writeln!(f, "[{}] {}", time, lines.join(" | ")).ok();
    }
}
