//! Binary entrypoint: read a unified diff from stdin, write one JSON review packet to stdout.
//!
//! Input is scanned in chunks so very large diffs never sit in memory as one string.

use risk_engine::{review, DiffScanner, ReviewError};
use std::io::{self, Read, Write};

const CHUNK_SIZE: usize = 64 * 1024;

fn main() {
  if let Err(e) = run_binary() {
    let _ = writeln!(io::stderr(), "risk-engine error: {}", e);
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), ReviewError> {
  let mut scanner = DiffScanner::new();
  let mut stdin = io::stdin().lock();
  let mut buf = vec![0u8; CHUNK_SIZE];
  loop {
    let n = stdin.read(&mut buf)?;
    if n == 0 {
      break;
    }
    scanner.feed(&buf[..n]);
  }

  let out = review(&scanner.finish());
  let json = serde_json::to_vec(&out)?;
  io::stdout().write_all(&json)?;
  Ok(())
}
