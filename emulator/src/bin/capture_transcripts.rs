use std::env;
use std::io;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

const POWER_CYCLE: &[&str] = &[
    "status",
    "tap",
    "advance 4s",
    "status",
    "tap",
    "advance 3s",
    "advance 5s",
    "log",
];

const BOOT_TIMEOUT: &[&str] = &["sbc down", "tap", "advance 101s", "status", "log"];

const SHUTDOWN_TIMEOUT: &[&str] = &[
    "sbc auto boot=1s",
    "tap",
    "advance 2s",
    "sbc manual",
    "tap",
    "advance 101s",
    "status",
    "log",
];

fn main() -> io::Result<()> {
    let dir = env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("transcripts"), PathBuf::from);

    record(&dir, "power-cycle.log", POWER_CYCLE)?;
    record(&dir, "boot-timeout.log", BOOT_TIMEOUT)?;
    record(&dir, "shutdown-timeout.log", SHUTDOWN_TIMEOUT)?;
    Ok(())
}

fn record(dir: &Path, name: &str, script: &[&str]) -> io::Result<()> {
    let path = dir.join(name);
    let mut session = Session::new(Some(&path))?;
    for line in script {
        session.handle_command(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
