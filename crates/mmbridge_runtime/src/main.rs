//! MMagEdit Bridge smoke test
//!
//! Boots the guest library, prints its metadata, optionally loads a ROM and
//! a hack, and dumps a small slice of the CHR state.
//!
//! Usage: `mmbridge /path/to/mmagedit.js [base.nes] [hack.txt]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mmbridge_core::{Bridge, BridgeResult, Settings};
use mmbridge_script::QuickJsSession;

const SETTINGS_ENV: &str = "MMBRIDGE_SETTINGS";
const SMOKE_LOG_LEVEL: i32 = 5;
const CHR_SELECTOR: &str = ".chr[0][0:2]";

fn load_settings() -> Result<Settings> {
    let Some(path) = std::env::var_os(SETTINGS_ENV).map(PathBuf::from) else {
        return Ok(Settings::default());
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let settings = Settings::from_json_str(&json)
        .with_context(|| format!("parsing settings in {}", path.display()))?;
    tracing::debug!("loaded settings from {}", path.display());
    Ok(settings)
}

/// Turns a latched failure into an `anyhow` error carrying the latch text.
fn check<T>(bridge: &mut Bridge<QuickJsSession>, what: &str, result: BridgeResult<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(_) => bail!("{what} failed: {}", bridge.take_error()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(script) = args.next() else {
        println!("Usage: mmbridge /path/to/mmagedit.js [base.nes] [hack.txt]");
        return Ok(());
    };
    let rom = args.next();
    let hack = args.next();

    let mut bridge = Bridge::<QuickJsSession>::with_settings(load_settings()?);
    bridge.set_log_level(SMOKE_LOG_LEVEL);

    let result = bridge.init(&script);
    check(&mut bridge, "init", result)?;

    let outcome = exercise(&mut bridge, rom.as_deref(), hack.as_deref());

    let result = bridge.end();
    check(&mut bridge, "end", result)?;
    outcome
}

fn exercise(
    bridge: &mut Bridge<QuickJsSession>,
    rom: Option<&str>,
    hack: Option<&str>,
) -> Result<()> {
    let result = bridge.name_version_date();
    println!("{}", check(bridge, "get_name_version_date", result)?);
    let result = bridge.version_int();
    println!("format version {}", check(bridge, "get_version_int", result)?);

    let Some(rom) = rom else {
        return Ok(());
    };
    let result = bridge.load_rom(rom);
    check(bridge, "load_rom", result)?;
    tracing::info!("loaded ROM {rom}");

    if let Some(hack) = hack {
        let result = bridge.load_hack(hack);
        check(bridge, "load_hack", result)?;
        tracing::info!("applied hack {hack}");
    }

    let result = bridge.get_state_select(CHR_SELECTOR);
    println!("{}", check(bridge, "get_state_select", result)?);
    Ok(())
}
