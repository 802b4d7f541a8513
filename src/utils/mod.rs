use crate::error::{ArbError, Result};
use log::{error, info};
use once_cell::sync::Lazy;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair},
};
use std::collections::HashMap;
use std::str::FromStr;

pub fn setup_logging() -> std::result::Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized.");
    Ok(())
}

pub fn load_keypair(path: &str) -> Result<Keypair> {
    match read_keypair_file(path) {
        Ok(kp) => {
            info!("Successfully loaded keypair from: {}", path);
            Ok(kp)
        }
        Err(e) => {
            let error_msg = format!("Failed to load keypair from path '{}': {}", path, e);
            error!("{}", error_msg);
            Err(ArbError::ConfigError(error_msg))
        }
    }
}

/// Mint addresses for the tokens this bot routes. Symbols are the halves of
/// a pair string like "SOL/USDC".
pub static TOKEN_MINTS: Lazy<HashMap<&'static str, Pubkey>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let entries = [
        ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
        ("SOL", "So11111111111111111111111111111111111111112"),
        ("RAY", "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R"),
        ("SRM", "SRMuApVNdxXokk5GT7XD5cUUgXMBCoAz2LHeuAoKWRt"),
        ("ORCA", "orcaEKTdK7LKz57vaAYr9QeNsVEPfiu6QeMU1kektZE"),
    ];
    for (symbol, addr) in entries {
        m.insert(
            symbol,
            Pubkey::from_str(addr).expect("static mint table entry must parse"),
        );
    }
    m
});

pub fn mint_for_symbol(symbol: &str) -> Option<Pubkey> {
    TOKEN_MINTS.get(symbol).copied()
}

pub fn symbol_for_mint(mint: &Pubkey) -> Option<&'static str> {
    TOKEN_MINTS
        .iter()
        .find(|(_, m)| *m == mint)
        .map(|(symbol, _)| *symbol)
}

/// Splits a "BASE/QUOTE" pair into its token symbols.
pub fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('/')
        .ok_or_else(|| ArbError::ParseError(format!("Malformed token pair '{}'", pair)))
}
