//! The per-thread hot loop: generate, derive, look up, report.

use anyhow::Context;
use log::info;
use secp256k1::{Secp256k1, SignOnly};
use std::collections::hash_map::DefaultHasher;
use std::fs::OpenOptions;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::sync::Arc;
use std::thread;

use crate::address::{derive_address, PubkeyScheme};
use crate::balance::AddressIndex;
use crate::keygen;
use crate::stats::Counters;
use crate::EncodeHex;

/// One search thread. Owns its RNG, curve context and index handle; the
/// only state shared with the rest of the process is the counter pair.
pub struct Worker {
    index: Box<dyn AddressIndex>,
    counters: Arc<Counters>,
    scheme: PubkeyScheme,
    secp: Secp256k1<SignOnly>,
}

impl Worker {
    pub fn new(index: Box<dyn AddressIndex>, counters: Arc<Counters>, scheme: PubkeyScheme) -> Self {
        Self {
            index,
            counters,
            scheme,
            secp: Secp256k1::signing_only(),
        }
    }

    /// Loops until the process is killed. Returns only on a fatal error:
    /// a scalar the curve library rejects points at a generator defect,
    /// and I/O failures on the index or match file are not retryable.
    pub fn run(mut self) -> anyhow::Result<()> {
        let mut rng = rand::thread_rng();
        loop {
            let key = keygen::random_key_below_order(&mut rng);
            let address = derive_address(&self.secp, &key, self.scheme)?;
            let hit = self
                .index
                .lookup(&address)
                .with_context(|| format!("looking up {address}"))?;
            self.counters.record_key();
            if let Some(balance) = hit {
                self.report_match(&key, &address, balance)
                    .context("writing match record")?;
            }
        }
    }

    /// Matches are so rare that opening the file anew each time is fine.
    /// The file name carries a hash of the thread id, so concurrent
    /// workers never share a handle.
    fn report_match(&self, key: &[u8; 32], address: &str, balance: u64) -> std::io::Result<()> {
        println!("-------------------- NON NULL BALANCE FOUND --------------------");
        info!("match: {address}");
        let path = format!("walletminer.balance.{}.txt", thread_token());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", match_record(key, address, balance))
    }
}

/// `<64-hex private key> => [<address>], BALANCE: <balance>sat`
fn match_record(key: &[u8; 32], address: &str, balance: u64) -> String {
    format!("{} => [{}], BALANCE: {}sat", key.hex(), address, balance)
}

fn thread_token() -> u64 {
    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn match_record_format() {
        let key = hex!("be63955589062b68320f0a3d5b450551c67bbb5f6e5b34cec57738f3a96316a9");
        assert_eq!(
            match_record(&key, "1Dai8FBumerEYMzijW7hfMgD45HowqYzVP", 123),
            "be63955589062b68320f0a3d5b450551c67bbb5f6e5b34cec57738f3a96316a9 \
             => [1Dai8FBumerEYMzijW7hfMgD45HowqYzVP], BALANCE: 123sat"
        );
    }

    #[test]
    fn thread_token_is_stable_within_a_thread() {
        assert_eq!(thread_token(), thread_token());
        let other = thread::spawn(thread_token).join().unwrap();
        assert_ne!(thread_token(), other);
    }
}
