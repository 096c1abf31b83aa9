use std::path::Path;

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose, Engine as _};
use keyring::Entry;
use sitestore_core::StoreKey;
use tracing::info;
use zeroize::Zeroizing;

const SERVICE_NAME: &str = "DarklockSiteStore";
const STORE_KEY: &str = "store_key";

/// Pick the store key: explicit hex first, then the OS keyring.
pub fn resolve_key(key_hex: Option<&str>, store_dir: &Path, create: bool) -> Result<StoreKey> {
    if let Some(hex) = key_hex {
        return StoreKey::from_hex(hex.trim()).map_err(|e| anyhow!("--key-hex: {e}"));
    }
    match load_store_key(store_dir) {
        Ok(Some(key)) => Ok(key),
        Ok(None) if create => {
            let key = StoreKey::generate();
            save_store_key(store_dir, &key)?;
            info!(store = %store_dir.display(), "created new store key in keyring");
            Ok(key)
        }
        Ok(None) => bail!(
            "no key for {} in the keyring; pass --key-hex, set SITESTORE_KEY, or use --create-key",
            store_dir.display()
        ),
        Err(e) => Err(e),
    }
}

fn entry_for(store_dir: &Path) -> Result<Entry> {
    Entry::new(SERVICE_NAME, &format!("{}:{}", STORE_KEY, store_dir.display()))
        .map_err(|e| anyhow!("keyring init: {e}"))
}

pub fn load_store_key(store_dir: &Path) -> Result<Option<StoreKey>> {
    let entry = entry_for(store_dir)?;
    let encoded = match entry.get_password() {
        Ok(encoded) => Zeroizing::new(encoded),
        Err(keyring::Error::NoEntry) => return Ok(None),
        Err(e) => return Err(anyhow!("load store key: {e}")),
    };
    let decoded = Zeroizing::new(
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| anyhow!("decode store key: {e}"))?,
    );
    let key = StoreKey::from_bytes(&decoded).map_err(|e| anyhow!("store key: {e}"))?;
    Ok(Some(key))
}

pub fn save_store_key(store_dir: &Path, key: &StoreKey) -> Result<()> {
    let entry = entry_for(store_dir)?;
    let encoded = Zeroizing::new(general_purpose::STANDARD.encode(key.as_bytes()));
    entry
        .set_password(&encoded)
        .map_err(|e| anyhow!("store key: {e}"))?;
    Ok(())
}
