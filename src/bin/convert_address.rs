//! Print Tron addresses in both base58 and hex form.
//!
//! Usage: `convert-address [ADDRESS...]`. Without arguments the two Nile
//! deployment addresses are converted.

use anyhow::Result;
use savegas::address::TronAddress;

const DEFAULT_ADDRESSES: [(&str, &str); 2] = [
    ("MockUSDT", "41adebb351862e434db88f5ced6977f1edf5c05c4f"),
    ("SaveGas", "412d74ca55d64f8c67155ac0232e3e2f22c9256de0"),
];

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() {
        for (name, hex) in DEFAULT_ADDRESSES {
            let address = TronAddress::from_hex(hex)?;
            println!("{} Base58: {}", name, address.to_base58());
        }
        return Ok(());
    }

    let mut failed = false;
    for arg in &args {
        match arg.parse::<TronAddress>() {
            Ok(address) if arg.trim().starts_with('T') => println!("{} -> {}", arg, address.to_hex()),
            Ok(address) => println!("{} -> {}", arg, address.to_base58()),
            Err(e) => {
                eprintln!("{}: {}", arg, e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
