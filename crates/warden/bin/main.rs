//! The `warden` CLI: serves dapp requests for a local keyring.

fn main() {
    if let Err(err) = warden::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
