//! `keygen`: generate a standalone keypair.

use anyhow::Result;

use crate::keys::Keypair;

use super::{print_success, print_warning};

pub async fn run() -> Result<()> {
    let keypair = Keypair::generate();
    print_success(&format!("Address: {}", keypair.address()));
    println!("Secret: {}", keypair.to_secret_base58().as_str());
    print_warning("Store the secret now; it is not written anywhere.");
    Ok(())
}
