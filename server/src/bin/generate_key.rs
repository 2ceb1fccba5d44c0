use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use color_eyre::eyre::Result;
use rand::{rngs::OsRng, RngCore as _};

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // 64 random bytes encode to 86 characters, above the cookie key minimum
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    let secret = URL_SAFE_NO_PAD.encode(bytes);

    println!("Generated session secret:");
    println!("{}", secret);
    println!();
    println!("You can use this as your SESSION_SECRET environment variable.");
    println!("For example, add the following to your .env file:");
    println!("SESSION_SECRET=\"{}\"", secret);

    Ok(())
}
