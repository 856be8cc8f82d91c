use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SERIAL_LENGTH: usize = 6;

/// Generates a short human-readable id such as `WRH-4K9ZQ2`.
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let serial: String = (0..SERIAL_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", prefix, serial)
}
