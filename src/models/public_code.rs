use rand::Rng;

/// Share-code alphabet without the easily confused 0/O and 1/I.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const PREFIX: &str = "PUB-";
pub const CODE_LENGTH: usize = 8;

pub fn generate<R>(rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    let mut code = String::with_capacity(PREFIX.len() + CODE_LENGTH);
    code.push_str(PREFIX);
    for _ in 0..CODE_LENGTH {
        code.push(ALPHABET[rng.random_range(0..ALPHABET.len())] as char);
    }
    code
}

/// Cheap shape check so obviously malformed codes never hit the database.
pub fn is_well_formed(code: &str) -> bool {
    code.strip_prefix(PREFIX)
        .map(|body| body.len() == CODE_LENGTH && body.bytes().all(|b| ALPHABET.contains(&b)))
        .unwrap_or(false)
}
