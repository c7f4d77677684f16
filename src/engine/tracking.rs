use rand::Rng;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LETTER_COUNT: usize = 2;
const DIGIT_COUNT: usize = 9;

/// Random tracking code: two uppercase letters followed by nine digits.
pub fn generate_tracking_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(LETTER_COUNT + DIGIT_COUNT);

    for _ in 0..LETTER_COUNT {
        code.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    }
    for _ in 0..DIGIT_COUNT {
        code.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }

    code
}

pub fn is_tracking_code(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() == LETTER_COUNT + DIGIT_COUNT
        && bytes[..LETTER_COUNT].iter().all(u8::is_ascii_uppercase)
        && bytes[LETTER_COUNT..].iter().all(u8::is_ascii_digit)
}
