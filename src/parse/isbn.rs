//! ISBN canonicalisation and checksum validation.

/// Strip hyphens and spaces, upper-case a trailing `x`.
pub fn canonical(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn is_valid_isbn10(isbn: &str) -> bool {
    let isbn = canonical(isbn);
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let digit = match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += digit * (10 - i as u32);
    }
    sum % 11 == 0
}

pub fn is_valid_isbn13(isbn: &str) -> bool {
    let isbn = canonical(isbn);
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let sum: u32 = bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| (b - b'0') as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    sum % 10 == 0
}

/// Thirteen ASCII digits, checksum not considered.
pub fn looks_like_isbn13(isbn: &str) -> bool {
    let isbn = canonical(isbn);
    isbn.len() == 13 && isbn.bytes().all(|b| b.is_ascii_digit())
}

/// Convert a valid ISBN-10 (or pass through a valid ISBN-13) to ISBN-13 form.
pub fn to_isbn13(isbn: &str) -> Option<String> {
    let isbn = canonical(isbn);
    if is_valid_isbn13(&isbn) {
        return Some(isbn);
    }
    if !is_valid_isbn10(&isbn) {
        return None;
    }

    let body = format!("978{}", &isbn[..9]);
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;
    Some(format!("{}{}", body, check))
}

pub fn bad_isbn10s<'a>(isbns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    isbns
        .into_iter()
        .filter(|isbn| !isbn.is_empty() && !is_valid_isbn10(isbn))
        .map(str::to_string)
        .collect()
}

pub fn bad_isbn13s<'a>(isbns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    isbns
        .into_iter()
        .filter(|isbn| !isbn.is_empty() && !is_valid_isbn13(isbn))
        .map(str::to_string)
        .collect()
}
