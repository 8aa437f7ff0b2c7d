use std::time::Instant;

/// Percent-encode a string with the character set kept by JavaScript's `encodeURIComponent`
pub fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Generated avatar for a display name
pub fn avatar_url(name: &str) -> String {
    let name = if name.trim().is_empty() { "User" } else { name };
    format!(
        "https://ui-avatars.com/api/?name={}&background=1E3A8A&color=fff",
        encode_uri_component(name)
    )
}

/// Run `f` and return its result with the elapsed time in milliseconds
pub fn measure<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed().as_secs_f64() * 1000.0)
}
