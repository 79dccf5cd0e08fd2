//! Framed GNSS sentence construction for the fault-injection feed.

/// XOR checksum over a sentence body (the bytes between `$` and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Wrap a sentence body with `$`, the checksum suffix, and CRLF.
pub fn sentence(body: &str) -> String {
    format!("${body}*{:02X}\r\n", checksum(body))
}

/// GGA fix sentence with the given fix-quality indicator (0 = no fix,
/// 1 = GPS, 2 = DGPS). Position and time are fixed; only the quality field
/// matters to the agent's PPS logic.
pub fn gga_fix(quality: u8) -> String {
    sentence(&format!(
        "GPGGA,165848.000,4714.7671,N,00849.8387,E,{quality},9,1.01,480.0,M,48.0,M,0000,0000"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_xor_of_body_bytes() {
        // Worked example: "GPGGA," ^ ... is easiest to pin with a tiny body.
        assert_eq!(checksum("A"), 0x41);
        assert_eq!(checksum("AB"), 0x41 ^ 0x42);
    }

    #[test]
    fn sentence_is_framed_and_terminated() {
        let s = sentence("GPTXT,test");
        assert!(s.starts_with("$GPTXT,test*"));
        assert!(s.ends_with("\r\n"));
        // Two uppercase hex digits between '*' and CRLF.
        let hex = &s[s.len() - 4..s.len() - 2];
        assert!(u8::from_str_radix(hex, 16).is_ok());
    }

    #[test]
    fn gga_fix_carries_quality_field() {
        let s = gga_fix(2);
        assert!(s.contains(",E,2,9,"));
        let body = &s[1..s.rfind('*').unwrap()];
        let hex = &s[s.rfind('*').unwrap() + 1..s.len() - 2];
        assert_eq!(u8::from_str_radix(hex, 16).unwrap(), checksum(body));
    }
}
