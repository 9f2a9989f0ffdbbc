/// Fill byte used to pad fixed-width strings
pub const PAD: u8 = b' ';

/// Copies `value` into `buffer`, truncating to the buffer width and padding
/// the remainder with [`PAD`].
pub fn write_padded(buffer: &mut [u8], value: &[u8]) {
    let n = value.len().min(buffer.len());
    buffer[..n].copy_from_slice(&value[..n]);
    buffer[n..].fill(PAD);
}

/// Reads a fixed-width string, stripping trailing padding and NUL bytes.
pub fn read_padded(buffer: &[u8]) -> std::result::Result<&str, std::str::Utf8Error> {
    let end = buffer
        .iter()
        .rposition(|&b| b != PAD && b != 0)
        .map_or(0, |pos| pos + 1);
    std::str::from_utf8(&buffer[..end])
}

/// Appends `value` to `buffer` as decimal, left-padded with zeros to `width` digits.
///
/// Values wider than `width` are written in full.
pub fn push_zero_padded<I: itoa::Integer>(buffer: &mut Vec<u8>, value: I, width: usize) {
    let mut translater = itoa::Buffer::new();
    let digits = translater.format(value).as_bytes();
    for _ in digits.len()..width {
        buffer.push(b'0');
    }
    buffer.extend_from_slice(digits);
}

/// Tracks the maximum length of a stream of strings (bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxLen(usize);
impl MaxLen {
    pub fn update(&mut self, value: &str) {
        self.0 = self.0.max(value.len());
    }
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn padding_truncates_and_fills() {
        let mut buf = [0u8; 6];
        write_padded(&mut buf, b"ABC");
        assert_eq!(&buf, b"ABC   ");
        write_padded(&mut buf, b"ABCDEFGH");
        assert_eq!(&buf, b"ABCDEF");
        assert_eq!(read_padded(b"AB  \0\0").unwrap(), "AB");
        assert_eq!(read_padded(b"    ").unwrap(), "");
    }

    #[test]
    fn zero_padding_sorts_numerically() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        push_zero_padded(&mut a, 900u32, 10);
        push_zero_padded(&mut b, 1000u32, 10);
        assert_eq!(a, b"0000000900");
        assert!(a < b);
    }
}
