pub(crate) fn header<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if line.contains(&b' ') {
        let (maybe_name, value) = split_once(line, &b' ');
        if maybe_name == name {
            Some(value)
        } else {
            None
        }
    } else {
        None
    }
}

pub(crate) fn split_once<'a>(s: &'a [u8], c: &u8) -> (&'a [u8], &'a [u8]) {
    match s.iter().position(|b| b == c) {
        Some(n) => (&s[0..n], &s[n + 1..]),
        None => (s, &[]),
    }
}

/// Splits a commit or tag into its header block and message at the first blank line.
///
/// Returns `None` for the message if there is no blank line.
pub(crate) fn split_message(data: &[u8]) -> (&[u8], Option<&[u8]>) {
    match data.windows(2).position(|w| w == b"\n\n") {
        Some(n) => (&data[..n], Some(&data[n + 2..])),
        None => (data, None),
    }
}

/// Groups header lines, folding continuation lines (those starting with a space)
/// into the preceding header.
pub(crate) fn header_lines(headers: &[u8]) -> Vec<Vec<u8>> {
    let mut lines: Vec<Vec<u8>> = Vec::new();

    if headers.is_empty() {
        return lines;
    }

    for line in headers.split(|b| *b == b'\n') {
        match lines.last_mut() {
            Some(last) if line.starts_with(b" ") => {
                last.push(b'\n');
                last.extend_from_slice(line);
            }
            _ => lines.push(line.to_vec()),
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fn() {
        assert_eq!(header(b"tagger abc", b"tagger").unwrap(), b"abc");
        assert_eq!(header(b"tagger ", b"tagger").unwrap(), b"");

        assert_eq!(header(b"taggex abc", b"tagger"), None);
        assert_eq!(header(b"tagger", b"tagger"), None);
        assert_eq!(header(b"taggerx abc", b"tagger"), None);
    }

    #[test]
    fn split_once_fn() {
        assert_eq!(split_once(b"a b c", &b' '), (&b"a"[..], &b"b c"[..]));
        assert_eq!(split_once(b"abc", &b' '), (&b"abc"[..], &b""[..]));
    }

    #[test]
    fn split_message_fn() {
        let (h, m) = split_message(b"tree x\nauthor y\n\nhello\n\nworld");
        assert_eq!(h, b"tree x\nauthor y");
        assert_eq!(m.unwrap(), b"hello\n\nworld");

        let (h, m) = split_message(b"tree x");
        assert_eq!(h, b"tree x");
        assert!(m.is_none());

        let (h, m) = split_message(b"tree x\n\n");
        assert_eq!(h, b"tree x");
        assert_eq!(m.unwrap(), b"");
    }

    #[test]
    fn header_lines_folds_continuations() {
        let lines = header_lines(b"tree x\ngpgsig -----BEGIN\n line two\n -----END\nencoding y");
        assert_eq!(
            lines,
            vec![
                b"tree x".to_vec(),
                b"gpgsig -----BEGIN\n line two\n -----END".to_vec(),
                b"encoding y".to_vec(),
            ]
        );
    }

    #[test]
    fn header_lines_empty() {
        assert!(header_lines(b"").is_empty());
    }
}
