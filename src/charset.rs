// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Character set fallback for printed text

use encoding_rs::Encoding;
use log::warn;

/// Look up each label, skipping ones the encoding tables do not know
pub fn resolve(labels: &[String]) -> Vec<&'static Encoding> {
    let mut chain = Vec::new();
    for label in labels {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => chain.push(encoding),
            None => warn!("Unknown charset '{}', skipping", label),
        }
    }
    chain
}

/// Encode `line` with the first charset that represents every character
pub fn encode_line(line: &str, chain: &[&'static Encoding]) -> Option<(Vec<u8>, &'static Encoding)> {
    for &encoding in chain {
        let (bytes, used, had_errors) = encoding.encode(line);
        // Encoders without a byte form (UTF-16) silently switch to UTF-8
        if had_errors || used != encoding {
            continue;
        }
        return Some((bytes.into_owned(), encoding));
    }
    None
}

#[cfg(test)]
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{EUC_KR, UTF_8, WINDOWS_1252};
    use pretty_assertions::assert_eq;

    fn labels(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_korean_labels() {
        let chain = resolve(&labels(&["euc-kr", "windows-949", "ks_c_5601-1987"]));
        assert_eq!(chain, vec![EUC_KR, EUC_KR, EUC_KR]);
    }

    #[test]
    fn test_resolve_skips_unknown() {
        let chain = resolve(&labels(&["no-such-charset", "utf-8"]));
        assert_eq!(chain, vec![UTF_8]);
    }

    #[test]
    fn test_korean_round_trip() {
        let text = "영수증 합계 12,000원";
        let (bytes, used) = encode_line(text, &[EUC_KR]).unwrap();
        assert_eq!(used, EUC_KR);
        assert_ne!(bytes, text.as_bytes());
        assert_eq!(decode(&bytes, EUC_KR), text);
    }

    #[test]
    fn test_ascii_is_unchanged() {
        let (bytes, _) = encode_line("Hello", &[EUC_KR]).unwrap();
        assert_eq!(bytes, b"Hello".to_vec());
    }

    #[test]
    fn test_falls_back_in_order() {
        let (bytes, used) = encode_line("한글 😀", &[EUC_KR, WINDOWS_1252, UTF_8]).unwrap();
        assert_eq!(used, UTF_8);
        assert_eq!(bytes, "한글 😀".as_bytes().to_vec());
    }

    #[test]
    fn test_exhausted() {
        assert_eq!(encode_line("😀", &[EUC_KR, WINDOWS_1252]), None);
        assert_eq!(encode_line("abc", &[]), None);
    }
}
