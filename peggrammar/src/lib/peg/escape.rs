// Copyright (c) 2018 King's College London
// created by the Software Development Team <http://soft-dev.org/>
//
// The Universal Permissive License (UPL), Version 1.0
//
// Subject to the condition set forth below, permission is hereby granted to any person obtaining a
// copy of this software, associated documentation and/or data (collectively the "Software"), free
// of charge and under any and all copyright rights in the Software, and any and all patent rights
// owned or freely licensable by each licensor hereunder covering either (i) the unmodified
// Software as contributed to or provided by such licensor, or (ii) the Larger Works (as defined
// below), to deal in both
//
// (a) the Software, and
// (b) any piece of software and/or hardware listed in the lrgrwrks.txt file
// if one is included with the Software (each a "Larger Work" to which the Software is contributed
// by such licensors),
//
// without restriction, including without limitation the rights to copy, create derivative works
// of, display, perform, and distribute the Software and make, use, sell, offer for sale, import,
// export, have made, and have sold the Software and the Larger Work(s), and to sublicense the
// foregoing rights on either these or other terms.
//
// This license is subject to the following condition: The above copyright notice and either this
// complete permission notice or at a minimum a reference to the UPL must be included in all copies
// or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Escaping and unescaping for the textual rendering of grammars. The canonical rendering of a
//! clause must survive a round-trip through the grammar surface syntax, so the three atom
//! contexts (double-quoted strings, single-quoted characters and character sets) each escape the
//! characters that are significant to them, C-style.

/// Render `s` as a double-quoted string literal.
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        push_escaped(c, &['"'], &mut out);
    }
    out.push('"');
    out
}

/// Render `c` as a single-quoted character literal.
pub fn quote_char(c: char) -> String {
    let mut out = String::with_capacity(4);
    out.push('\'');
    push_escaped(c, &['\''], &mut out);
    out.push('\'');
    out
}

/// Render `c` as it appears inside a `[...]` character set.
pub fn charset_char(c: char) -> String {
    let mut out = String::with_capacity(2);
    push_escaped(c, &['[', ']', '^', '-'], &mut out);
    out
}

fn push_escaped(c: char, delims: &[char], out: &mut String) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        _ if delims.contains(&c) => {
            out.push('\\');
            out.push(c);
        }
        _ if (c as u32) < 0x20 => {
            out.push_str(&format!("\\u{:04x}", c as u32));
        }
        _ => out.push(c)
    }
}

/// Undo the escapes produced above (and the other common C-style ones). Unknown escapes yield
/// the escaped character itself, so that e.g. `\-` is usable in any context.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut cs = s.chars();
    while let Some(c) = cs.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match cs.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let mut v: u32 = 0;
                for _ in 0..4 {
                    match cs.next().and_then(|h| h.to_digit(16)) {
                        Some(d) => v = v * 16 + d,
                        None => break
                    }
                }
                match ::std::char::from_u32(v) {
                    Some(u) => out.push(u),
                    None => out.push('\u{fffd}')
                }
            }
            Some(o) => out.push(o),
            None => out.push('\\')
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::{charset_char, quote_char, quote_str, unescape};

    #[test]
    fn test_quote_str() {
        assert_eq!(quote_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_str("a\nb\\"), "\"a\\nb\\\\\"");
        assert_eq!(quote_str("monkey"), "\"monkey\"");
    }

    #[test]
    fn test_quote_char() {
        assert_eq!(quote_char('\''), "'\\''");
        assert_eq!(quote_char('+'), "'+'");
        assert_eq!(quote_char('\t'), "'\\t'");
    }

    #[test]
    fn test_charset_char() {
        assert_eq!(charset_char(']'), "\\]");
        assert_eq!(charset_char('-'), "\\-");
        assert_eq!(charset_char('q'), "q");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\nb"), "a\nb");
        assert_eq!(unescape("\\u0041\\-"), "A-");
        assert_eq!(unescape("\\\\"), "\\");
        assert_eq!(unescape("plain"), "plain");
    }
}
