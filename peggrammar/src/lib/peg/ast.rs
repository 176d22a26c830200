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

//! The clause expression tree which users (and the grammar surface syntax) build rules from,
//! together with factory functions for each expression kind. The factories perform the rewrites
//! which are always safe (e.g. `one_or_more(one_or_more(x))` collapses to `one_or_more(x)`);
//! compositions which are outright errors are caught when the grammar is prepared.
//!
//! Expressions still contain rule references and labels; both are resolved away by preparation,
//! which turns a list of [`Rule`](../struct.Rule.html)s into a
//! [`PegGrammar`](../grammar/struct.PegGrammar.html).

use std::fmt;

use peg::escape;
use peg::{CharSet, PegGrammarError};

/// Rendering precedences for the textual form of expressions; a subexpression is parenthesised
/// when its binding is looser than its context requires. These must stay in step with the levels
/// of the grammar surface syntax.
pub(crate) const PREC_FIRST: u8 = 0;
pub(crate) const PREC_SEQ: u8 = 1;
pub(crate) const PREC_LOOKAHEAD: u8 = 2;
pub(crate) const PREC_LABEL: u8 = 3;
pub(crate) const PREC_SUFFIX: u8 = 4;
pub(crate) const PREC_ATOM: u8 = 5;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expr {
    /// Match one character against a set.
    CharSet(CharSet),
    /// Match a literal string, optionally case-insensitively.
    CharSeq { s: String, ignore_case: bool },
    /// Match zero characters, but only at the start of the input.
    Start,
    /// Always match, consuming nothing.
    Nothing,
    /// Match every subexpression, one after the other.
    Seq(Vec<Expr>),
    /// Ordered choice: the first matching subexpression wins.
    First(Vec<Expr>),
    /// One or more repetitions.
    OneOrMore(Box<Expr>),
    /// Zero-width positive lookahead.
    FollowedBy(Box<Expr>),
    /// Zero-width negative lookahead.
    NotFollowedBy(Box<Expr>),
    /// A by-name reference to another rule; resolved away during preparation.
    RuleRef(String),
    /// An AST label on the expression beneath it; lifted onto the enclosing subclause position
    /// during preparation.
    Label(String, Box<Expr>)
}

pub fn char_set(chars: &str) -> Expr {
    Expr::CharSet(CharSet::new(chars))
}

pub fn char_set_negated(chars: &str) -> Expr {
    Expr::CharSet(CharSet::new(chars).negate())
}

pub fn char_range(lo: char, hi: char) -> Expr {
    Expr::CharSet(CharSet::from_ranges(&[(lo, hi)]))
}

pub fn char_ranges(ranges: &[(char, char)]) -> Expr {
    Expr::CharSet(CharSet::from_ranges(ranges))
}

/// A single-character terminal (a one character set).
pub fn ch(c: char) -> Expr {
    Expr::CharSet(CharSet::from_ranges(&[(c, c)]))
}

pub fn any_char() -> Expr {
    Expr::CharSet(CharSet::any())
}

pub fn str_lit(s: &str) -> Expr {
    Expr::CharSeq {
        s: s.to_string(),
        ignore_case: false
    }
}

pub fn str_lit_ci(s: &str) -> Expr {
    Expr::CharSeq {
        s: s.to_string(),
        ignore_case: true
    }
}

pub fn start() -> Expr {
    Expr::Start
}

pub fn nothing() -> Expr {
    Expr::Nothing
}

pub fn seq(subs: Vec<Expr>) -> Expr {
    Expr::Seq(subs)
}

pub fn first(subs: Vec<Expr>) -> Expr {
    Expr::First(subs)
}

/// One or more repetitions of `sub`. Repeating a repetition, or a clause which consumes no
/// input, changes nothing, so those collapse to the subexpression itself.
pub fn one_or_more(sub: Expr) -> Expr {
    match sub {
        Expr::OneOrMore(_)
        | Expr::Nothing
        | Expr::Start
        | Expr::FollowedBy(_)
        | Expr::NotFollowedBy(_) => sub,
        _ => Expr::OneOrMore(Box::new(sub))
    }
}

/// Zero or more repetitions, expressed as `(sub+ / ())`.
pub fn zero_or_more(sub: Expr) -> Expr {
    optional(one_or_more(sub))
}

/// An optional match, expressed as `(sub / ())`.
pub fn optional(sub: Expr) -> Expr {
    first(vec![sub, nothing()])
}

/// Positive lookahead. `followed_by(nothing())` always matches and consumes nothing, so it
/// collapses to `nothing()`.
pub fn followed_by(sub: Expr) -> Expr {
    match sub {
        Expr::Nothing => Expr::Nothing,
        _ => Expr::FollowedBy(Box::new(sub))
    }
}

pub fn not_followed_by(sub: Expr) -> Expr {
    Expr::NotFollowedBy(Box::new(sub))
}

pub fn rule_ref(name: &str) -> Expr {
    Expr::RuleRef(name.to_string())
}

pub fn label(name: &str, sub: Expr) -> Expr {
    Expr::Label(name.to_string(), Box::new(sub))
}

impl Expr {
    pub(crate) fn prec(&self) -> u8 {
        match *self {
            Expr::First(_) => PREC_FIRST,
            Expr::Seq(_) => PREC_SEQ,
            Expr::FollowedBy(_) | Expr::NotFollowedBy(_) => PREC_LOOKAHEAD,
            Expr::Label(..) => PREC_LABEL,
            Expr::OneOrMore(_) => PREC_SUFFIX,
            _ => PREC_ATOM
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter, ctx: u8) -> fmt::Result {
        if self.prec() < ctx {
            write!(f, "(")?;
            self.fmt_prec(f, PREC_FIRST)?;
            return write!(f, ")");
        }
        match *self {
            Expr::CharSet(ref cs) => write!(f, "{}", cs),
            Expr::CharSeq { ref s, ignore_case } => {
                write!(f, "{}", escape::quote_str(s))?;
                if ignore_case {
                    write!(f, "i")?;
                }
                Ok(())
            }
            Expr::Start => write!(f, "^"),
            Expr::Nothing => write!(f, "()"),
            Expr::Seq(ref subs) => {
                for (i, sub) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    sub.fmt_prec(f, PREC_SEQ + 1)?;
                }
                Ok(())
            }
            Expr::First(ref subs) => {
                for (i, sub) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " / ")?;
                    }
                    sub.fmt_prec(f, PREC_FIRST + 1)?;
                }
                Ok(())
            }
            Expr::OneOrMore(ref sub) => {
                sub.fmt_prec(f, PREC_ATOM)?;
                write!(f, "+")
            }
            Expr::FollowedBy(ref sub) => {
                write!(f, "&")?;
                sub.fmt_prec(f, PREC_LABEL)
            }
            Expr::NotFollowedBy(ref sub) => {
                write!(f, "!")?;
                sub.fmt_prec(f, PREC_LABEL)
            }
            Expr::RuleRef(ref n) => write!(f, "{}", n),
            Expr::Label(ref n, ref sub) => {
                write!(f, "{}:", n)?;
                sub.fmt_prec(f, PREC_SUFFIX)
            }
        }
    }

    /// Check the compositions which the factory functions cannot collapse away. Called on every
    /// rule during grammar preparation.
    pub(crate) fn validate(&self) -> Result<(), PegGrammarError> {
        match *self {
            Expr::First(ref subs) => {
                for (i, sub) in subs.iter().enumerate() {
                    if let Expr::Nothing = *sub {
                        if i != subs.len() - 1 {
                            return Err(PegGrammarError::InvalidClauseComposition(
                                "() is only permitted as the final alternative of an ordered \
                                 choice"
                                    .to_string()
                            ));
                        }
                    }
                    sub.validate()?;
                }
                Ok(())
            }
            Expr::Seq(ref subs) => {
                for sub in subs {
                    sub.validate()?;
                }
                Ok(())
            }
            Expr::FollowedBy(ref sub) | Expr::NotFollowedBy(ref sub) => {
                match **sub {
                    Expr::FollowedBy(_) | Expr::NotFollowedBy(_) => {
                        return Err(PegGrammarError::InvalidClauseComposition(
                            "a lookahead must not be applied directly to another lookahead"
                                .to_string()
                        ));
                    }
                    Expr::Nothing => {
                        return Err(PegGrammarError::InvalidClauseComposition(
                            "!() can never match".to_string()
                        ));
                    }
                    _ => ()
                }
                sub.validate()
            }
            Expr::OneOrMore(ref sub) | Expr::Label(_, ref sub) => sub.validate(),
            _ => Ok(())
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_prec(f, PREC_FIRST)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use peg::PegGrammarError;

    #[test]
    fn test_one_or_more_collapses() {
        assert_eq!(one_or_more(one_or_more(ch('a'))), one_or_more(ch('a')));
        assert_eq!(one_or_more(nothing()), nothing());
        assert_eq!(one_or_more(start()), start());
        let fb = followed_by(ch('a'));
        assert_eq!(one_or_more(fb.clone()), fb);
        let nfb = not_followed_by(ch('a'));
        assert_eq!(one_or_more(nfb.clone()), nfb);
    }

    #[test]
    fn test_followed_by_nothing_collapses() {
        assert_eq!(followed_by(nothing()), nothing());
    }

    #[test]
    fn test_validate_errors() {
        let e = first(vec![nothing(), ch('a')]);
        match e.validate() {
            Err(PegGrammarError::InvalidClauseComposition(_)) => (),
            r => panic!("{:?}", r)
        }
        match not_followed_by(nothing()).validate() {
            Err(PegGrammarError::InvalidClauseComposition(_)) => (),
            r => panic!("{:?}", r)
        }
        match followed_by(not_followed_by(ch('a'))).validate() {
            Err(PegGrammarError::InvalidClauseComposition(_)) => (),
            r => panic!("{:?}", r)
        }
        assert_eq!(optional(ch('a')).validate(), Ok(()));
    }

    #[test]
    fn test_display_parens() {
        let e = seq(vec![
            first(vec![ch('a'), ch('b')]),
            one_or_more(char_range('0', '9')),
        ]);
        assert_eq!(format!("{}", e), "('a' / 'b') [0-9]+");
        let e = first(vec![
            label("sum", seq(vec![rule_ref("E"), label("op", ch('+')), rule_ref("N")])),
            rule_ref("N"),
        ]);
        assert_eq!(format!("{}", e), "sum:(E op:'+' N) / N");
        let e = not_followed_by(seq(vec![ch('a'), ch('b')]));
        assert_eq!(format!("{}", e), "!('a' 'b')");
        let e = label("v", one_or_more(char_range('a', 'z')));
        assert_eq!(format!("{}", e), "v:[a-z]+");
        assert_eq!(format!("{}", zero_or_more(ch('x'))), "'x'+ / ()");
        assert_eq!(format!("{}", str_lit_ci("select")), "\"select\"i");
    }
}
