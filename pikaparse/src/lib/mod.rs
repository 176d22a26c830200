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

//! A bottom-up ("pika") matching engine for grammars prepared by the `peggrammar` crate. Rather
//! than descending from a grammar's start rule, the engine works from the right-hand end of the
//! input towards the left, matching terminals first and waking each clause whenever one of its
//! subclauses newly matches; left recursion, direct or indirect, therefore needs no special
//! treatment, and the memo table left behind by a parse doubles as the raw material for syntax
//! error reporting.
//!
//! The main entry points are [`parse`](fn.parse.html) (and
//! [`parse_opts`](fn.parse_opts.html)), which drive a
//! [`MemoTable`](memotable/struct.MemoTable.html) to its fixpoint, and
//! [`metagrammar::grammar_from_str`](metagrammar/fn.grammar_from_str.html), which reads the
//! textual grammar surface syntax (itself parsed with this engine).

extern crate fnv;
#[macro_use]
extern crate lazy_static;
extern crate num_traits;
extern crate peggrammar;

pub mod astnode;
pub mod memotable;
pub mod metagrammar;
mod parser;

pub use astnode::ASTNode;
pub use memotable::{Match, MemoKey, MemoTable};
pub use parser::{parse, parse_opts, ParseOpts};
