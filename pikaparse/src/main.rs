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

extern crate getopts;
extern crate pikaparse;

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process;

use getopts::Options;
use pikaparse::metagrammar::grammar_from_str;
use pikaparse::{parse_opts, ParseOpts};

fn usage(prog: &str, error: &str) -> ! {
    let path = Path::new(prog);
    let leaf = match path.file_name().and_then(|x| x.to_str()) {
        Some(m) => m,
        None => "pikaparse"
    };
    if !error.is_empty() {
        eprintln!("{}", error);
    }
    eprintln!(
        "Usage: {} [-t] [-e <rule>] <grammar file> <start rule> <input file>",
        leaf
    );
    process::exit(1);
}

fn read_file(path: &str) -> String {
    let mut s = String::new();
    let mut f = match File::open(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Can't open file {}: {}", path, e);
            process::exit(1);
        }
    };
    f.read_to_string(&mut s).unwrap();
    s
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args[0].clone();
    let matches = match Options::new()
        .optflag("h", "help", "")
        .optflag("t", "trace", "Report each match attempt on stderr.")
        .optmulti(
            "e",
            "error-rule",
            "Rule used to delimit syntax errors (may be given multiple times; defaults to the \
             start rule).",
            "RULE"
        )
        .parse(&args[1..])
    {
        Ok(m) => m,
        Err(f) => usage(&prog, f.to_string().as_str())
    };

    if matches.opt_present("h") || matches.free.len() != 3 {
        usage(&prog, "");
    }

    let grm_path = &matches.free[0];
    let start_rule = &matches.free[1];
    let input_path = &matches.free[2];

    let grm = match grammar_from_str(&read_file(grm_path)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("{}: {}", grm_path, e);
            process::exit(1);
        }
    };
    if grm.rule_idx(start_rule).is_none() {
        usage(&prog, &format!("Unknown start rule '{}'.", start_rule));
    }

    let input = read_file(input_path);
    let memo = parse_opts(
        &grm,
        &input,
        ParseOpts {
            trace: matches.opt_present("t")
        }
    );

    match memo.to_ast(start_rule) {
        Some(ref ast) if ast.len() == memo.input_len() => {
            print!("{}", ast.pp());
        }
        _ => {
            let error_rules = matches.opt_strs("e");
            let names = if error_rules.is_empty() {
                vec![start_rule.as_str()]
            } else {
                error_rules.iter().map(|x| x.as_str()).collect()
            };
            let errs = memo.syntax_errors(&names);
            if errs.is_empty() {
                eprintln!("Parse error: input not matched by rule '{}'.", start_rule);
            }
            for (start, end, text) in errs {
                eprintln!("Syntax error at {}..{}: '{}'", start, end, text);
            }
            process::exit(1);
        }
    }
}
