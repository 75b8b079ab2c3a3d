/***************************************************************************************[main.rs]
Copyright (c) 2021-2024, Ilona Prater

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

extern crate clap;
extern crate cpu_time;
extern crate flate2;
extern crate gnatsat;

#[cfg(not(feature = "logging"))]
mod env_logger {
    pub fn init() {}
}

#[cfg(feature = "logging")]
extern crate env_logger;

use clap::{App, Arg};
use flate2::bufread::GzDecoder;
use gnatsat::{Solver, SATISFIABLE, UNSATISFIABLE};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::exit;
use std::time::Instant;

mod system;

fn main() {
    env_logger::init();
    let exitcode = main2().unwrap_or_else(|err| {
        eprintln!("{}", err);
        exit(1)
    });
    exit(exitcode);
}

fn main2() -> io::Result<i32> {
    let resource = system::ResourceMeasure::new();

    let matches = App::new("gnatsat")
        .version(Solver::version())
        .about("Incremental CDCL SAT solver with inprocessing")
        .arg(Arg::with_name("input-file").help("DIMACS or INCCNF input, gzip detected"))
        .arg(
            Arg::with_name("proof")
                .long("proof")
                .takes_value(true)
                .help("write a DRAT proof to this file"),
        )
        .arg(
            Arg::with_name("verbosity")
                .long("verb")
                .default_value("1")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("cpu-lim")
                .long("cpu-lim")
                .default_value("-1.0")
                .takes_value(true)
                .help("CPU time limit in seconds"),
        )
        .arg(
            Arg::with_name("strict")
                .long("strict")
                .takes_value(true)
                .default_value("1")
                .help("DIMACS strictness (0, 1 or 2)"),
        )
        .arg(Arg::with_name("plain").long("plain").help("disable all inprocessing"))
        .arg(Arg::with_name("sat").long("sat").help("tune for satisfiable instances"))
        .arg(Arg::with_name("unsat").long("unsat").help("tune for unsatisfiable instances"))
        .arg(
            Arg::with_name("optimize")
                .short("O")
                .takes_value(true)
                .help("scale inprocessing effort by a power of ten"),
        )
        .arg(
            Arg::with_name("option")
                .short("o")
                .long("option")
                .multiple(true)
                .number_of_values(1)
                .takes_value(true)
                .help("forward a long option, e.g. -o --no-elim or -o --restartint=50"),
        )
        .get_matches();

    let verbosity = matches
        .value_of("verbosity")
        .unwrap()
        .parse::<i32>()
        .unwrap_or(0);
    let strict = matches
        .value_of("strict")
        .unwrap()
        .parse::<i32>()
        .unwrap_or(1);
    let cpu_lim: Option<f64> = matches
        .value_of("cpu-lim")
        .and_then(|s| s.parse().ok())
        .filter(|x: &f64| *x > 0.);

    let mut solver = Solver::new();

    for &preset in ["plain", "sat", "unsat"].iter() {
        if matches.is_present(preset) {
            solver.configure(preset);
        }
    }
    if let Some(vals) = matches.values_of("option") {
        for arg in vals {
            if !solver.set_long_option(arg) {
                eprintln!("ERROR! invalid option '{}'", arg);
                exit(1);
            }
        }
    }

    if let Some(proof_file) = matches.value_of("proof") {
        if let Err(msg) = solver.trace_proof_path(proof_file) {
            eprintln!("ERROR! {}", msg);
            exit(1);
        }
    }

    if let Some(e) = matches.value_of("optimize").and_then(|s| s.parse().ok()) {
        solver.optimize(e);
    }

    if let Some(max_cpu) = cpu_lim {
        let measure = system::ResourceMeasure::new();
        solver.connect_terminator(Box::new(move || measure.cpu_time() > max_cpu));
    }

    if verbosity > 0 {
        println!("c {}", Solver::signature());
    }

    let initial_time = Instant::now();
    let mut incremental = false;
    let mut cubes: Vec<i32> = vec![];

    let input_file = matches.value_of("input-file");
    let parse_result = if let Some(input_file) = input_file {
        let file = BufReader::new(File::open(input_file)?);
        read_input_autogz(file, &mut solver, strict, &mut incremental, &mut cubes)
    } else {
        if verbosity > 0 {
            println!("c reading from standard input");
        }
        let stdin = io::stdin();
        let lock = stdin.lock();
        read_input_autogz(lock, &mut solver, strict, &mut incremental, &mut cubes)
    };
    let max_var = match parse_result {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{}", msg);
            exit(1);
        }
    };

    if verbosity > 0 {
        println!("c variables: {:>10}", max_var);
        println!("c clauses:   {:>10}", solver.irredundant());
        let duration = Instant::now() - initial_time;
        println!(
            "c parsed in {}.{:02} s",
            duration.as_secs(),
            duration.subsec_nanos() / 10_000_000
        );
    }

    if incremental {
        // solve each cube as a set of assumptions
        let mut start = 0;
        for end in 0..cubes.len() {
            if cubes[end] != 0 {
                continue;
            }
            for &lit in &cubes[start..end] {
                solver.assume(lit);
            }
            start = end + 1;
            match solver.solve() {
                SATISFIABLE => println!("s SATISFIABLE"),
                UNSATISFIABLE => println!("s UNSATISFIABLE"),
                _ => println!("s UNKNOWN"),
            }
        }
        if verbosity > 0 {
            solver.statistics();
        }
        return Ok(0);
    }

    let status = solver.solve();
    if verbosity > 0 {
        solver.statistics();
        println!("c CPU time: {:.3} s", resource.cpu_time());
    }

    if status == SATISFIABLE {
        println!("s SATISFIABLE");
        print_model(&mut solver, max_var);
    } else if status == UNSATISFIABLE {
        println!("s UNSATISFIABLE");
    } else {
        println!("s UNKNOWN");
    }

    if let Err(msg) = solver.close_proof_trace() {
        eprintln!("ERROR! {}", msg);
        exit(1);
    }

    Ok(match status {
        SATISFIABLE => 10,
        UNSATISFIABLE => 20,
        _ => 0,
    })
}

fn print_model(solver: &mut Solver, max_var: i32) {
    let mut line = String::from("v");
    for var in 1..=max_var {
        let lit = solver.val(var);
        let text = format!(" {}", lit);
        if line.len() + text.len() > 77 {
            println!("{}", line);
            line = String::from("v");
        }
        line.push_str(&text);
    }
    line.push_str(" 0");
    println!("{}", line);
}

fn read_input_autogz<R: BufRead>(
    mut input: R,
    solver: &mut Solver,
    strict: i32,
    incremental: &mut bool,
    cubes: &mut Vec<i32>,
) -> Result<i32, String> {
    let is_gz = input
        .fill_buf()
        .map_err(|e| e.to_string())?
        .starts_with(b"\x1F\x8B");
    if is_gz {
        let mut reader = BufReader::new(GzDecoder::new(input));
        solver.read_dimacs_incremental(&mut reader, strict, incremental, cubes)
    } else {
        solver.read_dimacs_incremental(&mut input, strict, incremental, cubes)
    }
}
