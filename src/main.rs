//! A small command-line driver around the core.
//!
//! With no arguments, replays the three-relation join from the original
//! demo program (`incdb.cpp`): builds R(x,y), S(y,z), T(x,z), joins them
//! with a leapfrog triejoin, and prints every resulting tuple depth-first.
//!
//! With arguments (`r.csv s.csv t.csv updates.csv insert|delete`), loads
//! R/S/T from plain `x,y` CSV files, wraps them in an incremental `Count`,
//! replays `updates.csv` as `table,x,y` lines against the given operation,
//! and prints the final count and the time spent updating it.

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use log::info;

use incdb::db::{init_log, Database};
use incdb::harness::{load_relation, run_updates};
use incdb::query::{Count, Op, Query};
use incdb::relation::Relation;
use incdb::trie::TrieCursor;

fn demo() -> incdb::error::DbResult<()> {
    let pool = Database::global().pool();

    let mut r = Relation::create(pool.clone(), 0, 1)?;
    let mut s = Relation::create(pool.clone(), 1, 2)?;
    let mut t = Relation::create(pool, 0, 2)?;

    r.insert(7, 4)?;
    s.insert(4, 0)?;
    s.insert(4, 1)?;
    s.insert(4, 2)?;
    s.insert(4, 3)?;
    t.insert(7, 0)?;
    t.insert(7, 1)?;
    t.insert(7, 2)?;
    r.insert(8, 4)?;
    t.insert(8, 3)?;
    t.insert(8, 4)?;

    let cursors: Vec<Box<dyn TrieCursor>> =
        vec![Box::new(r.scan()?), Box::new(s.scan()?), Box::new(t.scan()?)];
    let mut join = incdb::leapfrog::LeapfrogTriejoin::new(3, cursors);
    print_tuples(&mut join, 3)?;
    println!();
    Ok(())
}

fn print_tuples(cur: &mut dyn TrieCursor, depth: usize) -> incdb::error::DbResult<()> {
    if depth == 0 {
        return Ok(());
    }
    cur.open()?;
    let mut first = true;
    while !cur.at_end() {
        if !first {
            print!(" ");
        }
        print!("{}", cur.key());
        if depth > 1 {
            print!("(");
            print_tuples(cur, depth - 1)?;
            print!(")");
        }
        cur.next()?;
        first = false;
    }
    cur.up()
}

fn parse_op(s: &str) -> Option<Op> {
    match s {
        "insert" => Some(Op::Insert),
        "delete" => Some(Op::Delete),
        _ => None,
    }
}

fn run_from_files(r_path: &str, s_path: &str, t_path: &str, updates_path: &str, op: Op) -> incdb::error::DbResult<()> {
    let pool = Database::global().pool();

    let mut r = Relation::create(pool.clone(), 0, 1)?;
    let mut s = Relation::create(pool.clone(), 1, 2)?;
    let mut t = Relation::create(pool, 0, 2)?;

    load_relation(&mut r, BufReader::new(File::open(r_path)?))?;
    load_relation(&mut s, BufReader::new(File::open(s_path)?))?;
    load_relation(&mut t, BufReader::new(File::open(t_path)?))?;

    let mut count = Count::create(vec![r, s, t], 3, false);
    count.recompute()?;
    info!("loaded relations, initial count: {}", count.count());

    let elapsed = run_updates(&mut count, op, BufReader::new(File::open(updates_path)?))?;

    println!("final count: {}", count.count());
    println!("update time: {:?}", elapsed);
    Ok(())
}

fn main() -> ExitCode {
    init_log();

    let args: Vec<String> = std::env::args().collect();
    let result = if args.len() == 1 {
        demo()
    } else if args.len() == 6 {
        match parse_op(&args[5]) {
            Some(op) => run_from_files(&args[1], &args[2], &args[3], &args[4], op),
            None => {
                eprintln!("unrecognised operation {:?}, expected insert or delete", args[5]);
                return ExitCode::FAILURE;
            }
        }
    } else {
        eprintln!("usage: small-db [r.csv s.csv t.csv updates.csv insert|delete]");
        return ExitCode::FAILURE;
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n\nsmall-db terminated due to an error: {}", e);
            ExitCode::FAILURE
        }
    }
}
