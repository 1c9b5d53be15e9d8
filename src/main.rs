use calq::CalendarQueue;
use clap::{Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Build a queue from random priorities, drain it, verify the order
    Soak,
    /// Measure the mean hold time (unlink + reinsert) at each queue size
    Hold,
}

#[derive(Parser)]
#[command(name = "calq")]
#[command(about = "Calendar queue exerciser", long_about = None)]
struct Args {
    /// Exercise mode
    #[arg(value_enum)]
    mode: Mode,

    /// Number of items in the queue
    #[arg(short = 'n', long, default_value = "4000")]
    items: usize,

    /// Number of build/drain cycles (soak mode)
    #[arg(short = 'r', long, default_value = "1")]
    repeats: usize,

    /// Number of hold cycles per queue size (hold mode)
    #[arg(short = 'c', long, default_value = "100")]
    cycles: usize,

    /// RNG seed for priority generation
    #[arg(short, long, default_value = "271828")]
    seed: u64,

    /// Priorities are drawn uniformly from [0, this bound)
    #[arg(short = 'p', long, default_value = "1000.0")]
    max_priority: f64,
}

fn new_queue() -> CalendarQueue<()> {
    match CalendarQueue::new() {
        Ok(queue) => queue,
        Err(e) => {
            eprintln!("Error creating queue: {}", e);
            std::process::exit(1);
        }
    }
}

fn insert_or_die(queue: &mut CalendarQueue<()>, priority: f64) {
    if let Err(e) = queue.insert_entry(priority, ()) {
        eprintln!("Error inserting priority {}: {}", priority, e);
        std::process::exit(1);
    }
}

/// Builds a queue from random priorities, drains it completely and verifies
/// that the drained priorities are non-increasing and none went missing.
fn soak(args: &Args) {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut total_ms = 0u128;

    for repeat in 1..=args.repeats {
        let priorities: Vec<f64> = (0..args.items)
            .map(|_| rng.gen_range(0.0..args.max_priority))
            .collect();

        let mut queue = new_queue();
        let start = Instant::now();
        for &priority in &priorities {
            insert_or_die(&mut queue, priority);
        }

        let mut drained = 0usize;
        let mut last = f64::INFINITY;
        while let Some(id) = queue.unlink_max() {
            let priority = queue.priority(id);
            if priority > last {
                eprintln!(
                    "Error: priority {} drained after smaller {}",
                    priority, last
                );
                std::process::exit(1);
            }
            last = priority;
            drained += 1;
            queue.free_item(id);
        }
        let elapsed_ms = start.elapsed().as_millis();
        total_ms += elapsed_ms;

        let ok = drained == priorities.len();
        println!(
            "repeat: {:<3}  items: {:<8}  drained: {:<8}  ok: {}  elapsed: {} ms",
            repeat,
            priorities.len(),
            drained,
            if ok { 'Y' } else { 'N' },
            elapsed_ms
        );
        if !ok {
            std::process::exit(1);
        }
    }

    if args.repeats > 1 {
        println!("---");
        println!(
            "repeats: {:<3} items: {:<8}  elapsed: {} ms",
            args.repeats,
            args.items * args.repeats,
            total_ms
        );
    }
}

/// Grows a queue one item at a time and, at each size, measures the mean
/// time of an unlink-then-reinsert cycle, then times a final full drain.
fn hold(args: &Args) {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut queue = new_queue();

    for size in 1..=args.items {
        insert_or_die(&mut queue, rng.gen_range(0.0..args.max_priority));

        let start = Instant::now();
        for _ in 0..args.cycles {
            let Some(id) = queue.unlink_max() else { break };
            queue.free_item(id);
            insert_or_die(&mut queue, rng.gen_range(0.0..args.max_priority));
        }
        let hold_us = start.elapsed().as_secs_f64() * 1e6 / args.cycles as f64;
        println!("size: {:<8}  hold: {:.3} us", size, hold_us);
    }

    let start = Instant::now();
    let mut drained = 0usize;
    while let Some(id) = queue.unlink_max() {
        queue.free_item(id);
        drained += 1;
    }
    println!(
        "drained: {:<5}  elapsed: {} us",
        drained,
        start.elapsed().as_micros()
    );
}

fn main() {
    let args = Args::parse();

    if args.items == 0 {
        eprintln!("Error: items must be at least 1");
        std::process::exit(1);
    }

    if args.cycles == 0 {
        eprintln!("Error: cycles must be at least 1");
        std::process::exit(1);
    }

    if !args.max_priority.is_finite() || args.max_priority <= 0.0 {
        eprintln!("Error: max priority must be positive and finite");
        std::process::exit(1);
    }

    match args.mode {
        Mode::Soak => soak(&args),
        Mode::Hold => hold(&args),
    }
}
