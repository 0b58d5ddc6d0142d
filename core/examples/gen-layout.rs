//! Prints the platform layout a host would deal for a given seed.
//!
//! Usage:
//!   cargo run -p dropduel-core --example gen-layout -- [seed] [count] > layouts.json

use dropduel_core::*;

fn main() {
    let mut args = std::env::args().skip(1);
    let seed = match args.next().map(|s| s.parse::<u32>()) {
        None => DEFAULT_SEED,
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            eprintln!("Invalid seed: {}", e);
            std::process::exit(1);
        }
    };
    let count = args.next().and_then(|s| s.parse::<usize>().ok()).unwrap_or(1);

    let config = GameConfig { seed, ..GameConfig::default() };

    // Same stream the host draws layout seeds from
    let mut state = config.seed;
    let mut layouts = Vec::with_capacity(count);
    for i in 0..count {
        let (layout_seed, next) = prng_seed(state);
        state = next;
        let platforms = layout_from_seed(&config, layout_seed);
        eprintln!(
            "layout {}: seed={} widths={:?}",
            i,
            layout_seed,
            platforms.iter().map(|p| p.width.round()).collect::<Vec<_>>()
        );
        layouts.push(Message::SetExactPlatforms {
            seed: layout_seed,
            timestamp: 0,
            platforms,
        });
    }

    match serde_json::to_string_pretty(&layouts) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode layouts: {}", e);
            std::process::exit(1);
        }
    }
}
