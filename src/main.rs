use std::{env, process};

use heapscope::runtime::{
    gc::{Handle, Isolate, IsolateConfig, ReclaimPolicy},
    leak_detector,
    value::{HeapNumber, HeapString},
};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let trace = take_flag(&mut args, "--trace");
    let eager = take_flag(&mut args, "--eager");
    let gc_telemetry = take_flag(&mut args, "--gc-telemetry");
    let leak_detector = take_flag(&mut args, "--leak-detector");
    let config_path = match extract_config_path(&mut args) {
        Some(value) => value,
        None => process::exit(1),
    };

    init_tracing(trace);

    let mut config = match config_path {
        Some(path) => match IsolateConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        },
        None => IsolateConfig::default(),
    };
    if eager {
        config = config.with_reclaim(ReclaimPolicy::Eager);
    }
    if gc_telemetry {
        config = config.with_telemetry(true);
    }

    if args.len() < 2 {
        print_help();
        return;
    }

    let ok = match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
            true
        }
        "scenario" => {
            if args.len() < 3 {
                eprintln!("Usage: heapscope scenario <a|b|c|all>");
                false
            } else {
                run_scenarios(&config, &args[2])
            }
        }
        "stress" => {
            if args.len() < 3 {
                eprintln!("Usage: heapscope stress <n>");
                false
            } else {
                match args[2].parse::<usize>() {
                    Ok(count) => {
                        run_stress(&config, count);
                        true
                    }
                    Err(_) => {
                        eprintln!("Error: stress expects a non-negative integer.");
                        false
                    }
                }
            }
        }
        other => {
            eprintln!("Error: unknown command `{other}`");
            print_help();
            false
        }
    };

    if leak_detector {
        let stats = leak_detector::snapshot();
        println!(
            "[leak] objects allocated={} reclaimed={} live={}",
            stats.objects_allocated,
            stats.objects_reclaimed,
            stats.live_objects()
        );
        println!(
            "[leak] handles registered={} released={} live={}",
            stats.handles_registered,
            stats.handles_released,
            stats.live_handles()
        );
    }

    if !ok {
        process::exit(1);
    }
}

fn print_help() {
    println!(
        "\
heapscope

Usage:
  heapscope scenario <a|b|c|all>
  heapscope stress <n>

Flags:
  --trace            Emit trace-level isolate events on stderr
  --eager            Reclaim objects as soon as their last handle is released
  --gc-telemetry     Print allocation and collection telemetry after each run
  --leak-detector    Print process-wide object and handle counters
  --config <path>    Load isolate settings from a JSON file"
    );
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("heapscope=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let present = args.iter().any(|arg| arg == flag);
    if present {
        args.retain(|arg| arg != flag);
    }
    present
}

fn extract_config_path(args: &mut Vec<String>) -> Option<Option<String>> {
    let mut path = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            if i + 1 >= args.len() {
                eprintln!("Usage: heapscope <command> --config <path>");
                return None;
            }
            path = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(path)
}

fn count_label(count: Option<usize>) -> String {
    count.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn print_telemetry(isolate: &Isolate) {
    if let Some(report) = isolate.telemetry_report() {
        println!("{report}");
    }
}

fn run_scenarios(config: &IsolateConfig, which: &str) -> bool {
    match which {
        "a" => scenario_a(config),
        "b" => scenario_b(config),
        "c" => scenario_c(config),
        "all" => {
            scenario_a(config);
            scenario_b(config);
            scenario_c(config);
        }
        other => {
            eprintln!("Error: unknown scenario `{other}` (expected a, b, c or all)");
            return false;
        }
    }
    true
}

/// One object, two aliasing handles, both dropped, then swept.
fn scenario_a(config: &IsolateConfig) {
    let isolate = Isolate::with_config(config.clone());
    let id;
    {
        let h1 = HeapString::new(&isolate, "string");
        id = h1.object_id();
        println!(
            "[a] alloc: tracked={} handles={}",
            isolate.size(),
            h1.handle_count()
        );
        let h2 = Handle::from_handle(&isolate, &h1);
        println!(
            "[a] copy: tracked={} handles={}",
            isolate.size(),
            h2.handle_count()
        );
    }
    let remaining = id.and_then(|id| isolate.handle_count(id));
    println!(
        "[a] scope end: tracked={} handles={}",
        isolate.size(),
        count_label(remaining)
    );
    let reclaimed = isolate.collect();
    println!(
        "[a] collect: reclaimed={} tracked={}",
        reclaimed,
        isolate.size()
    );
    print_telemetry(&isolate);
}

/// Two independent objects, only the first handle cleared.
fn scenario_b(config: &IsolateConfig) {
    let isolate = Isolate::with_config(config.clone());
    let mut first = HeapString::new(&isolate, "first");
    let second = HeapString::new(&isolate, "second");
    println!("[b] alloc: tracked={}", isolate.size());

    first.clear();
    println!("[b] clear first: tracked={}", isolate.size());

    let reclaimed = isolate.collect();
    println!(
        "[b] collect: reclaimed={} tracked={} survivor={}",
        reclaimed,
        isolate.size(),
        *second
    );
    print_telemetry(&isolate);
}

/// One object with two handles; clearing one must not free it.
fn scenario_c(config: &IsolateConfig) {
    let isolate = Isolate::with_config(config.clone());
    let mut h1 = HeapNumber::new(&isolate, 42.0);
    let h2 = h1.clone();
    println!(
        "[c] alloc+copy: tracked={} handles={}",
        isolate.size(),
        h2.handle_count()
    );

    h1.clear();
    println!("[c] clear first: handles={}", h2.handle_count());

    let reclaimed = isolate.collect();
    println!(
        "[c] collect: reclaimed={} tracked={} handles={} value={}",
        reclaimed,
        isolate.size(),
        h2.handle_count(),
        *h2
    );
    print_telemetry(&isolate);
}

fn run_stress(config: &IsolateConfig, count: usize) {
    let isolate = Isolate::with_config(config.clone());
    let mut kept = Vec::with_capacity(count / 2 + 1);
    let mut collections = 0;

    for i in 0..count {
        let handle = HeapString::new(&isolate, &format!("s{i}"));
        if i % 2 == 0 {
            kept.push(handle.clone());
        }
        if isolate.should_collect() {
            isolate.collect();
            collections += 1;
        }
    }
    println!(
        "[stress] allocated={} tracked={} threshold_collections={}",
        count,
        isolate.size(),
        collections
    );

    let reclaimed = isolate.collect();
    println!(
        "[stress] collect: reclaimed={} tracked={}",
        reclaimed,
        isolate.size()
    );

    drop(kept);
    let reclaimed = isolate.collect();
    println!(
        "[stress] release all: reclaimed={} tracked={}",
        reclaimed,
        isolate.size()
    );
    print_telemetry(&isolate);
}
