use ride_dispatch::sim;

fn parse_usize_list(arg: &str) -> Option<Vec<usize>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<usize>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn print_usage(program: &str) {
    println!("Ride Dispatch CLI");
    println!("Usage:");
    println!("  {program} (run demo)");
    println!("  {program} bench [passengers] [drivers] [regions] [cap] [delay_ms] [validate]");
    println!("  {program} stress [passenger_sets] [driver_sets] [cap_sets] [delay_ms] [validate]");
    println!("  {program} --help");
    println!();
    println!("Sets are comma-separated lists (e.g., 20,50,100). Use \"-\" to keep a set's default.");
    println!("Omit delay_ms to keep its default.");
    println!("Defaults:");
    println!("  bench  passengers=50 drivers=4 regions=2 cap=4 delay_ms=5");
    println!("  stress passengers=20,50,100 drivers=1,2,4,8 caps=1,2,4 delay_ms=5");
    println!("Flags:");
    println!("  validate  report driver-exclusivity and lost-booking violations");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn main() {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "ride_dispatch".to_string());
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("bench") => {
            let passengers = args.next().and_then(|v| v.parse::<usize>().ok());
            let drivers = args.next().and_then(|v| v.parse::<usize>().ok());
            let regions = args.next().and_then(|v| v.parse::<usize>().ok());
            let cap = args.next().and_then(|v| v.parse::<usize>().ok());
            let delay_ms = args.next().and_then(|v| v.parse::<u64>().ok());
            let validate = args.any(|arg| arg == "validate");
            sim::run_benchmark(passengers, drivers, regions, cap, delay_ms, validate);
        }
        Some("stress") => {
            let mut passenger_sets: Option<Vec<usize>> = None;
            let mut driver_sets: Option<Vec<usize>> = None;
            let mut cap_sets: Option<Vec<usize>> = None;
            let mut delay_ms: Option<u64> = None;
            let mut passenger_sets_skipped = false;
            let mut driver_sets_skipped = false;
            let mut cap_sets_skipped = false;
            let mut validate = false;

            for arg in args {
                if arg == "validate" {
                    validate = true;
                    continue;
                }

                if passenger_sets.is_none() && !passenger_sets_skipped {
                    if arg == "-" {
                        passenger_sets_skipped = true;
                    } else if let Some(values) = parse_usize_list(&arg) {
                        passenger_sets = Some(values);
                    } else {
                        exit_with_usage(
                            &program,
                            &format!("stress: invalid passenger_sets value: {arg}"),
                        );
                    }
                    continue;
                }
                if driver_sets.is_none() && !driver_sets_skipped {
                    if arg == "-" {
                        driver_sets_skipped = true;
                    } else if let Some(values) = parse_usize_list(&arg) {
                        driver_sets = Some(values);
                    } else {
                        exit_with_usage(
                            &program,
                            &format!("stress: invalid driver_sets value: {arg}"),
                        );
                    }
                    continue;
                }
                if cap_sets.is_none() && !cap_sets_skipped {
                    if arg == "-" {
                        cap_sets_skipped = true;
                    } else if let Some(values) = parse_usize_list(&arg) {
                        cap_sets = Some(values);
                    } else {
                        exit_with_usage(
                            &program,
                            &format!("stress: invalid cap_sets value: {arg}"),
                        );
                    }
                    continue;
                }
                if delay_ms.is_none() {
                    if let Ok(value) = arg.parse::<u64>() {
                        delay_ms = Some(value);
                    } else {
                        exit_with_usage(&program, &format!("stress: invalid delay_ms value: {arg}"));
                    }
                    continue;
                }

                exit_with_usage(&program, &format!("stress: unexpected argument: {arg}"));
            }

            sim::run_stress(passenger_sets, driver_sets, cap_sets, delay_ms, validate);
        }
        Some("--help") | Some("-h") | Some("help") => print_usage(&program),
        Some(other) => {
            exit_with_usage(&program, &format!("unknown command: {other}"));
        }
        None => sim::run_demo(),
    }
}
