use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use memlat::clock;
use memlat::error::ConfigError;
use memlat::flush::FlushMode;
use memlat::handshake::SignalMode;
use memlat::ops::{self, Operation};
use memlat::protocols::{CHANNELS_PER_PAGE, Harness};
use memlat::stats::{SampleSink, Statistic};

const COLUMNS: &str = "  Samples,       Min,      Mean,       Max,        SD";

#[derive(Copy, Clone, PartialEq, Eq)]
enum OpKind {
    Load,
    Store,
    AtomicInc,
}

impl OpKind {
    fn parse(letter: char) -> Option<Self> {
        match letter {
            'r' => Some(OpKind::Load),
            'w' => Some(OpKind::Store),
            'a' => Some(OpKind::AtomicInc),
            _ => None,
        }
    }

    fn operation(self) -> Operation {
        match self {
            OpKind::Load => ops::do_loads,
            OpKind::Store => ops::do_stores,
            OpKind::AtomicInc => ops::do_atomic_incs,
        }
    }

    fn label(self) -> &'static str {
        match self {
            OpKind::Load => "Load",
            OpKind::Store => "Store",
            OpKind::AtomicInc => "Atomic Inc",
        }
    }
}

enum Experiment {
    LinePlacement,
    Memory,
    Placement {
        op: OpKind,
        modified: bool,
        allocate_in_zero: bool,
    },
    Sharing {
        op: OpKind,
        modified: bool,
    },
    RoundTrip {
        mode: SignalMode,
    },
    Visibility,
}

fn parse_line_state(letter: char) -> Option<bool> {
    match letter {
        'm' => Some(true),
        'u' => Some(false),
        _ => None,
    }
}

fn parse_experiment(selector: &str) -> Result<Experiment, ConfigError> {
    let unknown = || ConfigError::UnknownSelector(selector.to_string());
    let mut letters = selector.chars();
    match letters.next().ok_or_else(unknown)? {
        'L' => Ok(Experiment::LinePlacement),
        'M' => Ok(Experiment::Memory),
        'P' => {
            let op = letters.next().and_then(OpKind::parse).ok_or_else(unknown)?;
            let modified = letters
                .next()
                .and_then(parse_line_state)
                .ok_or_else(unknown)?;
            let allocate_in_zero = letters.next() == Some('0');
            Ok(Experiment::Placement {
                op,
                modified,
                allocate_in_zero,
            })
        }
        'S' => {
            let op = letters.next().and_then(OpKind::parse).ok_or_else(unknown)?;
            let modified = letters
                .next()
                .and_then(parse_line_state)
                .ok_or_else(unknown)?;
            Ok(Experiment::Sharing { op, modified })
        }
        'R' => {
            let mode = match letters.next() {
                Some('a') => SignalMode::AtomicInc,
                Some('w') | None => SignalMode::Store,
                Some(_) => return Err(unknown()),
            };
            Ok(Experiment::RoundTrip { mode })
        }
        'V' => Ok(Experiment::Visibility),
        _ => Err(unknown()),
    }
}

fn print_help() {
    eprint!(
        "\
The first argument selects the experiment; it may have up to four letters.
The first letter picks the experiment, the others the operation and line state.
L             -- Line latency: half round trip time depending on the cache line used
M             -- Memory: read/write latencies, local and remote
R[aw] [n]     -- Round trip: half the round trip time using an atomic or a plain
                 write, measured from thread n (zero if unspecified).
                 If n < 0, run from every thread.
P[rwa][mu][0] [n] -- Placement: the operation is read/write/atomic per the second
                 letter, the line state [modified/unmodified] per the third.
                 A fourth letter '0' measures the shared array owned by thread 0
                 (default is an array allocated by the measuring thread).
                 If n is present measurements are made from there; n < 0 runs all.
S[rwa][mu] [n] -- Sharing: the operation is read/write/atomic per the second
                 letter, the line state [modified/unmodified] per the third.
                 If n is present measurements are made from there; n < 0 runs all.
V [n]         -- Visibility: time until the last of n polling threads sees a write.
                 If n is present measurements are made from there; n < 0 runs all.

Memory looks at the time to read/write a line that is not in the cache.
Placement looks at the operation when the line sits in one other cache,
moved over every other logical CPU.
Sharing puts the line into n other caches before the operation.
"
    );
}

fn team_size() -> Result<usize, Box<dyn Error>> {
    match env::var("MEMLAT_THREADS") {
        Ok(text) => Ok(text.parse()?),
        Err(_) => Ok(std::thread::available_parallelism()?.get()),
    }
}

fn target_name() -> String {
    if let Ok(name) = env::var("TARGET_MACHINE") {
        return name;
    }
    cpu_model_name().unwrap_or_else(|| env::consts::ARCH.to_string())
}

#[cfg(target_os = "linux")]
fn cpu_model_name() -> Option<String> {
    let info = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    for line in info.lines() {
        if let Some(rest) = line.strip_prefix("model name") {
            return Some(rest.trim_start_matches([' ', '\t', ':']).to_string());
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn cpu_model_name() -> Option<String> {
    None
}

/// Civil date from a day count relative to 1970-01-01 (Howard Hinnant's
/// algorithm).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn date_time() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let (year, month, day) = civil_from_days((seconds / 86_400) as i64);
    let tod = seconds % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60
    )
}

fn engineering(seconds: f64) -> String {
    let magnitude = seconds.abs();
    let (scale, unit) = if magnitude >= 1.0 || magnitude == 0.0 {
        (1.0, " s")
    } else if magnitude >= 1e-3 {
        (1e3, "ms")
    } else if magnitude >= 1e-6 {
        (1e6, "us")
    } else if magnitude >= 1e-9 {
        (1e9, "ns")
    } else {
        (1e12, "ps")
    };
    format!("{:9.2} {unit}", seconds * scale)
}

fn format_stat(stat: &Statistic) -> String {
    format!(
        "{:8}, {}, {}, {}, {}",
        stat.count(),
        engineering(stat.min()),
        engineering(stat.mean()),
        engineering(stat.max()),
        engineering(stat.std_dev())
    )
}

/// Run a per-thread experiment from one source, or from every source in
/// turn when `from` is negative (at a quarter of the sample count, since
/// the sweep multiplies the runtime by the team size).
fn run_source_sweep<F>(
    harness: &mut Harness,
    from: i64,
    mut measure: F,
    header: &dyn Fn(usize) -> String,
    skip: &dyn Fn(usize, usize) -> bool,
) -> Result<(), ConfigError>
where
    F: FnMut(&Harness, &mut [Statistic], usize) -> Result<(), ConfigError>,
{
    let members = harness.members();
    let sources: Vec<usize> = if from < 0 {
        harness.set_samples(harness.samples() / 4);
        (0..members).collect()
    } else {
        vec![from as usize]
    };

    let tick = clock::tick_interval();
    let mut stats = vec![Statistic::new(); members];
    let mut first = true;
    for source in sources {
        measure(harness, &mut stats, source)?;
        if !first {
            println!("### NEW EXPERIMENT ###");
        }
        first = false;
        print!("{}", header(source));
        for index in 0..members {
            if skip(index, source) {
                continue;
            }
            stats[index].scale(tick);
            println!("{index}, {}", format_stat(&stats[index]));
            stats[index].reset();
        }
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let Some(selector) = args.next() else {
        print_help();
        return Err("need an experiment selector".into());
    };
    if selector == "-h" || selector == "--help" {
        print_help();
        return Ok(());
    }
    let from: i64 = match args.next() {
        Some(text) => text.parse()?,
        None => 0,
    };

    let experiment = parse_experiment(&selector).inspect_err(|_| print_help())?;
    let members = team_size()?;
    let mut harness = Harness::new(members, FlushMode::from_environment())?;
    let target = target_name();

    match experiment {
        Experiment::LinePlacement => {
            // Arbitrary choice of the pinged core.
            let other = members - 1;
            let mut stats = vec![Statistic::new(); CHANNELS_PER_PAGE];
            // One warm-up run whose data is discarded, then five printed
            // runs so consistency is visible.
            harness.measure_line_placement(&mut stats, other)?;
            let tick = clock::tick_interval();
            for run in 0..5 {
                harness.measure_line_placement(&mut stats, other)?;
                if run != 0 {
                    println!("### NEW EXPERIMENT ###");
                }
                println!(
                    "Line Placement (half round trip)\n\
                     {target},run {}\n\
                     # {}\n\
                     # Pinging core {other}\n\
                     Line Index,{COLUMNS}",
                    run + 1,
                    date_time()
                );
                for (index, stat) in stats.iter_mut().enumerate() {
                    stat.scale(tick);
                    println!("{index:6}, {}", format_stat(stat));
                }
            }
        }

        Experiment::Memory => {
            let mut stats = [Statistic::new(); 4];
            harness.measure_memory(&mut stats[0], ops::do_loads);
            harness.measure_memory(&mut stats[1], ops::do_stores);
            let remote = members - 1;
            harness.measure_memory_on(&mut stats[2], ops::do_loads, remote)?;
            harness.measure_memory_on(&mut stats[3], ops::do_stores, remote)?;
            let tick = clock::tick_interval();
            for stat in stats.iter_mut() {
                stat.scale(tick);
            }
            println!(
                "Memory Latency\n{target}\n# {}\nOperation,{COLUMNS}",
                date_time()
            );
            println!("Load,  {}", format_stat(&stats[0]));
            println!("Store, {}", format_stat(&stats[1]));
            println!("Remote Load, {}", format_stat(&stats[2]));
            println!("Remote Store, {}", format_stat(&stats[3]));
        }

        Experiment::Placement {
            op,
            modified,
            allocate_in_zero,
        } => {
            let target = &target;
            run_source_sweep(
                &mut harness,
                from,
                |harness, stats, source| {
                    harness.measure_placement_from(
                        stats,
                        op.operation(),
                        modified,
                        source,
                        allocate_in_zero,
                    )
                },
                &|source| {
                    format!(
                        "Placement\n\
                         {target}, {}, {}, {}, Active {source}\n\
                         # {}\n\
                         Placement,{COLUMNS}\n",
                        op.label(),
                        if modified { "modified" } else { "unmodified" },
                        if allocate_in_zero {
                            "allocate(0)"
                        } else {
                            "allocate(n)"
                        },
                        date_time()
                    )
                },
                &|index, source| index == source,
            )?;
        }

        Experiment::Sharing { op, modified } => {
            let target = &target;
            run_source_sweep(
                &mut harness,
                from,
                |harness, stats, source| {
                    harness.measure_sharing_from(stats, op.operation(), modified, source)
                },
                &|source| {
                    format!(
                        "Sharing\n\
                         {target}, {}, {}, Active {source}\n\
                         # {}\n\
                         Sharing,{COLUMNS}\n",
                        op.label(),
                        if modified { "modified" } else { "unmodified" },
                        date_time()
                    )
                },
                &|index, _| index == 0,
            )?;
        }

        Experiment::RoundTrip { mode } => {
            let target = &target;
            let signal = match mode {
                SignalMode::Store => "Write",
                SignalMode::AtomicInc => "Atomic",
            };
            run_source_sweep(
                &mut harness,
                from,
                |harness, stats, source| harness.measure_roundtrip_from(stats, source, mode),
                &|source| {
                    format!(
                        "Half Round Trip\n\
                         From {source}, {target}, {signal}\n\
                         # {}\n\
                         Position,{COLUMNS}\n",
                        date_time()
                    )
                },
                &|index, source| index == source,
            )?;
        }

        Experiment::Visibility => {
            let target = &target;
            run_source_sweep(
                &mut harness,
                from,
                |harness, stats, source| harness.measure_visibility_from(stats, source),
                &|source| {
                    format!(
                        "Visibility\n\
                         From {source}, {target}\n\
                         # {}\n\
                         Pollers,{COLUMNS}\n",
                        date_time()
                    )
                },
                &|index, _| index == 0,
            )?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Experiment, OpKind, civil_from_days, engineering, parse_experiment};
    use memlat::handshake::SignalMode;

    #[test]
    fn test_selector_parsing() {
        assert!(matches!(
            parse_experiment("L"),
            Ok(Experiment::LinePlacement)
        ));
        assert!(matches!(parse_experiment("M"), Ok(Experiment::Memory)));
        assert!(matches!(parse_experiment("V"), Ok(Experiment::Visibility)));
        assert!(matches!(
            parse_experiment("Pam0"),
            Ok(Experiment::Placement {
                op: OpKind::AtomicInc,
                modified: true,
                allocate_in_zero: true,
            })
        ));
        assert!(matches!(
            parse_experiment("Sru"),
            Ok(Experiment::Sharing {
                op: OpKind::Load,
                modified: false,
            })
        ));
        assert!(matches!(
            parse_experiment("Ra"),
            Ok(Experiment::RoundTrip {
                mode: SignalMode::AtomicInc,
            })
        ));
        assert!(matches!(
            parse_experiment("R"),
            Ok(Experiment::RoundTrip {
                mode: SignalMode::Store,
            })
        ));
    }

    #[test]
    fn test_selector_rejections() {
        for selector in ["", "X", "Pq", "Prx", "Sw", "Rz"] {
            assert!(parse_experiment(selector).is_err(), "{selector:?}");
        }
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn test_engineering_units() {
        assert_eq!(engineering(1.5).trim(), "1.50  s");
        assert_eq!(engineering(2.5e-3).trim(), "2.50 ms");
        assert_eq!(engineering(42.0e-9).trim(), "42.00 ns");
    }
}
