use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use habit_vault::stats;
use habit_vault::{Frequency, SecureHabitStore};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run()
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "list".to_string());

    match command.as_str() {
        "--version" | "-V" => {
            println!("habits v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "list" => cmd_list(),
        "add" => cmd_add(args.collect()),
        "edit" => cmd_edit(args.collect()),
        "rm" => cmd_remove(args.next()),
        "toggle" => cmd_toggle(args.next()),
        "done" => cmd_weekly(args.next(), true),
        "undo" => cmd_weekly(args.next(), false),
        "move" => cmd_move(args.next(), args.next()),
        "stats" => cmd_stats(),
        "path" => cmd_path(),
        other => {
            print_usage();
            Err(anyhow!("unknown command: {other}"))
        }
    }
}

fn print_usage() {
    println!("habits - local encrypted habit tracker");
    println!();
    println!("Usage:");
    println!("  habits [list]                 show habits with today's state");
    println!("  habits add <title> [--weekly N]");
    println!("  habits edit <n> <title> [--weekly N]");
    println!("  habits rm <n>                 delete a habit");
    println!("  habits toggle <n>             flip today's completion");
    println!("  habits done <n>               add a weekly completion");
    println!("  habits undo <n>               drop this week's latest completion");
    println!("  habits move <n> <m>           reorder within daily or weekly list");
    println!("  habits stats                  14-day consistency grid");
    println!("  habits path                   print the encrypted store path");
}

fn open_store() -> Result<SecureHabitStore> {
    let mut store = SecureHabitStore::open_default()?;
    store.load();
    store.seed_if_empty()?;
    Ok(store)
}

fn cmd_list() -> Result<()> {
    let store = open_store()?;
    for (idx, habit) in store.habits().iter().enumerate() {
        match habit.frequency {
            Frequency::Daily => {
                let mark = if habit.is_completed_today() { "x" } else { " " };
                println!("{:>2}. [{mark}] {}", idx + 1, habit.title);
            }
            Frequency::Weekly { occurrences } => {
                println!(
                    "{:>2}. [{}/{occurrences}] {} (weekly)",
                    idx + 1,
                    habit.completions_this_week(),
                    habit.title
                );
            }
        }
    }
    Ok(())
}

/// Split trailing arguments into a title and an optional `--weekly N`
/// frequency. An empty title is rejected here; the model does not check.
fn parse_habit_args(rest: Vec<String>) -> Result<(String, Frequency)> {
    let mut title_words: Vec<String> = Vec::new();
    let mut frequency = Frequency::Daily;
    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--weekly" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow!("--weekly requires a count"))?;
                let occurrences: u32 = raw
                    .parse()
                    .map_err(|_| anyhow!("--weekly count must be a number"))?;
                frequency = Frequency::Weekly {
                    occurrences: occurrences.clamp(1, 7),
                };
            }
            _ => title_words.push(arg),
        }
    }
    let title = title_words.join(" ").trim().to_string();
    if title.is_empty() {
        return Err(anyhow!("habit title must not be empty"));
    }
    Ok((title, frequency))
}

fn cmd_add(rest: Vec<String>) -> Result<()> {
    let (title, frequency) = parse_habit_args(rest)?;
    let mut store = open_store()?;
    store.add_habit(&title, frequency)?;
    println!("added \"{title}\"");
    Ok(())
}

fn cmd_edit(rest: Vec<String>) -> Result<()> {
    let mut iter = rest.into_iter();
    let number = iter.next();
    let mut store = open_store()?;
    let id = habit_at(&store, number)?;
    let (title, frequency) = parse_habit_args(iter.collect())?;
    store.update_habit(id, &title, frequency)?;
    println!("updated \"{title}\"");
    Ok(())
}

fn cmd_remove(number: Option<String>) -> Result<()> {
    let mut store = open_store()?;
    let id = habit_at(&store, number)?;
    store.delete_habit(id)?;
    println!("deleted");
    Ok(())
}

fn cmd_toggle(number: Option<String>) -> Result<()> {
    let mut store = open_store()?;
    let id = habit_at(&store, number)?;
    store.toggle_completion(id)?;
    cmd_status_line(&store, id);
    Ok(())
}

fn cmd_weekly(number: Option<String>, add: bool) -> Result<()> {
    let mut store = open_store()?;
    let id = habit_at(&store, number)?;
    if add {
        store.add_weekly_completion(id)?;
    } else {
        store.remove_weekly_completion(id)?;
    }
    cmd_status_line(&store, id);
    Ok(())
}

fn cmd_status_line(store: &SecureHabitStore, id: Uuid) {
    if let Some(habit) = store.habit(id) {
        match habit.frequency {
            Frequency::Daily => {
                let state = if habit.is_completed_today() {
                    "done today"
                } else {
                    "not done today"
                };
                println!("{}: {state}", habit.title);
            }
            Frequency::Weekly { occurrences } => {
                println!(
                    "{}: {}/{occurrences} this week",
                    habit.title,
                    habit.completions_this_week()
                );
            }
        }
    }
}

fn cmd_move(from: Option<String>, to: Option<String>) -> Result<()> {
    let mut store = open_store()?;
    let dragged = habit_at(&store, from)?;
    let destination = habit_at(&store, to)?;

    // The drag stays inside the dragged habit's own frequency sub-list.
    let daily = matches!(
        store.habit(dragged).map(|h| h.frequency),
        Some(Frequency::Daily)
    );
    if daily {
        store.move_within_filter(
            |h| matches!(h.frequency, Frequency::Daily),
            dragged,
            destination,
        )?;
    } else {
        store.move_within_filter(
            |h| matches!(h.frequency, Frequency::Weekly { .. }),
            dragged,
            destination,
        )?;
    }
    cmd_list()
}

fn cmd_stats() -> Result<()> {
    let store = open_store()?;
    println!("Consistency, last {} days:", stats::HISTORY_DAYS);
    for habit in store.habits() {
        let row: String = stats::recent_history(habit)
            .into_iter()
            .map(|done| if done { '#' } else { '.' })
            .collect();
        println!("{row}  {}", habit.title);
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    let store = SecureHabitStore::open_default()?;
    println!("{}", store.encrypted_file_path().display());
    Ok(())
}

fn habit_at(store: &SecureHabitStore, number: Option<String>) -> Result<Uuid> {
    let raw = number.ok_or_else(|| anyhow!("missing habit number (see `habits list`)"))?;
    let number: usize = raw
        .parse()
        .map_err(|_| anyhow!("habit number must be an integer"))?;
    let idx = number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("habit numbers start at 1"))?;
    store
        .habits()
        .get(idx)
        .map(|h| h.id)
        .ok_or_else(|| anyhow!("no habit number {number}"))
}
