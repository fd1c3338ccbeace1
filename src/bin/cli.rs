use std::env;
use std::fs;
use std::process::ExitCode;

use weekly_report::{Config, Entry, WorkbookStore};

fn usage(program: &str) {
    eprintln!("Usage: {} <command>", program);
    eprintln!("Commands:");
    eprintln!("  list [query]    List entries, optionally filtered by name, division or week");
    eprintln!("  show <id>       Print every field of one entry");
    eprintln!("  export <dest>   Copy the workbook file to <dest>");
}

fn print_entry(entry: &Entry) {
    let optional_date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();

    println!("ID:                  {}", entry.id);
    println!("Name:                {}", entry.name);
    println!("Division:            {}", entry.division);
    println!("Activity:            {}", entry.activity);
    println!("Start Date:          {}", entry.start_date);
    println!("Date of Last Update: {}", optional_date(entry.last_update));
    println!("Work Done:           {}", entry.work_done);
    println!("Status:              {}", entry.status);
    println!("Recommendation:      {}", entry.recommendation);
    println!("Approval:            {}", entry.approval.as_deref().unwrap_or(""));
}

fn run(store: &WorkbookStore, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    match args.first().map(String::as_str) {
        Some("list") => {
            let query = args.get(1).map(String::as_str).unwrap_or("");
            let entries = store.search(query)?;
            for weekly in &entries {
                let entry = &weekly.entry;
                println!(
                    "{:>5}  {}  {:<44}  {:<24}  {}",
                    entry.id,
                    weekly.week,
                    entry.division.title(),
                    entry.name,
                    entry.activity.replace('\n', " ")
                );
            }
            println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
        }
        Some("show") => {
            let id: u32 = args
                .get(1)
                .ok_or("show needs an entry id")?
                .parse()
                .map_err(|_| "entry id must be a positive integer")?;
            print_entry(&store.get(id)?);
        }
        Some("export") => {
            let dest = args.get(1).ok_or("export needs a destination path")?;
            let bytes = store.export()?;
            fs::write(dest, &bytes)?;
            log::info!("exported {} bytes to {}", bytes.len(), dest);
        }
        _ => unreachable!("commands are checked in main"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("report-cli");
    if !matches!(args.get(1).map(String::as_str), Some("list" | "show" | "export")) {
        usage(program);
        return ExitCode::FAILURE;
    }

    let store = WorkbookStore::new(Config::from_env().workbook_path);
    match run(&store, &args[1..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
