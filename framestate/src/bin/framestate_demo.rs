//! Framestate demo
//!
//! Usage:
//!   framestate-demo [--conflict] [--config gc.json]
//!
//! Walks an address through a few frames and prints what each frame sees.
//! Set RUST_LOG=debug to follow the frame lifecycle.

use clap::Parser;
use std::path::PathBuf;

use framestate::{FrameConfig, FrameError, FrameManager, Model, Result};

#[derive(Parser, Debug)]
#[command(name = "framestate-demo")]
#[command(about = "Snapshot isolation walkthrough for framed objects")]
#[command(version)]
struct Args {
    /// Also race two frames writing the same object
    #[arg(long)]
    conflict: bool,

    /// JSON file with frame manager settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct Address {
    street: String,
    city: String,
}

fn street(address: &Model<Address>) -> Result<String> {
    address.read(|a| a.street.clone())
}

fn set_street(address: &Model<Address>, street: &str) -> Result<()> {
    address.write(|a| a.street = street.to_string())
}

fn isolation(manager: &FrameManager) -> Result<Model<Address>> {
    let address = manager.framed(|| {
        Model::new_in(
            manager,
            Address {
                street: "123 Any Street".to_string(),
                city: "AnyTown".to_string(),
            },
        )
    })?;
    println!(
        "F1 created {} at {}",
        address.id(),
        address.read(|a| format!("{}, {}", a.street, a.city))?
    );

    manager.open()?;
    println!("F2 reads  {}", street(&address)?);
    set_street(&address, "456 New Street")?;
    println!("F2 wrote  {}", street(&address)?);
    let f2 = manager.suspend()?;

    let before = manager.framed(|| street(&address))?;
    println!("F3 reads  {} (F2 still open)", before);

    manager.commit_frame(&f2)?;
    let after = manager.framed(|| street(&address))?;
    println!("F4 reads  {} (F2 committed)", after);

    Ok(address)
}

fn conflict(manager: &FrameManager, address: &Model<Address>) -> Result<()> {
    manager.open()?;
    set_street(address, "From frame A")?;
    let a = manager.suspend()?;

    manager.open()?;
    set_street(address, "From frame B")?;
    let b = manager.suspend()?;

    manager.commit_frame(&b)?;
    println!("Frame {} committed first", b.id());

    match manager.commit_frame(&a) {
        Err(FrameError::FrameConflict { frame, objects }) => {
            let objects: Vec<String> = objects.iter().map(|o| o.to_string()).collect();
            println!("Frame {} rejected: conflicting writes to {}", frame, objects.join(", "));
        }
        Err(e) => return Err(e),
        Ok(()) => println!("Frame {} committed", a.id()),
    }

    let winner = manager.framed(|| street(address))?;
    println!("Winner    {}", winner);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => FrameConfig::from_file(path)?,
        None => FrameConfig::default(),
    };
    let manager = FrameManager::with_config(config);

    let address = isolation(&manager)?;
    if args.conflict {
        conflict(&manager, &address)?;
    }

    if let Some(stats) = manager.collect_garbage() {
        println!(
            "GC removed {} record(s); {} left in {} object(s)",
            stats.records_removed,
            manager.total_records(),
            manager.live_object_count()
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
