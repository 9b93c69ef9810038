use coremgr::{CoreManager, ManagerConfig};
use std::thread;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    coremgr::init_logging();

    // Optional TOML file; defaults to four cores without touching the scheduler.
    let config = match std::env::args().nth(1) {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default().with_corelist("0-3").with_dry_run(true),
    };
    let manager = CoreManager::from_config(&config)?;

    let consumers = ["data-reader", "trigger", "writer"];
    for name in consumers {
        manager.allocate(name, 1)?;
    }
    manager.dump();

    thread::scope(|s| {
        let workers: Vec<_> = consumers
            .into_iter()
            .map(|name| {
                let manager = &manager;
                s.spawn(move || -> coremgr::Result<()> {
                    manager.set_affinity(name)?;
                    println!("{name} running on [{}]", manager.affinity_string()?);
                    manager.release(name)
                })
            })
            .collect();
        workers
            .into_iter()
            .try_for_each(|w| w.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
    })?;

    println!("coordinator on [{}]", manager.affinity_string()?);
    manager.dump();
    Ok(())
}
