use coremgr::{CoreManager, NodeSelector, SysfsTopology, TopologyView};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    coremgr::init_logging();

    let topology = SysfsTopology::detect();
    topology.log_topology();

    let manager = CoreManager::dry_run();
    manager.configure_topology(&topology)?;

    for &node in topology.numa_cores().keys() {
        let name = format!("node{node}-worker");
        match manager.allocate_on_node(&name, NodeSelector::Node(node)) {
            Ok(()) => println!("{name}: {:?}", manager.allocation(&name).unwrap_or_default()),
            Err(e) => println!("{name}: {e}"),
        }
    }
    manager.allocate_on_node("anywhere", NodeSelector::Any)?;

    manager.dump();
    Ok(())
}
