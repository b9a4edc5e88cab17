//! Version command implementation.

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("polsat {VERSION}");
    println!();
    println!("Conflict detection and resolution for ABAC policies.");
    println!();
    println!("Build info:");
    println!("  Solver:       interval (exact, single-variable constraints)");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
}
