mod tda_controllers;
mod tda_gui;
mod tda_models;
mod tda_views;

fn main() {
    // Diagnostics go to the log; user-visible state lives in the GUI
    env_logger::init();

    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe application encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Troubleshooting:");
        eprintln!("  • Please restart the application");
        eprintln!("  • Check your internet connection");
        eprintln!("  • Report this issue if it persists");
        eprintln!("\n{}", "═".repeat(70));
    }));

    // Run the application
    if let Err(e) = tda_gui::run_gui() {
        eprintln!("\n⚠️  Failed to start the GUI: {}", e);
        std::process::exit(1);
    }
}
