use log::error;
use std::panic;

/// Pretty panics on stderr, and a copy of the message in the log file.
///
/// The hook does not exit the process, so unwinding still runs the session
/// and store destructors that flush pending progress.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        default_hook(panic_info);
    }));
}
