use log::error;

/// Exit code the service manager sees when the daemon resets itself
pub const RESET_EXIT_CODE: i32 = 75;

/// Hard reset. The process exits and the service manager starts it again
/// from scratch, which also hands back any memory the process was holding.
pub fn reset(reason: &str) -> ! {
    error!("Resetting: {}", reason);
    log::logger().flush();
    std::process::exit(RESET_EXIT_CODE);
}
