//! `driver-sync` binary.

fn main() -> std::process::ExitCode {
	driver_sync::cli::main()
}
