use std::process::ExitCode;

fn main() -> ExitCode {
    modbus_bridge::runtime::run_from_args()
}
