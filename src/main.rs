use decl_port::cli;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(command_line_interface.log_filter()),
    )
    .init();
    command_line_interface.run()
}
