fn main() -> anyhow::Result<()> {
    soulspak::cli::run_cli()
}
