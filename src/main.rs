use autopkgtest_cli::AutopkgtestCli;

fn main() -> anyhow::Result<()> {
    let success = AutopkgtestCli::execute()?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
