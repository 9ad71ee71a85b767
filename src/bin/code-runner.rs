use anyhow::Result;

fn main() -> Result<()> {
    code_runner::cli::run()
}
