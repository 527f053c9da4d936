use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = flagscope_api::Args::parse();

	flagscope_api::run(args).await
}
